//! Scripted in-memory transport for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{RangeBody, Transport};
use crate::fetch_head::HeadResult;
use crate::retry::{BodyError, RequestError};

/// What the scripted server does for one range request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reply {
    /// 206 with exactly the requested bytes.
    Full,
    /// Non-2xx status; the request fails before any body is read.
    Status(u32),
    /// Body ends cleanly after `n` bytes.
    Short(usize),
    /// Body is cut off after `n` bytes with an incomplete-body error.
    Incomplete(usize),
    /// The first `n` body reads fail, then the full range arrives.
    FlakyRead(u32),
    /// Every body read fails.
    BrokenRead,
    /// Ignores Range and returns the whole object.
    WholeObject,
}

type Responder = dyn Fn(u64, u32) -> Reply + Send + Sync;

/// Serves `body` from memory. `responder(start, call)` picks the reply for
/// the `call`-th (1-based) request of the range starting at `start`.
pub(crate) struct ScriptedTransport {
    body: Vec<u8>,
    head: HeadResult,
    probe_failures: AtomicUsize,
    responder: Box<Responder>,
    calls: Mutex<HashMap<u64, u32>>,
    total_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new(body: Vec<u8>) -> Self {
        let head = HeadResult {
            content_length: Some(body.len() as u64),
            accept_ranges: true,
            content_disposition: None,
        };
        ScriptedTransport {
            body,
            head,
            probe_failures: AtomicUsize::new(0),
            responder: Box::new(|_, _| Reply::Full),
            calls: Mutex::new(HashMap::new()),
            total_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_responder<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, u32) -> Reply + Send + Sync + 'static,
    {
        self.responder = Box::new(f);
        self
    }

    pub(crate) fn with_head(mut self, head: HeadResult) -> Self {
        self.head = head;
        self
    }

    /// Fail the first `n` probes with a connection error.
    pub(crate) fn with_probe_failures(self, n: usize) -> Self {
        self.probe_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Number of range requests issued for the range starting at `start`.
    pub(crate) fn calls_for(&self, start: u64) -> u32 {
        self.calls.lock().unwrap().get(&start).copied().unwrap_or(0)
    }

    /// Number of range requests issued in total.
    pub(crate) fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn probe(&self, _url: &str) -> anyhow::Result<HeadResult> {
        let left = self.probe_failures.load(Ordering::SeqCst);
        if left > 0 {
            self.probe_failures.store(left - 1, Ordering::SeqCst);
            anyhow::bail!("connection refused");
        }
        Ok(self.head.clone())
    }

    fn send_range(
        &self,
        _url: &str,
        start: u64,
        end: u64,
    ) -> Result<Box<dyn RangeBody>, RequestError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let c = calls.entry(start).or_insert(0);
            *c += 1;
            *c
        };
        let reply = (self.responder)(start, call);
        let end_excl = ((end + 1) as usize).min(self.body.len());
        let slice = self.body[start as usize..end_excl].to_vec();
        let reads = match reply {
            Reply::Full => vec![Ok(slice)],
            Reply::Status(code) => return Err(RequestError::Http(code)),
            Reply::Short(n) => vec![Ok(slice[..n].to_vec())],
            Reply::Incomplete(n) => vec![Err(BodyError::Incomplete {
                received: slice[..n].to_vec(),
            })],
            Reply::FlakyRead(n) => {
                let mut reads: Vec<_> = (0..n)
                    .map(|_| Err(BodyError::Transport("connection reset".into())))
                    .collect();
                reads.push(Ok(slice));
                reads
            }
            Reply::BrokenRead => Vec::new(),
            Reply::WholeObject => vec![Ok(self.body.clone())],
        };
        Ok(Box::new(ScriptedBody { reads, next: 0 }))
    }
}

struct ScriptedBody {
    reads: Vec<Result<Vec<u8>, BodyError>>,
    next: usize,
}

impl RangeBody for ScriptedBody {
    fn read_body(&mut self) -> Result<Vec<u8>, BodyError> {
        let i = self.next;
        self.next += 1;
        match self.reads.get_mut(i) {
            Some(slot) => std::mem::replace(slot, Err(BodyError::Transport("consumed".into()))),
            None => Err(BodyError::Transport("connection reset".into())),
        }
    }
}
