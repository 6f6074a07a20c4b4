//! CLI command handlers, one file per subcommand.

mod completions;
mod get;
mod scan;

use anyhow::Result;
use blockdl_core::config::BlockdlConfig;

pub use completions::run_completions;
pub use get::run_get;
pub use scan::run_scan;

#[cfg(test)]
pub(crate) use get::{exit_status, format_progress, on_interrupt, Interrupt};
#[cfg(test)]
pub(crate) use scan::compact_indices;

/// Command-line values that take precedence over config.toml.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub block_size_kb: Option<u64>,
    pub workers: Option<usize>,
}

impl Overrides {
    /// Config with these overrides applied, validated.
    pub fn apply(&self, cfg: &BlockdlConfig) -> Result<BlockdlConfig> {
        let mut merged = cfg.clone();
        if let Some(kb) = self.block_size_kb {
            merged.block_size_kb = kb;
        }
        if let Some(n) = self.workers {
            merged.workers = n;
        }
        merged.validate()?;
        Ok(merged)
    }
}
