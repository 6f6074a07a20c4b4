//! Block math.
//!
//! Splits a remote object into fixed-size blocks and computes the inclusive
//! byte range and HTTP `Range` header for each one. The last block may be
//! shorter than the block size.

mod layout;

pub use layout::{Block, BlockLayout};
