//! Result I/O.

pub mod export;
