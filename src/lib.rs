//! Monte-Carlo AC load-flow studies for small low-voltage networks.

pub mod config;
pub mod flow;
/// Result I/O (CSV export).
pub mod io;
pub mod montecarlo;
pub mod network;
pub mod solver;
pub mod ybus;
