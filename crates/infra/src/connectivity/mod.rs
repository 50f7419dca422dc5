//! Network reachability tracking

pub mod monitor;

pub use monitor::ConnectivityMonitor;
