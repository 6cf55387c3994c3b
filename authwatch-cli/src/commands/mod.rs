//! Command handlers -- one module per subcommand

pub mod alerts;
pub mod config;
pub mod fetch;
pub mod ips;
pub mod status;
