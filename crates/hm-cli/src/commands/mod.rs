//! CLI subcommand implementations.

pub mod import;
pub mod power;
pub mod readings;
pub mod temperature;
pub mod util;
