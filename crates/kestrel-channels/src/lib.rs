//! Channel implementations for the Kestrel agent.

pub mod cli;

pub use cli::CliChannel;
