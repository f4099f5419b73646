pub mod archive;
pub mod cli;
pub mod client;
pub mod load_config;

pub use cli::{run, Cli, Commands};
