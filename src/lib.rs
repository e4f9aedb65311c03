pub mod cli;
pub mod config;
pub mod pipeline;
pub mod setup;
pub mod source;
pub mod upload;
pub mod watch;
