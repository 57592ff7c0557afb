pub mod chip;
pub mod cli;
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod sources;
pub mod types;
