pub mod config;
pub mod scratch;
