pub mod api_endpoints;
pub mod cli;
pub mod config;
pub mod permissions;
pub mod server_runner;
pub mod structs;
pub mod tokens;
pub mod utils;
