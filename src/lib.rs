pub mod catalog;
pub mod command;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod reaper;
pub mod server;
pub mod session;
pub mod store;
pub mod wire;
