pub mod catalog;
pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod hooks;
pub mod keys;
pub mod proxy;
pub mod routes;
pub mod schema;
pub mod session;
pub mod testing;
pub mod upstream;
