pub extern crate actix_web;

pub mod admin;
pub mod config;
pub mod connection;
mod connection_tx;
pub mod document_file;
pub mod handlers;
pub mod server;

pub use connection_tx::ConnectionTx;
