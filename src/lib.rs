pub mod algorithms;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod grid;
pub mod models;
pub mod processors;
pub mod readers;
pub mod store;
pub mod utils;
pub mod writers;

pub use error::{BinningError, Result};
