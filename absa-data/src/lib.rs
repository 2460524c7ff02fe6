pub mod config;
pub mod corpus;
pub mod dataset;
pub mod embedding;
pub mod error;
mod persist;
pub mod vocab;

pub use error::{DataError, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn get_version() -> &'static str {
    VERSION
}
