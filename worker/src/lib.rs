pub mod config;
pub mod error;
pub mod processor;
pub mod queries;
pub mod queue;
pub mod store;
pub mod utils;
pub mod worker;

pub use shared::{models::*, validation::*, error::DecodeError};
