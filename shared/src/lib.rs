pub mod error;
pub mod models;
pub mod validation;

pub use error::DecodeError;
pub use models::*;
pub use validation::*;
