pub mod error;
pub mod types;

pub use error::SlimeError;
pub use types::Result;
