pub mod codec;
pub mod error;
pub mod hash;
pub mod types;

pub use error::ChainError;
pub use hash::Hash512;

pub type Result<T> = std::result::Result<T, ChainError>;
