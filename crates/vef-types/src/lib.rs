pub mod abi;
pub mod error;

pub use abi::*;
pub use error::{Result, VefError};
