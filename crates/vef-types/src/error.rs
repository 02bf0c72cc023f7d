use thiserror::Error;

/// VEF 统一错误类型
#[derive(Error, Debug)]
pub enum VefError {
    #[error("ABI version mismatch: host {host}, extension {extension}")]
    AbiMismatch { host: u32, extension: u32 },

    #[error("Duplicate function: {0}")]
    DuplicateFunction(String),

    #[error("Invalid function declaration: {0}")]
    InvalidFunction(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Result too large: {len} bytes exceeds declared capacity {capacity}")]
    ResultTooLarge { len: usize, capacity: usize },

    #[error("Registration error: {0}")]
    Registration(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, VefError>;
