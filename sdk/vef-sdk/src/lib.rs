//! Authoring SDK for VillageSQL extensions.
//!
//! An extension declares its SQL functions with the [`Extension`] builder,
//! implements them as plain safe Rust functions, and exports the two ABI
//! symbols with [`export_extension!`]. Everything that crosses the C
//! boundary (argument decoding, result-slot writes, panic containment)
//! lives in this crate so extension code never touches a raw pointer.

pub mod function;
pub mod logging;
pub mod registration;
pub mod result;

mod macros;

pub use function::{
    Args, CallContext, Extension, ExtensionBuilder, FunctionDef, ScalarFn, ScalarResult, SqlArg,
    SqlOutput,
};
pub use result::ResultSlot;

pub use vef_types::abi;
pub use vef_types::abi::VefSqlType;
pub use vef_types::{Result, VefError};
