//! VEF ABI - the C surface shared between the VillageSQL host and loaded
//! extensions.
//!
//! Extensions must export these symbols:
//! - `vef_abi_version() -> u32`
//! - `vef_extension_entry(*const VefRegistrar) -> i32`
//!
//! All pointered data handed to a callback (`VefInValue`, `VefResult`) is
//! owned by the host and only borrowed for the duration of a single call.
//! The host copies `VefFunctionDesc` contents during registration, so the
//! descriptor's pointers need not outlive the `register_function` call.

use std::ffi::{c_char, c_void};

use serde::{Deserialize, Serialize};

/// ABI version for compatibility checking. Bumped whenever the C layout
/// below changes.
pub const VEF_ABI_VERSION: u32 = 1;

/// Entry returned by `vef_extension_entry` on success.
pub const VEF_OK: i32 = 0;
/// Entry / registration failure code.
pub const VEF_FAILURE: i32 = 1;

/// Hosts allocate result buffers of at least this many bytes, even for
/// functions that declare a smaller (or zero) text capacity, so that error
/// messages always have room to travel back through the slot.
pub const VEF_RESULT_MIN_CAPACITY: usize = 256;

/// Symbol name of the ABI version export.
pub const VEF_ABI_VERSION_SYMBOL: &[u8] = b"vef_abi_version";
/// Symbol name of the extension entry point.
pub const VEF_ENTRY_SYMBOL: &[u8] = b"vef_extension_entry";

pub const VEF_LOG_TRACE: u32 = 0;
pub const VEF_LOG_DEBUG: u32 = 1;
pub const VEF_LOG_INFO: u32 = 2;
pub const VEF_LOG_WARN: u32 = 3;
pub const VEF_LOG_ERROR: u32 = 4;

/// Opaque per-call execution context. Owned by the host; a callback borrows
/// it for exactly one call and must not retain it.
#[repr(C)]
pub struct VefContext {
    _private: [u8; 0],
}

/// Opaque handle to the host-side function registry, threaded through
/// `VefRegistrar::register_function`.
#[repr(C)]
pub struct VefRegistry {
    _private: [u8; 0],
}

/// SQL types covered by the scaffold.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VefSqlType {
    Text = 0,
    Integer = 1,
}

impl std::fmt::Display for VefSqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VefSqlType::Text => write!(f, "text"),
            VefSqlType::Integer => write!(f, "integer"),
        }
    }
}

/// One input argument, host-owned. For `Text` arguments `data`/`len`
/// describe a UTF-8 byte range; for `Integer` arguments `int_value` holds
/// the value. A SQL NULL sets `is_null` and leaves the rest unspecified.
#[repr(C)]
pub struct VefInValue {
    pub value_type: VefSqlType,
    pub is_null: bool,
    pub int_value: i64,
    pub data: *const u8,
    pub len: usize,
}

/// Three-way result discriminant: a successful value, SQL NULL, or an
/// error with a message.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VefResultKind {
    Value = 0,
    Null = 1,
    Error = 2,
}

/// Caller-allocated result slot. The host allocates `buf` with `capacity`
/// bytes before the call; the callback fills `kind`, writes text or an
/// error message into `buf`, and records the written length in `len`.
/// Writers must keep `len <= capacity`; integer values travel through
/// `int_value` with `len == 0`.
#[repr(C)]
pub struct VefResult {
    pub kind: VefResultKind,
    pub int_value: i64,
    pub buf: *mut u8,
    pub capacity: usize,
    pub len: usize,
}

/// The scalar callback type. `user_data` is the opaque pointer supplied at
/// registration, handed back verbatim on every call.
pub type VefScalarFn = unsafe extern "C" fn(
    ctx: *mut VefContext,
    user_data: *const c_void,
    args: *const VefInValue,
    argc: usize,
    result: *mut VefResult,
);

/// Registration record for one SQL-visible function.
#[repr(C)]
pub struct VefFunctionDesc {
    /// SQL name, null-terminated.
    pub name: *const c_char,
    pub return_type: VefSqlType,
    pub arg_types: *const VefSqlType,
    pub arg_count: usize,
    /// Declared output buffer capacity for `Text` returns. Must be
    /// non-zero for text-returning functions.
    pub max_result_len: usize,
    pub callback: VefScalarFn,
    pub user_data: *const c_void,
}

/// Host log sink: level constant plus a UTF-8 byte range.
pub type VefLogFn = unsafe extern "C" fn(level: u32, ptr: *const u8, len: usize);

/// Registers one function with the host; returns `VEF_OK` on success.
pub type VefRegisterFn =
    unsafe extern "C" fn(registry: *mut VefRegistry, desc: *const VefFunctionDesc) -> i32;

/// What the host hands to `vef_extension_entry`.
#[repr(C)]
pub struct VefRegistrar {
    pub abi_version: u32,
    pub registry: *mut VefRegistry,
    pub register_function: VefRegisterFn,
    pub log: VefLogFn,
}

/// Type of the `vef_extension_entry` export.
pub type VefEntryFn = unsafe extern "C" fn(registrar: *const VefRegistrar) -> i32;

/// Type of the `vef_abi_version` export.
pub type VefAbiVersionFn = unsafe extern "C" fn() -> u32;
