use std::collections::HashMap;
use std::ffi::{c_void, CStr};

use anyhow::{bail, Context, Result};
use vef_types::abi::{
    VefFunctionDesc, VefInValue, VefRegistry, VefResult, VefResultKind, VefScalarFn, VefSqlType,
    VEF_FAILURE, VEF_LOG_DEBUG, VEF_LOG_INFO, VEF_LOG_TRACE, VEF_LOG_WARN, VEF_OK,
    VEF_RESULT_MIN_CAPACITY,
};
use vef_types::VefError;

use crate::value::{HostValue, SqlReturn};

/// One function as it arrived through the C registrar.
pub struct RegisteredFunction {
    pub name: String,
    pub return_type: VefSqlType,
    pub arg_types: Vec<VefSqlType>,
    pub max_result_len: usize,
    pub callback: VefScalarFn,
    pub user_data: *const c_void,
}

// The ABI requires callbacks (and whatever user_data points at) to be
// callable from any host thread; the SDK side stores a plain fn pointer
// there.
unsafe impl Send for RegisteredFunction {}
unsafe impl Sync for RegisteredFunction {}

/// Collects function descriptors while the extension entry point runs.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, RegisteredFunction>,
    last_error: Option<String>,
}

impl FunctionRegistry {
    pub fn get(&self, name: &str) -> Option<&RegisteredFunction> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Sorted function names, for listings.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn take_last_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Dispatch one call by function name.
    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<SqlReturn> {
        let func = self
            .functions
            .get(name)
            .with_context(|| format!("unknown function: {name}"))?;
        call_function(func, args)
    }

    /// Validate and store one descriptor. Rich errors stay on the registry
    /// because the C boundary can only carry a status code.
    fn insert_desc(&mut self, desc: &VefFunctionDesc) -> std::result::Result<(), VefError> {
        if desc.name.is_null() {
            return Err(VefError::InvalidFunction("name is null".to_string()));
        }
        // Safety: checked non-null; the SDK hands us a NUL-terminated name
        let name = unsafe { CStr::from_ptr(desc.name) }
            .to_str()
            .map_err(|_| VefError::InvalidFunction("name is not valid UTF-8".to_string()))?
            .to_string();
        if name.is_empty() {
            return Err(VefError::InvalidFunction("name is empty".to_string()));
        }
        if self.functions.contains_key(&name) {
            return Err(VefError::DuplicateFunction(name));
        }
        if desc.return_type == VefSqlType::Text && desc.max_result_len == 0 {
            return Err(VefError::InvalidFunction(format!(
                "{name}: text return requires a non-zero max_result_len"
            )));
        }

        let arg_types = if desc.arg_count == 0 {
            Vec::new()
        } else if desc.arg_types.is_null() {
            return Err(VefError::InvalidFunction(format!(
                "{name}: arg_types is null with arg_count {}",
                desc.arg_count
            )));
        } else {
            // Safety: non-null and the SDK guarantees arg_count entries
            unsafe { std::slice::from_raw_parts(desc.arg_types, desc.arg_count) }.to_vec()
        };

        tracing::debug!("registered function {name} ({} args)", arg_types.len());
        self.functions.insert(
            name.clone(),
            RegisteredFunction {
                name,
                return_type: desc.return_type,
                arg_types,
                max_result_len: desc.max_result_len,
                callback: desc.callback,
                user_data: desc.user_data,
            },
        );
        Ok(())
    }
}

/// The `register_function` callback handed to extension entry points. The
/// opaque registry pointer is a `FunctionRegistry` owned by the loader.
pub(crate) unsafe extern "C" fn register_function(
    registry: *mut VefRegistry,
    desc: *const VefFunctionDesc,
) -> i32 {
    if registry.is_null() || desc.is_null() {
        return VEF_FAILURE;
    }
    let registry = &mut *(registry as *mut FunctionRegistry);
    match registry.insert_desc(&*desc) {
        Ok(()) => VEF_OK,
        Err(err) => {
            registry.last_error = Some(err.to_string());
            VEF_FAILURE
        }
    }
}

// 防止超大日志
const MAX_LOG_LEN: usize = 4096;

/// Log sink handed to extensions; re-emits guest log lines through the
/// host's tracing subscriber.
pub(crate) unsafe extern "C" fn host_log(level: u32, ptr: *const u8, len: usize) {
    if ptr.is_null() {
        return;
    }
    // 限制日志长度
    let len = len.min(MAX_LOG_LEN);
    if len == 0 {
        return;
    }

    let slice = std::slice::from_raw_parts(ptr, len);
    match std::str::from_utf8(slice) {
        Ok(msg) => match level {
            VEF_LOG_TRACE => tracing::trace!(target: "vef_extension", "{}", msg),
            VEF_LOG_DEBUG => tracing::debug!(target: "vef_extension", "{}", msg),
            VEF_LOG_INFO => tracing::info!(target: "vef_extension", "{}", msg),
            VEF_LOG_WARN => tracing::warn!(target: "vef_extension", "{}", msg),
            _ => tracing::error!(target: "vef_extension", "{}", msg),
        },
        Err(e) => {
            tracing::warn!("Invalid UTF-8 in extension log (len={}): {}", len, e);
        }
    }
}

/// Invoke one registered function the way the engine would: marshal the
/// arguments, hand over a result buffer of the declared capacity, decode
/// the slot afterwards.
pub fn call_function(func: &RegisteredFunction, args: &[HostValue]) -> Result<SqlReturn> {
    if args.len() != func.arg_types.len() {
        bail!(
            "wrong argument count for {}: expected {}, got {}",
            func.name,
            func.arg_types.len(),
            args.len()
        );
    }

    let mut raw_args = Vec::with_capacity(args.len());
    for (idx, (value, ty)) in args.iter().zip(&func.arg_types).enumerate() {
        let raw = match (value, ty) {
            (HostValue::Null, ty) => VefInValue {
                value_type: *ty,
                is_null: true,
                int_value: 0,
                data: std::ptr::null(),
                len: 0,
            },
            (HostValue::Text(s), VefSqlType::Text) => VefInValue {
                value_type: VefSqlType::Text,
                is_null: false,
                int_value: 0,
                data: s.as_ptr(),
                len: s.len(),
            },
            (HostValue::Integer(v), VefSqlType::Integer) => VefInValue {
                value_type: VefSqlType::Integer,
                is_null: false,
                int_value: *v,
                data: std::ptr::null(),
                len: 0,
            },
            _ => bail!(
                "wrong argument type for {}: argument {} expects {}",
                func.name,
                idx + 1,
                ty
            ),
        };
        raw_args.push(raw);
    }

    // 错误消息也走结果缓冲区，保证最小容量
    let capacity = func.max_result_len.max(VEF_RESULT_MIN_CAPACITY);
    let mut buf = vec![0u8; capacity];
    let mut result = VefResult {
        kind: VefResultKind::Null,
        int_value: 0,
        buf: buf.as_mut_ptr(),
        capacity,
        len: 0,
    };

    // Safety: raw_args borrows from `args` which outlives the call, the
    // buffer lives until after decoding, and the callback contract says
    // nothing is retained past the call.
    unsafe {
        (func.callback)(
            std::ptr::null_mut(),
            func.user_data,
            raw_args.as_ptr(),
            raw_args.len(),
            &mut result,
        );
    }

    if result.len > result.capacity {
        bail!(
            "extension wrote {} bytes into a {} byte buffer",
            result.len,
            result.capacity
        );
    }
    let payload = &buf[..result.len];

    match result.kind {
        VefResultKind::Null => Ok(SqlReturn::Null),
        VefResultKind::Error => Ok(SqlReturn::Error(
            String::from_utf8_lossy(payload).to_string(),
        )),
        VefResultKind::Value => match func.return_type {
            VefSqlType::Integer => Ok(SqlReturn::Integer(result.int_value)),
            VefSqlType::Text => Ok(SqlReturn::Text(
                String::from_utf8(payload.to_vec())
                    .context("extension returned invalid UTF-8")?,
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    unsafe extern "C" fn echo_upper(
        _ctx: *mut vef_types::abi::VefContext,
        _user_data: *const c_void,
        args: *const VefInValue,
        argc: usize,
        result: *mut VefResult,
    ) {
        let result = &mut *result;
        if argc != 1 {
            result.kind = VefResultKind::Error;
            result.len = 0;
            return;
        }
        let arg = &*args;
        if arg.is_null {
            result.kind = VefResultKind::Null;
            result.len = 0;
            return;
        }
        let text = std::slice::from_raw_parts(arg.data, arg.len);
        let upper = String::from_utf8_lossy(text).to_uppercase();
        std::ptr::copy_nonoverlapping(upper.as_ptr(), result.buf, upper.len());
        result.len = upper.len();
        result.kind = VefResultKind::Value;
    }

    fn register_echo(registry: &mut FunctionRegistry, name: &str) -> i32 {
        let cname = CString::new(name).unwrap();
        let arg_types = [VefSqlType::Text];
        let desc = VefFunctionDesc {
            name: cname.as_ptr(),
            return_type: VefSqlType::Text,
            arg_types: arg_types.as_ptr(),
            arg_count: 1,
            max_result_len: 64,
            callback: echo_upper,
            user_data: std::ptr::null(),
        };
        unsafe {
            register_function(
                registry as *mut FunctionRegistry as *mut VefRegistry,
                &desc,
            )
        }
    }

    #[test]
    fn test_register_and_call() {
        let mut registry = FunctionRegistry::default();
        assert_eq!(register_echo(&mut registry, "upper"), VEF_OK);
        assert_eq!(registry.len(), 1);

        let result = registry
            .call("upper", &[HostValue::Text("hello".to_string())])
            .unwrap();
        assert_eq!(result, SqlReturn::Text("HELLO".to_string()));
    }

    #[test]
    fn test_null_argument_passes_through() {
        let mut registry = FunctionRegistry::default();
        register_echo(&mut registry, "upper");

        let result = registry.call("upper", &[HostValue::Null]).unwrap();
        assert_eq!(result, SqlReturn::Null);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = FunctionRegistry::default();
        assert_eq!(register_echo(&mut registry, "upper"), VEF_OK);
        assert_eq!(register_echo(&mut registry, "upper"), VEF_FAILURE);
        assert!(registry
            .take_last_error()
            .unwrap()
            .contains("Duplicate function"));
    }

    #[test]
    fn test_zero_capacity_text_function_is_rejected() {
        let mut registry = FunctionRegistry::default();
        let cname = CString::new("bad").unwrap();
        let desc = VefFunctionDesc {
            name: cname.as_ptr(),
            return_type: VefSqlType::Text,
            arg_types: std::ptr::null(),
            arg_count: 0,
            max_result_len: 0,
            callback: echo_upper,
            user_data: std::ptr::null(),
        };
        let rc = unsafe {
            register_function(
                &mut registry as *mut FunctionRegistry as *mut VefRegistry,
                &desc,
            )
        };
        assert_eq!(rc, VEF_FAILURE);
    }

    #[test]
    fn test_wrong_argument_count() {
        let mut registry = FunctionRegistry::default();
        register_echo(&mut registry, "upper");

        let err = registry.call("upper", &[]).unwrap_err();
        assert!(err.to_string().contains("wrong argument count"));
    }

    #[test]
    fn test_wrong_argument_type() {
        let mut registry = FunctionRegistry::default();
        register_echo(&mut registry, "upper");

        let err = registry.call("upper", &[HostValue::Integer(1)]).unwrap_err();
        assert!(err.to_string().contains("wrong argument type"));
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::default();
        let err = registry.call("nope", &[]).unwrap_err();
        assert!(err.to_string().contains("unknown function"));
    }
}
