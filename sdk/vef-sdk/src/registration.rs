//! Registration glue between the safe [`Extension`] declaration and the
//! host's C registrar. This is the only module that crosses the ABI in the
//! guest direction; extension code reaches it through `export_extension!`.

use std::ffi::{c_void, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};

use vef_types::abi::{
    VefContext, VefFunctionDesc, VefInValue, VefRegistrar, VefResult, VEF_ABI_VERSION,
    VEF_FAILURE, VEF_LOG_ERROR, VEF_LOG_INFO, VEF_OK,
};
use vef_types::VefError;

use crate::function::{Args, CallContext, Extension, ScalarFn, SqlOutput};
use crate::logging;
use crate::result::ResultSlot;

/// Drive the host registrar with a freshly built extension declaration.
/// This is the body of the generated `vef_extension_entry` export.
///
/// # Safety
///
/// `registrar` must be null or point to a `VefRegistrar` that stays valid
/// for the duration of the call.
pub unsafe fn entry(
    registrar: *const VefRegistrar,
    build: fn() -> Result<Extension, VefError>,
) -> i32 {
    if registrar.is_null() {
        return VEF_FAILURE;
    }
    let registrar = &*registrar;

    // 先接上宿主日志，后续的失败路径才有地方可说话
    logging::set_host_log(registrar.log);

    if registrar.abi_version != VEF_ABI_VERSION {
        logging::emit(
            VEF_LOG_ERROR,
            &format!(
                "ABI version mismatch: host {}, extension {}",
                registrar.abi_version, VEF_ABI_VERSION
            ),
        );
        return VEF_FAILURE;
    }

    let ext = match catch_unwind(build) {
        Ok(Ok(ext)) => ext,
        Ok(Err(err)) => {
            logging::emit(VEF_LOG_ERROR, &format!("extension build failed: {err}"));
            return VEF_FAILURE;
        }
        Err(_) => {
            logging::emit(VEF_LOG_ERROR, "extension builder panicked");
            return VEF_FAILURE;
        }
    };

    match register(&ext, registrar) {
        Ok(()) => {
            logging::emit(
                VEF_LOG_INFO,
                &format!(
                    "registered extension {} v{} ({} functions)",
                    ext.name(),
                    ext.version(),
                    ext.functions().len()
                ),
            );
            VEF_OK
        }
        Err(err) => {
            logging::emit(VEF_LOG_ERROR, &format!("registration failed: {err}"));
            VEF_FAILURE
        }
    }
}

/// Hand every declared function to the host, one descriptor at a time.
/// The host copies descriptor contents during the call, so the temporary
/// CString and type slice only need to live until `register_function`
/// returns.
fn register(ext: &Extension, registrar: &VefRegistrar) -> Result<(), VefError> {
    for def in ext.functions() {
        let name = CString::new(def.name()).map_err(|_| {
            VefError::InvalidFunction(format!("{}: name contains a NUL byte", def.name()))
        })?;
        let arg_types = def.arg_types();

        let desc = VefFunctionDesc {
            name: name.as_ptr(),
            return_type: def.return_type(),
            arg_types: arg_types.as_ptr(),
            arg_count: arg_types.len(),
            max_result_len: def.declared_max_result_len(),
            callback: scalar_trampoline,
            user_data: erase_callback(def.callback()),
        };

        // Safety: desc points at live data for the duration of the call
        let rc = unsafe { (registrar.register_function)(registrar.registry, &desc) };
        if rc != VEF_OK {
            return Err(VefError::Registration(format!(
                "host rejected function {}",
                def.name()
            )));
        }
    }
    Ok(())
}

fn erase_callback(f: ScalarFn) -> *const c_void {
    f as *const () as *const c_void
}

/// # Safety
///
/// `user_data` must have been produced by [`erase_callback`].
unsafe fn restore_callback(user_data: *const c_void) -> ScalarFn {
    std::mem::transmute::<*const c_void, ScalarFn>(user_data)
}

/// The single C callback registered for every function. `user_data`
/// carries the safe callback; everything the safe code returns (value,
/// NULL, error) or does wrong (panic) ends up in the result slot. Never
/// unwinds across the boundary.
pub(crate) unsafe extern "C" fn scalar_trampoline(
    ctx: *mut VefContext,
    user_data: *const c_void,
    args: *const VefInValue,
    argc: usize,
    result: *mut VefResult,
) {
    if result.is_null() {
        return;
    }
    let mut slot = ResultSlot::from_raw(result);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let callback = restore_callback(user_data);
        let args = Args::from_raw(args, argc)?;
        let ctx = CallContext::from_raw(ctx);
        callback(&ctx, &args)
    }));

    match outcome {
        Ok(Ok(Some(SqlOutput::Text(text)))) => {
            if let Err(err) = slot.set_text(&text) {
                slot.set_error(&err.to_string());
            }
        }
        Ok(Ok(Some(SqlOutput::Integer(value)))) => slot.set_integer(value),
        Ok(Ok(None)) => slot.set_null(),
        Ok(Err(err)) => slot.set_error(&err.to_string()),
        Err(_) => slot.set_error("extension function panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vef_types::abi::{VefResultKind, VefSqlType};

    fn shout(_ctx: &CallContext, args: &Args) -> crate::function::ScalarResult {
        match args.get(0) {
            Some(crate::function::SqlArg::Null) => Ok(None),
            Some(crate::function::SqlArg::Text(s)) => {
                Ok(Some(SqlOutput::Text(s.to_uppercase())))
            }
            _ => Err(VefError::InvalidArgument("expected text".to_string())),
        }
    }

    fn panicky(_ctx: &CallContext, _args: &Args) -> crate::function::ScalarResult {
        panic!("boom");
    }

    fn call_through_trampoline(
        callback: ScalarFn,
        args: &[VefInValue],
        capacity: usize,
    ) -> (VefResultKind, i64, Vec<u8>) {
        let mut buf = vec![0u8; capacity];
        let mut result = VefResult {
            kind: VefResultKind::Null,
            int_value: 0,
            buf: buf.as_mut_ptr(),
            capacity,
            len: 0,
        };

        unsafe {
            scalar_trampoline(
                std::ptr::null_mut(),
                erase_callback(callback),
                args.as_ptr(),
                args.len(),
                &mut result,
            );
        }

        (result.kind, result.int_value, buf[..result.len].to_vec())
    }

    fn text_arg(s: &str) -> VefInValue {
        VefInValue {
            value_type: VefSqlType::Text,
            is_null: false,
            int_value: 0,
            data: s.as_ptr(),
            len: s.len(),
        }
    }

    fn null_arg() -> VefInValue {
        VefInValue {
            value_type: VefSqlType::Text,
            is_null: true,
            int_value: 0,
            data: std::ptr::null(),
            len: 0,
        }
    }

    #[test]
    fn test_trampoline_returns_value() {
        let args = [text_arg("hi")];
        let (kind, _, bytes) = call_through_trampoline(shout, &args, 32);
        assert_eq!(kind, VefResultKind::Value);
        assert_eq!(bytes, b"HI");
    }

    #[test]
    fn test_trampoline_returns_null_for_null_input() {
        let args = [null_arg()];
        let (kind, _, bytes) = call_through_trampoline(shout, &args, 32);
        assert_eq!(kind, VefResultKind::Null);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_trampoline_converts_callback_error() {
        let (kind, _, bytes) = call_through_trampoline(shout, &[], 64);
        assert_eq!(kind, VefResultKind::Error);
        let msg = String::from_utf8(bytes).unwrap();
        assert!(msg.contains("expected text"), "unexpected message: {msg}");
    }

    #[test]
    fn test_trampoline_contains_panics() {
        let args = [text_arg("x")];
        let (kind, _, bytes) = call_through_trampoline(panicky, &args, 64);
        assert_eq!(kind, VefResultKind::Error);
        let msg = String::from_utf8(bytes).unwrap();
        assert!(msg.contains("panicked"));
    }

    #[test]
    fn test_trampoline_rejects_oversized_value() {
        fn wide(_ctx: &CallContext, _args: &Args) -> crate::function::ScalarResult {
            Ok(Some(SqlOutput::Text("x".repeat(100))))
        }

        // capacity 8 太小，写不下 100 字节的结果
        let (kind, _, bytes) = call_through_trampoline(wide, &[], 8);
        assert_eq!(kind, VefResultKind::Error);
        assert!(!bytes.is_empty());
    }
}
