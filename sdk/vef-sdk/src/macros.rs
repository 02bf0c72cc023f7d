/// Macro to export the two symbols the host looks up when loading an
/// extension: `vef_abi_version` and `vef_extension_entry`.
///
/// Takes the path of a `fn() -> Result<Extension, VefError>` that builds
/// the extension declaration:
///
/// ```ignore
/// fn extension() -> vef_sdk::Result<vef_sdk::Extension> { ... }
/// vef_sdk::export_extension!(extension);
/// ```
#[macro_export]
macro_rules! export_extension {
    ($build:path) => {
        #[no_mangle]
        pub extern "C" fn vef_abi_version() -> u32 {
            $crate::abi::VEF_ABI_VERSION
        }

        /// # Safety
        ///
        /// Called by the host with a registrar that stays valid for the
        /// duration of the call.
        #[no_mangle]
        pub unsafe extern "C" fn vef_extension_entry(
            registrar: *const $crate::abi::VefRegistrar,
        ) -> i32 {
            $crate::registration::entry(registrar, $build)
        }
    };
}

/// TRACE 级别日志宏，经宿主 sink 输出
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::emit($crate::abi::VEF_LOG_TRACE, &msg);
    }};
}

/// DEBUG 级别日志宏
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::emit($crate::abi::VEF_LOG_DEBUG, &msg);
    }};
}

/// INFO 级别日志宏
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::emit($crate::abi::VEF_LOG_INFO, &msg);
    }};
}

/// WARN 级别日志宏
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::emit($crate::abi::VEF_LOG_WARN, &msg);
    }};
}

/// ERROR 级别日志宏
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::emit($crate::abi::VEF_LOG_ERROR, &msg);
    }};
}
