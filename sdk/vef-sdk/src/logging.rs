//! 扩展侧日志
//!
//! 扩展本身没有自己的日志后端：日志通过注册时宿主交来的函数指针转发，
//! 由宿主决定落到哪里（服务器日志、tracing 等）。注册之前调用日志宏是
//! 安全的空操作。

use std::sync::OnceLock;

use vef_types::abi::VefLogFn;

static HOST_LOG: OnceLock<VefLogFn> = OnceLock::new();

/// Capture the host's log sink. Called once from the generated entry
/// point; later registrations of the same process keep the first sink.
pub(crate) fn set_host_log(log: VefLogFn) {
    let _ = HOST_LOG.set(log);
}

/// Forward one formatted message to the host. No-op before registration.
#[doc(hidden)]
pub fn emit(level: u32, message: &str) {
    if let Some(log) = HOST_LOG.get() {
        // Safety: the host guarantees the sink stays callable for the
        // lifetime of the loaded extension; we pass a valid UTF-8 range.
        unsafe {
            log(level, message.as_ptr(), message.len());
        }
    }
}
