// crates/engine_plugins/src/shims.rs

use std::ffi::c_void;
use std::panic::{self, UnwindSafe};

/// Runs a `loadPlugin` body without letting a panic cross the C boundary.
/// A panicking load reports no context.
pub(crate) fn guard_load<F>(plugin: &str, f: F) -> *mut c_void
where
    F: FnOnce() -> *mut c_void + UnwindSafe,
{
    match panic::catch_unwind(f) {
        Ok(context) => context,
        Err(_) => {
            tracing::error!(plugin, "loadPlugin panicked");
            std::ptr::null_mut()
        }
    }
}

/// Same for `unloadPlugin`.
pub(crate) fn guard_unload<F>(plugin: &str, f: F)
where
    F: FnOnce() + UnwindSafe,
{
    if panic::catch_unwind(f).is_err() {
        tracing::error!(plugin, "unloadPlugin panicked");
    }
}
