// crates/engine_shared/src/plugin_api.rs
use core::ffi::c_void;
use core::ptr::NonNull;

// ==================================================================================
// 1. ENTRY POINTS (The "Contract")
// ==================================================================================

/// Symbol a module exports to be notified right after it is mapped.
pub const LOAD_PLUGIN_SYMBOL: &str = "loadPlugin";

/// Symbol a module exports to be notified right before it is unmapped.
pub const UNLOAD_PLUGIN_SYMBOL: &str = "unloadPlugin";

/// `loadPlugin`: no arguments, may return an opaque context (null means "none").
pub type LoadPluginFn = unsafe extern "C" fn() -> *mut c_void;

/// `unloadPlugin`: no arguments, no return value.
pub type UnloadPluginFn = unsafe extern "C" fn();

// ==================================================================================
// 2. OPAQUE CONTEXT
// ==================================================================================

/// Whatever `loadPlugin` handed back to the host.
///
/// The host never dereferences it. It is kept so the owner of the plugin can
/// hand it back to plugin-specific APIs.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginContext(NonNull<c_void>);

impl PluginContext {
    /// Wraps a raw `loadPlugin` result. Null maps to `None`.
    pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

// SAFETY: the pointer is opaque to the host and only ever passed back to the
// module that produced it.
unsafe impl Send for PluginContext {}

// ==================================================================================
// 3. MODULE FILE NAMES
// ==================================================================================

/// Suffix the platform's loader expects on a shared module file.
#[cfg(target_os = "windows")]
pub const MODULE_SUFFIX: &str = ".dll";
#[cfg(target_os = "macos")]
pub const MODULE_SUFFIX: &str = ".dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const MODULE_SUFFIX: &str = ".so";

// ==================================================================================
// 4. EXPORT HELPER
// ==================================================================================

/// Emits the two well-known entry points for a native module.
///
/// ```rust,ignore
/// fn on_load() -> *mut core::ffi::c_void { core::ptr::null_mut() }
/// fn on_unload() {}
///
/// engine_shared::declare_plugin!(load: on_load, unload: on_unload);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    (load: $load:path, unload: $unload:path) => {
        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn loadPlugin() -> *mut ::core::ffi::c_void {
            $load()
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn unloadPlugin() {
            $unload()
        }
    };
    (load: $load:path) => {
        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn loadPlugin() -> *mut ::core::ffi::c_void {
            $load()
        }
    };
}
