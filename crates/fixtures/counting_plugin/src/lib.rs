// crates/fixtures/counting_plugin/src/lib.rs
//
// Exports both plugin entry points and counts how often each one ran.

use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

static LOADS: AtomicUsize = AtomicUsize::new(0);
static UNLOADS: AtomicUsize = AtomicUsize::new(0);
static CONTEXT: u8 = 0;

fn on_load() -> *mut c_void {
    LOADS.fetch_add(1, Ordering::SeqCst);
    context_ptr()
}

fn on_unload() {
    UNLOADS.fetch_add(1, Ordering::SeqCst);
}

fn context_ptr() -> *mut c_void {
    std::ptr::addr_of!(CONTEXT) as *mut c_void
}

engine_shared::declare_plugin!(load: on_load, unload: on_unload);

#[no_mangle]
pub extern "C" fn counting_plugin_loads() -> usize {
    LOADS.load(Ordering::SeqCst)
}

#[no_mangle]
pub extern "C" fn counting_plugin_unloads() -> usize {
    UNLOADS.load(Ordering::SeqCst)
}

/// The pointer `loadPlugin` hands back.
#[no_mangle]
pub extern "C" fn counting_plugin_context() -> *mut c_void {
    context_ptr()
}
