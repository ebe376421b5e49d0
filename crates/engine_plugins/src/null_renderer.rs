// crates/engine_plugins/src/null_renderer.rs

use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use engine_core::renderer::{register_renderer, unregister_renderer, Renderer};

use crate::shims::{guard_load, guard_unload};

pub const NAME: &str = "NullRenderer";

/// Frames drawn by every `NullRenderer` instance in the process.
static FRAMES_RENDERED: AtomicU64 = AtomicU64::new(0);

pub fn frames_rendered() -> u64 {
    FRAMES_RENDERED.load(Ordering::Relaxed)
}

/// Walks the frame without drawing anything.
#[derive(Default)]
pub struct NullRenderer {
    last_frame: AtomicU64,
}

impl Renderer for NullRenderer {
    fn name(&self) -> &str {
        NAME
    }

    fn render_all(&self, frame: u64) {
        self.last_frame.store(frame, Ordering::Relaxed);
        FRAMES_RENDERED.fetch_add(1, Ordering::Relaxed);
    }
}

pub extern "C" fn load() -> *mut c_void {
    guard_load(NAME, || {
        register_renderer(NAME, || Arc::new(NullRenderer::default()));
        std::ptr::null_mut()
    })
}

pub extern "C" fn unload() {
    guard_unload(NAME, || {
        unregister_renderer(NAME);
    })
}
