// crates/engine_plugins/src/null_input.rs

use std::collections::VecDeque;
use std::ffi::c_void;

use engine_core::input::{register_input_handler, unregister_input_handler, InputEvent, RawInputHandler};

use crate::shims::{guard_load, guard_unload};

pub const NAME: &str = "NullInput";

/// Input source without a device. Events can be queued up front and are
/// handed out one frame at a time.
#[derive(Default)]
pub struct ScriptedInput {
    frames: VecDeque<Vec<InputEvent>>,
}

impl ScriptedInput {
    pub fn new(frames: impl IntoIterator<Item = Vec<InputEvent>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl RawInputHandler for ScriptedInput {
    fn name(&self) -> &str {
        NAME
    }

    fn poll(&mut self, events: &mut Vec<InputEvent>) {
        if let Some(frame) = self.frames.pop_front() {
            events.extend(frame);
        }
    }
}

pub extern "C" fn load() -> *mut c_void {
    guard_load(NAME, || {
        register_input_handler(NAME, || Box::new(ScriptedInput::default()));
        std::ptr::null_mut()
    })
}

pub extern "C" fn unload() {
    guard_unload(NAME, || {
        unregister_input_handler(NAME);
    })
}
