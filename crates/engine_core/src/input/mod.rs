// crates/engine_core/src/input/mod.rs
pub mod actions;
pub mod state;

use std::any::Any;

use crate::error::{EngineError, Result};
use crate::factory::FactoryTable;
use crate::subsystem::{LiveSubsystems, Subsystem};

pub use actions::{ActionMap, ButtonCode};
pub use state::{ActionId, InputState, MAX_ACTIONS, MAX_AXES};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Button { code: ButtonCode, pressed: bool },
    Axis { index: usize, value: f32 },
    /// Focus left the window; every held button is released.
    FocusLost,
}

/// Device-level input source, usually provided by an input plugin.
pub trait RawInputHandler: Send {
    fn name(&self) -> &str;

    /// Appends everything received since the previous call.
    fn poll(&mut self, events: &mut Vec<InputEvent>);
}

static INPUT_HANDLERS: FactoryTable<Box<dyn RawInputHandler>> = FactoryTable::new();

pub fn register_input_handler(
    name: &str,
    factory: impl Fn() -> Box<dyn RawInputHandler> + Send + Sync + 'static,
) {
    INPUT_HANDLERS.register(name, factory);
}

pub fn unregister_input_handler(name: &str) -> bool {
    INPUT_HANDLERS.unregister(name)
}

/// Turns raw handler events into per-frame action state.
#[derive(Default)]
pub struct Input {
    handler: Option<Box<dyn RawInputHandler>>,
    actions: ActionMap,
    state: InputState,
    events: Vec<InputEvent>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the raw handler with one built by the factory registered under `name`.
    pub fn set_handler(&mut self, name: &str) -> Result<()> {
        let handler = INPUT_HANDLERS
            .create(name)
            .ok_or_else(|| EngineError::UnknownFactory(name.to_owned()))?;
        tracing::info!(handler = handler.name(), "input handler active");
        self.handler = Some(handler);
        Ok(())
    }

    pub fn set_raw_handler(&mut self, handler: Box<dyn RawInputHandler>) {
        self.handler = Some(handler);
    }

    /// Drops the current handler. Must happen before its plugin is unloaded.
    pub fn clear_handler(&mut self) {
        self.handler = None;
        self.state = InputState::default();
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    pub fn actions(&self) -> &ActionMap {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionMap {
        &mut self.actions
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    /// Queues an event as if the handler had reported it.
    pub fn inject(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    pub fn update(&mut self) {
        self.state.begin_frame();
        if let Some(handler) = &mut self.handler {
            handler.poll(&mut self.events);
        }

        for event in self.events.drain(..) {
            match event {
                InputEvent::Button { code, pressed } => {
                    if let Some(action) = self.actions.action_for(code) {
                        self.state.set_action(action, pressed);
                    }
                }
                InputEvent::Axis { index, value } => self.state.set_axis(index, value),
                InputEvent::FocusLost => {
                    for action in 0..MAX_ACTIONS as ActionId {
                        self.state.set_action(action, false);
                    }
                }
            }
        }
    }
}

impl Subsystem for Input {
    fn name(&self) -> &'static str {
        "Input"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {
        if self.handler.is_some() {
            tracing::warn!("input handler still set at shutdown");
        }
        self.clear_handler();
        self.events.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
