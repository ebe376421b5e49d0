// crates/engine_core/src/input/actions.rs
use std::collections::HashMap;

use super::state::ActionId;

/// Button code as reported by a raw input handler.
pub type ButtonCode = u32;

/// Action names and the buttons bound to them.
#[derive(Default, Clone)]
pub struct ActionMap {
    name_to_id: HashMap<String, ActionId>,
    bindings: HashMap<ButtonCode, ActionId>,
    next_id: ActionId,
}

impl ActionMap {
    /// Returns the existing id if `name` is already registered.
    pub fn register(&mut self, name: &str) -> ActionId {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = self.next_id;
        self.name_to_id.insert(name.to_string(), id);
        self.next_id += 1;
        id
    }

    pub fn id(&self, name: &str) -> Option<ActionId> {
        self.name_to_id.get(name).copied()
    }

    pub fn bind(&mut self, button: ButtonCode, action: ActionId) {
        self.bindings.insert(button, action);
    }

    pub fn action_for(&self, button: ButtonCode) -> Option<ActionId> {
        self.bindings.get(&button).copied()
    }
}
