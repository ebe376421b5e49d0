// crates/engine_core/src/input/state.rs

/// Stable integer id for a named action.
pub type ActionId = u32;

/// Digital actions are tracked in a 64-bit mask.
pub const MAX_ACTIONS: usize = 64;

/// Number of analog axes kept per frame.
pub const MAX_AXES: usize = 8;

/// Per-frame snapshot of resolved input.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    digital_mask: u64,
    previous_mask: u64,
    analog_axes: [f32; MAX_AXES],
}

impl InputState {
    /// Out-of-range ids are never active.
    pub fn is_active(&self, action: ActionId) -> bool {
        bit(action).is_some_and(|bit| self.digital_mask & bit != 0)
    }

    pub fn just_pressed(&self, action: ActionId) -> bool {
        bit(action).is_some_and(|bit| self.digital_mask & bit != 0 && self.previous_mask & bit == 0)
    }

    pub fn just_released(&self, action: ActionId) -> bool {
        bit(action).is_some_and(|bit| self.digital_mask & bit == 0 && self.previous_mask & bit != 0)
    }

    pub fn axis(&self, index: usize) -> f32 {
        self.analog_axes.get(index).copied().unwrap_or(0.0)
    }

    pub fn digital_mask(&self) -> u64 {
        self.digital_mask
    }

    /// Starts a new frame: the current mask becomes the previous one.
    pub(crate) fn begin_frame(&mut self) {
        self.previous_mask = self.digital_mask;
    }

    pub(crate) fn set_action(&mut self, action: ActionId, active: bool) {
        let Some(bit) = bit(action) else {
            tracing::warn!(action, "action id outside the digital mask");
            return;
        };
        if active {
            self.digital_mask |= bit;
        } else {
            self.digital_mask &= !bit;
        }
    }

    pub(crate) fn set_axis(&mut self, index: usize, value: f32) {
        if let Some(axis) = self.analog_axes.get_mut(index) {
            *axis = value.clamp(-1.0, 1.0);
        }
    }
}

fn bit(action: ActionId) -> Option<u64> {
    ((action as usize) < MAX_ACTIONS).then(|| 1u64 << action)
}
