// crates/engine_core/src/render_window.rs

use std::any::Any;
use std::collections::BTreeMap;

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::platform::{Platform, PlatformHandle};
use crate::subsystem::{LiveSubsystems, Subsystem};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderWindowDesc {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub vsync: bool,
}

impl Default for RenderWindowDesc {
    fn default() -> Self {
        Self {
            title: "Engine".into(),
            width: 1280,
            height: 720,
            fullscreen: false,
            vsync: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderWindowId(u32);

#[derive(Clone, Debug, PartialEq)]
pub struct RenderWindow {
    pub id: RenderWindowId,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub focused: bool,
    pub primary: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowEvent {
    Resized { width: u32, height: u32 },
    FocusChanged(bool),
    CloseRequested,
}

/// Posts window events from any thread; they are applied in `RenderWindowManager::update`.
#[derive(Clone)]
pub struct WindowEventSink {
    sender: Sender<(RenderWindowId, WindowEvent)>,
}

impl WindowEventSink {
    pub fn post(&self, window: RenderWindowId, event: WindowEvent) {
        // The manager owns the receiver for as long as the sink is useful.
        let _ = self.sender.send((window, event));
    }
}

/// Window bookkeeping and per-frame event processing.
pub struct RenderWindowManager {
    windows: BTreeMap<RenderWindowId, RenderWindow>,
    next_id: u32,
    sender: Sender<(RenderWindowId, WindowEvent)>,
    receiver: Receiver<(RenderWindowId, WindowEvent)>,
    platform: Option<PlatformHandle>,
}

impl RenderWindowManager {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            windows: BTreeMap::new(),
            next_id: 0,
            sender,
            receiver,
            platform: None,
        }
    }

    /// Records a window the render system already accepted.
    pub fn add(&mut self, desc: &RenderWindowDesc, primary: bool) -> RenderWindowId {
        debug_assert!(
            !primary || self.windows.values().all(|w| !w.primary),
            "only one primary window"
        );
        let id = RenderWindowId(self.next_id);
        self.next_id += 1;
        self.windows.insert(
            id,
            RenderWindow {
                id,
                title: desc.title.clone(),
                width: desc.width,
                height: desc.height,
                focused: true,
                primary,
            },
        );
        tracing::info!(?id, title = %desc.title, width = desc.width, height = desc.height, primary, "window created");
        id
    }

    pub fn destroy(&mut self, id: RenderWindowId) -> Option<RenderWindow> {
        let window = self.windows.remove(&id)?;
        tracing::info!(?id, title = %window.title, "window destroyed");
        Some(window)
    }

    pub fn get(&self, id: RenderWindowId) -> Option<&RenderWindow> {
        self.windows.get(&id)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn event_sink(&self) -> WindowEventSink {
        WindowEventSink {
            sender: self.sender.clone(),
        }
    }

    /// Applies every posted event.
    pub fn update(&mut self) {
        let events: Vec<_> = self.receiver.try_iter().collect();
        let mut closed = Vec::new();
        for (id, event) in events {
            let Some(window) = self.windows.get_mut(&id) else {
                tracing::debug!(?id, ?event, "event for a window that no longer exists");
                continue;
            };

            match event {
                WindowEvent::Resized { width, height } => {
                    if width > 0 && height > 0 {
                        window.width = width;
                        window.height = height;
                    }
                }
                WindowEvent::FocusChanged(focused) => window.focused = focused,
                WindowEvent::CloseRequested if window.primary => {
                    if let Some(platform) = &self.platform {
                        platform.request_quit();
                    }
                }
                WindowEvent::CloseRequested => closed.push(id),
            }
        }

        for id in closed {
            if let Some(window) = self.windows.remove(&id) {
                tracing::info!(?id, title = %window.title, "window closed");
            }
        }
    }
}

impl Default for RenderWindowManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Subsystem for RenderWindowManager {
    fn name(&self) -> &'static str {
        "RenderWindowManager"
    }

    fn start(&mut self, live: &LiveSubsystems<'_>) -> Result<()> {
        self.platform = Some(live.get::<Platform>()?.handle());
        Ok(())
    }

    fn stop(&mut self) {
        for window in self.windows.values() {
            tracing::warn!(id = ?window.id, title = %window.title, "window still open at shutdown");
        }
        self.windows.clear();
        self.platform = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
