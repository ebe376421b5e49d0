// crates/engine_core/src/resource_managers.rs

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

use crate::error::{EngineError, Result};
use crate::resources::{ResourceStore, Resources};
use crate::subsystem::{LiveSubsystems, Subsystem};

/// A resource kind with a built-in fallback instance.
pub trait DefaultResource: Any + Send + Sync + Sized {
    const MANAGER_NAME: &'static str;
    const DEFAULT_NAME: &'static str;

    fn create_default() -> Self;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Unit quad in the XY plane, centred on the origin.
    pub fn quad() -> Self {
        let corners = [
            (Vec3::new(-0.5, -0.5, 0.0), Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, 0.0), Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, 0.0), Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, 0.0), Vec2::new(0.0, 0.0)),
        ];
        Self {
            vertices: corners
                .iter()
                .map(|(position, uv)| Vertex {
                    position: position.to_array(),
                    uv: uv.to_array(),
                })
                .collect(),
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }

    /// Vertex data as uploaded to a GPU buffer.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

impl DefaultResource for Mesh {
    const MANAGER_NAME: &'static str = "MeshManager";
    const DEFAULT_NAME: &'static str = "DefaultMesh";

    fn create_default() -> Self {
        Self::quad()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub base_color: Vec4,
    pub program: Option<String>,
}

impl DefaultResource for Material {
    const MANAGER_NAME: &'static str = "MaterialManager";
    const DEFAULT_NAME: &'static str = "DefaultMaterial";

    fn create_default() -> Self {
        Self {
            base_color: Vec4::ONE,
            program: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Font {
    pub family: String,
    pub size: u32,
}

impl DefaultResource for Font {
    const MANAGER_NAME: &'static str = "FontManager";
    const DEFAULT_NAME: &'static str = "DefaultFont";

    fn create_default() -> Self {
        Self {
            family: "monospace".into(),
            size: 16,
        }
    }
}

/// Creates resources of one kind and keeps its default instance alive.
pub struct ResourceManager<R: DefaultResource> {
    store: Option<ResourceStore>,
    default: Option<Arc<R>>,
    _kind: PhantomData<fn() -> R>,
}

pub type MeshManager = ResourceManager<Mesh>;
pub type MaterialManager = ResourceManager<Material>;
pub type FontManager = ResourceManager<Font>;

impl<R: DefaultResource> ResourceManager<R> {
    pub fn new() -> Self {
        Self {
            store: None,
            default: None,
            _kind: PhantomData,
        }
    }

    pub fn default_resource(&self) -> Result<Arc<R>> {
        self.default
            .clone()
            .ok_or(EngineError::SubsystemNotLive(R::MANAGER_NAME))
    }

    pub fn create(&self, name: &str, resource: R) -> Result<Arc<R>> {
        let store = self
            .store
            .as_ref()
            .ok_or(EngineError::SubsystemNotLive(R::MANAGER_NAME))?;
        Ok(store.insert(name, resource))
    }
}

impl<R: DefaultResource> Default for ResourceManager<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DefaultResource> Subsystem for ResourceManager<R> {
    fn name(&self) -> &'static str {
        R::MANAGER_NAME
    }

    fn start(&mut self, live: &LiveSubsystems<'_>) -> Result<()> {
        let store = live.get::<Resources>()?.store()?;
        self.default = Some(store.insert(R::DEFAULT_NAME, R::create_default()));
        self.store = Some(store);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(store) = self.store.take() {
            store.unload(R::DEFAULT_NAME);
        }
        self.default = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
