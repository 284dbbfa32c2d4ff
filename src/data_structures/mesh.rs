//! Meshes and the slot store that keeps them.

use std::sync::Arc;

use crate::data_structures::{geometry::Geometry, transform::TransformId};

/// Per-slot version counter. [`Generation::INVALID`] marks an empty slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation(u8);

impl Generation {
    pub const INVALID: Generation = Generation(u8::MAX);

    pub fn first() -> Self {
        Generation(0)
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// The next generation, wrapping around the sentinel.
    pub fn next(self) -> Self {
        let next = self.0.wrapping_add(1);
        if next == u8::MAX {
            Generation(0)
        } else {
            Generation(next)
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Mesh {
    /// Id reported by picking; also the shader instance slot in the pick shaders.
    pub unique_id: u32,
    pub generation: Generation,
    pub geometries: Vec<Arc<Geometry>>,
    pub transform: TransformId,
}

impl Mesh {
    pub fn new(unique_id: u32, geometries: Vec<Arc<Geometry>>, transform: TransformId) -> Self {
        Self {
            unique_id,
            generation: Generation::first(),
            geometries,
            transform,
        }
    }

    pub fn is_live(&self) -> bool {
        self.generation.is_valid()
    }
}

/// Mesh slots of a scene.
///
/// Removing a mesh tombstones its slot. The slot is recycled by the next insert
/// and the mesh placed there gets a bumped generation, so stale [`MeshHandle`]s
/// stop resolving.
#[derive(Debug, Default)]
pub struct MeshStore {
    slots: Vec<Mesh>,
    /// Generation the slot had before it was tombstoned.
    retired: Vec<(usize, Generation)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle {
    pub index: usize,
    pub generation: Generation,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut mesh: Mesh) -> MeshHandle {
        if let Some((index, previous)) = self.retired.pop() {
            mesh.generation = previous.next();
            let handle = MeshHandle {
                index,
                generation: mesh.generation,
            };
            self.slots[index] = mesh;
            return handle;
        }
        mesh.generation = Generation::first();
        self.slots.push(mesh);
        MeshHandle {
            index: self.slots.len() - 1,
            generation: Generation::first(),
        }
    }

    pub fn remove(&mut self, handle: MeshHandle) -> Option<Mesh> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation || !slot.is_live() {
            return None;
        }
        let removed = Mesh {
            unique_id: slot.unique_id,
            generation: slot.generation,
            geometries: std::mem::take(&mut slot.geometries),
            transform: slot.transform,
        };
        slot.generation = Generation::INVALID;
        self.retired.push((handle.index, removed.generation));
        Some(removed)
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.slots
            .get(handle.index)
            .filter(|m| m.is_live() && m.generation == handle.generation)
    }

    pub fn get_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.slots
            .get_mut(handle.index)
            .filter(|m| m.is_live() && m.generation == handle.generation)
    }

    /// Live meshes in slot order.
    pub fn iter_live(&self) -> impl Iterator<Item = &Mesh> {
        self.slots.iter().filter(|m| m.is_live())
    }

    /// All slots, tombstones included.
    pub fn slots(&self) -> &[Mesh] {
        &self.slots
    }

    pub fn live_count(&self) -> usize {
        self.iter_live().count()
    }
}
