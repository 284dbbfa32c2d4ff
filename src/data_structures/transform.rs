//! Parented transforms.
//!
//! A transform stores position, rotation (as quaternion) and scale. Transforms live
//! in a [`Transforms`] arena and refer to their parent by [`TransformId`], which is a
//! non-owning handle. A parent can therefore be dropped independently of its
//! children, and cycles are rejected when a parent is assigned.
//!
//! - the local matrix is `T * R * S` and is rebuilt only when the transform is dirty
//! - the world matrix is never cached; it always walks the current parent chain

use std::cell::Cell;

use cgmath::{Matrix4, One, Quaternion, SquareMatrix, Vector3};

use crate::error::TransformError;

/// Generational handle into a [`Transforms`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
pub struct Transform {
    position: Vector3<f32>,
    rotation: Quaternion<f32>,
    scale: Vector3<f32>,
    is_dirty: Cell<bool>,
    local: Cell<Matrix4<f32>>,
    parent: Option<TransformId>,
}

impl Transform {
    /// Identity transform: no translation, no rotation, unit scale.
    pub fn new() -> Self {
        Self::from_position_rotation_scale(
            Vector3::new(0.0, 0.0, 0.0),
            Quaternion::one(),
            Vector3::new(1.0, 1.0, 1.0),
        )
    }

    pub fn from_position(position: Vector3<f32>) -> Self {
        Self::from_position_rotation_scale(position, Quaternion::one(), Vector3::new(1.0, 1.0, 1.0))
    }

    pub fn from_rotation(rotation: Quaternion<f32>) -> Self {
        Self::from_position_rotation_scale(
            Vector3::new(0.0, 0.0, 0.0),
            rotation,
            Vector3::new(1.0, 1.0, 1.0),
        )
    }

    pub fn from_position_rotation(position: Vector3<f32>, rotation: Quaternion<f32>) -> Self {
        Self::from_position_rotation_scale(position, rotation, Vector3::new(1.0, 1.0, 1.0))
    }

    pub fn from_position_rotation_scale(
        position: Vector3<f32>,
        rotation: Quaternion<f32>,
        scale: Vector3<f32>,
    ) -> Self {
        Self {
            position,
            rotation,
            scale,
            is_dirty: Cell::new(true),
            local: Cell::new(Matrix4::identity()),
            parent: None,
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn rotation(&self) -> Quaternion<f32> {
        self.rotation
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn parent(&self) -> Option<TransformId> {
        self.parent
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.get()
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.is_dirty.set(true);
    }

    pub fn set_rotation(&mut self, rotation: Quaternion<f32>) {
        self.rotation = rotation;
        self.is_dirty.set(true);
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
        self.is_dirty.set(true);
    }

    pub fn set_position_rotation(&mut self, position: Vector3<f32>, rotation: Quaternion<f32>) {
        self.position = position;
        self.rotation = rotation;
        self.is_dirty.set(true);
    }

    pub fn set_position_rotation_scale(
        &mut self,
        position: Vector3<f32>,
        rotation: Quaternion<f32>,
        scale: Vector3<f32>,
    ) {
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;
        self.is_dirty.set(true);
    }

    pub fn translate(&mut self, translation: Vector3<f32>) {
        self.position += translation;
        self.is_dirty.set(true);
    }

    /// Applies `rotation` on top of the current rotation.
    pub fn rotate(&mut self, rotation: Quaternion<f32>) {
        self.rotation = rotation * self.rotation;
        self.is_dirty.set(true);
    }

    /// Multiplies the current scale component-wise.
    pub fn scale_by(&mut self, scale: Vector3<f32>) {
        self.scale = Vector3::new(
            self.scale.x * scale.x,
            self.scale.y * scale.y,
            self.scale.z * scale.z,
        );
        self.is_dirty.set(true);
    }

    pub fn translate_rotate(&mut self, translation: Vector3<f32>, rotation: Quaternion<f32>) {
        self.position += translation;
        self.rotation = rotation * self.rotation;
        self.is_dirty.set(true);
    }

    /// Local matrix, rebuilt from position/rotation/scale if anything changed since
    /// the last call.
    pub fn local(&self) -> Matrix4<f32> {
        if self.is_dirty.get() {
            let m = Matrix4::from_translation(self.position)
                * Matrix4::from(self.rotation)
                * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z);
            self.local.set(m);
            self.is_dirty.set(false);
        }
        self.local.get()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Self::from_position(position)
    }
}

struct Slot {
    generation: u32,
    transform: Option<Transform>,
}

/// Arena owning every transform of a scene.
#[derive(Default)]
pub struct Transforms {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Transforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, transform: Transform) -> TransformId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.transform = Some(transform);
            return TransformId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            transform: Some(transform),
        });
        TransformId {
            index,
            generation: 0,
        }
    }

    /// Removes a transform. Children that pointed at it become roots.
    pub fn remove(&mut self, id: TransformId) -> Option<Transform> {
        let removed = {
            let slot = self.slots.get_mut(id.index as usize)?;
            if slot.generation != id.generation {
                return None;
            }
            slot.transform.take()?
        };
        self.free.push(id.index);
        for slot in self.slots.iter_mut() {
            if let Some(t) = slot.transform.as_mut() {
                if t.parent == Some(id) {
                    t.parent = None;
                }
            }
        }
        Some(removed)
    }

    pub fn contains(&self, id: TransformId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.transform.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: TransformId) -> Option<&Transform> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.transform.as_ref())
    }

    pub fn get_mut(&mut self, id: TransformId) -> Option<&mut Transform> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.transform.as_mut())
    }

    /// Sets or clears the parent of `child`.
    pub fn set_parent(
        &mut self,
        child: TransformId,
        parent: Option<TransformId>,
    ) -> Result<(), TransformError> {
        if !self.contains(child) {
            return Err(TransformError::UnknownTransform(child));
        }
        if let Some(parent) = parent {
            if parent == child {
                return Err(TransformError::SelfParent);
            }
            if !self.contains(parent) {
                return Err(TransformError::UnknownTransform(parent));
            }
            // walk up from the new parent, hitting the child means a loop
            let mut cursor = Some(parent);
            while let Some(id) = cursor {
                if id == child {
                    return Err(TransformError::Cycle);
                }
                cursor = self.get(id).and_then(|t| t.parent);
            }
        }
        if let Some(t) = self.get_mut(child) {
            t.parent = parent;
        }
        Ok(())
    }

    pub fn local(&self, id: TransformId) -> Option<Matrix4<f32>> {
        self.get(id).map(Transform::local)
    }

    /// World matrix of `id`: its local matrix composed with every ancestor's.
    ///
    /// Always reflects the current state of the whole chain. An unknown handle
    /// yields the identity matrix.
    pub fn world(&self, id: TransformId) -> Matrix4<f32> {
        let Some(t) = self.get(id) else {
            log::warn!("world matrix requested for unknown transform {id:?}");
            return Matrix4::identity();
        };
        let mut world = t.local();
        let mut cursor = t.parent;
        while let Some(parent_id) = cursor {
            match self.get(parent_id) {
                Some(parent) => {
                    world = parent.local() * world;
                    cursor = parent.parent;
                }
                None => break,
            }
        }
        world
    }
}
