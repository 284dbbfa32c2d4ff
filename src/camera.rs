//! Cameras and the camera system.
//!
//! A [`Camera`] is a position plus Euler rotation (pitch, yaw, roll in radians).
//! Its view matrix is rebuilt lazily on read after a change. Views refer to
//! cameras by name through the [`CameraSystem`], which always holds a
//! `"default"` camera.

use std::{cell::Cell, collections::HashMap};

use anyhow::anyhow;
use cgmath::{Euler, Matrix4, Rad, SquareMatrix, Vector3, Vector4, Zero};

use crate::error::RegistryError;

pub const DEFAULT_CAMERA_NAME: &str = "default";

/// 89 degrees. Pitch is clamped to this to stay clear of gimbal lock.
const PITCH_LIMIT: f32 = 1.553_343;

#[derive(Debug, Clone)]
pub struct Camera {
    position: Vector3<f32>,
    euler_rotation: Vector3<f32>,
    is_dirty: Cell<bool>,
    view: Cell<Matrix4<f32>>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    pub fn new() -> Self {
        Self {
            position: Vector3::zero(),
            euler_rotation: Vector3::zero(),
            is_dirty: Cell::new(false),
            view: Cell::new(Matrix4::identity()),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.is_dirty.set(true);
    }

    pub fn euler_rotation(&self) -> Vector3<f32> {
        self.euler_rotation
    }

    pub fn set_euler_rotation(&mut self, rotation: Vector3<f32>) {
        self.euler_rotation = rotation;
        self.is_dirty.set(true);
    }

    fn world(&self) -> Matrix4<f32> {
        let rotation = Matrix4::from(Euler::new(
            Rad(self.euler_rotation.x),
            Rad(self.euler_rotation.y),
            Rad(self.euler_rotation.z),
        ));
        Matrix4::from_translation(self.position) * rotation
    }

    pub fn view(&self) -> Matrix4<f32> {
        if self.is_dirty.get() {
            // a rotation plus translation is always invertible
            let view = self.world().invert().unwrap_or_else(Matrix4::identity);
            self.view.set(view);
            self.is_dirty.set(false);
        }
        self.view.get()
    }

    fn axis(&self, axis: Vector4<f32>) -> Vector3<f32> {
        (self.world() * axis).truncate()
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.axis(Vector4::new(0.0, 0.0, -1.0, 0.0))
    }

    pub fn backward(&self) -> Vector3<f32> {
        -self.forward()
    }

    pub fn left(&self) -> Vector3<f32> {
        -self.right()
    }

    pub fn right(&self) -> Vector3<f32> {
        self.axis(Vector4::new(1.0, 0.0, 0.0, 0.0))
    }

    fn shift(&mut self, direction: Vector3<f32>, amount: f32) {
        self.position += direction * amount;
        self.is_dirty.set(true);
    }

    pub fn move_forward(&mut self, amount: f32) {
        self.shift(self.forward(), amount);
    }

    pub fn move_backward(&mut self, amount: f32) {
        self.shift(self.backward(), amount);
    }

    pub fn move_left(&mut self, amount: f32) {
        self.shift(self.left(), amount);
    }

    pub fn move_right(&mut self, amount: f32) {
        self.shift(self.right(), amount);
    }

    pub fn move_up(&mut self, amount: f32) {
        self.shift(Vector3::unit_y(), amount);
    }

    pub fn move_down(&mut self, amount: f32) {
        self.shift(-Vector3::unit_y(), amount);
    }

    pub fn yaw(&mut self, amount: f32) {
        self.euler_rotation.y += amount;
        self.is_dirty.set(true);
    }

    pub fn pitch(&mut self, amount: f32) {
        self.euler_rotation.x = (self.euler_rotation.x + amount).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.is_dirty.set(true);
    }
}

struct CameraSlot {
    reference_count: u32,
    camera: Camera,
}

/// Named, reference-counted cameras.
pub struct CameraSystem {
    max_camera_count: usize,
    default_camera: Camera,
    cameras: HashMap<String, CameraSlot>,
}

impl CameraSystem {
    pub fn new(max_camera_count: usize) -> anyhow::Result<Self> {
        if max_camera_count == 0 {
            return Err(anyhow!("camera system needs room for at least one camera"));
        }
        Ok(Self {
            max_camera_count,
            default_camera: Camera::new(),
            cameras: HashMap::new(),
        })
    }

    /// Adds a reference to camera `name`, creating it on first use.
    pub fn acquire(&mut self, name: &str) -> Result<&mut Camera, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if name == DEFAULT_CAMERA_NAME {
            return Ok(&mut self.default_camera);
        }
        if !self.cameras.contains_key(name) && self.cameras.len() >= self.max_camera_count {
            return Err(RegistryError::Load {
                name: name.to_string(),
                source: anyhow!("no free camera slots (max {})", self.max_camera_count),
            });
        }
        let slot = self
            .cameras
            .entry(name.to_string())
            .or_insert_with(|| CameraSlot {
                reference_count: 0,
                camera: Camera::new(),
            });
        slot.reference_count += 1;
        Ok(&mut slot.camera)
    }

    /// Drops a reference. The camera is removed when none are left.
    pub fn release(&mut self, name: &str) -> Result<u32, RegistryError> {
        if name == DEFAULT_CAMERA_NAME {
            return Ok(0);
        }
        let Some(slot) = self.cameras.get_mut(name) else {
            log::warn!("release of unknown camera '{name}'");
            return Err(RegistryError::NotFound(name.to_string()));
        };
        slot.reference_count -= 1;
        let remaining = slot.reference_count;
        if remaining == 0 {
            self.cameras.remove(name);
        }
        Ok(remaining)
    }

    pub fn get(&self, name: &str) -> Option<&Camera> {
        if name == DEFAULT_CAMERA_NAME {
            return Some(&self.default_camera);
        }
        self.cameras.get(name).map(|slot| &slot.camera)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Camera> {
        if name == DEFAULT_CAMERA_NAME {
            return Some(&mut self.default_camera);
        }
        self.cameras.get_mut(name).map(|slot| &mut slot.camera)
    }

    pub fn default_camera(&self) -> &Camera {
        &self.default_camera
    }

    pub fn default_camera_mut(&mut self) -> &mut Camera {
        &mut self.default_camera
    }

    pub fn count(&self) -> usize {
        self.cameras.len()
    }
}
