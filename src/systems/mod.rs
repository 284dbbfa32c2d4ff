//! Resource systems layered on the renderer.
//!
//! - `texture` owns textures and the default textures
//! - `shader` builds shaders from configs and writes their uniforms
//! - `material` pairs textures with shader instances
//! - `geometry` uploads vertex data and generates simple shapes
//!
//! Start-up order matters: textures first, then shaders (the views create the
//! built-in ones), then materials, then geometries.

pub mod geometry;
pub mod material;
pub mod shader;
pub mod texture;
