//! anima-ngin
//!
//! A backend-agnostic rendering engine core. Scene data (parented transforms,
//! meshes, cameras) is turned each frame into per-view render packets, which a
//! renderer façade draws through a pluggable [`renderer::backend::RendererBackend`].
//! Resources (textures, shaders, materials, geometry) are reference counted and
//! loaded through an indexed asset directory, optionally on a job system.
//!
//! High-level modules
//! - `assets`: asset index, loader registry and async loading
//! - `camera`: cameras and the named camera registry
//! - `config`: TOML engine configuration and the built-in view set
//! - `context`: the owner of every subsystem
//! - `data_structures`: transforms, meshes, textures, materials, geometry
//! - `error`: typed errors per subsystem
//! - `flow`: the game trait and the application loop
//! - `jobs`: worker threads, priorities and result dispatch
//! - `pick`: id to colour encoding for object picking
//! - `render`: per-frame render packets
//! - `renderer`: the renderer façade, backend contract and headless backend
//! - `resources`: resource loaders and the reference registry
//! - `systems`: texture, shader, material and geometry systems
//! - `views`: world, UI, skybox and pick render views
//!

pub mod assets;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod jobs;
pub mod pick;
pub mod render;
pub mod renderer;
pub mod resources;
pub mod systems;
pub mod views;

// Re-exported so downstream code uses the same math types.
pub use cgmath;
