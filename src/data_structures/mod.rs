//! Engine data structures: transforms, meshes, textures, materials and geometry.
//!
//! - `transform` holds the parented transform arena
//! - `identifier` hands out reusable unique ids for pickable objects
//! - `mesh` contains meshes and the generation-tagged mesh store
//! - `texture`, `material`, `geometry` and `shader` are the records managed by the resource systems
//! - `skybox` and `ui_text` are the payloads of the skybox and UI views
//! - `ring_queue` is the bounded FIFO used by the job system

pub mod geometry;
pub mod identifier;
pub mod material;
pub mod mesh;
pub mod ring_queue;
pub mod shader;
pub mod skybox;
pub mod texture;
pub mod transform;
pub mod ui_text;
