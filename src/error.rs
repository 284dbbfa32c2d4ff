//! Error types shared across the engine.
//!
//! Every subsystem reports failures through its own enum so callers can match on
//! the cases they care about. Glue code (context construction, the game loop)
//! folds these into `anyhow::Error`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("transform handle {0:?} does not refer to a live transform")]
    UnknownTransform(crate::data_structures::transform::TransformId),
    #[error("a transform cannot be its own parent")]
    SelfParent,
    #[error("parenting would create a cycle in the transform hierarchy")]
    Cycle,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full (capacity {capacity})")]
    Full { capacity: usize },
    #[error("queue is empty")]
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("unique id {0} is not in use")]
    NotInUse(u32),
    #[error("all unique ids are in use")]
    Exhausted,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no reference named '{0}'")]
    NotFound(String),
    #[error("reference '{0}' was already released")]
    AlreadyReleased(String),
    #[error("reference name must not be empty")]
    EmptyName,
    #[error("loading '{name}' failed: {source}")]
    Load {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid config in {path}: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("image decode of {path} failed: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("no loader registered for resource type {0:?}")]
    NoLoader(crate::resources::ResourceType),
    #[error("a loader for resource type {0:?} is already registered")]
    DuplicateLoader(crate::resources::ResourceType),
    #[error("asset '{name}' of type {kind:?} was not found")]
    NotFound {
        name: String,
        kind: crate::resources::ResourceType,
    },
    #[error("asset root {0} is not a directory")]
    BadRoot(PathBuf),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("asset watcher error: {0}")]
    Watch(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ShaderError {
    #[error("shader name must not be empty")]
    EmptyName,
    #[error("shader '{0}' already exists")]
    Duplicate(String),
    #[error("shader '{0}' not found")]
    NotFound(String),
    #[error("shader id {0} is not valid")]
    InvalidId(u32),
    #[error("shader system is full ({0} shaders)")]
    Capacity(usize),
    #[error("render pass '{0}' required by shader does not exist")]
    MissingRenderPass(String),
    #[error("uniform '{uniform}' not found on shader '{shader}'")]
    UnknownUniform { shader: String, uniform: String },
    #[error("uniform '{0}' is registered twice")]
    DuplicateUniform(String),
    #[error("too many uniforms, the limit is {0}")]
    TooManyUniforms(usize),
    #[error("too many {scope} textures, the limit is {limit}")]
    TooManyTextures { scope: &'static str, limit: usize },
    #[error("samplers cannot use local scope ('{0}')")]
    LocalSampler(String),
    #[error("uniform '{0}' expects a different value type")]
    TypeMismatch(String),
    #[error("shader '{0}' has not been initialized")]
    NotInitialized(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("swapchain is being recreated, frame skipped")]
    SwapchainBooting,
    #[error("backend handle {0} is unknown")]
    UnknownHandle(u32),
    #[error("backend operation '{op}' failed: {message}")]
    Failed { op: &'static str, message: String },
}

impl BackendError {
    pub fn failed(op: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            op,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("render pass '{0}' already exists")]
    DuplicateRenderPass(String),
    #[error("render pass '{0}' not found")]
    UnknownRenderPass(String),
    #[error("begin frame failed: {0}")]
    BeginFrame(#[source] BackendError),
    #[error("end frame failed: {0}")]
    EndFrame(#[source] BackendError),
    #[error("rendering view '{view}' failed: {source}")]
    View {
        view: String,
        #[source]
        source: Box<ViewError>,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("view name must not be empty")]
    EmptyName,
    #[error("view '{0}' needs at least one render pass")]
    NoPasses(String),
    #[error("view '{view}' needs exactly {expected} render passes, got {actual}")]
    PassCount {
        view: String,
        expected: usize,
        actual: usize,
    },
    #[error("view '{0}' already exists")]
    Duplicate(String),
    #[error("view '{0}' not found")]
    NotFound(String),
    #[error("no free view slots (max {0})")]
    Capacity(usize),
    #[error("view '{view}' received a {got} payload")]
    PayloadMismatch { view: String, got: &'static str },
    #[error("view '{view}' cannot pick unique id {id}")]
    IdOutOfRange { view: String, id: u32 },
    #[error("view '{view}' has no camera '{camera}'")]
    MissingCamera { view: String, camera: String },
    #[error("shader '{shader}' for view '{view}' is missing uniform '{uniform}'")]
    MissingUniform {
        view: String,
        shader: String,
        uniform: String,
    },
    #[error("loading shader '{shader}' for view '{view}' failed: {source}")]
    ShaderLoad {
        view: String,
        shader: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Renderer(#[from] RendererError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("the job system needs at least one worker thread")]
    NoWorkers,
    #[error("spawning worker thread failed: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("job system has been shut down")]
    ShutDown,
    #[error("job {id} failed: {message}")]
    Failed { id: u64, message: String },
}
