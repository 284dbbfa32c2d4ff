//! The engine context.
//!
//! [`Context`] owns every subsystem: the renderer façade, the asset manager, the
//! job system, the texture, shader, material and geometry systems, cameras,
//! render views and the scene stores. It is built explicitly from an
//! [`EngineConfig`] and a backend; nothing lives in globals.
//!
//! Systems are brought up in dependency order (textures before shaders, views
//! before materials so the built-in material shader exists) and torn down in
//! reverse by [`Context::shutdown`].

use std::sync::Arc;

use anyhow::Context as _;

use crate::{
    assets::AssetManager,
    camera::CameraSystem,
    config::EngineConfig,
    data_structures::{
        geometry::{Geometry, GeometryConfig},
        identifier::Identifiers,
        material::Material,
        mesh::{Mesh, MeshHandle, MeshStore},
        skybox::Skybox,
        texture::{Texture, TextureMap, TextureUse},
        transform::{TransformId, Transforms},
    },
    error::{IdentifierError, RegistryError, RendererError, ViewError},
    jobs::JobSystem,
    render::{RenderPacket, RenderViewPacket},
    renderer::{
        FrameOutcome, Renderer,
        backend::RendererBackend,
        headless::{HeadlessBackend, HeadlessRecorder},
    },
    systems::{
        geometry::{GeometrySystem, generate_cube_config},
        material::{MaterialDeps, MaterialSystem},
        shader::{ShaderSystem, ShaderSystemConfig},
        texture::TextureSystem,
    },
    views::{RenderViewSystem, ViewDeps, ViewFrame, ViewPayload, skybox::BUILTIN_SKYBOX_SHADER},
};

const SKYBOX_GEOMETRY_NAME: &str = "skybox_cube";

/// Builds a [`MaterialDeps`] from disjoint fields of a context.
macro_rules! material_deps {
    ($ctx:expr) => {
        MaterialDeps {
            renderer: &mut $ctx.renderer,
            shaders: &mut $ctx.shaders,
            textures: &$ctx.textures,
            assets: &$ctx.assets,
        }
    };
}

pub struct Context {
    pub config: EngineConfig,
    pub renderer: Renderer,
    pub assets: Arc<AssetManager>,
    pub jobs: JobSystem,
    pub textures: TextureSystem,
    pub shaders: ShaderSystem,
    pub materials: MaterialSystem,
    pub geometries: GeometrySystem,
    pub cameras: CameraSystem,
    pub views: RenderViewSystem,
    pub transforms: Transforms,
    pub meshes: MeshStore,
    pub identifiers: Identifiers,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("app", &self.config.app.name)
            .field("frame_number", &self.renderer.frame_number())
            .field("views", &self.views.count())
            .field("meshes", &self.meshes.live_count())
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(config: EngineConfig, backend: Box<dyn RendererBackend>) -> anyhow::Result<Self> {
        let limits = &config.limits;

        let mut renderer = Renderer::new(backend, &config.renderer);
        renderer
            .initialize(&config.app.name, config.app.width, config.app.height)
            .context("initializing the renderer")?;

        let assets = Arc::new(AssetManager::new(&config.assets.root).with_context(|| {
            format!("opening asset root {}", config.assets.root.display())
        })?);
        if config.assets.watch {
            #[cfg(feature = "watch")]
            assets.watch()?;
            #[cfg(not(feature = "watch"))]
            log::warn!("asset watching requested but the `watch` feature is disabled");
        }

        let jobs = JobSystem::new(
            config.jobs.worker_count,
            config.jobs.result_capacity,
            renderer.backend().is_multithreaded(),
        )?;

        let textures = TextureSystem::new(&mut renderer, limits.max_texture_count)?;
        let mut shaders = ShaderSystem::new(
            ShaderSystemConfig::from(limits),
            Some(textures.default_texture()),
        )?;
        let cameras = CameraSystem::new(limits.max_camera_count)?;

        let mut views = RenderViewSystem::new(limits.max_view_count)?;
        for view in &config.views {
            let deps = ViewDeps {
                renderer: &mut renderer,
                shaders: &mut shaders,
                assets: &assets,
            };
            views
                .create(deps, view)
                .with_context(|| format!("creating render view '{}'", view.name))?;
        }

        let materials =
            MaterialSystem::new(&mut renderer, &mut shaders, &textures, limits.max_material_count)?;
        let geometries = GeometrySystem::new(&mut renderer, &materials, limits.max_geometry_count)?;

        log::info!(
            "context '{}' ready with {} views",
            config.app.name,
            views.count()
        );
        Ok(Self {
            config,
            renderer,
            assets,
            jobs,
            textures,
            shaders,
            materials,
            geometries,
            cameras,
            views,
            transforms: Transforms::new(),
            meshes: MeshStore::new(),
            identifiers: Identifiers::new(),
        })
    }

    /// A context on the in-memory backend, with the recorder to inspect it.
    pub fn headless(config: EngineConfig) -> anyhow::Result<(Self, HeadlessRecorder)> {
        let backend = HeadlessBackend::new();
        let recorder = backend.recorder();
        let ctx = Self::new(config, Box::new(backend))?;
        Ok((ctx, recorder))
    }

    pub fn acquire_texture(&mut self, name: &str, auto_release: bool) -> Result<Arc<Texture>, RegistryError> {
        self.textures
            .acquire(&mut self.renderer, &self.assets, name, auto_release)
    }

    pub fn release_texture(&mut self, name: &str) -> Result<u64, RegistryError> {
        self.textures.release(&mut self.renderer, name)
    }

    pub fn acquire_material(&mut self, name: &str) -> Result<Arc<Material>, RegistryError> {
        self.materials.acquire(material_deps!(self), name)
    }

    pub fn release_material(&mut self, name: &str) -> Result<u64, RegistryError> {
        self.materials.release(material_deps!(self), name)
    }

    pub fn acquire_geometry(
        &mut self,
        config: &GeometryConfig,
        auto_release: bool,
    ) -> Result<Arc<Geometry>, RegistryError> {
        self.geometries
            .acquire_from_config(material_deps!(self), &self.materials, config, auto_release)
    }

    pub fn release_geometry(&mut self, name: &str) -> Result<u64, RegistryError> {
        self.geometries
            .release(material_deps!(self), &self.materials, name)
    }

    /// Loads the cubemap `<name>_r` .. `<name>_b` and wraps it with a cube
    /// geometry and an instance of the skybox shader.
    pub fn create_skybox(&mut self, cubemap_name: &str) -> anyhow::Result<Arc<Skybox>> {
        let shader_id = self
            .shaders
            .get_id(BUILTIN_SKYBOX_SHADER)
            .with_context(|| format!("shader '{BUILTIN_SKYBOX_SHADER}' is not loaded"))?;
        let texture = self
            .textures
            .acquire_cube(&mut self.renderer, &self.assets, cubemap_name, true)?;
        let cubemap = TextureMap::new(TextureUse::Cubemap, Some(texture));

        let cube = generate_cube_config(10.0, 10.0, 10.0, 1.0, 1.0, SKYBOX_GEOMETRY_NAME, "");
        let geometry = match self.acquire_geometry(&cube, true) {
            Ok(geometry) => geometry,
            Err(e) => {
                self.release_texture(cubemap_name)?;
                return Err(e.into());
            }
        };
        let instance_id = match self.shaders.acquire_instance_resources(
            &mut self.renderer,
            shader_id,
            std::slice::from_ref(&cubemap),
        ) {
            Ok(id) => id,
            Err(e) => {
                self.release_geometry(SKYBOX_GEOMETRY_NAME)?;
                self.release_texture(cubemap_name)?;
                return Err(e.into());
            }
        };
        log::debug!("skybox '{cubemap_name}' created");
        Ok(Arc::new(Skybox::new(cubemap, geometry, instance_id)))
    }

    /// Gives back the skybox's shader instance, geometry and cubemap.
    pub fn destroy_skybox(&mut self, skybox: &Skybox) -> anyhow::Result<()> {
        let shader_id = self
            .shaders
            .get_id(BUILTIN_SKYBOX_SHADER)
            .with_context(|| format!("shader '{BUILTIN_SKYBOX_SHADER}' is not loaded"))?;
        self.shaders
            .release_instance_resources(&mut self.renderer, shader_id, skybox.instance_id)?;
        self.release_geometry(&skybox.geometry.name)?;
        if let Some(texture) = &skybox.cubemap.texture {
            self.release_texture(&texture.name)?;
        }
        Ok(())
    }

    /// The lowest unique id not held by a mesh or text.
    pub fn acquire_unique_id(&mut self) -> Result<u32, IdentifierError> {
        self.identifiers.acquire()
    }

    pub fn release_unique_id(&mut self, id: u32) -> Result<(), IdentifierError> {
        self.identifiers.release(id)
    }

    /// Stores a mesh under a fresh unique id.
    pub fn spawn_mesh(
        &mut self,
        geometries: Vec<Arc<Geometry>>,
        transform: TransformId,
    ) -> Result<MeshHandle, IdentifierError> {
        let unique_id = self.identifiers.acquire()?;
        Ok(self.meshes.insert(Mesh::new(unique_id, geometries, transform)))
    }

    /// Removes a mesh and gives its unique id back for reuse.
    pub fn despawn_mesh(&mut self, handle: MeshHandle) -> Option<Mesh> {
        let mesh = self.meshes.remove(handle)?;
        if let Err(e) = self.identifiers.release(mesh.unique_id) {
            log::warn!("despawned mesh held an unknown id: {e}");
        }
        Some(mesh)
    }

    pub fn build_packet(
        &self,
        view_name: &str,
        payload: ViewPayload<'_>,
    ) -> Result<RenderViewPacket, ViewError> {
        self.views
            .build_packet(view_name, payload, &self.transforms, &self.cameras)
    }

    pub fn draw_frame(&mut self, packet: &RenderPacket) -> Result<FrameOutcome, RendererError> {
        let mut frame = ViewFrame {
            views: &mut self.views,
            shaders: &mut self.shaders,
            materials: &self.materials,
        };
        self.renderer.draw_frame(packet, &mut frame)
    }

    /// Hands every view packet of a drawn frame back to its view.
    pub fn destroy_packet(&self, packet: RenderPacket) {
        for view_packet in packet.views {
            self.views.on_destroy_packet(view_packet);
        }
    }

    pub fn on_resized(&mut self, width: u32, height: u32) {
        self.renderer.on_resized(width, height);
    }

    pub fn on_mouse_moved(&mut self, x: i32, y: i32) {
        self.views.on_mouse_moved(x, y);
    }

    pub fn hovered_id(&self) -> Option<u32> {
        self.views.hovered_id()
    }

    pub fn shutdown(&mut self) {
        log::info!("shutting down context '{}'", self.config.app.name);
        self.jobs.shutdown();
        #[cfg(feature = "watch")]
        self.assets.stop_watching();
        self.geometries
            .shutdown(material_deps!(self), &self.materials);
        self.materials
            .shutdown(&mut self.renderer, &mut self.shaders, &self.textures);
        self.views.shutdown(&mut self.renderer, &mut self.shaders);
        self.shaders.shutdown(&mut self.renderer);
        self.textures.shutdown(&mut self.renderer);
        self.renderer.shutdown();
    }
}
