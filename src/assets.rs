//! Asset index and resource loading.
//!
//! The [`AssetManager`] scans its root directory once at start-up and keeps an
//! index of every file whose extension maps to a [`ResourceType`]. With the
//! `watch` feature and `assets.watch = true` a background watcher keeps that
//! index current. Readers take a shared lock, the watcher an exclusive one.
//!
//! Lookups go through fixed sub-directories:
//! - images: `textures/<name>.<ext>` for each of [`IMAGE_EXTENSIONS`]
//! - shaders: `shaders/<name>.shadercfg`
//! - materials: `materials/<name>.amt`
//! - text and binary: `<name>` relative to the root

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use instant::Instant;
use parking_lot::RwLock;

use crate::{
    error::AssetError,
    jobs::{JobId, JobPriority, JobSystem, JobType},
    resources::{
        LoadParams, Resource, ResourceLoader, ResourceType,
        binary::{BinaryLoader, TextLoader},
        image::{IMAGE_EXTENSIONS, ImageLoader},
        material::MaterialLoader,
        shader::ShaderLoader,
    },
};

#[derive(Debug, Clone)]
pub struct AssetInfo {
    pub path: PathBuf,
    pub resource_type: ResourceType,
    pub last_loaded: Instant,
}

type AssetIndex = Arc<RwLock<HashMap<PathBuf, AssetInfo>>>;

pub struct AssetManager {
    root: PathBuf,
    index: AssetIndex,
    loaders: RwLock<HashMap<ResourceType, Arc<dyn ResourceLoader>>>,
    #[cfg(feature = "watch")]
    watcher: parking_lot::Mutex<Option<notify::RecommendedWatcher>>,
}

impl AssetManager {
    /// Indexes `root` and registers the built-in loaders.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, AssetError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(AssetError::BadRoot(root));
        }
        let manager = Self {
            root,
            index: Arc::new(RwLock::new(HashMap::new())),
            loaders: RwLock::new(HashMap::new()),
            #[cfg(feature = "watch")]
            watcher: parking_lot::Mutex::new(None),
        };
        manager.rescan();
        manager.register_loader(Arc::new(TextLoader))?;
        manager.register_loader(Arc::new(BinaryLoader))?;
        manager.register_loader(Arc::new(ImageLoader))?;
        manager.register_loader(Arc::new(MaterialLoader))?;
        manager.register_loader(Arc::new(ShaderLoader))?;
        log::info!(
            "asset manager indexed {} files under {}",
            manager.index.read().len(),
            manager.root.display()
        );
        Ok(manager)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn register_loader(&self, loader: Arc<dyn ResourceLoader>) -> Result<(), AssetError> {
        let kind = loader.resource_type();
        let mut loaders = self.loaders.write();
        if loaders.contains_key(&kind) {
            return Err(AssetError::DuplicateLoader(kind));
        }
        loaders.insert(kind, loader);
        Ok(())
    }

    /// Rebuilds the index from disk.
    pub fn rescan(&self) {
        let mut found = HashMap::new();
        scan_dir(&self.root, &self.root, &mut found);
        *self.index.write() = found;
    }

    pub fn asset_count(&self) -> usize {
        self.index.read().len()
    }

    /// Index entry for a path relative to the root.
    pub fn asset_info(&self, relative: impl AsRef<Path>) -> Option<AssetInfo> {
        self.index.read().get(relative.as_ref()).cloned()
    }

    /// Resolves `name` to an indexed path for `kind`, trying every image extension.
    pub fn resolve(&self, name: &str, kind: ResourceType) -> Result<PathBuf, AssetError> {
        let candidates: Vec<PathBuf> = match kind {
            ResourceType::Image => IMAGE_EXTENSIONS
                .iter()
                .map(|ext| Path::new("textures").join(format!("{name}.{ext}")))
                .collect(),
            ResourceType::Shader => vec![Path::new("shaders").join(format!("{name}.shadercfg"))],
            ResourceType::Material => vec![Path::new("materials").join(format!("{name}.amt"))],
            ResourceType::Binary | ResourceType::Text => vec![PathBuf::from(name)],
        };
        for relative in candidates {
            if self.touch(&relative, kind) {
                return Ok(self.root.join(relative));
            }
        }
        Err(AssetError::NotFound {
            name: name.to_string(),
            kind,
        })
    }

    /// Marks an indexed asset as loaded now. Files that exist on disk but were not
    /// indexed yet (the watcher lags behind) are added on the way.
    fn touch(&self, relative: &Path, kind: ResourceType) -> bool {
        let mut index = self.index.write();
        if let Some(info) = index.get_mut(relative) {
            info.last_loaded = Instant::now();
            return true;
        }
        if self.root.join(relative).is_file() {
            index.insert(
                relative.to_path_buf(),
                AssetInfo {
                    path: relative.to_path_buf(),
                    resource_type: kind,
                    last_loaded: Instant::now(),
                },
            );
            return true;
        }
        false
    }

    pub fn load(
        &self,
        name: &str,
        kind: ResourceType,
        params: LoadParams,
    ) -> Result<Resource, AssetError> {
        let loader = self
            .loaders
            .read()
            .get(&kind)
            .cloned()
            .ok_or(AssetError::NoLoader(kind))?;
        let path = self.resolve(name, kind)?;
        log::debug!("loading {kind:?} '{name}' from {}", path.display());
        Ok(loader.load(&path, name, params)?)
    }

    pub fn unload(&self, resource: Resource) {
        let kind = resource.data.kind();
        match self.loaders.read().get(&kind) {
            Some(loader) => loader.unload(resource),
            None => log::warn!("unloading {kind:?} '{}' without a loader", resource.name),
        }
    }

    /// Loads on the job system's resource thread and hands the result to
    /// `on_complete` during a later [`JobSystem::update`].
    pub fn load_async<C>(
        self: &Arc<Self>,
        jobs: &mut JobSystem,
        name: &str,
        kind: ResourceType,
        params: LoadParams,
        on_complete: C,
    ) -> anyhow::Result<JobId>
    where
        C: FnOnce(anyhow::Result<Resource>) + 'static,
    {
        let manager = Arc::clone(self);
        let name = name.to_string();
        let id = jobs.submit(
            JobType::RESOURCE_LOAD,
            JobPriority::Normal,
            move || Ok(manager.load(&name, kind, params)?),
            on_complete,
        )?;
        Ok(id)
    }

    /// Starts the filesystem watcher. Created or modified files are (re)indexed,
    /// removed ones dropped from the index.
    #[cfg(feature = "watch")]
    pub fn watch(&self) -> Result<(), AssetError> {
        use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

        let index = Arc::clone(&self.index);
        let root = self.root.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for path in &event.paths {
                        let Ok(relative) = path.strip_prefix(&root) else {
                            continue;
                        };
                        match event.kind {
                            EventKind::Create(_) | EventKind::Modify(_) => {
                                if let Some(resource_type) = resource_type_for(path) {
                                    index.write().insert(
                                        relative.to_path_buf(),
                                        AssetInfo {
                                            path: relative.to_path_buf(),
                                            resource_type,
                                            last_loaded: Instant::now(),
                                        },
                                    );
                                }
                            }
                            EventKind::Remove(_) => {
                                index.write().remove(relative);
                            }
                            _ => {}
                        }
                    }
                }
                Err(e) => log::error!("asset watcher: {e}"),
            },
            Config::default(),
        )
        .map_err(|e| AssetError::Watch(e.to_string()))?;
        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| AssetError::Watch(e.to_string()))?;
        *self.watcher.lock() = Some(watcher);
        log::debug!("watching {} for changes", self.root.display());
        Ok(())
    }

    #[cfg(feature = "watch")]
    pub fn stop_watching(&self) {
        self.watcher.lock().take();
    }
}

/// Resource type implied by a file extension.
pub fn resource_type_for(path: &Path) -> Option<ResourceType> {
    match path.extension()?.to_str()? {
        "shadercfg" => Some(ResourceType::Shader),
        "spv" | "bin" => Some(ResourceType::Binary),
        "png" | "jpg" | "jpeg" | "tga" | "bmp" => Some(ResourceType::Image),
        "amt" => Some(ResourceType::Material),
        "txt" => Some(ResourceType::Text),
        _ => None,
    }
}

fn scan_dir(root: &Path, dir: &Path, found: &mut HashMap<PathBuf, AssetInfo>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("cannot read asset directory {}: {e}", dir.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_dir(root, &path, found);
            continue;
        }
        let Some(resource_type) = resource_type_for(&path) else {
            continue;
        };
        if let Ok(relative) = path.strip_prefix(root) {
            found.insert(
                relative.to_path_buf(),
                AssetInfo {
                    path: relative.to_path_buf(),
                    resource_type,
                    last_loaded: Instant::now(),
                },
            );
        }
    }
}
