//! Reference-counted registry of named resources.
//!
//! Textures, materials and geometries are acquired by name. The first acquire
//! loads the resource; later acquires bump the count. Releasing to zero frees the
//! resource only if the entry was created with auto-release.
//!
//! The lock protects the map only. Loads and unloads run with the lock released,
//! and threads asking for a name that is still loading wait on a condition
//! variable instead of loading it a second time.

use std::{collections::HashMap, sync::Arc};

use parking_lot::{Condvar, Mutex};

use crate::error::RegistryError;

enum Slot<T> {
    Loading,
    Ready(Arc<T>),
}

struct Reference<T> {
    count: u64,
    auto_release: bool,
    slot: Slot<T>,
}

pub struct ReferenceRegistry<T> {
    entries: Mutex<HashMap<String, Reference<T>>>,
    loaded: Condvar,
}

impl<T> Default for ReferenceRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            loaded: Condvar::new(),
        }
    }
}

impl<T> ReferenceRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the resource named `name`, loading it with `load` if it is not
    /// registered yet. `auto_release` only takes effect when the entry has no
    /// outstanding references.
    pub fn acquire<F>(
        &self,
        name: &str,
        auto_release: bool,
        load: F,
    ) -> Result<Arc<T>, RegistryError>
    where
        F: FnOnce() -> anyhow::Result<T>,
    {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut entries = self.entries.lock();
        loop {
            let loading = match entries.get_mut(name) {
                Some(reference) => match &reference.slot {
                    Slot::Ready(value) => {
                        let value = Arc::clone(value);
                        if reference.count == 0 {
                            reference.auto_release = auto_release;
                        }
                        reference.count += 1;
                        return Ok(value);
                    }
                    Slot::Loading => true,
                },
                None => false,
            };
            if !loading {
                break;
            }
            self.loaded.wait(&mut entries);
        }
        entries.insert(
            name.to_string(),
            Reference {
                count: 0,
                auto_release,
                slot: Slot::Loading,
            },
        );
        drop(entries);

        let loaded = load();

        let mut entries = self.entries.lock();
        let result = match loaded {
            Ok(value) => {
                let value = Arc::new(value);
                if let Some(reference) = entries.get_mut(name) {
                    reference.slot = Slot::Ready(Arc::clone(&value));
                    reference.count = 1;
                }
                Ok(value)
            }
            Err(source) => {
                entries.remove(name);
                log::error!("failed to load '{name}': {source:#}");
                Err(RegistryError::Load {
                    name: name.to_string(),
                    source,
                })
            }
        };
        drop(entries);
        self.loaded.notify_all();
        result
    }

    /// Registers an already built value under `name` with a count of one.
    /// Fails if the name is taken.
    pub fn insert(&self, name: &str, auto_release: bool, value: T) -> Result<Arc<T>, RegistryError> {
        let mut inserted = false;
        let value = self.acquire(name, auto_release, || {
            inserted = true;
            Ok(value)
        })?;
        if inserted {
            Ok(value)
        } else {
            // roll back the count bump from acquiring an existing name
            if let Some(reference) = self.entries.lock().get_mut(name) {
                reference.count = reference.count.saturating_sub(1);
            }
            Err(RegistryError::Load {
                name: name.to_string(),
                source: anyhow::anyhow!("'{name}' is already registered"),
            })
        }
    }

    /// Drops one reference. Reaching zero on an auto-release entry removes it and
    /// hands the value to `unload`, outside the lock.
    pub fn release<F>(&self, name: &str, unload: F) -> Result<u64, RegistryError>
    where
        F: FnOnce(Arc<T>),
    {
        let mut entries = self.entries.lock();
        let Some(reference) = entries.get_mut(name) else {
            log::warn!("release of unknown reference '{name}'");
            return Err(RegistryError::NotFound(name.to_string()));
        };
        if reference.count == 0 {
            log::warn!("reference '{name}' released more often than acquired");
            return Err(RegistryError::AlreadyReleased(name.to_string()));
        }
        reference.count -= 1;
        let remaining = reference.count;
        if remaining > 0 || !reference.auto_release {
            return Ok(remaining);
        }
        let Some(Reference {
            slot: Slot::Ready(value),
            ..
        }) = entries.remove(name)
        else {
            return Ok(0);
        };
        drop(entries);
        unload(value);
        Ok(0)
    }

    /// Loaded value without touching the count.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        match &self.entries.lock().get(name)?.slot {
            Slot::Ready(value) => Some(Arc::clone(value)),
            Slot::Loading => None,
        }
    }

    pub fn ref_count(&self, name: &str) -> Option<u64> {
        self.entries.lock().get(name).map(|r| r.count)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every loaded entry regardless of count, for shutdown.
    pub fn drain(&self) -> Vec<(String, Arc<T>)> {
        let mut entries = self.entries.lock();
        let names: Vec<String> = entries
            .iter()
            .filter(|(_, r)| matches!(r.slot, Slot::Ready(_)))
            .map(|(n, _)| n.clone())
            .collect();
        names
            .into_iter()
            .filter_map(|name| match entries.remove(&name) {
                Some(Reference {
                    slot: Slot::Ready(value),
                    ..
                }) => Some((name, value)),
                _ => None,
            })
            .collect()
    }
}
