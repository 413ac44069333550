//! which main documents depend on which include files
//!
//! The registry outlives single loads. A host feeds it from the include callback of
//! [YamlComposer::load](crate::YamlComposer::load) and asks it which main documents need to be recomposed when an
//! include file changes.
use indexmap::IndexSet;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct Associations {
    includes_by_main: HashMap<PathBuf, IndexSet<PathBuf>>,
    mains_by_include: HashMap<PathBuf, IndexSet<PathBuf>>,
}

impl Associations {
    fn unlink(&mut self, main: &Path) -> Option<IndexSet<PathBuf>> {
        let includes = self.includes_by_main.remove(main)?;
        for include in &includes {
            if let Some(mains) = self.mains_by_include.get_mut(include) {
                mains.shift_remove(main);
                if mains.is_empty() {
                    self.mains_by_include.remove(include);
                }
            }
        }
        Some(includes)
    }
}

#[derive(Debug, Default)]
pub struct IncludeRegistry {
    associations: RwLock<Associations>,
}

impl IncludeRegistry {
    pub fn register_include(&self, main: impl Into<PathBuf>, include: impl Into<PathBuf>) {
        let (main, include) = (main.into(), include.into());
        tracing::trace!(main=%main.display(), include=%include.display(), "registering include");

        let mut associations = self.associations.write().unwrap_or_else(PoisonError::into_inner);
        associations
            .mains_by_include
            .entry(include.clone())
            .or_default()
            .insert(main.clone());
        associations
            .includes_by_main
            .entry(main)
            .or_default()
            .insert(include);
    }

    pub fn get_mains_for_include(&self, include: &Path) -> Vec<PathBuf> {
        let associations = self.associations.read().unwrap_or_else(PoisonError::into_inner);
        associations
            .mains_by_include
            .get(include)
            .map(|mains| mains.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_includes_for_main(&self, main: &Path) -> Vec<PathBuf> {
        let associations = self.associations.read().unwrap_or_else(PoisonError::into_inner);
        associations
            .includes_by_main
            .get(main)
            .map(|includes| includes.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_include(&self, include: &Path) -> bool {
        let associations = self.associations.read().unwrap_or_else(PoisonError::into_inner);
        associations.mains_by_include.contains_key(include)
    }

    /// Forgets `main` and all its associations
    pub fn remove_main(&self, main: &Path) {
        let mut associations = self.associations.write().unwrap_or_else(PoisonError::into_inner);
        if associations.unlink(main).is_some() {
            tracing::trace!(main=%main.display(), "removed main document");
        }
    }

    /// Replaces the include set of `main` in one step, e.g. after it was recomposed
    pub fn replace_includes(&self, main: impl Into<PathBuf>, includes: impl IntoIterator<Item = PathBuf>) {
        let main = main.into();
        let includes: IndexSet<PathBuf> = includes.into_iter().collect();

        let mut associations = self.associations.write().unwrap_or_else(PoisonError::into_inner);
        associations.unlink(&main);
        if includes.is_empty() {
            return;
        }
        for include in &includes {
            associations
                .mains_by_include
                .entry(include.clone())
                .or_default()
                .insert(main.clone());
        }
        associations.includes_by_main.insert(main, includes);
    }

    /// All main documents with at least one include
    pub fn mains(&self) -> Vec<PathBuf> {
        let associations = self.associations.read().unwrap_or_else(PoisonError::into_inner);
        associations.includes_by_main.keys().cloned().collect()
    }
}
