//! Library resolution
//!
//! Folds the libraries of an ordered layer stack into one deduplicated list.
//! A coordinate keeps the position of the layer that first introduced it;
//! later layers only replace its content.

use crate::core::version::{LibraryDescriptor, VersionLayer};
use std::collections::HashMap;

/// Keyed sequence where the first insertion fixes the position and later
/// insertions for the same key replace the value in place.
#[derive(Debug)]
pub(crate) struct StableMerge<T> {
    positions: HashMap<String, usize>,
    items: Vec<T>,
}

impl<T> StableMerge<T> {
    pub(crate) fn new() -> Self {
        Self {
            positions: HashMap::new(),
            items: Vec::new(),
        }
    }

    pub(crate) fn upsert(&mut self, key: String, item: T) {
        match self.positions.get(&key) {
            Some(&pos) => self.items[pos] = item,
            None => {
                self.positions.insert(key, self.items.len());
                self.items.push(item);
            }
        }
    }

    pub(crate) fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Resolved library set of a merged version
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedLibraries {
    /// Every merged descriptor, active or not, in first-introduction order
    all: Vec<LibraryDescriptor>,
    normal: Vec<LibraryDescriptor>,
    native: Vec<LibraryDescriptor>,
}

impl ResolvedLibraries {
    pub fn all(&self) -> &[LibraryDescriptor] {
        &self.all
    }

    /// Active classpath libraries
    pub fn normal(&self) -> &[LibraryDescriptor] {
        &self.normal
    }

    /// Active platform-native libraries
    pub fn native(&self) -> &[LibraryDescriptor] {
        &self.native
    }
}

pub struct LibraryResolver;

impl LibraryResolver {
    /// Merge the libraries of `layers`, walked in order.
    pub fn resolve<'a, I>(layers: I) -> ResolvedLibraries
    where
        I: IntoIterator<Item = &'a VersionLayer>,
    {
        let mut merge = StableMerge::new();
        for layer in layers {
            for lib in layer.libraries() {
                merge.upsert(lib.key(), lib.clone());
            }
        }

        let all = merge.into_items();
        let (native, normal): (Vec<_>, Vec<_>) = all
            .iter()
            .filter(|lib| lib.enabled && lib.should_include())
            .cloned()
            .partition(|lib| lib.is_native());

        tracing::debug!(
            "Resolved {} libraries ({} normal, {} native)",
            all.len(),
            normal.len(),
            native.len()
        );

        ResolvedLibraries {
            all,
            normal,
            native,
        }
    }
}
