//! Version composer
//!
//! Owns an instance's layer stack and its merged version. Every structural
//! change folds the whole stack again; a failed fold leaves the previous
//! merged version in place.

use super::merged::activation_record;
use super::{LibraryDescriptor, MergedVersion, ModActivation, VersionLayer};
use crate::config::ComposeConfig;
use crate::core::error::{ComposeError, ComposeResult};
use crate::core::instance::{BASE_LAYER_ID, CUSTOM_LAYER_ID, LayerStore, ORDER_DOCUMENT_ID};
use crate::core::mods::ModRegistry;
use crate::core::projection::{LayerList, ModList, Notifier, StructureObserver};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Where a layer in the stack came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerOrigin {
    Base,
    Loader,
    External,
    Custom,
}

#[derive(Debug, Clone)]
struct Slot {
    origin: LayerOrigin,
    /// Position in canonical load order
    rank: usize,
    /// Store keys of the documents behind this layer, shadowed ones first
    documents: Vec<String>,
    layer: VersionLayer,
}

#[derive(Debug, Serialize, Deserialize)]
struct OrderDocument {
    order: Vec<String>,
}

pub struct VersionComposer {
    store: Box<dyn LayerStore>,
    config: ComposeConfig,
    slots: Vec<Slot>,
    merged: MergedVersion,
    generation: u64,
    mods: ModRegistry,
    needs_reapply: bool,
    notifier: Notifier,
}

impl VersionComposer {
    pub fn new(store: Box<dyn LayerStore>, mods: ModRegistry, config: ComposeConfig) -> Self {
        Self {
            store,
            config,
            slots: Vec::new(),
            merged: MergedVersion::default(),
            generation: 0,
            mods,
            needs_reapply: false,
            notifier: Notifier::default(),
        }
    }

    /// Rebuild the stack from the store: base, loaders (unless
    /// `only_vanilla`), `external` in order, then the custom layer.
    /// Persisted ordering overrides are applied to the reorderable layers.
    pub fn reload(&mut self, only_vanilla: bool, external: &[String]) -> ComposeResult<()> {
        let _bracket = self.notifier.bracket();

        let slots = self.load_slots(only_vanilla, external)?;
        let merged = self.fold(&slots)?;

        self.slots = slots;
        self.publish(merged);
        self.mods.apply_activation(self.merged.mods());

        tracing::info!(
            "Loaded {} layers for '{}'{}",
            self.slots.len(),
            self.merged.id(),
            if self.is_custom() { " (custom)" } else { "" }
        );
        Ok(())
    }

    /// Drop every layer and the merged version.
    pub fn clear(&mut self) {
        let _bracket = self.notifier.bracket();
        self.slots.clear();
        self.merged = MergedVersion::default();
        self.needs_reapply = false;
    }

    /// Fold the stack again. `already_resetting` skips the structure bracket
    /// when the caller has one open.
    pub fn reapply(&mut self, already_resetting: bool) -> ComposeResult<()> {
        let _bracket = (!already_resetting).then(|| self.notifier.bracket());
        let merged = self.fold(&self.slots)?;
        self.publish(merged);
        Ok(())
    }

    /// Reapply only when a mod change asked for it.
    pub fn reapply_if_needed(&mut self) -> ComposeResult<bool> {
        if !self.needs_reapply {
            return Ok(false);
        }
        self.reapply(false)?;
        Ok(true)
    }

    /// Check the merged version is launchable.
    pub fn finalize(&self) -> ComposeResult<()> {
        if self.merged.main_class().is_none_or(|c| c.trim().is_empty()) {
            return Err(ComposeError::IncompleteConfiguration(
                "no main class set".to_string(),
            ));
        }
        if self.merged.libraries().normal().is_empty() {
            return Err(ComposeError::IncompleteConfiguration(
                "no active libraries".to_string(),
            ));
        }
        Ok(())
    }

    pub fn merged(&self) -> &MergedVersion {
        &self.merged
    }

    /// Number of successful merges so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn needs_reapply(&self) -> bool {
        self.needs_reapply
    }

    pub fn active_normal_libs(&self) -> &[LibraryDescriptor] {
        self.merged.libraries().normal()
    }

    pub fn active_native_libs(&self) -> &[LibraryDescriptor] {
        self.merged.libraries().native()
    }

    // === Layer stack ===

    pub fn layer_count(&self) -> usize {
        self.slots.len()
    }

    pub fn layers(&self) -> impl Iterator<Item = &VersionLayer> {
        self.slots.iter().map(|s| &s.layer)
    }

    pub fn layer(&self, index: usize) -> Option<&VersionLayer> {
        self.slots.get(index).map(|s| &s.layer)
    }

    pub fn layer_by_id(&self, id: &str) -> Option<&VersionLayer> {
        self.layers().find(|l| l.id() == id)
    }

    pub fn layer_id(&self, index: usize) -> Option<&str> {
        self.layer(index).map(|l| l.id())
    }

    pub fn layer_origin(&self, index: usize) -> Option<LayerOrigin> {
        self.slots.get(index).map(|s| s.origin)
    }

    /// Does the stack carry a custom override layer
    pub fn is_custom(&self) -> bool {
        self.slots
            .last()
            .is_some_and(|s| s.origin == LayerOrigin::Custom)
    }

    pub fn is_reorderable(&self, index: usize) -> bool {
        reorderable_range(&self.slots).contains(&index)
    }

    pub fn can_remove(&self, index: usize) -> bool {
        self.is_reorderable(index)
    }

    /// Swap a reorderable layer with its reorderable neighbour. Fixed layers
    /// and moves past either end are no-ops. Returns whether it moved.
    pub fn move_layer(&mut self, index: usize, direction: MoveDirection) -> ComposeResult<bool> {
        if !self.is_reorderable(index) {
            tracing::debug!("Layer {} is fixed, not moving", index);
            return Ok(false);
        }
        let target = match direction {
            MoveDirection::Up => index.checked_sub(1),
            MoveDirection::Down => index.checked_add(1),
        };
        let Some(target) = target.filter(|t| self.is_reorderable(*t)) else {
            return Ok(false);
        };

        let mut slots = self.slots.clone();
        slots.swap(index, target);
        let merged = self.fold(&slots)?;
        let order = OrderDocument {
            order: slots[reorderable_range(&slots)]
                .iter()
                .map(|s| s.layer.id().to_string())
                .collect(),
        };
        self.store
            .persist(ORDER_DOCUMENT_ID, &serde_json::to_value(&order)?)?;

        tracing::debug!("Moved layer '{}' {:?}", slots[target].layer.id(), direction);
        let _bracket = self.notifier.bracket();
        self.slots = slots;
        self.publish(merged);
        Ok(true)
    }

    /// Remove a reorderable layer and its document.
    pub fn remove(&mut self, index: usize) -> ComposeResult<bool> {
        let len = self.slots.len();
        if index >= len {
            return Err(ComposeError::range(index, len));
        }
        if !self.can_remove(index) {
            return Err(ComposeError::InvalidOperation(format!(
                "layer '{}' cannot be removed",
                self.slots[index].layer.id()
            )));
        }

        let mut slots = self.slots.clone();
        let removed = slots.remove(index);
        let merged = self.fold(&slots)?;
        for key in &removed.documents {
            self.store.discard(key)?;
        }

        tracing::info!("Removed layer '{}'", removed.layer.id());
        let _bracket = self.notifier.bracket();
        self.slots = slots;
        self.publish(merged);
        Ok(true)
    }

    /// Restore canonical load order and forget ordering overrides.
    pub fn reset_order(&mut self) -> ComposeResult<()> {
        let mut slots = self.slots.clone();
        slots.sort_by_key(|s| s.rank);
        let merged = self.fold(&slots)?;
        self.store.discard(ORDER_DOCUMENT_ID)?;

        let _bracket = self.notifier.bracket();
        self.slots = slots;
        self.publish(merged);
        Ok(())
    }

    /// Drop the custom override layer. Returns `false` when there is none.
    pub fn revert_to_base(&mut self) -> ComposeResult<bool> {
        if !self.is_custom() {
            return Ok(false);
        }

        let mut slots = self.slots.clone();
        slots.pop();
        let merged = self.fold(&slots)?;
        self.store.discard(CUSTOM_LAYER_ID)?;

        tracing::info!("Reverted '{}' to base", self.merged.id());
        let _bracket = self.notifier.bracket();
        self.slots = slots;
        self.publish(merged);
        self.mods.apply_activation(self.merged.mods());
        Ok(true)
    }

    /// The custom layer in document form
    pub fn custom_document(&self) -> ComposeResult<Option<serde_json::Value>> {
        self.custom_slot()
            .map(|s| s.layer.to_document())
            .transpose()
    }

    /// Replace the custom layer with one built from `document`.
    pub fn set_custom_document(&mut self, document: &serde_json::Value) -> ComposeResult<()> {
        let layer = VersionLayer::from_document(document)?;

        let mut slots = self.slots.clone();
        install_custom(&mut slots, layer.clone());
        let merged = self.fold(&slots)?;
        self.store.persist(CUSTOM_LAYER_ID, &layer.to_document()?)?;

        let _bracket = self.notifier.bracket();
        self.slots = slots;
        self.publish(merged);
        self.mods.apply_activation(self.merged.mods());
        Ok(())
    }

    // === Mods ===

    pub fn mods(&self) -> &ModRegistry {
        &self.mods
    }

    pub fn install_mod(&mut self, file: &Path) -> ComposeResult<()> {
        let before = self.mods.activation_record();
        self.mods.install(file)?;
        self.commit_mods(before)
    }

    pub fn delete_mods(&mut self, first: usize, last: usize) -> ComposeResult<()> {
        let before = self.mods.activation_record();
        let deleted = self.mods.delete_range(first, last);
        if self.installed_changed(&before) {
            self.commit_mods(before)?;
        }
        deleted
    }

    /// Returns whether the flag changed. The merged version is only updated
    /// by the next reapply.
    pub fn set_mod_enabled(&mut self, index: usize, enabled: bool) -> ComposeResult<bool> {
        let before = self.mods.activation_record();
        if !self.mods.set_enabled(index, enabled)? {
            return Ok(false);
        }
        self.commit_mods(before)?;
        Ok(true)
    }

    /// Rescan the mods directory. Returns whether the set of installed mods
    /// changed. Files that could not be described are reported after the
    /// rest of the scan has been committed.
    pub fn mods_directories_changed(&mut self) -> ComposeResult<bool> {
        let before = self.mods.activation_record();
        let record = activation_record(self.layers());
        let scanned = self.mods.directories_changed(&record);

        let changed = self.installed_changed(&before);
        if changed {
            self.commit_mods(before)?;
        }
        scanned.map(|_| changed)
    }

    /// Write the registry state into the custom layer. When that fails only
    /// the enabled flags roll back; files already adopted or deleted stay
    /// that way and the registry keeps matching the directory.
    fn commit_mods(&mut self, before: Vec<ModActivation>) -> ComposeResult<()> {
        let installed_changed = self.installed_changed(&before);
        if let Err(e) = self.write_mod_record() {
            self.mods.restore_activation(&before);
            self.needs_reapply |= installed_changed;
            return Err(e);
        }
        self.needs_reapply = true;
        Ok(())
    }

    fn installed_changed(&self, before: &[ModActivation]) -> bool {
        !self.mods.ids().into_iter().eq(before.iter().map(|r| r.id.as_str()))
    }

    fn write_mod_record(&mut self) -> ComposeResult<()> {
        let recorded = activation_record(self.layers());
        let deviates = self.mods.entries().iter().any(|e| {
            recorded
                .iter()
                .find(|r| r.id == e.id())
                .is_none_or(|r| r.enabled) != e.enabled()
        });
        // Without a custom layer an all-default mod list needs no record
        if !self.is_custom() && !deviates {
            return Ok(());
        }

        let record = self.mods.activation_record();
        let layer = match self.custom_slot() {
            Some(slot) => slot.layer.with_mods(record),
            None => VersionLayer::empty(CUSTOM_LAYER_ID).with_mods(record),
        };
        self.store.persist(CUSTOM_LAYER_ID, &layer.to_document()?)?;

        let _bracket = (!self.is_custom()).then(|| self.notifier.bracket());
        install_custom(&mut self.slots, layer);
        Ok(())
    }

    // === Projections ===

    pub fn observe_layers(&mut self, observer: Rc<dyn StructureObserver>) {
        self.notifier.subscribe(observer);
    }

    pub fn observe_mods(&mut self, observer: Rc<dyn StructureObserver>) {
        self.mods.observe(observer);
    }

    pub fn layer_list(&mut self) -> LayerList<'_> {
        LayerList::new(self)
    }

    pub fn mod_list(&mut self) -> ModList<'_> {
        ModList::new(self)
    }

    // === Internals ===

    fn custom_slot(&self) -> Option<&Slot> {
        self.slots
            .last()
            .filter(|s| s.origin == LayerOrigin::Custom)
    }

    fn fold(&self, slots: &[Slot]) -> ComposeResult<MergedVersion> {
        let layers: Vec<&VersionLayer> = slots.iter().map(|s| &s.layer).collect();
        MergedVersion::fold(
            &layers,
            &self.mods.ids(),
            self.config.max_launcher_version,
        )
    }

    fn publish(&mut self, merged: MergedVersion) {
        self.merged = merged;
        self.generation += 1;
        self.needs_reapply = false;
    }

    fn load_slots(&self, only_vanilla: bool, external: &[String]) -> ComposeResult<Vec<Slot>> {
        let base_doc = self
            .store
            .load(BASE_LAYER_ID)
            .map_err(|e| ComposeError::Load(e.to_string()))?
            .ok_or_else(|| ComposeError::Load("no base version document".to_string()))?;
        let base =
            VersionLayer::from_document(&base_doc).map_err(|e| ComposeError::Load(e.to_string()))?;

        let mut slots = vec![Slot {
            origin: LayerOrigin::Base,
            rank: 0,
            documents: vec![BASE_LAYER_ID.to_string()],
            layer: base,
        }];

        if !only_vanilla {
            let mut loaders = Vec::new();
            for id in self.store.loader_layer_ids()? {
                match self.store.load(&id)? {
                    Some(doc) => loaders.push((id, VersionLayer::from_document(&doc)?)),
                    None => tracing::warn!("Loader layer '{}' vanished, skipping", id),
                }
            }
            loaders.sort_by_key(|(_, l)| l.order().unwrap_or(0));
            for (key, layer) in loaders {
                add_layer(&mut slots, LayerOrigin::Loader, key, layer)?;
            }
        }

        for id in external {
            match self.store.load(id)? {
                Some(doc) => add_layer(
                    &mut slots,
                    LayerOrigin::External,
                    id.clone(),
                    VersionLayer::from_document(&doc)?,
                )?,
                None => tracing::warn!("External layer '{}' not found, skipping", id),
            }
        }

        if let Some(doc) = self.store.load(CUSTOM_LAYER_ID)? {
            install_custom(&mut slots, VersionLayer::from_document(&doc)?);
        }

        for (rank, slot) in slots.iter_mut().enumerate() {
            slot.rank = rank;
        }

        if let Some(doc) = self.store.load(ORDER_DOCUMENT_ID)? {
            let order: OrderDocument = serde_json::from_value(doc)
                .map_err(|e| ComposeError::parse(ORDER_DOCUMENT_ID, e))?;
            apply_order(&mut slots, &order.order);
        }

        Ok(slots)
    }
}

/// Indices of the layers that may be moved or removed.
fn reorderable_range(slots: &[Slot]) -> Range<usize> {
    let end = match slots.last() {
        Some(s) if s.origin == LayerOrigin::Custom => slots.len() - 1,
        _ => slots.len(),
    };
    1.min(end)..end
}

/// Append a loader/external layer stored under `key`. A reorderable layer
/// with the same id is replaced in place.
fn add_layer(
    slots: &mut Vec<Slot>,
    origin: LayerOrigin,
    key: String,
    layer: VersionLayer,
) -> ComposeResult<()> {
    if slots[0].layer.id() == layer.id() {
        return Err(ComposeError::parse(
            layer.id(),
            "layer id collides with the base layer",
        ));
    }

    match slots[1..].iter_mut().find(|s| s.layer.id() == layer.id()) {
        Some(slot) => {
            tracing::debug!("Layer '{}' replaces an earlier one", layer.id());
            slot.origin = origin;
            slot.documents.push(key);
            slot.layer = layer;
        }
        None => slots.push(Slot {
            origin,
            rank: slots.len(),
            documents: vec![key],
            layer,
        }),
    }
    Ok(())
}

/// Put `layer` on top of the stack as the custom layer.
fn install_custom(slots: &mut Vec<Slot>, layer: VersionLayer) {
    match slots.last_mut() {
        Some(slot) if slot.origin == LayerOrigin::Custom => slot.layer = layer,
        _ => slots.push(Slot {
            origin: LayerOrigin::Custom,
            rank: usize::MAX,
            documents: vec![CUSTOM_LAYER_ID.to_string()],
            layer,
        }),
    }
}

/// Listed ids first, in listed order; the rest keep canonical order after them.
fn apply_order(slots: &mut [Slot], order: &[String]) {
    let range = reorderable_range(slots);
    slots[range].sort_by_key(|s| match order.iter().position(|id| id == s.layer.id()) {
        Some(pos) => (0, pos),
        None => (1, s.rank),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mods::tests::{FakeDescriber, FakeDirectory, delta};
    use crate::core::projection::tests::Recorder;
    use crate::core::projection::{Cell, Column, ListProjection};
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// In-memory store; clones share the same documents.
    #[derive(Clone, Default)]
    struct MemoryStore {
        docs: Rc<RefCell<HashMap<String, Value>>>,
        loaders: Vec<String>,
        fail_persist: bool,
    }

    impl MemoryStore {
        fn with(mut self, id: &str, doc: Value) -> Self {
            if ![BASE_LAYER_ID, CUSTOM_LAYER_ID, ORDER_DOCUMENT_ID].contains(&id) {
                self.loaders.push(id.to_string());
            }
            self.docs.borrow_mut().insert(id.to_string(), doc);
            self
        }

        fn get(&self, id: &str) -> Option<Value> {
            self.docs.borrow().get(id).cloned()
        }
    }

    impl LayerStore for MemoryStore {
        fn load(&self, layer_id: &str) -> ComposeResult<Option<Value>> {
            Ok(self.get(layer_id))
        }

        fn loader_layer_ids(&self) -> ComposeResult<Vec<String>> {
            Ok(self.loaders.clone())
        }

        fn persist(&mut self, layer_id: &str, document: &Value) -> ComposeResult<()> {
            if self.fail_persist {
                return Err(ComposeError::store(layer_id, "no space left on device"));
            }
            self.docs
                .borrow_mut()
                .insert(layer_id.to_string(), document.clone());
            Ok(())
        }

        fn discard(&mut self, layer_id: &str) -> ComposeResult<()> {
            self.docs.borrow_mut().remove(layer_id);
            Ok(())
        }
    }

    fn base_doc() -> Value {
        json!({
            "id": "1.7.10",
            "type": "release",
            "mainClass": "net.minecraft.Launch",
            "minecraftArguments": "--username ${auth_player_name}",
            "libraries": [{ "name": "org.a:a:1" }]
        })
    }

    fn loader_doc(id: &str, order: i32) -> Value {
        json!({
            "id": id,
            "name": id.to_uppercase(),
            "version": "1.0",
            "order": order,
            "libraries": [{ "name": format!("org.{}:{}:1", id, id) }]
        })
    }

    fn composer(store: &MemoryStore) -> VersionComposer {
        composer_with_mods(store, &[])
    }

    fn composer_with_mods(store: &MemoryStore, files: &[&str]) -> VersionComposer {
        let directory = FakeDirectory::default();
        directory.scans.borrow_mut().push(delta(files, &[]));
        let mods = ModRegistry::new(Box::new(directory), Box::new(FakeDescriber));
        VersionComposer::new(Box::new(store.clone()), mods, ComposeConfig::default())
    }

    fn ids(composer: &VersionComposer) -> Vec<&str> {
        composer.layers().map(|l| l.id()).collect()
    }

    fn lib_names(libs: &[LibraryDescriptor]) -> Vec<&str> {
        libs.iter().map(|l| l.name.as_str()).collect()
    }

    fn stack() -> MemoryStore {
        MemoryStore::default()
            .with(BASE_LAYER_ID, base_doc())
            .with("forge", loader_doc("forge", 1))
            .with("liteloader", loader_doc("liteloader", 2))
            .with("optifine", loader_doc("optifine", 3))
    }

    #[test]
    fn test_loader_overrides_main_class_and_libraries() {
        let store = MemoryStore::default().with(BASE_LAYER_ID, base_doc()).with(
            "loader",
            json!({
                "id": "net.loader",
                "mainClass": "net.loader.Main",
                "libraries": [
                    { "name": "org.a:a:1", "enabled": false },
                    { "name": "org.b:b:1" }
                ]
            }),
        );
        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();

        assert_eq!(composer.merged().main_class(), Some("net.loader.Main"));
        assert_eq!(lib_names(composer.active_normal_libs()), ["org.b:b:1"]);
        assert!(composer.active_native_libs().is_empty());
    }

    #[test]
    fn test_reload_order_and_only_vanilla() {
        let store = MemoryStore::default()
            .with(BASE_LAYER_ID, base_doc())
            .with("late", loader_doc("late", 5))
            .with("early", loader_doc("early", 1))
            .with("extra", loader_doc("extra", 0))
            .with(CUSTOM_LAYER_ID, json!({ "id": "custom" }));

        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();
        assert_eq!(ids(&composer), ["1.7.10", "extra", "early", "late", "custom"]);
        assert!(composer.is_custom());

        composer.reload(true, &[]).unwrap();
        assert_eq!(ids(&composer), ["1.7.10", "custom"]);
        assert_eq!(composer.layer_origin(1), Some(LayerOrigin::Custom));
    }

    #[test]
    fn test_external_layers_and_id_replacement() {
        let store = stack().with(
            "forge-dev",
            json!({ "id": "forge", "version": "2.0", "order": 1 }),
        );
        let mut composer = composer(&store);
        composer.reload(true, &["optifine".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(ids(&composer), ["1.7.10", "optifine"]);
        assert_eq!(composer.layer_origin(1), Some(LayerOrigin::External));

        composer.reload(false, &[]).unwrap();
        assert_eq!(ids(&composer), ["1.7.10", "forge", "liteloader", "optifine"]);
        assert_eq!(composer.layer_by_id("forge").and_then(|l| l.version()), Some("2.0"));
    }

    #[test]
    fn test_reload_fails_without_base() {
        let store = MemoryStore::default().with("forge", loader_doc("forge", 1));
        let mut composer = composer(&store);
        assert!(matches!(composer.reload(false, &[]), Err(ComposeError::Load(_))));

        let store = MemoryStore::default().with(BASE_LAYER_ID, json!({ "mainClass": "x" }));
        let mut composer = self::composer(&store);
        assert!(matches!(composer.reload(false, &[]), Err(ComposeError::Load(_))));
    }

    #[test]
    fn test_failed_reload_keeps_previous_state() {
        let store = stack();
        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();
        let before = composer.merged().clone();

        store
            .docs
            .borrow_mut()
            .insert("forge".to_string(), json!({ "id": "forge", "libraries": [{ "name": "bad" }] }));
        assert!(matches!(composer.reload(false, &[]), Err(ComposeError::Parse { .. })));
        assert_eq!(composer.merged(), &before);
        assert_eq!(composer.layer_count(), 4);
    }

    #[test]
    fn test_reapply_is_idempotent() {
        let mut composer = composer(&stack());
        composer.reload(false, &[]).unwrap();
        let first = composer.merged().clone();
        composer.reapply(false).unwrap();
        assert_eq!(composer.merged(), &first);
        composer.reapply(true).unwrap();
        assert_eq!(composer.merged(), &first);
    }

    #[test]
    fn test_merge_error_keeps_previous_result() {
        let store = MemoryStore::default().with(BASE_LAYER_ID, base_doc());
        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();
        let before = composer.merged().clone();
        let generation = composer.generation();

        let err = composer
            .set_custom_document(&json!({ "id": "custom", "minimumLauncherVersion": 99 }))
            .unwrap_err();
        assert!(matches!(err, ComposeError::Merge { ref layer, .. } if layer == "custom"));
        assert_eq!(composer.merged(), &before);
        assert_eq!(composer.generation(), generation);
        assert!(!composer.is_custom());
        assert_eq!(store.get(CUSTOM_LAYER_ID), None);
    }

    #[test]
    fn test_finalize() {
        let mut composer = composer(&stack());
        composer.reload(false, &[]).unwrap();
        composer.finalize().unwrap();

        let store = MemoryStore::default().with(BASE_LAYER_ID, json!({ "id": "bare" }));
        let mut composer = self::composer(&store);
        composer.reload(false, &[]).unwrap();
        assert!(matches!(
            composer.finalize(),
            Err(ComposeError::IncompleteConfiguration(_))
        ));

        let store = MemoryStore::default()
            .with(BASE_LAYER_ID, json!({ "id": "nolibs", "mainClass": "M" }));
        let mut composer = self::composer(&store);
        composer.reload(false, &[]).unwrap();
        assert!(matches!(
            composer.finalize(),
            Err(ComposeError::IncompleteConfiguration(_))
        ));
    }

    #[test]
    fn test_move_fixed_layers_is_noop() {
        let store = stack().with(CUSTOM_LAYER_ID, json!({ "id": "custom" }));
        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();
        let before: Vec<String> = ids(&composer).iter().map(|s| s.to_string()).collect();
        let generation = composer.generation();

        assert!(!composer.move_layer(0, MoveDirection::Down).unwrap());
        assert!(!composer.move_layer(4, MoveDirection::Up).unwrap());
        assert!(!composer.move_layer(1, MoveDirection::Up).unwrap());
        assert!(!composer.move_layer(3, MoveDirection::Down).unwrap());
        assert!(!composer.move_layer(9, MoveDirection::Down).unwrap());

        assert_eq!(ids(&composer), before);
        assert_eq!(composer.generation(), generation);
        assert_eq!(store.get(ORDER_DOCUMENT_ID), None);
    }

    #[test]
    fn test_move_persists_order_and_reset_restores() {
        let store = stack();
        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();

        assert!(composer.move_layer(1, MoveDirection::Down).unwrap());
        assert_eq!(ids(&composer), ["1.7.10", "liteloader", "forge", "optifine"]);
        assert_eq!(
            store.get(ORDER_DOCUMENT_ID),
            Some(json!({ "order": ["liteloader", "forge", "optifine"] }))
        );
        assert_eq!(
            lib_names(composer.active_normal_libs()),
            ["org.a:a:1", "org.liteloader:liteloader:1", "org.forge:forge:1", "org.optifine:optifine:1"]
        );

        // order survives a reload
        composer.reload(false, &[]).unwrap();
        assert_eq!(ids(&composer), ["1.7.10", "liteloader", "forge", "optifine"]);

        composer.reset_order().unwrap();
        assert_eq!(ids(&composer), ["1.7.10", "forge", "liteloader", "optifine"]);
        assert_eq!(store.get(ORDER_DOCUMENT_ID), None);
    }

    #[test]
    fn test_remove() {
        let store = stack().with(CUSTOM_LAYER_ID, json!({ "id": "custom" }));
        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();

        assert!(!composer.can_remove(0));
        assert!(!composer.can_remove(4));
        assert!(composer.can_remove(2));

        assert!(matches!(composer.remove(0), Err(ComposeError::InvalidOperation(_))));
        assert!(matches!(composer.remove(4), Err(ComposeError::InvalidOperation(_))));
        assert!(matches!(composer.remove(5), Err(ComposeError::Range { .. })));
        assert_eq!(composer.layer_count(), 5);

        let generation = composer.generation();
        assert!(composer.remove(2).unwrap());
        assert_eq!(composer.layer_count(), 4);
        assert_eq!(composer.generation(), generation + 1);
        assert_eq!(ids(&composer), ["1.7.10", "forge", "optifine", "custom"]);
        assert_eq!(store.get("liteloader"), None);
    }

    #[test]
    fn test_remove_discards_by_store_key() {
        let store = MemoryStore::default()
            .with(BASE_LAYER_ID, base_doc())
            .with("forge-1614", json!({ "id": "net.minecraftforge", "order": 1 }))
            .with("net.minecraftforge", json!({ "id": "unrelated", "order": 2 }));
        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();
        assert_eq!(ids(&composer), ["1.7.10", "net.minecraftforge", "unrelated"]);

        assert!(composer.remove(1).unwrap());
        assert_eq!(store.get("forge-1614"), None);
        assert!(store.get("net.minecraftforge").is_some());

        composer.reload(false, &[]).unwrap();
        assert_eq!(ids(&composer), ["1.7.10", "unrelated"]);
    }

    #[test]
    fn test_remove_replaced_layer_discards_every_document() {
        let store = stack().with(
            "forge-dev",
            json!({ "id": "forge", "version": "2.0", "order": 1 }),
        );
        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();

        assert!(composer.remove(1).unwrap());
        assert_eq!(store.get("forge"), None);
        assert_eq!(store.get("forge-dev"), None);

        composer.reload(false, &[]).unwrap();
        assert_eq!(ids(&composer), ["1.7.10", "liteloader", "optifine"]);
    }

    #[test]
    fn test_revert_to_base() {
        let store = stack().with(
            CUSTOM_LAYER_ID,
            json!({ "id": "custom", "mainClass": "my.Main" }),
        );
        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();
        assert_eq!(composer.merged().main_class(), Some("my.Main"));
        assert_eq!(
            composer.custom_document().unwrap(),
            Some(json!({ "id": "custom", "mainClass": "my.Main" }))
        );

        assert!(composer.revert_to_base().unwrap());
        assert!(!composer.is_custom());
        assert_eq!(composer.merged().main_class(), Some("net.minecraft.Launch"));
        assert_eq!(store.get(CUSTOM_LAYER_ID), None);

        assert!(!composer.revert_to_base().unwrap());
        assert_eq!(composer.custom_document().unwrap(), None);
    }

    #[test]
    fn test_set_mod_enabled_takes_effect_on_reapply() {
        let store = MemoryStore::default().with(BASE_LAYER_ID, base_doc());
        let mut composer = composer_with_mods(&store, &["a.jar", "b.jar", "c.jar"]);
        composer.reload(false, &[]).unwrap();
        assert!(composer.mods_directories_changed().unwrap());
        assert!(!composer.is_custom());
        composer.reapply(false).unwrap();
        assert_eq!(
            composer.merged().active_mods().collect::<Vec<_>>(),
            ["a.jar", "b.jar", "c.jar"]
        );

        assert!(composer.set_mod_enabled(2, false).unwrap());
        assert!(composer.needs_reapply());
        assert!(composer.is_custom());
        assert_eq!(composer.merged().active_mods().count(), 3);

        assert!(composer.reapply_if_needed().unwrap());
        assert_eq!(
            composer.merged().active_mods().collect::<Vec<_>>(),
            ["a.jar", "b.jar"]
        );
        let entries = composer.mods().entries();
        assert_eq!(entries[0].id(), "a.jar");
        assert!(entries[0].enabled() && entries[1].enabled());
        assert_eq!(
            store.get(CUSTOM_LAYER_ID),
            Some(json!({
                "id": "custom",
                "mods": [
                    { "id": "a.jar", "enabled": true },
                    { "id": "b.jar", "enabled": true },
                    { "id": "c.jar", "enabled": false }
                ]
            }))
        );
    }

    #[test]
    fn test_mod_state_survives_restart() {
        let store = MemoryStore::default().with(BASE_LAYER_ID, base_doc());
        let mut composer = composer_with_mods(&store, &["a.jar", "b.jar"]);
        composer.reload(false, &[]).unwrap();
        composer.mods_directories_changed().unwrap();
        composer.set_mod_enabled(0, false).unwrap();

        let mut restarted = composer_with_mods(&store, &["a.jar", "b.jar"]);
        restarted.reload(false, &[]).unwrap();
        restarted.mods_directories_changed().unwrap();
        assert!(!restarted.mods().entries()[0].enabled());
        assert!(restarted.mods().entries()[1].enabled());
    }

    #[test]
    fn test_revert_reenables_mods() {
        let store = MemoryStore::default().with(BASE_LAYER_ID, base_doc());
        let mut composer = composer_with_mods(&store, &["a.jar"]);
        composer.reload(false, &[]).unwrap();
        composer.mods_directories_changed().unwrap();
        composer.set_mod_enabled(0, false).unwrap();

        assert!(composer.revert_to_base().unwrap());
        assert!(composer.mods().entries()[0].enabled());
        assert_eq!(composer.merged().active_mods().collect::<Vec<_>>(), ["a.jar"]);
    }

    #[test]
    fn test_delete_mods_keeps_remaining_order() {
        let store = MemoryStore::default().with(BASE_LAYER_ID, base_doc());
        let mut composer = composer_with_mods(&store, &["0.jar", "1.jar", "2.jar", "3.jar"]);
        composer.reload(false, &[]).unwrap();
        composer.mods_directories_changed().unwrap();

        composer.delete_mods(1, 2).unwrap();
        let entries = composer.mods().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].id(), "3.jar");

        assert!(matches!(composer.delete_mods(0, 5), Err(ComposeError::Range { .. })));
        assert_eq!(composer.mods().len(), 2);
    }

    #[test]
    fn test_failed_mod_record_write_keeps_file_changes() {
        let mut store = MemoryStore::default()
            .with(BASE_LAYER_ID, base_doc())
            .with(CUSTOM_LAYER_ID, json!({ "id": "custom" }));
        store.fail_persist = true;

        let directory = FakeDirectory::default();
        let removed = Rc::clone(&directory.removed);
        directory
            .scans
            .borrow_mut()
            .push(delta(&["a.jar", "b.jar"], &[]));
        let mods = ModRegistry::new(Box::new(directory), Box::new(FakeDescriber));
        let mut composer =
            VersionComposer::new(Box::new(store.clone()), mods, ComposeConfig::default());
        composer.reload(false, &[]).unwrap();

        // the scan itself sticks even though its record cannot be written
        assert!(matches!(
            composer.mods_directories_changed(),
            Err(ComposeError::Store { .. })
        ));
        assert_eq!(composer.mods().len(), 2);
        assert!(composer.needs_reapply());

        assert!(matches!(
            composer.delete_mods(0, 0),
            Err(ComposeError::Store { .. })
        ));
        assert_eq!(*removed.borrow(), [PathBuf::from("/mods/a.jar")]);
        assert_eq!(composer.mods().entries()[0].id(), "b.jar");
        assert_eq!(composer.mods().len(), 1);

        assert!(composer.set_mod_enabled(0, false).is_err());
        assert!(composer.mods().entries()[0].enabled());

        assert!(composer.install_mod(Path::new("/downloads/c.jar")).is_err());
        assert_eq!(composer.mods().len(), 2);

        composer.reapply_if_needed().unwrap();
        assert_eq!(
            composer.merged().active_mods().collect::<Vec<_>>(),
            ["b.jar", "c.jar"]
        );
    }

    #[test]
    fn test_install_mod() {
        let store = MemoryStore::default().with(BASE_LAYER_ID, base_doc());
        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();

        composer.install_mod(Path::new("/downloads/new.jar")).unwrap();
        assert!(composer.needs_reapply());
        assert!(matches!(
            composer.install_mod(Path::new("/other/new.jar")),
            Err(ComposeError::DuplicateMod(_))
        ));
        composer.reapply(false).unwrap();
        assert_eq!(composer.merged().active_mods().collect::<Vec<_>>(), ["new.jar"]);
    }

    #[test]
    fn test_layer_structure_brackets() {
        let recorder = Rc::new(Recorder::default());
        let mut composer = composer(&stack());
        composer.observe_layers(recorder.clone());

        composer.reload(false, &[]).unwrap();
        composer.remove(0).unwrap_err();
        composer.move_layer(1, MoveDirection::Down).unwrap();
        composer.reapply(true).unwrap();
        assert_eq!(*recorder.events.borrow(), ["begin", "end", "begin", "end"]);

        // a failing reload still closes its bracket
        let mut broken = self::composer(&MemoryStore::default());
        let recorder = Rc::new(Recorder::default());
        broken.observe_layers(recorder.clone());
        broken.reload(false, &[]).unwrap_err();
        assert_eq!(*recorder.events.borrow(), ["begin", "end"]);
    }

    #[test]
    fn test_layer_projection() {
        let store = stack().with(CUSTOM_LAYER_ID, json!({ "id": "custom" }));
        let mut composer = composer(&store);
        composer.reload(false, &[]).unwrap();
        let mut list = composer.layer_list();

        assert_eq!(list.row_count(), 5);
        assert_eq!(list.column_count(), 3);
        assert_eq!(list.cell(1, Column::Name), Some(Cell::Text("FORGE".to_string())));
        assert_eq!(list.cell(1, Column::Version), Some(Cell::Text("1.0".to_string())));
        assert_eq!(list.cell(0, Column::Version), Some(Cell::Text(String::new())));
        assert_eq!(list.cell(7, Column::Name), None);

        assert!(!list.flags(0, Column::Active).editable);
        assert!(!list.flags(4, Column::Active).editable);
        assert!(list.flags(1, Column::Active).editable);
        assert!(!list.flags(1, Column::Name).editable);

        assert!(!list.set_cell(0, Column::Active, Cell::Check(false)).unwrap());
        assert!(!list.set_cell(1, Column::Name, Cell::Text("x".into())).unwrap());
        assert!(list.set_cell(1, Column::Active, Cell::Check(false)).unwrap());
        assert_eq!(list.row_count(), 4);
        assert_eq!(store.get("forge"), None);
        assert!(list.set_cell(9, Column::Active, Cell::Check(false)).is_err());
    }

    #[test]
    fn test_mod_projection() {
        let store = MemoryStore::default().with(BASE_LAYER_ID, base_doc());
        let mut composer = composer_with_mods(&store, &["a.jar", "b.jar"]);
        composer.reload(false, &[]).unwrap();
        composer.mods_directories_changed().unwrap();

        let recorder = Rc::new(Recorder::default());
        composer.observe_mods(recorder.clone());

        let mut list = composer.mod_list();
        assert_eq!(list.row_count(), 2);
        assert_eq!(list.cell(0, Column::Active), Some(Cell::Check(true)));
        assert_eq!(list.cell(1, Column::Name), Some(Cell::Text("b".to_string())));
        assert_eq!(list.cell(1, Column::Version), Some(Cell::Text("1.0".to_string())));
        assert!(list.flags(1, Column::Active).editable);

        assert!(list.set_cell(1, Column::Active, Cell::Check(false)).unwrap());
        assert_eq!(list.cell(1, Column::Active), Some(Cell::Check(false)));
        assert!(matches!(
            list.set_cell(2, Column::Active, Cell::Check(false)),
            Err(ComposeError::Range { .. })
        ));
        assert!(recorder.events.borrow().contains(&"rows 1..=1".to_string()));
    }
}
