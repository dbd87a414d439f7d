//! List projections
//!
//! Row/column views over the layer stack and the mod list for list-based
//! consumers. Structural changes are announced through [`StructureObserver`]
//! brackets; row indices are only valid between brackets.

use crate::core::error::{ComposeError, ComposeResult};
use crate::core::version::VersionComposer;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Active,
    Name,
    Version,
}

impl Column {
    pub const ALL: [Column; 3] = [Column::Active, Column::Name, Column::Version];

    pub fn from_index(index: usize) -> Option<Column> {
        Self::ALL.get(index).copied()
    }

    pub fn header(&self) -> &'static str {
        match self {
            Column::Active => "Active",
            Column::Name => "Name",
            Column::Version => "Version",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Check(bool),
    Text(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellFlags {
    pub selectable: bool,
    pub checkable: bool,
    pub editable: bool,
}

pub trait ListProjection {
    fn row_count(&self) -> usize;

    fn column_count(&self) -> usize {
        Column::ALL.len()
    }

    fn header(&self, column: Column) -> &'static str {
        column.header()
    }

    /// `None` for rows outside the list.
    fn cell(&self, row: usize, column: Column) -> Option<Cell>;

    fn flags(&self, row: usize, column: Column) -> CellFlags;

    /// Write a cell. Returns whether anything changed; read-only cells and
    /// mismatched values report `false`.
    fn set_cell(&mut self, row: usize, column: Column, value: Cell) -> ComposeResult<bool>;
}

/// Receives structure brackets and row updates
pub trait StructureObserver {
    fn structure_about_to_change(&self);

    fn structure_changed(&self);

    fn rows_changed(&self, _first: usize, _last: usize) {}
}

#[derive(Clone, Default)]
pub struct Notifier {
    observers: Vec<Rc<dyn StructureObserver>>,
}

impl Notifier {
    pub fn subscribe(&mut self, observer: Rc<dyn StructureObserver>) {
        self.observers.push(observer);
    }

    /// Open a structure bracket; it closes when the guard drops.
    pub fn bracket(&self) -> StructureBracket {
        for observer in &self.observers {
            observer.structure_about_to_change();
        }
        StructureBracket {
            observers: self.observers.clone(),
        }
    }

    pub fn rows_changed(&self, first: usize, last: usize) {
        for observer in &self.observers {
            observer.rows_changed(first, last);
        }
    }
}

/// Open structure bracket. Dropping it sends `structure_changed`, also on
/// early returns.
#[must_use = "the bracket closes as soon as the guard is dropped"]
pub struct StructureBracket {
    observers: Vec<Rc<dyn StructureObserver>>,
}

impl Drop for StructureBracket {
    fn drop(&mut self) {
        for observer in &self.observers {
            observer.structure_changed();
        }
    }
}

/// Rows are the layers of a composer's stack.
///
/// Active is always checked. Unchecking a removable layer removes it from the
/// stack and discards its documents from the store, so the layer does not
/// come back on the next reload.
pub struct LayerList<'a> {
    composer: &'a mut VersionComposer,
}

impl<'a> LayerList<'a> {
    pub fn new(composer: &'a mut VersionComposer) -> Self {
        Self { composer }
    }
}

impl ListProjection for LayerList<'_> {
    fn row_count(&self) -> usize {
        self.composer.layer_count()
    }

    fn cell(&self, row: usize, column: Column) -> Option<Cell> {
        let layer = self.composer.layer(row)?;
        Some(match column {
            Column::Active => Cell::Check(true),
            Column::Name => Cell::Text(layer.display_name().to_string()),
            Column::Version => Cell::Text(layer.version().unwrap_or_default().to_string()),
        })
    }

    fn flags(&self, row: usize, column: Column) -> CellFlags {
        if row >= self.row_count() {
            return CellFlags::default();
        }
        CellFlags {
            selectable: true,
            checkable: column == Column::Active,
            editable: column == Column::Active && self.composer.can_remove(row),
        }
    }

    fn set_cell(&mut self, row: usize, column: Column, value: Cell) -> ComposeResult<bool> {
        let len = self.row_count();
        if row >= len {
            return Err(ComposeError::range(row, len));
        }
        match (column, value) {
            (Column::Active, Cell::Check(false)) if self.composer.can_remove(row) => {
                self.composer.remove(row)
            }
            _ => Ok(false),
        }
    }
}

/// Rows are the installed mods; Active routes to the mod's enabled flag.
pub struct ModList<'a> {
    composer: &'a mut VersionComposer,
}

impl<'a> ModList<'a> {
    pub fn new(composer: &'a mut VersionComposer) -> Self {
        Self { composer }
    }
}

impl ListProjection for ModList<'_> {
    fn row_count(&self) -> usize {
        self.composer.mods().len()
    }

    fn cell(&self, row: usize, column: Column) -> Option<Cell> {
        let entry = self.composer.mods().get(row)?;
        Some(match column {
            Column::Active => Cell::Check(entry.enabled()),
            Column::Name => Cell::Text(entry.artifact().name.clone()),
            Column::Version => Cell::Text(entry.artifact().version.clone()),
        })
    }

    fn flags(&self, row: usize, column: Column) -> CellFlags {
        if row >= self.row_count() {
            return CellFlags::default();
        }
        let active = column == Column::Active;
        CellFlags {
            selectable: true,
            checkable: active,
            editable: active,
        }
    }

    fn set_cell(&mut self, row: usize, column: Column, value: Cell) -> ComposeResult<bool> {
        match (column, value) {
            (Column::Active, Cell::Check(enabled)) => self.composer.set_mod_enabled(row, enabled),
            _ => {
                let len = self.row_count();
                if row >= len {
                    return Err(ComposeError::range(row, len));
                }
                Ok(false)
            }
        }
    }
}
