//! Rendition ladder: the quality catalog and preset selection.

mod catalog;
mod select;

pub use catalog::{default_presets, quality_label, QualityCatalog, RenditionPreset};
pub use select::{select_presets, Selection};
