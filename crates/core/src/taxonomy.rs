//! Project class taxonomy.
//!
//! The taxonomy is a fixed, ordered list of class names with display colors.
//! A class *name* is the persisted identity of a label; a class *id* is only
//! the position of that name in the current taxonomy and is recomputed on
//! every read.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Name returned by [`ClassTaxonomy::name_of`] for an out-of-range id.
pub const UNKNOWN_CLASS_NAME: &str = "unknown";

/// Color returned by [`ClassTaxonomy::color_of`] for an out-of-range id.
pub const FALLBACK_COLOR: &str = "#FF0000";

/// Built-in project classes, in index order.
const DEFAULT_CLASSES: &[(&str, &str)] = &[
    ("person", "#FF0000"),
    ("car", "#0000FF"),
    ("falldown", "#FFFF00"),
    ("bus", "#00FF00"),
    ("truck", "#800080"),
    ("bicycle", "#FFA500"),
    ("motorcycle", "#00FFFF"),
    ("boar", "#8B4513"),
    ("tractor", "#CCCCCC"),
    ("scooter", "#FFC0CB"),
    ("cat", "#32CD32"),
    ("dog", "#FFD700"),
];

/// One class in the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub color: String,
}

/// API view of a class with its current index.
#[derive(Debug, Clone, Serialize)]
pub struct ClassEntry {
    pub class_id: usize,
    pub class_name: String,
    pub color: String,
    pub auto_detectable: bool,
}

/// Immutable, ordered list of recognized classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTaxonomy {
    classes: Vec<ClassDef>,
}

impl Default for ClassTaxonomy {
    fn default() -> Self {
        Self {
            classes: DEFAULT_CLASSES
                .iter()
                .map(|(name, color)| ClassDef {
                    name: (*name).to_string(),
                    color: (*color).to_string(),
                })
                .collect(),
        }
    }
}

impl ClassTaxonomy {
    /// Build a taxonomy from explicit class definitions.
    ///
    /// Names must be non-empty, unique ignoring case, and free of whitespace
    /// (the label codec splits on whitespace). Colors must be `#RRGGBB`.
    pub fn new(classes: Vec<ClassDef>) -> Result<Self, CoreError> {
        if classes.is_empty() {
            return Err(CoreError::Validation(
                "taxonomy must contain at least one class".into(),
            ));
        }

        let mut seen = HashSet::new();
        for class in &classes {
            validate_class_name(&class.name)?;
            validate_color_hex(&class.color)?;
            if !seen.insert(class.name.to_lowercase()) {
                return Err(CoreError::Validation(format!(
                    "duplicate class name '{}' in taxonomy",
                    class.name
                )));
            }
        }

        Ok(Self { classes })
    }

    /// Load a taxonomy from a JSON file of `[{"name": ..., "color": ...}]`.
    pub fn from_json_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        let classes: Vec<ClassDef> = serde_json::from_str(&raw).map_err(|e| {
            CoreError::Validation(format!("invalid taxonomy file {}: {e}", path.display()))
        })?;
        Self::new(classes)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class name at `id`, or [`UNKNOWN_CLASS_NAME`] when out of range.
    pub fn name_of(&self, id: usize) -> &str {
        self.classes
            .get(id)
            .map(|c| c.name.as_str())
            .unwrap_or(UNKNOWN_CLASS_NAME)
    }

    /// Index of the class with exactly this name.
    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|c| c.name == name)
    }

    /// Display color for `id`, or [`FALLBACK_COLOR`] when out of range.
    pub fn color_of(&self, id: usize) -> &str {
        self.classes
            .get(id)
            .map(|c| c.color.as_str())
            .unwrap_or(FALLBACK_COLOR)
    }

    /// Class names in index order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|c| c.name.as_str())
    }

    pub fn entries(&self) -> Vec<ClassEntry> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| ClassEntry {
                class_id: i,
                class_name: c.name.clone(),
                color: c.color.clone(),
                auto_detectable: true,
            })
            .collect()
    }

    /// Manifest body listing class names one per line, in index order.
    pub fn manifest(&self) -> String {
        self.names().collect::<Vec<_>>().join("\n")
    }
}

fn validate_class_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation("class name must not be empty".into()));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(format!(
            "class name '{name}' must not contain whitespace"
        )));
    }
    Ok(())
}

/// Validate that a color string is in `#RRGGBB` hex format.
pub fn validate_color_hex(color: &str) -> Result<(), CoreError> {
    let Some(hex_part) = color.strip_prefix('#') else {
        return Err(CoreError::Validation(format!(
            "Invalid color '{color}'. Must start with '#'"
        )));
    };
    if hex_part.len() != 6 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::Validation(format!(
            "Invalid color '{color}'. Must be in #RRGGBB hex format"
        )));
    }
    Ok(())
}
