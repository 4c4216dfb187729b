//! Anatomical label registry
//!
//! Maps numeric label IDs to structure names and display colours. The
//! registry is loaded once and passed by reference wherever names are
//! needed.

use crate::error::{Error, Result};
use crate::writer::sanitize_filename;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One labeled structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    /// Voxel value of the structure; never 0
    pub id: u32,
    /// Human-readable structure name
    pub name: String,
    /// Display colour as RGB
    #[serde(default = "default_color")]
    pub color: [u8; 3],
}

fn default_color() -> [u8; 3] {
    [200, 200, 200]
}

impl LabelInfo {
    /// Create a label entry
    pub fn new(id: u32, name: impl Into<String>, color: [u8; 3]) -> Self {
        Self {
            id,
            name: name.into(),
            color,
        }
    }

    /// File stem for exported meshes of this structure
    pub fn file_stem(&self) -> String {
        sanitize_filename(&self.name)
    }
}

/// Immutable set of label definitions
#[derive(Debug, Clone, Default)]
pub struct LabelRegistry {
    labels: Vec<LabelInfo>,
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl LabelRegistry {
    /// Build a registry, checking its invariants
    ///
    /// # Errors
    /// [`Error::Registry`] when an ID is 0 or repeated, or a name is empty.
    pub fn new(labels: Vec<LabelInfo>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(labels.len());
        let mut by_name = HashMap::with_capacity(labels.len());
        for (index, label) in labels.iter().enumerate() {
            if label.id == 0 {
                return Err(Error::Registry(format!(
                    "Label '{}' uses ID 0, which is reserved for background",
                    label.name
                )));
            }
            if label.name.trim().is_empty() {
                return Err(Error::Registry(format!("Label {} has an empty name", label.id)));
            }
            if by_id.insert(label.id, index).is_some() {
                return Err(Error::Registry(format!("Duplicate label ID {}", label.id)));
            }
            by_name
                .entry(label.name.trim().to_lowercase())
                .or_insert(index);
        }
        Ok(Self {
            labels,
            by_id,
            by_name,
        })
    }

    /// Parse a JSON array of `{"id", "name", "color"}` objects
    pub fn from_json(json: &str) -> Result<Self> {
        let labels: Vec<LabelInfo> = serde_json::from_str(json)?;
        Self::new(labels)
    }

    /// Load a JSON registry file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Look up a label by ID
    pub fn by_id(&self, id: u32) -> Option<&LabelInfo> {
        self.by_id.get(&id).map(|&i| &self.labels[i])
    }

    /// Look up a label by name, ignoring case and surrounding whitespace
    pub fn by_name(&self, name: &str) -> Option<&LabelInfo> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|&i| &self.labels[i])
    }

    /// Display name for an ID, falling back to `label_<id>`
    pub fn name_or_default(&self, id: u32) -> String {
        self.by_id(id)
            .map(|l| l.name.clone())
            .unwrap_or_else(|| format!("label_{}", id))
    }

    /// All labels in definition order
    pub fn labels(&self) -> &[LabelInfo] {
        &self.labels
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when no labels are defined
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate over labels in definition order
    pub fn iter(&self) -> impl Iterator<Item = &LabelInfo> {
        self.labels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"id": 1, "name": "liver", "color": [255, 0, 0]},
        {"id": 3, "name": "Left Kidney", "color": [0, 255, 0]},
        {"id": 12, "name": "aorta"}
    ]"#;

    #[test]
    fn test_parse_and_lookup() {
        let registry = LabelRegistry::from_json(SAMPLE).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.by_id(1).unwrap().name, "liver");
        assert_eq!(registry.by_name("left kidney").unwrap().id, 3);
        assert_eq!(registry.by_name(" LIVER ").unwrap().id, 1);
        assert_eq!(registry.by_id(12).unwrap().color, [200, 200, 200]);
        assert!(registry.by_id(2).is_none());
        assert_eq!(registry.by_id(3).unwrap().file_stem(), "Left_Kidney");
        assert_eq!(registry.name_or_default(99), "label_99");
    }

    #[test]
    fn test_background_id_rejected() {
        let err = LabelRegistry::new(vec![LabelInfo::new(0, "background", [0, 0, 0])]).unwrap_err();
        assert!(matches!(err, Error::Registry(_)));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let labels = vec![
            LabelInfo::new(5, "spleen", [1, 2, 3]),
            LabelInfo::new(5, "pancreas", [4, 5, 6]),
        ];
        assert!(matches!(LabelRegistry::new(labels), Err(Error::Registry(_))));
    }

    #[test]
    fn test_empty_name_rejected() {
        let labels = vec![LabelInfo::new(2, "  ", [0, 0, 0])];
        assert!(matches!(LabelRegistry::new(labels), Err(Error::Registry(_))));
    }

    #[test]
    fn test_invalid_json() {
        let err = LabelRegistry::from_json("{not json").unwrap_err();
        assert!(err.to_string().contains("[E1003]"));
    }
}
