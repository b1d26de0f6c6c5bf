use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

const ADVISORIES_JSON: &str = include_str!("../assets/advisories.json");

#[derive(Error, Debug)]
pub enum AdvisoryError {
    #[error("Failed to parse advisory table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("No advisory for classes: {0:?}")]
    MissingClasses(Vec<&'static str>),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Advisory {
    pub causes: String,
    pub symptoms: String,
    pub treatment: Vec<String>,
    pub prevention: Vec<String>,
}

/// Care notes per catalog class, keyed by the raw class name.
#[derive(Debug)]
pub struct AdvisoryTable {
    entries: HashMap<String, Advisory>,
}

impl AdvisoryTable {
    /// Loads the bundled table and checks it covers every class the model can emit.
    pub fn load() -> Result<Self, AdvisoryError> {
        let entries: HashMap<String, Advisory> = serde_json::from_str(ADVISORIES_JSON)?;

        let missing: Vec<&'static str> = plant_diagnosis::CLASS_NAMES
            .iter()
            .copied()
            .filter(|key| !entries.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(AdvisoryError::MissingClasses(missing));
        }

        Ok(Self { entries })
    }

    pub fn get(&self, class_key: &str) -> Option<&Advisory> {
        self.entries.get(class_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_catalog() {
        let table = AdvisoryTable::load().unwrap();
        for key in plant_diagnosis::CLASS_NAMES {
            let advisory = table.get(key).unwrap();
            assert!(!advisory.causes.is_empty());
            assert!(!advisory.treatment.is_empty());
        }
    }

    #[test]
    fn test_lookup_uses_raw_key() {
        let table = AdvisoryTable::load().unwrap();
        assert!(table.get("Tomato_Late_blight").is_some());
        assert!(table.get("Tomato Late Blight").is_none());
    }
}
