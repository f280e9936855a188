//! Class-id to display-name lookup.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::detect::ClassId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassNames {
    names: BTreeMap<ClassId, String>,
}

impl ClassNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names in model order: index `i` names class `i`.
    pub fn from_list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .enumerate()
                .map(|(i, name)| (i as ClassId, name.into()))
                .collect(),
        }
    }

    /// Read one name per line. Blank lines and `#` comments do not consume
    /// a class index.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read class names {}", path.display()))?;
        Ok(Self::from_list(
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        ))
    }

    /// Display name for a class; unnamed classes render as `class <id>`.
    pub fn name(&self, class_id: ClassId) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("class {}", class_id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
