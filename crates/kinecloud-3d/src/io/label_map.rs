use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};

/// Error types for the label map module.
#[derive(Debug, thiserror::Error)]
pub enum LabelMapError {
    /// Failed to open or create the file.
    #[error("failed to access label map file")]
    Io(#[from] std::io::Error),

    /// Failed to parse or write JSON.
    #[error("invalid label map json")]
    Json(#[from] serde_json::Error),

    /// Two parts share a name.
    #[error("duplicate part name {0:?}")]
    DuplicateName(String),

    /// Ids do not cover `0..K-1` exactly once.
    #[error("label ids must be contiguous from 0, missing id {missing}")]
    NonContiguous {
        /// The first id absent from the map.
        missing: u32,
    },
}

/// Bijection between contiguous label ids `0..K-1` and part names.
///
/// Serialized as a JSON object `{ name: id }` in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "HashMap<String, u32>")]
pub struct LabelMap {
    // names indexed by label id
    names: Vec<String>,
}

impl LabelMap {
    /// Assign ids to names in iteration order.
    pub fn from_names<I, S>(names: I) -> Result<Self, LabelMapError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect::<Vec<String>>();
        let mut seen = HashSet::new();
        if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(LabelMapError::DuplicateName(dup.clone()));
        }
        Ok(Self { names })
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the map has no labels.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Id of a part name.
    pub fn id(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n == name).map(|i| i as u32)
    }

    /// Name of a label id.
    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// Iterate `(id, name)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (i as u32, n.as_str()))
    }

    /// Write the map as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LabelMapError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read a map written by [`LabelMap::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelMapError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl Serialize for LabelMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.names.len()))?;
        for (id, name) in self.iter() {
            map.serialize_entry(name, &id)?;
        }
        map.end()
    }
}

impl TryFrom<HashMap<String, u32>> for LabelMap {
    type Error = LabelMapError;

    fn try_from(entries: HashMap<String, u32>) -> Result<Self, Self::Error> {
        let mut slots: Vec<Option<String>> = vec![None; entries.len()];
        // an out of range or repeated id always leaves some slot below K empty
        for (name, id) in entries {
            if let Some(slot) = slots.get_mut(id as usize) {
                if slot.is_none() {
                    *slot = Some(name);
                }
            }
        }
        let names = slots
            .into_iter()
            .enumerate()
            .map(|(id, name)| name.ok_or(LabelMapError::NonContiguous { missing: id as u32 }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { names })
    }
}
