//! Block (single-cell observation) summary values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `(keyword, cell) = value` observation, the on-wire/on-disk form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub keyword: String,
    pub cell: usize,
    pub value: f64,
}

/// Block values keyed by `(keyword, global cell)`.
///
/// Serialized as a list of [`BlockEntry`] since tuple keys have no JSON form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<BlockEntry>", into = "Vec<BlockEntry>")]
pub struct BlockData(BTreeMap<(String, usize), f64>);

impl BlockData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, keyword: impl Into<String>, cell: usize, value: f64) {
        self.0.insert((keyword.into(), cell), value);
    }

    pub fn get(&self, keyword: &str, cell: usize) -> Option<f64> {
        self.0.get(&(keyword.to_owned(), cell)).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize, f64)> {
        self.0.iter().map(|((k, c), v)| (k.as_str(), *c, *v))
    }

    /// Union with another rank's observations; each cell lives on one rank.
    pub fn merge_from(&mut self, other: &BlockData) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), *value);
        }
    }
}

impl From<Vec<BlockEntry>> for BlockData {
    fn from(entries: Vec<BlockEntry>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|e| ((e.keyword, e.cell), e.value))
                .collect(),
        )
    }
}

impl From<BlockData> for Vec<BlockEntry> {
    fn from(data: BlockData) -> Self {
        data.0
            .into_iter()
            .map(|((keyword, cell), value)| BlockEntry {
                keyword,
                cell,
                value,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_form_is_entry_list() {
        let mut b = BlockData::new();
        b.insert("BPR", 12, 201.5);
        let json = serde_json::to_string(&b).unwrap();
        assert!(json.starts_with('['));
        let back: BlockData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("BPR", 12), Some(201.5));
    }
}
