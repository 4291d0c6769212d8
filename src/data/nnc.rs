//! Non-neighbour connections (NNCs).
//!
//! The set is append-only: connections declared by the input deck come first
//! and topology-discovered ones follow. Nothing here merges or sums repeated
//! pairs; consumers that need unique pairs must deduplicate themselves.

use serde::{Deserialize, Serialize};

/// A flow connection between two cartesian cells that do not share a
/// structured face.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NncEntry {
    pub cell1: usize,
    pub cell2: usize,
    pub trans: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NncSet {
    entries: Vec<NncEntry>,
}

impl NncSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cell1: usize, cell2: usize, trans: f64) {
        self.entries.push(NncEntry {
            cell1,
            cell2,
            trans,
        });
    }

    pub fn entries(&self) -> &[NncEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NncEntry> {
        self.entries.iter()
    }
}

impl FromIterator<(usize, usize, f64)> for NncSet {
    fn from_iter<I: IntoIterator<Item = (usize, usize, f64)>>(iter: I) -> Self {
        let mut set = NncSet::new();
        for (c1, c2, t) in iter {
            set.add(c1, c2, t);
        }
        set
    }
}
