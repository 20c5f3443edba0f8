//! Era partitioning: group key → row indices, in first-seen key order.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub key: String,
    /// Row positions in the source table, ascending.
    pub rows: Vec<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Split row positions by key. Partitions appear in the order their key is
/// first encountered; rows keep their original relative order.
pub fn partition<S: AsRef<str>>(keys: &[S]) -> Vec<Partition> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut parts: Vec<Partition> = Vec::new();

    for (row, key) in keys.iter().enumerate() {
        let key = key.as_ref();
        let slot = *slots.entry(key).or_insert_with(|| {
            parts.push(Partition {
                key: key.to_string(),
                rows: Vec::new(),
            });
            parts.len() - 1
        });
        parts[slot].rows.push(row);
    }

    parts
}
