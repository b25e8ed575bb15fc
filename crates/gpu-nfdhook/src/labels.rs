//! Label storage and value encoding.
//!
//! Node labels are limited to [`LABEL_MAX_LENGTH`] characters per value.
//! Values that do not fit are sharded over numbered continuation keys
//! (`name`, `name2`, `name3`, ...) instead of being truncated.

use std::collections::HashMap;
use std::io;
use std::io::Write;

use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;

/// Prefix shared by every label the hook emits.
pub const LABEL_NAMESPACE: &str = "gpu.intel.com/";

/// Upper bound for a single label value.
pub const LABEL_MAX_LENGTH: usize = 63;

/// Insertion-ordered label map.
///
/// Keys are given without the namespace and stored with it. Overwriting an
/// existing key keeps its original position, so the printed order only
/// depends on the order in which labels were first produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing any previous value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let key = format!("{LABEL_NAMESPACE}{name}");
        let value = value.into();
        match self.positions.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Returns the value stored under `name` (without namespace).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.positions
            .get(&format!("{LABEL_NAMESPACE}{name}"))
            .map(|&pos| self.entries[pos].1.as_str())
    }

    /// Adds `value_to_add` to the number stored under `name`.
    ///
    /// A missing or non-numeric previous value counts as zero, so the first
    /// call initializes the label.
    pub fn add_numeric(&mut self, name: &str, value_to_add: i64) {
        let current = self
            .get(name)
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(0);
        self.set(name, current.saturating_add(value_to_add).to_string());
    }

    /// Stores `value` under `name`, continuing over `name2`, `name3`, ...
    /// when it is longer than [`LABEL_MAX_LENGTH`].
    pub fn set_sharded(&mut self, name: &str, value: &str) {
        for (i, chunk) in split(value, LABEL_MAX_LENGTH).into_iter().enumerate() {
            if i == 0 {
                self.set(name, chunk);
            } else {
                self.set(&format!("{name}{}", i + 1), chunk);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(namespaced key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Writes one `key=value` line per label.
    pub fn write_lines<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for (key, value) in self.iter() {
            writeln!(writer, "{key}={value}")?;
        }
        writer.flush()
    }
}

impl Serialize for LabelSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Cuts `value` into chunks of at most `max_length` bytes.
///
/// Chunks are taken from the front until the remainder fits; the remainder
/// is always emitted, even when empty. Joining the chunks gives back
/// `value`. A cut never splits a UTF-8 character, so a character wider than
/// `max_length` ends up alone in an oversized chunk.
///
/// `split("foo_bar", 4)` returns `["foo_", "bar"]`.
pub fn split(value: &str, max_length: usize) -> Vec<&str> {
    let max_length = max_length.max(1);
    let mut chunks = Vec::new();
    let mut rest = value;

    while rest.len() > max_length {
        let mut cut = max_length;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }

        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }

    chunks.push(rest);
    chunks
}
