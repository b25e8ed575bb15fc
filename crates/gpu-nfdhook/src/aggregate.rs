//! Per-card labels and running totals over the accepted cards.

use std::collections::BTreeMap;

use crate::device::Device;
use crate::labels::LabelSet;

pub const MEMORY_LABEL: &str = "memory.max";
pub const PLATFORM_GEN_LABEL: &str = "platform_gen";
pub const GRAPHICS_VERSION_LABEL: &str = "graphics_version";
pub const MEDIA_VERSION_LABEL: &str = "media_version";

/// Running totals and groupings over the accepted cards.
///
/// Groupings are kept in ordered maps so that encoding walks NUMA nodes in
/// ascending order and PCI groups in lexicographic order, independent of
/// the order cards were discovered in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub(crate) names: Vec<String>,
    pub(crate) indices: Vec<u32>,
    pub(crate) tiles: u64,
    pub(crate) numa_mapping: BTreeMap<i32, Vec<u32>>,
    pub(crate) pci_groups: BTreeMap<String, Vec<u32>>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one card in. Per-card labels (capabilities, platform counters,
    /// memory) go straight into `labels`; the rest is kept for encoding.
    pub fn add(&mut self, device: &Device, labels: &mut LabelSet) {
        self.names.push(device.name.clone());
        self.indices.push(device.index);
        self.tiles = self.tiles.saturating_add(device.tiles);

        if device.numa_node >= 0 {
            self.numa_mapping
                .entry(device.numa_node)
                .or_default()
                .push(device.index);
        }

        if let Some(group) = &device.pci_group {
            self.pci_groups
                .entry(group.clone())
                .or_default()
                .push(device.index);
        }

        add_capability_labels(device, labels);

        labels.add_numeric(MEMORY_LABEL, saturating_i64(device.memory));
    }

    /// Number of cards folded in so far.
    pub fn device_count(&self) -> usize {
        self.indices.len()
    }

    pub fn tiles(&self) -> u64 {
        self.tiles
    }
}

fn add_capability_labels(device: &Device, labels: &mut LabelSet) {
    let caps = &device.capabilities;

    if let Some(platform) = &caps.platform {
        labels.add_numeric(&format!("platform_{platform}.count"), 1);
        labels.add_numeric(
            &format!("platform_{platform}.tiles"),
            saturating_i64(device.tiles),
        );
        labels.set(&format!("platform_{platform}.present"), "true");
    }
    if let Some(media) = caps.media_version_label() {
        labels.set(MEDIA_VERSION_LABEL, media);
    }
    if let Some(graphics) = caps.graphics_version_label() {
        labels.set(GRAPHICS_VERSION_LABEL, graphics);
    }
    if let Some(gen) = caps.platform_gen() {
        labels.set(PLATFORM_GEN_LABEL, gen);
    }
}

pub(crate) fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
