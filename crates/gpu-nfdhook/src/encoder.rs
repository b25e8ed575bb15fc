//! Turns the aggregate over all cards into node labels.

use std::collections::BTreeMap;

use crate::aggregate::saturating_i64;
use crate::aggregate::Aggregate;
use crate::labels::LabelSet;

pub const GPU_LIST_LABEL: &str = "cards";
pub const GPU_NUM_LIST_LABEL: &str = "gpu-numbers";
pub const MILLICORE_LABEL: &str = "millicores";
pub const PCI_GROUP_LABEL: &str = "pci-groups";
pub const TILES_LABEL: &str = "tiles";
pub const NUMA_MAPPING_LABEL: &str = "numa-gpu-map";

/// Every card counts as this many millicores.
pub const MILLICORES_PER_GPU: i64 = 1000;

/// Adds the node-wide labels. Only `tiles` is added when no card was
/// accepted.
pub fn encode(aggregate: &Aggregate, labels: &mut LabelSet) {
    labels.add_numeric(TILES_LABEL, saturating_i64(aggregate.tiles()));

    let gpu_count = aggregate.device_count();
    if gpu_count == 0 {
        return;
    }

    // "card0.card1.card2", kept for older consumers
    labels.set_sharded(GPU_LIST_LABEL, &aggregate.names.join("."));

    // "0.1.2", short form of the card list
    labels.set_sharded(GPU_NUM_LIST_LABEL, &join_indices(&aggregate.indices));

    if !aggregate.numa_mapping.is_empty() {
        labels.set_sharded(
            NUMA_MAPPING_LABEL,
            &numa_mapping_value(&aggregate.numa_mapping),
        );
    }

    labels.add_numeric(
        MILLICORE_LABEL,
        MILLICORES_PER_GPU.saturating_mul(gpu_count as i64),
    );

    if !aggregate.pci_groups.is_empty() {
        labels.set_sharded(PCI_GROUP_LABEL, &pci_groups_value(&aggregate.pci_groups));
    }
}

/// `"0-0.1.2.3_1-4.5.6.7"`: node id and its cards, nodes in ascending order.
pub fn numa_mapping_value(mapping: &BTreeMap<i32, Vec<u32>>) -> String {
    mapping
        .iter()
        .map(|(node, gpus)| format!("{node}-{}", join_indices(gpus)))
        .collect::<Vec<_>>()
        .join("_")
}

/// `"0.1.2.3_4.5.6.7"`: cards of each group, groups ordered by PCI path.
pub fn pci_groups_value(groups: &BTreeMap<String, Vec<u32>>) -> String {
    groups
        .values()
        .map(|gpus| join_indices(gpus))
        .collect::<Vec<_>>()
        .join("_")
}

fn join_indices(indices: &[u32]) -> String {
    indices
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::labels::LABEL_MAX_LENGTH;

    fn aggregate_of(indices: &[u32]) -> Aggregate {
        Aggregate {
            names: indices.iter().map(|i| format!("card{i}")).collect(),
            indices: indices.to_vec(),
            tiles: indices.len() as u64,
            ..Aggregate::default()
        }
    }

    #[test]
    fn no_cards_only_tiles() {
        let mut labels = LabelSet::new();
        encode(&Aggregate::default(), &mut labels);

        let entries: Vec<_> = labels.iter().collect();
        assert_eq!(entries, vec![("gpu.intel.com/tiles", "0")]);
    }

    #[test]
    fn single_card_defaults() {
        let mut labels = LabelSet::new();
        encode(&aggregate_of(&[0]), &mut labels);

        let entries: Vec<_> = labels.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("gpu.intel.com/tiles", "1"),
                ("gpu.intel.com/cards", "card0"),
                ("gpu.intel.com/gpu-numbers", "0"),
                ("gpu.intel.com/millicores", "1000"),
            ]
        );
    }

    #[test]
    fn numa_mapping_is_sorted_by_node() {
        // inserted in descending order on purpose
        let mut mapping = BTreeMap::new();
        mapping.insert(1, vec![1]);
        mapping.insert(0, vec![0]);
        assert_eq!(numa_mapping_value(&mapping).as_str(), "0-0_1-1");

        let mapping = BTreeMap::from([(0, vec![0, 1, 2, 3]), (1, vec![4, 5, 6, 7])]);
        assert_eq!(numa_mapping_value(&mapping).as_str(), "0-0.1.2.3_1-4.5.6.7");
    }

    #[test]
    fn pci_groups_are_sorted_by_path() {
        let groups = BTreeMap::from([
            ("pci0000:80".to_string(), vec![4, 5]),
            ("pci0000:00".to_string(), vec![1, 0]),
        ]);
        assert_eq!(pci_groups_value(&groups).as_str(), "1.0_4.5");
    }

    fn collect_shards(labels: &LabelSet, name: &str) -> Vec<String> {
        let mut parts: Vec<String> = labels.get(name).map(str::to_string).into_iter().collect();
        for i in 2.. {
            match labels.get(&format!("{name}{i}")) {
                Some(part) => parts.push(part.to_string()),
                None => break,
            }
        }
        parts
    }

    #[test]
    fn long_lists_are_sharded() {
        let indices: Vec<u32> = (0..60).collect();
        let mut aggregate = aggregate_of(&indices);
        aggregate.numa_mapping = BTreeMap::from([(0, indices.clone())]);
        aggregate.pci_groups = BTreeMap::from([("pci0000:00".to_string(), indices.clone())]);

        let mut labels = LabelSet::new();
        encode(&aggregate, &mut labels);

        let joined = join_indices(&indices);
        assert!(joined.len() > LABEL_MAX_LENGTH * 2);

        let expected = [
            (GPU_NUM_LIST_LABEL, joined.clone()),
            (PCI_GROUP_LABEL, joined.clone()),
            (NUMA_MAPPING_LABEL, format!("0-{joined}")),
            (GPU_LIST_LABEL, aggregate.names.join(".")),
        ];
        for (name, value) in expected {
            let parts = collect_shards(&labels, name);
            assert!(parts.len() >= 3, "{name} should be split");
            assert!(parts.iter().all(|p| p.len() <= LABEL_MAX_LENGTH));
            assert_eq!(parts.concat(), value);
        }
    }

    #[test]
    fn millicores_scale_with_cards() {
        let mut labels = LabelSet::new();
        encode(&aggregate_of(&[0, 1, 2]), &mut labels);
        assert_eq!(labels.get(MILLICORE_LABEL), Some("3000"));
        assert_eq!(labels.get(TILES_LABEL), Some("3"));
    }
}
