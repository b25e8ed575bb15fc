//! Per-card attribute readers.
//!
//! Every reader is failure-isolated: a missing or malformed sysfs file is
//! logged and replaced by a fallback value, it never stops the other cards
//! from being labeled.

use std::fs;
use std::path::Path;

use tracing::debug;
use tracing::warn;

use crate::capability::Capabilities;
use crate::config::LabelerConfig;

/// Name prefix of the DRM card entries the hook labels.
pub const CARD_PREFIX: &str = "card";

/// Attributes of one accepted card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Sysfs entry name, e.g. `card0`.
    pub name: String,
    /// Number following the `card` prefix.
    pub index: u32,
    /// Number of tiles, at least 1.
    pub tiles: u64,
    /// Local memory in bytes, after reservation or from the override.
    pub memory: u64,
    /// NUMA node the card is attached to, `-1` when unknown.
    pub numa_node: i32,
    pub capabilities: Capabilities,
    /// PCI topology bucket, `None` when grouping is disabled or not possible.
    pub pci_group: Option<String>,
}

impl Device {
    /// Reads all attributes of the card `name` with the given index.
    pub fn read(config: &LabelerConfig, name: &str, index: u32) -> Self {
        let card_dir = config.sysfs_drm_dir.join(name);

        let tiles = tile_count(&card_dir);
        let memory = memory_amount(&card_dir, tiles, config);
        let numa_node = numa_node(&card_dir);
        let capabilities = Capabilities::read(&config.debugfs_dri_dir, index);
        let pci_group = pci_group_key(&card_dir, config.pci_grouping_level);

        debug!(
            card = name,
            tiles, memory, numa_node, ?pci_group, "Read card attributes"
        );

        Self {
            name: name.to_string(),
            index,
            tiles,
            memory,
            numa_node,
            capabilities,
            pci_group,
        }
    }
}

/// Returns the index of a `card<N>` entry name, `None` for any other name.
pub fn card_index(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(CARD_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Counts the `gt/gt*` tile folders of a card. Cards without them have one
/// tile.
pub fn tile_count(card_dir: &Path) -> u64 {
    let pattern = format!("{}/gt/gt*", card_dir.display());
    let count = match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).count(),
        Err(e) => {
            warn!("Invalid tile pattern {pattern}: {e}");
            0
        }
    };

    if count == 0 {
        1
    } else {
        count as u64
    }
}

/// Computes the usable local memory of a card.
///
/// `lmem_total_bytes` holds the per-tile amount. When it can't be read the
/// configured override is returned as is, without tile scaling.
pub fn memory_amount(card_dir: &Path, tiles: u64, config: &LabelerConfig) -> u64 {
    let file_path = card_dir.join("lmem_total_bytes");

    let content = match fs::read_to_string(&file_path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Can't read file {}: {e}", file_path.display());
            return config.memory_override;
        }
    };

    let Some(per_tile) = parse_unsigned(content.trim()) else {
        warn!("Can't convert lmem_total_bytes {:?}", content.trim());
        return config.memory_override;
    };

    per_tile
        .saturating_mul(tiles)
        .saturating_sub(config.memory_reserved)
}

/// Reads the NUMA node of a card, `-1` when unknown.
pub fn numa_node(card_dir: &Path) -> i32 {
    let file_path = card_dir.join("device/numa_node");

    let content = match fs::read_to_string(&file_path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Can't read file {}: {e}", file_path.display());
            return -1;
        }
    };

    match content.trim().parse::<i32>() {
        Ok(node) => node,
        Err(e) => {
            warn!("Can't convert numa_node {:?}: {e}", content.trim());
            -1
        }
    }
}

/// Resolves the card's sysfs link and returns the `levels` folders starting
/// at the first `pci*` folder, joined by `/`.
pub fn pci_group_key(card_dir: &Path, levels: u64) -> Option<String> {
    if levels == 0 {
        return None;
    }

    let target = match fs::canonicalize(card_dir) {
        Ok(target) => target,
        Err(e) => {
            debug!("Can't resolve {}: {e}", card_dir.display());
            return None;
        }
    };

    pci_path_parts(levels, &target.to_string_lossy())
}

/// Returns `levels` path folders of `full_path`, starting from the first
/// folder whose name begins with `pci`.
///
/// `None` when `full_path` has no separator, has no such folder, or fewer
/// than `levels` folders follow.
pub fn pci_path_parts(levels: u64, full_path: &str) -> Option<String> {
    let levels = usize::try_from(levels).ok().filter(|&l| l > 0)?;

    let parts: Vec<&str> = full_path.split('/').collect();
    if parts.len() == 1 {
        return None;
    }
    let start = parts.iter().position(|part| part.starts_with("pci"))?;
    let end = start.checked_add(levels)?;

    parts.get(start..end).map(|slice| slice.join("/"))
}

/// Parses an unsigned integer the way integer literals are written: decimal,
/// `0x` hexadecimal, `0o` or leading-`0` octal, `0b` binary. Underscores may
/// separate digits or follow a base prefix.
fn parse_unsigned(value: &str) -> Option<u64> {
    let prefix = value.get(..2).map(str::to_ascii_lowercase);
    let (radix, digits, prefixed) = match prefix.as_deref() {
        Some("0x") => (16, &value[2..], true),
        Some("0o") => (8, &value[2..], true),
        Some("0b") => (2, &value[2..], true),
        _ if value.len() > 1 && value.starts_with('0') => (8, &value[1..], true),
        _ => (10, value, false),
    };

    let underscores_ok = !digits.ends_with('_')
        && !digits.contains("__")
        && (prefixed || !digits.starts_with('_'));
    if !underscores_ok || digits.starts_with('+') {
        return None;
    }

    u64::from_str_radix(&digits.replace('_', ""), radix).ok()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use similar_asserts::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn card_index_accepts_only_card_numbers() {
        assert_eq!(card_index("card0"), Some(0));
        assert_eq!(card_index("card17"), Some(17));
        assert_eq!(card_index("card"), None);
        assert_eq!(card_index("card-1"), None);
        assert_eq!(card_index("card1-DP-1"), None);
        assert_eq!(card_index("renderD128"), None);
        assert_eq!(card_index("controlD64"), None);
        assert_eq!(card_index("card99999999999"), None);
    }

    #[test]
    fn tile_count_defaults_to_one() {
        let dir = TempDir::new().unwrap();
        assert_eq!(tile_count(dir.path()), 1);

        fs::create_dir_all(dir.path().join("gt/gt0")).unwrap();
        fs::create_dir_all(dir.path().join("gt/gt1")).unwrap();
        fs::create_dir_all(dir.path().join("gt/other")).unwrap();
        assert_eq!(tile_count(dir.path()), 2);
    }

    #[test]
    fn memory_amount_scales_by_tiles_and_subtracts_reserved() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "lmem_total_bytes", "1000\n");

        let config = LabelerConfig {
            memory_reserved: 300,
            ..LabelerConfig::default()
        };
        assert_eq!(memory_amount(dir.path(), 2, &config), 1700);

        let config = LabelerConfig {
            memory_reserved: 5000,
            ..LabelerConfig::default()
        };
        assert_eq!(memory_amount(dir.path(), 2, &config), 0);
    }

    #[test]
    fn memory_amount_accepts_prefixed_numbers() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "lmem_total_bytes", "0x400");
        assert_eq!(memory_amount(dir.path(), 1, &LabelerConfig::default()), 1024);
    }

    #[test]
    fn parse_unsigned_accepts_literal_notation() {
        assert_eq!(parse_unsigned("4096"), Some(4096));
        assert_eq!(parse_unsigned("0"), Some(0));
        assert_eq!(parse_unsigned("0x1F"), Some(31));
        assert_eq!(parse_unsigned("0X1f"), Some(31));
        assert_eq!(parse_unsigned("0o17"), Some(15));
        assert_eq!(parse_unsigned("017"), Some(15));
        assert_eq!(parse_unsigned("0b101"), Some(5));
        assert_eq!(parse_unsigned("1_000_000"), Some(1_000_000));
        assert_eq!(parse_unsigned("0x_ff"), Some(255));
        assert_eq!(parse_unsigned("0_17"), Some(15));
    }

    #[test]
    fn parse_unsigned_rejects_malformed_values() {
        for value in ["", "_1", "1_", "1__0", "0x", "0x_", "08", "0b2", "+5", "-1", "lots"] {
            assert_eq!(parse_unsigned(value), None, "{value:?}");
        }
    }

    #[test]
    fn memory_amount_falls_back_to_override_without_tile_scaling() {
        let dir = TempDir::new().unwrap();
        let config = LabelerConfig {
            memory_override: 4096,
            memory_reserved: 100,
            ..LabelerConfig::default()
        };
        assert_eq!(memory_amount(dir.path(), 4, &config), 4096);

        write(dir.path(), "lmem_total_bytes", "lots");
        assert_eq!(memory_amount(dir.path(), 4, &config), 4096);
    }

    #[test]
    fn numa_node_reads_or_returns_unknown() {
        let dir = TempDir::new().unwrap();
        assert_eq!(numa_node(dir.path()), -1);

        write(dir.path(), "device/numa_node", "1\n");
        assert_eq!(numa_node(dir.path()), 1);

        write(dir.path(), "device/numa_node", "-1\n");
        assert_eq!(numa_node(dir.path()), -1);

        write(dir.path(), "device/numa_node", "north");
        assert_eq!(numa_node(dir.path()), -1);
    }

    #[test]
    fn pci_path_parts_slices_from_pci_folder() {
        let path = "/sys/devices/pci0000:00/0000:00:01.0/0000:01:00.0/drm/card0";

        assert_eq!(pci_path_parts(1, path), Some("pci0000:00".to_string()));
        assert_eq!(
            pci_path_parts(3, path),
            Some("pci0000:00/0000:00:01.0/0000:01:00.0".to_string())
        );
        assert_eq!(
            pci_path_parts(5, path),
            Some("pci0000:00/0000:00:01.0/0000:01:00.0/drm/card0".to_string())
        );
        assert_eq!(pci_path_parts(6, path), None);
        assert_eq!(pci_path_parts(0, path), None);
        assert_eq!(pci_path_parts(2, "/sys/devices/platform/card0"), None);
        assert_eq!(pci_path_parts(1, "pci0000:00"), None);
    }

    #[test]
    fn pci_group_key_resolves_links() {
        let dir = TempDir::new().unwrap();
        let target = dir
            .path()
            .join("devices/pci0000:00/0000:00:02.0/drm/card0");
        fs::create_dir_all(&target).unwrap();
        fs::create_dir_all(dir.path().join("class/drm")).unwrap();
        let link = dir.path().join("class/drm/card0");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(
            pci_group_key(&link, 2),
            Some("pci0000:00/0000:00:02.0".to_string())
        );
        assert_eq!(pci_group_key(&link, 0), None);
        assert_eq!(pci_group_key(&dir.path().join("class/drm/card1"), 2), None);
    }
}
