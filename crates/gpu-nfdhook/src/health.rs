//! Device role and health checks consulted by the scanner.

use std::fs;
use std::path::Path;

use tracing::warn;

/// Answers questions about a DRM card entry the scanner cannot decide from
/// the vendor file alone.
pub trait DeviceHealth {
    /// Whether the card is an SR-IOV physical function with virtual
    /// functions enabled. Such cards are handed out through their VFs.
    fn is_pf_with_vfs(&self, card: &Path) -> bool;

    /// Number of fatal errors reported by the card and the name of the
    /// counter that reported them. `(0, "")` means healthy.
    fn fatal_errors(&self, card: &Path) -> (u64, String);
}

/// [`DeviceHealth`] backed by the card's sysfs attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysfsDeviceHealth;

impl DeviceHealth for SysfsDeviceHealth {
    fn is_pf_with_vfs(&self, card: &Path) -> bool {
        match fs::read_to_string(card.join("device/sriov_numvfs")) {
            Ok(numvfs) => {
                let numvfs = numvfs.trim();
                !numvfs.is_empty() && numvfs != "0"
            }
            Err(_) => false,
        }
    }

    fn fatal_errors(&self, card: &Path) -> (u64, String) {
        let pattern = format!(
            "{}/device/tile*/gt*/error_counter/*fatal*",
            card.display()
        );
        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Invalid error counter pattern {pattern}: {e}");
                return (0, String::new());
            }
        };

        let mut counters: Vec<_> = paths.filter_map(Result::ok).collect();
        counters.sort();

        for counter in counters {
            let Ok(content) = fs::read_to_string(&counter) else {
                continue;
            };
            let count = content.trim().parse::<u64>().unwrap_or(0);
            if count > 0 {
                let name = counter
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                return (count, name);
            }
        }

        (0, String::new())
    }
}
