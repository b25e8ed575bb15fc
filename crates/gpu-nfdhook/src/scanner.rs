//! Discovery of the DRM cards that get labeled.

use std::fs;
use std::path::Path;

use error_stack::Report;
use error_stack::ResultExt;
use tracing::trace;
use tracing::warn;

use crate::device::card_index;
use crate::error::LabelerError;
use crate::health::DeviceHealth;

/// PCI vendor id of the cards the hook labels.
pub const VENDOR_ID: &str = "0x8086";

/// Lists the cards under `sysfs_drm_dir` that pass every filter, in
/// directory order.
///
/// A card is skipped when its name isn't `card<N>`, its vendor file can't be
/// read or names another vendor, it is a PF with VFs enabled, or it reports
/// fatal errors.
///
/// # Errors
///
/// - [`LabelerError::ReadDeviceRoot`] if `sysfs_drm_dir` can't be listed
/// - [`LabelerError::ReadDrmDir`] if an otherwise accepted card has no
///   readable `device/drm` folder, which points at a broken sysfs rather
///   than at a single bad card
pub fn scan(
    sysfs_drm_dir: &Path,
    health: &impl DeviceHealth,
) -> Result<Vec<String>, Report<LabelerError>> {
    let entries = fs::read_dir(sysfs_drm_dir).change_context(LabelerError::ReadDeviceRoot {
        path: sysfs_drm_dir.display().to_string(),
    })?;

    let mut gpu_names = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {e}", sysfs_drm_dir.display());
                continue;
            }
        };

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().filter(|name| card_index(name).is_some()) else {
            trace!("Not compatible device {file_name:?}");
            continue;
        };

        let sys_path = sysfs_drm_dir.join(name);

        let vendor = match fs::read_to_string(sys_path.join("device/vendor")) {
            Ok(vendor) => vendor,
            Err(e) => {
                warn!("Skipping {name}. Can't read vendor file: {e}");
                continue;
            }
        };
        if vendor.trim() != VENDOR_ID {
            trace!("Non-Intel GPU {name}");
            continue;
        }

        if health.is_pf_with_vfs(&sys_path) {
            trace!("Skipping PF with VF {name}");
            continue;
        }

        let drm_dir = sys_path.join("device/drm");
        fs::read_dir(&drm_dir)
            .change_context(LabelerError::ReadDrmDir {
                device: name.to_string(),
            })
            .attach_printable_lazy(|| format!("path: {}", drm_dir.display()))?;

        let (errors, error_name) = health.fatal_errors(&sys_path);
        if errors != 0 {
            trace!("Skipping device {name} with {errors} '{error_name}' errors");
            continue;
        }

        gpu_names.push(name.to_string());
    }

    Ok(gpu_names)
}
