//! Error types for the labeling pipeline.

use core::error::Error;

use derive_more::Display;

/// Conditions that abort the whole run.
///
/// Everything else the labeler runs into is per-device and is resolved by a
/// fallback value where it happens.
#[derive(Debug, Display)]
pub enum LabelerError {
    #[display("Can't read sysfs folder {path}")]
    ReadDeviceRoot { path: String },

    #[display("Can't read device folder of {device}")]
    ReadDrmDir { device: String },
}

impl Error for LabelerError {}
