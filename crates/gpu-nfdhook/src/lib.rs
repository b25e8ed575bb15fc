//! GPU label discovery for node-feature-discovery.
//!
//! The hook walks the DRM class directory in sysfs, keeps the usable Intel
//! cards and turns their attributes into `gpu.intel.com/*` node labels whose
//! values never exceed 63 characters.

pub mod aggregate;
pub mod capability;
pub mod config;
pub mod device;
pub mod encoder;
pub mod error;
pub mod health;
pub mod labeler;
pub mod labels;
pub mod scanner;

pub use config::Cli;
pub use config::LabelerConfig;
pub use config::OutputFormat;
pub use error::LabelerError;
pub use health::DeviceHealth;
pub use health::SysfsDeviceHealth;
pub use labeler::Labeler;
pub use labels::LabelSet;
