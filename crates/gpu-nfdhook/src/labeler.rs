//! Single-pass label creation.

use error_stack::Report;
use tracing::info;
use tracing::warn;

use crate::aggregate::Aggregate;
use crate::config::LabelerConfig;
use crate::device::card_index;
use crate::device::Device;
use crate::encoder;
use crate::error::LabelerError;
use crate::health::DeviceHealth;
use crate::labels::LabelSet;
use crate::scanner;

/// Computes the GPU labels of this node in a single pass over sysfs.
pub struct Labeler<H> {
    config: LabelerConfig,
    health: H,
}

impl<H: DeviceHealth> Labeler<H> {
    pub fn new(config: LabelerConfig, health: H) -> Self {
        Self { config, health }
    }

    /// Scans the cards, reads their attributes and returns the label set.
    ///
    /// Problems with a single card only drop or degrade that card's
    /// contribution. Nothing is returned when the scan itself fails.
    ///
    /// # Errors
    ///
    /// Propagates the fatal [`LabelerError`]s of [`scanner::scan`].
    pub fn create_labels(&self) -> Result<LabelSet, Report<LabelerError>> {
        let gpu_names = scanner::scan(&self.config.sysfs_drm_dir, &self.health)?;

        let mut labels = LabelSet::new();
        let mut aggregate = Aggregate::new();

        for name in &gpu_names {
            // scan() only accepts card<N> names
            let Some(index) = card_index(name) else {
                warn!("Skipping {name}, can't parse card number");
                continue;
            };

            let device = Device::read(&self.config, name, index);
            aggregate.add(&device, &mut labels);
        }

        encoder::encode(&aggregate, &mut labels);

        info!(
            gpus = aggregate.device_count(),
            labels = labels.len(),
            "Created GPU labels"
        );

        Ok(labels)
    }
}
