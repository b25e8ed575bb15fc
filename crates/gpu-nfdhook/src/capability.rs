//! Parsing of the i915 debugfs capability file.

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;

use tracing::debug;
use tracing::warn;

/// Name of the per-card capability file under the DRI debugfs folder.
pub const CAPABILITY_FILE: &str = "i915_capabilities";

/// Lines of the capability file the hook cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CapabilityField {
    Platform,
    MediaVersion,
    GraphicsVersion,
    Gen,
}

impl CapabilityField {
    const ALL: [Self; 4] = [
        Self::Platform,
        Self::MediaVersion,
        Self::GraphicsVersion,
        Self::Gen,
    ];

    const fn prefix(self) -> &'static str {
        match self {
            Self::Platform => "platform:",
            // display version exists too, it isn't relevant for labels
            Self::MediaVersion => "media version:",
            Self::GraphicsVersion => "graphics version:",
            Self::Gen => "gen:",
        }
    }
}

/// Values found in a card's capability file.
///
/// Kernels up to 5.14 only report `gen`, newer ones report separate
/// graphics and media versions and may drop `gen`. The label accessors
/// reconcile both layouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub platform: Option<String>,
    pub gen: Option<String>,
    pub graphics_version: Option<String>,
    pub media_version: Option<String>,
}

impl Capabilities {
    /// Reads `<debugfs_dri_dir>/<index>/i915_capabilities`.
    ///
    /// The file is optional: debugfs may be unmounted or the driver may not
    /// provide it, so a missing file yields empty capabilities.
    pub fn read(debugfs_dri_dir: &Path, index: u32) -> Self {
        let path = debugfs_dri_dir
            .join(index.to_string())
            .join(CAPABILITY_FILE);

        match File::open(&path) {
            Ok(file) => Self::parse(BufReader::new(file), &path.display().to_string()),
            Err(e) => {
                debug!("Couldn't open file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Scans `reader` line by line until every recognized field was seen
    /// once or the input ends. `source` names the input in log messages.
    ///
    /// Lines are decoded lossily, so a line that isn't UTF-8 can't hide the
    /// fields that follow it.
    pub fn parse<R: BufRead>(reader: R, source: &str) -> Self {
        let mut capabilities = Self::default();
        let mut pending = CapabilityField::ALL.to_vec();

        for raw in reader.split(b'\n') {
            let raw = match raw {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Failed to read '{source}': {e}");
                    break;
                }
            };
            let decoded = String::from_utf8_lossy(&raw);
            let line = decoded.strip_suffix('\r').unwrap_or(&decoded);

            let Some(pos) = pending
                .iter()
                .position(|field| line.starts_with(field.prefix()))
            else {
                continue;
            };
            let field = pending.swap_remove(pos);

            match line.split_once(": ") {
                Some((_, value)) => capabilities.set(field, value),
                None => warn!("invalid '{source}' line format: '{line}'"),
            }

            if pending.is_empty() {
                break;
            }
        }

        capabilities
    }

    fn set(&mut self, field: CapabilityField, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }

        let slot = match field {
            CapabilityField::Platform => &mut self.platform,
            CapabilityField::MediaVersion => &mut self.media_version,
            CapabilityField::GraphicsVersion => &mut self.graphics_version,
            CapabilityField::Gen => &mut self.gen,
        };
        *slot = Some(value.to_string());
    }

    /// Major generation for the `platform_gen` label.
    ///
    /// Taken from `gen`, or derived from the graphics version (preferred)
    /// or the media version, and cut before the first `.`.
    pub fn platform_gen(&self) -> Option<&str> {
        self.gen
            .as_deref()
            .or(self.graphics_version.as_deref())
            .or(self.media_version.as_deref())
            .map(|gen| gen.split('.').next().unwrap_or(gen))
    }

    /// Value for the `graphics_version` label.
    pub fn graphics_version_label(&self) -> Option<&str> {
        self.graphics_version
            .as_deref()
            .or_else(|| self.legacy_gen())
    }

    /// Value for the `media_version` label.
    pub fn media_version_label(&self) -> Option<&str> {
        self.media_version.as_deref().or_else(|| self.legacy_gen())
    }

    /// `gen` of a capability file that has no version lines at all.
    fn legacy_gen(&self) -> Option<&str> {
        if self.graphics_version.is_none() && self.media_version.is_none() {
            self.gen.as_deref()
        } else {
            None
        }
    }
}
