use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;
use utils::version;

/// Default location of the DRM class directory.
pub const DEFAULT_SYSFS_DRM_DIR: &str = "/sys/class/drm";
/// Default location of the DRI debugfs directory.
pub const DEFAULT_DEBUGFS_DRI_DIR: &str = "/sys/kernel/debug/dri";

/// Node feature discovery hook that prints GPU labels for this node.
#[derive(Parser, Debug, Clone)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[arg(
        long,
        env = "SYSFS_DRM_DIR",
        default_value = DEFAULT_SYSFS_DRM_DIR,
        value_hint = clap::ValueHint::DirPath,
        help = "Sysfs DRM class directory to scan for cards"
    )]
    pub sysfs_drm_dir: PathBuf,

    #[arg(
        long,
        env = "DEBUGFS_DRI_DIR",
        default_value = DEFAULT_DEBUGFS_DRI_DIR,
        value_hint = clap::ValueHint::DirPath,
        help = "Debugfs DRI directory holding the i915_capabilities files"
    )]
    pub debugfs_dri_dir: PathBuf,

    #[arg(
        long,
        env = "GPU_MEMORY_OVERRIDE",
        default_value = "0",
        value_parser = parse_lenient_u64,
        help = "Memory amount in bytes to report for a GPU whose local memory can't be read"
    )]
    pub memory_override: u64,

    #[arg(
        long,
        env = "GPU_MEMORY_RESERVED",
        default_value = "0",
        value_parser = parse_lenient_u64,
        help = "Memory amount in bytes to subtract from each GPU's local memory"
    )]
    pub memory_reserved: u64,

    #[arg(
        long,
        env = "GPU_PCI_GROUPING_LEVEL",
        default_value = "0",
        value_parser = parse_lenient_u64,
        help = "Number of PCI path folders used to group GPUs, 0 disables the pci-groups label"
    )]
    pub pci_grouping_level: u64,

    #[arg(
        long,
        env = "NFD_HOOK_OUTPUT_FORMAT",
        value_enum,
        default_value_t = OutputFormat::Lines,
        help = "Output format for the labels"
    )]
    pub output_format: OutputFormat,
}

/// How the label set is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One `key=value` pair per line, as node-feature-discovery hooks expect
    Lines,
    /// A single JSON object
    Json,
}

/// Settings the labeler reads once at start up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelerConfig {
    pub sysfs_drm_dir: PathBuf,
    pub debugfs_dri_dir: PathBuf,
    /// Reported memory when `lmem_total_bytes` can't be read.
    pub memory_override: u64,
    /// Subtracted from the computed memory of every card.
    pub memory_reserved: u64,
    /// Depth of the PCI path slice used as group key, `0` disables grouping.
    pub pci_grouping_level: u64,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            sysfs_drm_dir: PathBuf::from(DEFAULT_SYSFS_DRM_DIR),
            debugfs_dri_dir: PathBuf::from(DEFAULT_DEBUGFS_DRI_DIR),
            memory_override: 0,
            memory_reserved: 0,
            pci_grouping_level: 0,
        }
    }
}

impl From<&Cli> for LabelerConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            sysfs_drm_dir: cli.sysfs_drm_dir.clone(),
            debugfs_dri_dir: cli.debugfs_dri_dir.clone(),
            memory_override: cli.memory_override,
            memory_reserved: cli.memory_reserved,
            pci_grouping_level: cli.pci_grouping_level,
        }
    }
}

/// Parses an unsigned number, mapping anything unparsable to `0`.
fn parse_lenient_u64(s: &str) -> Result<u64, String> {
    Ok(s.trim().parse::<u64>().unwrap_or(0))
}
