//! Configuration for the PCCT.
//!
//! Values come from built-in defaults, an optional configuration file, and
//! `UDCN_PCCT_*` environment variables, in increasing order of precedence.
//! Nested keys use a double underscore, e.g. `UDCN_PCCT_DISK__N_SLOTS`.

use rust_udcn_common::ndn::MAX_NDN_PACKET_SIZE;
use rust_udcn_common::types::{
    DISK_BLOCK_SIZE, MAX_CS_DIRECT_ENTRIES, MAX_CS_INDIRECT_ENTRIES, MAX_PCC_ENTRIES,
};
use rust_udcn_common::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Prefix of environment variables overriding configuration values.
pub const ENV_PREFIX: &str = "UDCN_PCCT";

/// Disk tier configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DiskConfig {
    /// Backing file of the block device.
    pub path: PathBuf,

    /// Number of usable slots (slot 0 is reserved on top of these).
    pub n_slots: u64,

    /// Device blocks per slot.
    #[serde(default = "default_blocks_per_slot")]
    pub blocks_per_slot: u64,
}

fn default_blocks_per_slot() -> u64 {
    (MAX_NDN_PACKET_SIZE as u64).div_ceil(DISK_BLOCK_SIZE)
}

impl DiskConfig {
    pub fn new(path: impl Into<PathBuf>, n_slots: u64) -> Self {
        Self {
            path: path.into(),
            n_slots,
            blocks_per_slot: default_blocks_per_slot(),
        }
    }

    /// Device size in blocks, including the reserved slot 0.
    pub fn num_blocks(&self) -> u64 {
        (self.n_slots + 1) * self.blocks_per_slot
    }
}

/// PCCT configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PcctConfig {
    /// Maximum number of composite entries.
    pub pcct_capacity: usize,

    /// Maximum number of entries holding an extension block at once;
    /// unset means `pcct_capacity`.
    pub ext_capacity: Option<usize>,

    pub cs_direct_capacity: usize,

    pub cs_indirect_capacity: usize,

    /// Disk tier; absent means evicted Data is dropped.
    pub disk: Option<DiskConfig>,
}

impl Default for PcctConfig {
    fn default() -> Self {
        Self {
            pcct_capacity: MAX_PCC_ENTRIES,
            ext_capacity: None,
            cs_direct_capacity: MAX_CS_DIRECT_ENTRIES,
            cs_indirect_capacity: MAX_CS_INDIRECT_ENTRIES,
            disk: None,
        }
    }
}

impl PcctConfig {
    /// Load configuration from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Extension block budget in effect.
    pub fn ext_capacity(&self) -> usize {
        self.ext_capacity.unwrap_or(self.pcct_capacity)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pcct_capacity == 0 {
            return Err(Error::Config("pcct_capacity must be positive".into()));
        }
        if let Some(disk) = &self.disk {
            if disk.n_slots == 0 {
                return Err(Error::Config("disk.n_slots must be positive".into()));
            }
            let slot_size = disk.blocks_per_slot * DISK_BLOCK_SIZE;
            if slot_size < MAX_NDN_PACKET_SIZE as u64 {
                return Err(Error::Config(format!(
                    "disk slot of {} bytes cannot hold a {}-byte packet",
                    slot_size, MAX_NDN_PACKET_SIZE
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // load() reads the process environment, which tests share.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let cfg = PcctConfig::default();
        assert_eq!(cfg.pcct_capacity, 65536);
        assert_eq!(cfg.cs_direct_capacity, 32768);
        assert_eq!(cfg.ext_capacity(), 65536);
        assert!(cfg.validate().is_ok());
        assert_eq!(DiskConfig::new("/tmp/x", 4).blocks_per_slot, 18);
    }

    #[test]
    fn test_load_file() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcct.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "cs_direct_capacity = 100\n\n[disk]\npath = \"/var/tmp/cs.img\"\nn_slots = 64\n"
        )
        .unwrap();

        let cfg = PcctConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.cs_direct_capacity, 100);
        assert_eq!(cfg.cs_indirect_capacity, MAX_CS_INDIRECT_ENTRIES);
        let disk = cfg.disk.unwrap();
        assert_eq!(disk.n_slots, 64);
        assert_eq!(disk.blocks_per_slot, 18);
        assert_eq!(disk.num_blocks(), 65 * 18);
    }

    #[test]
    fn test_ext_capacity_follows_table_capacity() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.toml");
        std::fs::write(&path, "pcct_capacity = 128\n").unwrap();
        let cfg = PcctConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.ext_capacity(), 128);

        std::fs::write(&path, "pcct_capacity = 128\next_capacity = 16\n").unwrap();
        let cfg = PcctConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.ext_capacity(), 16);
    }

    #[test]
    fn test_environment_overrides() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let vars = [
            ("UDCN_PCCT_CS_DIRECT_CAPACITY", "7"),
            ("UDCN_PCCT_DISK__PATH", "/var/tmp/env.img"),
            ("UDCN_PCCT_DISK__N_SLOTS", "32"),
        ];
        for (k, v) in vars {
            std::env::set_var(k, v);
        }
        let loaded = PcctConfig::load(None);
        for (k, _) in vars {
            std::env::remove_var(k);
        }

        let cfg = loaded.unwrap();
        assert_eq!(cfg.cs_direct_capacity, 7);
        let disk = cfg.disk.unwrap();
        assert_eq!(disk.path, PathBuf::from("/var/tmp/env.img"));
        assert_eq!(disk.n_slots, 32);
        assert_eq!(disk.blocks_per_slot, 18);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let err = PcctConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_small_slots() {
        let mut cfg = PcctConfig::default();
        cfg.disk = Some(DiskConfig {
            path: "/tmp/cs.img".into(),
            n_slots: 4,
            blocks_per_slot: 2,
        });
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }
}
