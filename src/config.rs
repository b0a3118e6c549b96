// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Recorder configuration: the tunables the host sets once before
//! `Core::new` — keyframe period, the diff-recording capacity, the
//! region count ceiling, and the on-disk blob names. The spec scopes
//! generic host configuration out, but these are parameters of this
//! subsystem itself, so they stay.

use std::path::Path;

use serde::Deserialize;

use crate::error::{CoreError, Result};

/// On-disk blob names (spec §6: "names are conventions, content is
/// bit-exact").
#[derive(Debug, Deserialize, Clone)]
pub struct BlobNames {
    #[serde(default = "default_save_name")]
    pub save: String,
    #[serde(default = "default_recording_name")]
    pub recording: String,
    #[serde(default = "default_index_name")]
    pub recording_index: String,
    #[serde(default = "default_playback_name")]
    pub playback: String,
}

impl Default for BlobNames {
    fn default() -> Self {
        Self {
            save: default_save_name(),
            recording: default_recording_name(),
            recording_index: default_index_name(),
            playback: default_playback_name(),
        }
    }
}

fn default_save_name() -> String {
    "save.bin".to_string()
}
fn default_recording_name() -> String {
    "recording.bin".to_string()
}
fn default_index_name() -> String {
    "recordingIndex.bin".to_string()
}
fn default_playback_name() -> String {
    "playback.bin".to_string()
}

/// Top-level recorder configuration, loadable from a TOML file.
#[derive(Debug, Deserialize, Clone)]
pub struct RecorderConfig {
    /// Number of DiffFrames between successive FullFrames (spec §4.4's `K`).
    #[serde(default = "default_keyframe_period")]
    pub keyframe_period: u32,
    /// Diff recording is disabled once the region set's total byte sum
    /// exceeds this (spec §3's `CAP`).
    #[serde(default = "default_region_cap_bytes")]
    pub region_cap_bytes: usize,
    /// Region count ceiling (spec §3: `count ≤ 1024`).
    #[serde(default = "default_max_regions")]
    pub max_regions: usize,
    #[serde(default)]
    pub blob_names: BlobNames,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            keyframe_period: default_keyframe_period(),
            region_cap_bytes: default_region_cap_bytes(),
            max_regions: default_max_regions(),
            blob_names: BlobNames::default(),
        }
    }
}

fn default_keyframe_period() -> u32 {
    60
}
fn default_region_cap_bytes() -> usize {
    1 << 20
}
fn default_max_regions() -> usize {
    crate::region::MAX_REGIONS
}

impl RecorderConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read config file: {e}")))?;
        let config: RecorderConfig =
            toml::from_str(&content).map_err(|e| CoreError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.keyframe_period == 0 {
            return Err(CoreError::Config("keyframe_period must be > 0".into()));
        }
        if self.region_cap_bytes == 0 {
            return Err(CoreError::Config("region_cap_bytes must be > 0".into()));
        }
        if self.max_regions == 0 || self.max_regions > crate::region::MAX_REGIONS {
            return Err(CoreError::Config(format!(
                "max_regions must be in 1..={}",
                crate::region::MAX_REGIONS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RecorderConfig::default();
        assert_eq!(cfg.keyframe_period, 60);
        assert_eq!(cfg.region_cap_bytes, 1 << 20);
        assert_eq!(cfg.max_regions, 1024);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_keyframe_period_is_rejected() {
        let mut cfg = RecorderConfig::default();
        cfg.keyframe_period = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn from_file_parses_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chronoshift.toml");
        std::fs::write(&path, "keyframe_period = 30\n").unwrap();
        let cfg = RecorderConfig::from_file(&path).unwrap();
        assert_eq!(cfg.keyframe_period, 30);
        assert_eq!(cfg.region_cap_bytes, 1 << 20);
    }
}
