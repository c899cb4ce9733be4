use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::EngineError;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    #[serde(default = "default_master_gain")]
    pub master_gain: f32,
    #[serde(default = "default_max_voices")]
    pub max_ambient_voices: usize,
    #[serde(default = "default_max_voices")]
    pub max_pulse_voices: usize,
    #[serde(default = "default_ambient_volume")]
    pub ambient_volume: f32,
    #[serde(default = "default_pan")]
    pub ambient_pan: f32,
    #[serde(default = "default_pulse_volume")]
    pub pulse_volume: f32,
    #[serde(default = "default_pulse_duration")]
    pub pulse_duration: f32,
    #[serde(default = "default_pan")]
    pub pulse_pan: f32,
    /// Push one visualization frame every N rendered blocks.
    #[serde(default = "default_viz_decimation")]
    pub viz_decimation: usize,
    /// Keep every Nth sample of the left channel in a visualization frame.
    #[serde(default = "default_viz_stride")]
    pub viz_stride: usize,
    #[serde(default = "default_viz_queue_capacity")]
    pub viz_queue_capacity: usize,
    #[serde(default = "default_max_loops")]
    pub max_loops: usize,
    #[serde(default)]
    pub sensor: SensorMapping,
}

/// How raw sensor readings become notes.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SensorMapping {
    #[serde(default = "default_ambient_base_root")]
    pub ambient_base_root: u8,
    #[serde(default = "default_humidity_min")]
    pub humidity_min: f64,
    #[serde(default = "default_humidity_max")]
    pub humidity_max: f64,
    #[serde(default = "default_ambient_max_semitones")]
    pub ambient_max_semitones: u8,
    #[serde(default = "default_ambient_window_secs")]
    pub ambient_window_secs: f64,
    #[serde(default = "default_pulse_base_root")]
    pub pulse_base_root: u8,
    #[serde(default = "default_pulse_max_semitones")]
    pub pulse_max_semitones: u8,
    #[serde(default = "default_pulse_min_semitones")]
    pub pulse_min_semitones: u8,
    #[serde(default = "default_pulse_cooldown_secs")]
    pub pulse_cooldown_secs: f64,
    #[serde(default = "default_zero_streak_to_clear")]
    pub zero_streak_to_clear: u32,
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_block_size() -> usize {
    2048
}

fn default_master_gain() -> f32 {
    0.30
}

fn default_max_voices() -> usize {
    24
}

fn default_ambient_volume() -> f32 {
    0.12
}

fn default_pan() -> f32 {
    0.5
}

fn default_pulse_volume() -> f32 {
    0.58
}

fn default_pulse_duration() -> f32 {
    0.35
}

fn default_viz_decimation() -> usize {
    4
}

fn default_viz_stride() -> usize {
    8
}

fn default_viz_queue_capacity() -> usize {
    50
}

fn default_max_loops() -> usize {
    10
}

fn default_ambient_base_root() -> u8 {
    36
}

fn default_humidity_min() -> f64 {
    200.0
}

fn default_humidity_max() -> f64 {
    400.0
}

fn default_ambient_max_semitones() -> u8 {
    36
}

fn default_ambient_window_secs() -> f64 {
    20.0
}

fn default_pulse_base_root() -> u8 {
    24
}

fn default_pulse_max_semitones() -> u8 {
    60
}

fn default_pulse_min_semitones() -> u8 {
    12
}

fn default_pulse_cooldown_secs() -> f64 {
    0.2
}

fn default_zero_streak_to_clear() -> u32 {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            master_gain: default_master_gain(),
            max_ambient_voices: default_max_voices(),
            max_pulse_voices: default_max_voices(),
            ambient_volume: default_ambient_volume(),
            ambient_pan: default_pan(),
            pulse_volume: default_pulse_volume(),
            pulse_duration: default_pulse_duration(),
            pulse_pan: default_pan(),
            viz_decimation: default_viz_decimation(),
            viz_stride: default_viz_stride(),
            viz_queue_capacity: default_viz_queue_capacity(),
            max_loops: default_max_loops(),
            sensor: SensorMapping::default(),
        }
    }
}

impl Default for SensorMapping {
    fn default() -> Self {
        Self {
            ambient_base_root: default_ambient_base_root(),
            humidity_min: default_humidity_min(),
            humidity_max: default_humidity_max(),
            ambient_max_semitones: default_ambient_max_semitones(),
            ambient_window_secs: default_ambient_window_secs(),
            pulse_base_root: default_pulse_base_root(),
            pulse_max_semitones: default_pulse_max_semitones(),
            pulse_min_semitones: default_pulse_min_semitones(),
            pulse_cooldown_secs: default_pulse_cooldown_secs(),
            zero_streak_to_clear: default_zero_streak_to_clear(),
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let txt = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&txt)?)
    }

    /// Like [`EngineConfig::load`], but a missing or broken file yields the
    /// defaults so the instrument can always start.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "falling back to default config");
                Self::default()
            }
        }
    }

    pub fn generate_default<P: AsRef<Path>>(path: P) -> Result<(), EngineError> {
        let txt = toml::to_string_pretty(&Self::default())?;
        std::fs::write(path, txt)?;
        Ok(())
    }

    pub fn block_seconds(&self) -> f64 {
        self.block_size as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: EngineConfig = toml::from_str("master_gain = 0.5\n[sensor]\npulse_base_root = 30\n").unwrap();
        assert_eq!(cfg.master_gain, 0.5);
        assert_eq!(cfg.sensor.pulse_base_root, 30);
        assert_eq!(cfg.sensor.pulse_max_semitones, 60);
        assert_eq!(cfg.max_pulse_voices, 24);
        assert_eq!(cfg.viz_queue_capacity, 50);
    }

    #[test]
    fn generated_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        EngineConfig::generate_default(&path).unwrap();
        let cfg = EngineConfig::load(&path).unwrap();
        assert_eq!(cfg.sample_rate, 48_000);
        assert_eq!(cfg.block_size, 2048);
        assert_eq!(cfg.sensor.humidity_max, 400.0);
    }

    #[test]
    fn broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sample_rate = \"fast\"").unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(EngineError::ConfigParse(_))));
        assert_eq!(EngineConfig::load_or_default(&path).sample_rate, 48_000);
        assert_eq!(EngineConfig::load_or_default(dir.path().join("missing.toml")).max_loops, 10);
    }
}
