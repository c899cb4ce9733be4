use crossbeam::channel::{Receiver, RecvTimeoutError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::EngineClock;
use crate::config::{EngineConfig, SensorMapping};
use crate::engine::EngineHandle;
use crate::notes::{adc_to_semitones, humidity_to_note, humidity_to_offset, quantize_to_major_scale};
use crate::voices::AmbientVoiceParams;

const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// One decoded pair of readings from the sensor board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorSample {
    pub humidity: i32,
    pub bio: i32,
}

/// What a single sample caused, mostly for tests and tracing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reaction {
    pub ambient_note: Option<u8>,
    pub ambient_cleared: bool,
    pub pulse_note: Option<u8>,
}

/// Turns the sensor stream into voices. Humidity is averaged over a window
/// before it moves the drone; the bio signal fires pulses directly, rate
/// limited by a cooldown.
pub struct SensorProcessor {
    handle: EngineHandle,
    mapping: SensorMapping,
    ambient_volume: f32,
    ambient_pan: f32,
    hum_samples: Vec<i32>,
    window_start: f64,
    zero_streak: u32,
    cleared_for_zero: bool,
    last_pulse: Option<f64>,
    rng: StdRng,
}

impl SensorProcessor {
    pub fn new(handle: EngineHandle, config: &EngineConfig, now: f64) -> Self {
        Self {
            handle,
            mapping: config.sensor.clone(),
            ambient_volume: config.ambient_volume,
            ambient_pan: config.ambient_pan,
            hum_samples: Vec::new(),
            window_start: now,
            zero_streak: 0,
            cleared_for_zero: false,
            last_pulse: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Fix the seed behind the drone parameter jitter, for reproducible renders.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn process(&mut self, sample: SensorSample, now: f64) -> Reaction {
        let mut reaction = Reaction::default();
        if !self.handle.is_enabled() {
            return reaction;
        }
        let m = &self.mapping;

        let hum_offset = humidity_to_offset(sample.humidity as f64, m.humidity_min, m.humidity_max, m.ambient_max_semitones);
        if hum_offset == 0 {
            self.zero_streak = self.zero_streak.saturating_add(1);
        } else {
            self.zero_streak = 0;
            self.cleared_for_zero = false;
        }

        if self.zero_streak >= m.zero_streak_to_clear {
            // dry sensor: drop the drone once and wait for readings to return
            if !self.cleared_for_zero {
                self.handle.clear_ambient_voices();
                self.hum_samples.clear();
                self.window_start = now;
                self.cleared_for_zero = true;
                reaction.ambient_cleared = true;
                info!("humidity at floor, ambient voices cleared");
            }
        } else {
            self.hum_samples.push(sample.humidity);
            if now - self.window_start >= m.ambient_window_secs && !self.hum_samples.is_empty() {
                let avg = self.hum_samples.iter().map(|h| *h as f64).sum::<f64>() / self.hum_samples.len() as f64;
                let (note, _) = humidity_to_note(avg, m.ambient_base_root, m.humidity_min, m.humidity_max, m.ambient_max_semitones);
                let params = AmbientVoiceParams::randomized(&mut self.rng, self.ambient_volume, self.ambient_pan);
                self.handle.add_ambient_voice(note, params);
                debug!(avg, note, samples = self.hum_samples.len(), "ambient voice added");
                self.hum_samples.clear();
                self.window_start = now;
                reaction.ambient_note = Some(note);
            }
        }

        let raw = adc_to_semitones(sample.bio, m.pulse_max_semitones);
        let offset = quantize_to_major_scale(raw as i32, m.pulse_max_semitones);
        let note = m.pulse_base_root.saturating_add(offset);
        let cooled = self.last_pulse.map_or(true, |t| now - t >= m.pulse_cooldown_secs);
        if offset >= m.pulse_min_semitones && cooled {
            self.handle.trigger_pulse(note);
            self.handle.record_note_at(now, note);
            self.last_pulse = Some(now);
            reaction.pulse_note = Some(note);
        }
        reaction
    }
}

/// Drain decoded samples on a dedicated thread until `shutdown` is set or
/// every sender is gone.
pub fn spawn_ingestion(
    rx: Receiver<SensorSample>,
    mut processor: SensorProcessor,
    clock: EngineClock,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("sensor-ingest".into())
        .spawn(move || {
            info!("sensor ingestion started");
            while !shutdown.load(Ordering::Acquire) {
                match rx.recv_timeout(POLL_TIMEOUT) {
                    Ok(sample) => {
                        processor.process(sample, clock.now());
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("sensor ingestion stopped");
        })
}
