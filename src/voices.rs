use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::f64::consts::TAU;

use crate::dsp::{equal_power_gains, pulse_envelope, softclip, vibrato_multiplier, Harmonics, Tremolo};
use crate::notes::note_to_frequency;

const PULSE_FADE_IN: f64 = 0.15;
const PULSE_FADE_OUT: f64 = 0.25;
const PULSE_RIGHT_RATIO: f32 = 0.995;
const PULSE_DRIVE: f32 = 1.05;
const ANTI_CLICK_SECS: f64 = 0.005;
/// A pulse whose envelope ends a block at or below this is dropped.
pub const PULSE_SILENCE: f32 = 1e-4;

/// A sound source rendered block by block into an interleaved stereo buffer.
pub trait Voice: Send {
    /// Add this voice's next `output.len() / 2` frames into `output`.
    fn process(&mut self, output: &mut [f32]);
    fn is_finished(&self) -> bool;
}

/// Parameters accepted when creating an ambient drone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientVoiceParams {
    pub volume: f32,
    pub pan: f32,
    pub vibrato_rate_hz: f32,
    pub vibrato_depth_cents_max: f32,
    pub tremolo_rate_hz: f32,
    pub tremolo_depth: f32,
}

impl Default for AmbientVoiceParams {
    fn default() -> Self {
        Self {
            volume: 0.12,
            pan: 0.5,
            vibrato_rate_hz: 5.0,
            vibrato_depth_cents_max: 10.0,
            tremolo_rate_hz: 0.20,
            tremolo_depth: 0.10,
        }
    }
}

impl AmbientVoiceParams {
    /// Slightly different movement per call so stacked drones never beat in
    /// lockstep.
    pub fn randomized<R: Rng + ?Sized>(rng: &mut R, volume: f32, pan: f32) -> Self {
        Self {
            volume,
            pan,
            vibrato_rate_hz: 4.8 + rng.gen::<f32>() * 0.8,
            vibrato_depth_cents_max: 8.0 + rng.gen::<f32>() * 6.0,
            tremolo_rate_hz: 0.10 + rng.gen::<f32>() * 0.20,
            tremolo_depth: 0.06 + rng.gen::<f32>() * 0.10,
        }
    }
}

/// Sustained drone. Never ends on its own.
#[derive(Clone, Debug)]
pub struct AmbientVoice {
    note: u8,
    base_freq: f32,
    phase: f64,
    elapsed: f64,
    attack: f64,
    harmonics: Harmonics,
    vib_rate_hz: f32,
    vib_depth_rate_hz: f32,
    vib_depth_min: f32,
    vib_depth_max: f32,
    tremolo: Tremolo,
    volume: f32,
    pan: f32,
    sample_rate: f32,
}

impl AmbientVoice {
    pub fn new(note: u8, params: AmbientVoiceParams, sample_rate: f32) -> Self {
        Self {
            note,
            base_freq: note_to_frequency(note),
            phase: 0.0,
            elapsed: 0.0,
            attack: 1.5,
            harmonics: Harmonics { h1: 1.0, h2: 0.20, h3: 0.06 },
            vib_rate_hz: params.vibrato_rate_hz,
            vib_depth_rate_hz: 0.08,
            vib_depth_min: 0.5,
            vib_depth_max: params.vibrato_depth_cents_max,
            tremolo: Tremolo { rate_hz: params.tremolo_rate_hz, depth: params.tremolo_depth },
            volume: params.volume.max(0.0),
            pan: params.pan.clamp(0.0, 1.0),
            sample_rate,
        }
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

impl Voice for AmbientVoice {
    fn process(&mut self, output: &mut [f32]) {
        let frames = output.len() / 2;
        if frames == 0 {
            return;
        }
        let dt = 1.0 / self.sample_rate as f64;
        let (lg, rg) = equal_power_gains(self.pan);
        let attack = self.attack.max(1e-6);
        let mut phase = self.phase;

        for i in 0..frames {
            let t = self.elapsed + i as f64 * dt;
            let env = (t / attack).clamp(0.0, 1.0) as f32;

            // the vibrato depth itself wanders between min and max
            let depth_lfo = 0.5 * (1.0 + (TAU * self.vib_depth_rate_hz as f64 * t).sin()) as f32;
            let cents = self.vib_depth_min + (self.vib_depth_max - self.vib_depth_min) * depth_lfo;
            let freq = self.base_freq as f64 * vibrato_multiplier(self.vib_rate_hz, cents, t);
            phase += TAU * freq * dt;

            let s = self.harmonics.sample(phase);
            let wave = s * env * self.tremolo.gain(t) * self.volume;
            output[i * 2] += wave * lg;
            output[i * 2 + 1] += wave * rg;
        }

        self.phase = phase.rem_euclid(TAU);
        self.elapsed += frames as f64 * dt;
    }

    fn is_finished(&self) -> bool {
        false
    }
}

/// Short enveloped note that removes itself once faded out.
#[derive(Clone, Debug)]
pub struct PulseVoice {
    note: u8,
    base_freq: f32,
    phase: f64,
    elapsed: f64,
    duration: f64,
    harmonics: Harmonics,
    vib_rate_hz: f32,
    vib_cents: f32,
    tremolo: Tremolo,
    volume: f32,
    drive: f32,
    last_envelope: f32,
    sample_rate: f32,
}

impl PulseVoice {
    pub fn new(note: u8, volume: f32, duration: f32, sample_rate: f32) -> Self {
        Self {
            note,
            base_freq: note_to_frequency(note),
            phase: 0.0,
            elapsed: 0.0,
            duration: duration.max(0.0) as f64,
            harmonics: Harmonics { h1: 1.0, h2: 0.16, h3: 0.045 },
            vib_rate_hz: 5.2,
            vib_cents: 7.0,
            tremolo: Tremolo { rate_hz: 0.35, depth: 0.12 },
            volume: volume.max(0.0),
            drive: PULSE_DRIVE,
            last_envelope: 1.0,
            sample_rate,
        }
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

impl Voice for PulseVoice {
    fn process(&mut self, output: &mut [f32]) {
        let frames = output.len() / 2;
        if frames == 0 {
            return;
        }
        let dt = 1.0 / self.sample_rate as f64;
        let mut phase = self.phase;
        let mut env = 0.0;

        for i in 0..frames {
            let t = self.elapsed + i as f64 * dt;
            env = pulse_envelope(t, self.duration, PULSE_FADE_IN, PULSE_FADE_OUT);

            let freq = self.base_freq as f64 * vibrato_multiplier(self.vib_rate_hz, self.vib_cents, t);
            phase += TAU * freq * dt;

            let s = self.harmonics.sample(phase);
            let mut wave = s * env * self.tremolo.gain(t) * self.volume;
            if t < ANTI_CLICK_SECS {
                wave *= (t / ANTI_CLICK_SECS).powf(1.5) as f32;
            }
            let wave = softclip(wave, self.drive);

            output[i * 2] += wave;
            output[i * 2 + 1] += PULSE_RIGHT_RATIO * wave;
        }

        self.phase = phase.rem_euclid(TAU);
        self.elapsed += frames as f64 * dt;
        self.last_envelope = env;
    }

    fn is_finished(&self) -> bool {
        self.last_envelope <= PULSE_SILENCE
    }
}

#[derive(Default)]
struct VoiceSet {
    ambient: VecDeque<AmbientVoice>,
    pulse: VecDeque<PulseVoice>,
}

/// Every sounding voice behind one lock. Adding, clearing and rendering a
/// block are atomic with respect to each other.
pub struct VoiceBank {
    voices: Mutex<VoiceSet>,
    max_ambient: usize,
    max_pulse: usize,
    sample_rate: f32,
}

impl VoiceBank {
    pub fn new(max_ambient: usize, max_pulse: usize, sample_rate: u32) -> Self {
        Self {
            voices: Mutex::new(VoiceSet::default()),
            max_ambient: max_ambient.max(1),
            max_pulse: max_pulse.max(1),
            sample_rate: sample_rate as f32,
        }
    }

    pub fn add_ambient(&self, note: u8, params: AmbientVoiceParams) {
        let voice = AmbientVoice::new(note, params, self.sample_rate);
        let mut set = self.voices.lock();
        set.ambient.push_back(voice);
        while set.ambient.len() > self.max_ambient {
            set.ambient.pop_front();
        }
    }

    pub fn add_pulse(&self, note: u8, volume: f32, duration: f32) {
        let voice = PulseVoice::new(note, volume, duration, self.sample_rate);
        let mut set = self.voices.lock();
        if set.pulse.len() >= self.max_pulse {
            set.pulse.pop_front();
        }
        set.pulse.push_back(voice);
    }

    pub fn clear_ambient(&self) {
        self.voices.lock().ambient.clear();
    }

    pub fn clear_pulse(&self) {
        self.voices.lock().pulse.clear();
    }

    /// Render one block of every voice into the two interleaved busses and
    /// drop pulses that have faded out.
    pub fn render(&self, ambient_bus: &mut [f32], pulse_bus: &mut [f32]) {
        let mut set = self.voices.lock();
        for voice in set.ambient.iter_mut() {
            voice.process(ambient_bus);
        }
        for voice in set.pulse.iter_mut() {
            voice.process(pulse_bus);
        }
        set.pulse.retain(|v| !v.is_finished());
    }

    pub fn ambient_count(&self) -> usize {
        self.voices.lock().ambient.len()
    }

    pub fn pulse_count(&self) -> usize {
        self.voices.lock().pulse.len()
    }

    pub fn ambient_snapshot(&self) -> Vec<AmbientVoice> {
        self.voices.lock().ambient.iter().cloned().collect()
    }

    pub fn pulse_snapshot(&self) -> Vec<PulseVoice> {
        self.voices.lock().pulse.iter().cloned().collect()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate as u32
    }
}
