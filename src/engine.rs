use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::clock::EngineClock;
use crate::config::EngineConfig;
use crate::dsp::reverb::SchroederReverb;
use crate::scheduler::{Loop, LoopLibrary, NoteSink};
use crate::state::EngineState;
use crate::viz::{viz_channel, VizReceiver, VizSender};
use crate::voices::{AmbientVoiceParams, VoiceBank};

/// Notes played when output is switched on, so a listener hears that it works.
pub const START_CHIME: [u8; 3] = [60, 64, 67];
const START_CHIME_GAP: Duration = Duration::from_millis(300);

/// Produces the output audio, one block per call. Owned by the audio
/// callback; everything it shares with other threads sits behind `Arc`s.
pub struct RenderEngine {
    state: Arc<EngineState>,
    voices: Arc<VoiceBank>,
    reverb: SchroederReverb,
    master_gain: f32,
    ambient_bus: Vec<f32>,
    pulse_bus: Vec<f32>,
    viz: VizSender,
    viz_decimation: usize,
    viz_stride: usize,
    viz_counter: usize,
}

impl RenderEngine {
    /// Fill an interleaved stereo block. While disabled the block is silent
    /// and no voice moves forward.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        if !self.state.is_enabled() {
            buffer.fill(0.0);
            return;
        }

        let len = buffer.len();
        if self.ambient_bus.len() != len {
            self.ambient_bus.resize(len, 0.0);
            self.pulse_bus.resize(len, 0.0);
        }
        self.ambient_bus.fill(0.0);
        self.pulse_bus.fill(0.0);

        self.voices.render(&mut self.ambient_bus, &mut self.pulse_bus);

        scale_finite(&mut self.ambient_bus, self.master_gain);
        // a non-finite sample in the reverb tank would never decay
        scale_finite(&mut self.pulse_bus, self.master_gain);
        self.reverb.process(&mut self.pulse_bus);

        let mut peak = 0.0f32;
        for ((out, amb), pul) in buffer.iter_mut().zip(&self.ambient_bus).zip(&self.pulse_bus) {
            *out = amb + pul;
            peak = peak.max(out.abs());
        }
        if peak > 1.0 {
            for v in buffer.iter_mut() {
                *v /= peak;
            }
        }
        for v in buffer.iter_mut() {
            *v = if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        }

        self.viz_counter += 1;
        if self.viz_counter >= self.viz_decimation {
            self.viz_counter = 0;
            let mut frame = self.viz.acquire();
            frame.extend(buffer.iter().step_by(2 * self.viz_stride).copied());
            self.viz.push(frame);
        }
    }

    pub fn voices(&self) -> &Arc<VoiceBank> {
        &self.voices
    }
}

fn scale_finite(bus: &mut [f32], gain: f32) {
    for v in bus.iter_mut() {
        *v = if v.is_finite() { *v * gain } else { 0.0 };
    }
}

/// The control API shared with sensor ingestion, loop playback and any
/// control surface. Cheap to clone.
#[derive(Clone)]
pub struct EngineHandle {
    state: Arc<EngineState>,
    voices: Arc<VoiceBank>,
    loops: Arc<LoopLibrary>,
    clock: EngineClock,
    pulse_volume: f32,
    pulse_duration: f32,
    pulse_pan: f32,
}

impl EngineHandle {
    pub fn set_enabled(&self, enabled: bool) {
        self.state.set_enabled(enabled);
        info!(enabled, "audio output toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    /// Enable output and play [`START_CHIME`] as pulses, one every 300 ms.
    /// Blocks until the last note is triggered.
    pub fn start_with_chime(&self) {
        self.set_enabled(true);
        for (i, note) in START_CHIME.iter().enumerate() {
            if i > 0 {
                std::thread::sleep(START_CHIME_GAP);
            }
            self.trigger_pulse(*note);
        }
    }

    pub fn add_ambient_voice(&self, note: u8, params: AmbientVoiceParams) {
        self.voices.add_ambient(note, params);
    }

    pub fn add_ambient_voice_randomized(&self, note: u8, volume: f32, pan: f32) {
        let params = AmbientVoiceParams::randomized(&mut rand::thread_rng(), volume, pan);
        self.voices.add_ambient(note, params);
    }

    /// Pulses render near-mono, so `_pan` is accepted for callers that
    /// pass one but has no effect.
    pub fn add_pulse_voice(&self, note: u8, volume: f32, duration: f32, _pan: f32) {
        self.voices.add_pulse(note, volume, duration);
    }

    /// A pulse with the configured default volume and length.
    pub fn trigger_pulse(&self, note: u8) {
        self.add_pulse_voice(note, self.pulse_volume, self.pulse_duration, self.pulse_pan);
    }

    pub fn clear_ambient_voices(&self) {
        self.voices.clear_ambient();
    }

    pub fn clear_pulse_voices(&self) {
        self.voices.clear_pulse();
    }

    /// Silence the output and drop every sounding voice.
    pub fn stop_and_clear(&self) {
        self.set_enabled(false);
        self.clear_ambient_voices();
        self.clear_pulse_voices();
    }

    pub fn start_recording(&self) -> bool {
        self.start_recording_at(self.clock.now())
    }

    pub fn start_recording_at(&self, now: f64) -> bool {
        let started = self.state.start_recording(now);
        if started {
            info!("recording started");
        }
        started
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    /// Append a played note to the open recording, if there is one.
    pub fn record_note(&self, note: u8) {
        self.record_note_at(self.clock.now(), note);
    }

    pub fn record_note_at(&self, now: f64, note: u8) {
        self.state.record_event(now, note);
    }

    /// Close the recording and store it as a loop. Empty recordings are
    /// dropped.
    pub fn stop_recording(&self) -> Option<Arc<Loop>> {
        self.stop_recording_at(self.clock.now())
    }

    pub fn stop_recording_at(&self, now: f64) -> Option<Arc<Loop>> {
        let was_recording = self.state.is_recording();
        match self.state.stop_recording(now) {
            Some(lp) => {
                info!(duration = lp.duration(), events = lp.events().len(), "loop stored");
                Some(self.loops.push(lp))
            }
            None => {
                if was_recording {
                    info!("recording stopped without notes, discarded");
                }
                None
            }
        }
    }

    pub fn clear_loop_history(&self) {
        self.loops.clear();
        info!("loop history cleared");
    }

    pub fn loops(&self) -> Vec<Arc<Loop>> {
        self.loops.snapshot().1
    }

    pub fn library(&self) -> &Arc<LoopLibrary> {
        &self.loops
    }

    pub fn voices(&self) -> &Arc<VoiceBank> {
        &self.voices
    }

    pub fn clock(&self) -> EngineClock {
        self.clock
    }
}

impl NoteSink for EngineHandle {
    fn trigger(&self, note: u8) {
        self.trigger_pulse(note);
    }
}

/// Everything a running instrument needs, wired to the same shared state.
pub struct Engine {
    pub render: RenderEngine,
    pub handle: EngineHandle,
    pub viz: VizReceiver,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_clock(config, EngineClock::new())
    }

    pub fn with_clock(config: &EngineConfig, clock: EngineClock) -> Self {
        let state = Arc::new(EngineState::new());
        let voices = Arc::new(VoiceBank::new(
            config.max_ambient_voices,
            config.max_pulse_voices,
            config.sample_rate,
        ));
        let loops = Arc::new(LoopLibrary::new(config.max_loops));
        let viz_stride = config.viz_stride.max(1);
        let frame_len = (config.block_size + viz_stride - 1) / viz_stride;
        let (viz_tx, viz_rx) = viz_channel(config.viz_queue_capacity, frame_len);

        let render = RenderEngine {
            state: state.clone(),
            voices: voices.clone(),
            reverb: SchroederReverb::new(config.sample_rate),
            master_gain: config.master_gain,
            ambient_bus: vec![0.0; config.block_size * 2],
            pulse_bus: vec![0.0; config.block_size * 2],
            viz: viz_tx,
            viz_decimation: config.viz_decimation.max(1),
            viz_stride,
            viz_counter: 0,
        };
        let handle = EngineHandle {
            state,
            voices,
            loops,
            clock,
            pulse_volume: config.pulse_volume,
            pulse_duration: config.pulse_duration,
            pulse_pan: config.pulse_pan,
        };
        Self { render, handle, viz: viz_rx }
    }
}
