pub mod reverb;

use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Additive three-partial waveform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Harmonics {
    pub h1: f32,
    pub h2: f32,
    pub h3: f32,
}

impl Harmonics {
    pub fn sample(&self, phase: f64) -> f32 {
        (self.h1 as f64 * phase.sin()
            + self.h2 as f64 * (2.0 * phase).sin()
            + self.h3 as f64 * (3.0 * phase).sin()) as f32
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tremolo {
    pub rate_hz: f32,
    pub depth: f32,
}

impl Tremolo {
    /// Gain in `[1 - depth, 1]`.
    pub fn gain(&self, t: f64) -> f32 {
        let trem = (TAU * self.rate_hz as f64 * t).sin() as f32;
        (1.0 - self.depth) + self.depth * (0.5 * (trem + 1.0))
    }
}

/// Frequency multiplier for a sinusoidal pitch deviation of `cents`.
pub fn vibrato_multiplier(rate_hz: f32, cents: f32, t: f64) -> f64 {
    let vib = (TAU * rate_hz as f64 * t).sin();
    2f64.powf(cents as f64 * vib / 1200.0)
}

/// Equal-power pan law, `pan` in `[0, 1]` from left to right.
pub fn equal_power_gains(pan: f32) -> (f32, f32) {
    let theta = pan.clamp(0.0, 1.0) as f64 * FRAC_PI_2;
    (theta.cos() as f32, theta.sin() as f32)
}

/// Click-free note envelope: quadratic fade-in, flat sustain and a
/// raised-cosine fade-out, each fade a fraction of `duration`.
pub fn pulse_envelope(t: f64, duration: f64, fade_in_ratio: f64, fade_out_ratio: f64) -> f32 {
    if !(duration.is_finite() && duration > 0.0) || t < 0.0 || t > duration {
        return 0.0;
    }
    let fade_in = duration * fade_in_ratio;
    let fade_out_start = duration * (1.0 - fade_out_ratio);
    if fade_out_ratio > 0.0 && t >= fade_out_start {
        let x = (t - fade_out_start) / (duration - fade_out_start);
        return (0.5 + 0.5 * (PI * x).cos()) as f32;
    }
    if fade_in > 0.0 && t <= fade_in {
        let x = t / fade_in;
        return (x * x) as f32;
    }
    if t < fade_out_start {
        1.0
    } else {
        0.0
    }
}

pub fn softclip(x: f32, drive: f32) -> f32 {
    (drive * x).tanh()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_starts_and_ends_silent() {
        let dur = 0.35;
        assert!(pulse_envelope(0.0, dur, 0.15, 0.25).abs() < 1e-6);
        assert!(pulse_envelope(dur, dur, 0.15, 0.25).abs() < 1e-6);
        assert_eq!(pulse_envelope(dur + 0.01, dur, 0.15, 0.25), 0.0);
        assert_eq!(pulse_envelope(-0.01, dur, 0.15, 0.25), 0.0);
        assert_eq!(pulse_envelope(dur * 0.5, dur, 0.15, 0.25), 1.0);
        let interior = (1..100).map(|i| pulse_envelope(dur * i as f64 / 100.0, dur, 0.15, 0.25));
        assert!(interior.clone().all(|e| e > 0.0));
        assert!(interior.fold(0.0f32, f32::max) <= 1.0);
    }

    #[test]
    fn degenerate_duration_is_silent() {
        for dur in [0.0, -0.2, f64::NAN, f64::INFINITY] {
            assert_eq!(pulse_envelope(0.0, dur, 0.15, 0.25), 0.0);
            assert_eq!(pulse_envelope(0.001, dur, 0.15, 0.25), 0.0);
        }
    }

    #[test]
    fn envelope_fades_are_monotonic() {
        let dur = 1.0;
        let mut prev = 0.0;
        for i in 0..=150 {
            let e = pulse_envelope(i as f64 / 1000.0, dur, 0.15, 0.25);
            assert!(e >= prev);
            prev = e;
        }
        for i in 750..=1000 {
            let e = pulse_envelope(i as f64 / 1000.0, dur, 0.15, 0.25);
            assert!(e <= prev + 1e-6);
            prev = e;
        }
    }

    #[test]
    fn pan_law_keeps_power() {
        for pan in [0.0, 0.25, 0.5, 0.9, 1.0] {
            let (l, r) = equal_power_gains(pan);
            assert!((l * l + r * r - 1.0).abs() < 1e-5);
        }
        let (l, r) = equal_power_gains(0.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
    }

    #[test]
    fn tremolo_range() {
        let trem = Tremolo { rate_hz: 0.35, depth: 0.12 };
        for i in 0..1000 {
            let g = trem.gain(i as f64 * 0.01);
            assert!(g >= 0.88 - 1e-6 && g <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn vibrato_stays_within_cents() {
        let max = 2f64.powf(7.0 / 1200.0);
        for i in 0..500 {
            let m = vibrato_multiplier(5.2, 7.0, i as f64 * 0.003);
            assert!(m <= max + 1e-12 && m >= 1.0 / max - 1e-12);
        }
    }
}
