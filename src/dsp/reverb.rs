//! Schroeder reverb: per channel a damping lowpass feeds four parallel
//! combs, their average runs through two allpasses in series.

const COMB_FEEDBACK: f32 = 0.78;
const ALLPASS_GAIN: f32 = 0.70;
const WET: f32 = 0.42;
const DRY: f32 = 0.82;
const PRE_LOWPASS: f32 = 0.60;

const COMB_MS_L: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const COMB_MS_R: [f32; 4] = [30.7, 38.1, 42.1, 44.7];
const ALLPASS_MS_L: [f32; 2] = [5.0, 1.7];
const ALLPASS_MS_R: [f32; 2] = [5.3, 1.9];

fn ms_to_samples(ms: f32, sample_rate: f32) -> usize {
    ((sample_rate * ms / 1000.0) as usize).max(1)
}

struct Comb {
    buf: Vec<f32>,
    idx: usize,
    feedback: f32,
}

impl Comb {
    fn new(delay: usize, feedback: f32) -> Self {
        Self { buf: vec![0.0; delay], idx: 0, feedback }
    }

    fn process(&mut self, x: f32) -> f32 {
        let out = self.buf[self.idx];
        self.buf[self.idx] = x + self.feedback * out;
        self.idx += 1;
        if self.idx >= self.buf.len() {
            self.idx = 0;
        }
        out
    }
}

struct Allpass {
    buf: Vec<f32>,
    idx: usize,
    g: f32,
}

impl Allpass {
    fn new(delay: usize, g: f32) -> Self {
        Self { buf: vec![0.0; delay], idx: 0, g }
    }

    fn process(&mut self, x: f32) -> f32 {
        let b = self.buf[self.idx];
        let out = -self.g * x + b;
        self.buf[self.idx] = x + self.g * out;
        self.idx += 1;
        if self.idx >= self.buf.len() {
            self.idx = 0;
        }
        out
    }
}

struct Channel {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
    lp_state: f32,
}

impl Channel {
    fn new(comb_ms: &[f32], allpass_ms: &[f32], sample_rate: f32) -> Self {
        Self {
            combs: comb_ms
                .iter()
                .map(|ms| Comb::new(ms_to_samples(*ms, sample_rate), COMB_FEEDBACK))
                .collect(),
            allpasses: allpass_ms
                .iter()
                .map(|ms| Allpass::new(ms_to_samples(*ms, sample_rate), ALLPASS_GAIN))
                .collect(),
            lp_state: 0.0,
        }
    }

    fn process(&mut self, x: f32) -> f32 {
        self.lp_state = PRE_LOWPASS * self.lp_state + (1.0 - PRE_LOWPASS) * x;
        let filtered = self.lp_state;

        let mut y = 0.0;
        for comb in &mut self.combs {
            y += comb.process(filtered);
        }
        y /= self.combs.len() as f32;

        for ap in &mut self.allpasses {
            y = ap.process(y);
        }
        DRY * x + WET * y
    }
}

pub struct SchroederReverb {
    left: Channel,
    right: Channel,
}

impl SchroederReverb {
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        Self {
            left: Channel::new(&COMB_MS_L, &ALLPASS_MS_L, sr),
            right: Channel::new(&COMB_MS_R, &ALLPASS_MS_R, sr),
        }
    }

    /// Process an interleaved stereo buffer in place.
    pub fn process(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            frame[0] = self.left.process(frame[0]);
            frame[1] = self.right.process(frame[1]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(x: &[f32]) -> f32 {
        (x.iter().map(|s| s * s).sum::<f32>() / x.len() as f32).sqrt()
    }

    #[test]
    fn delay_lengths() {
        assert_eq!(ms_to_samples(29.7, 48_000.0), 1425);
        assert_eq!(ms_to_samples(1.7, 48_000.0), 81);
        assert_eq!(ms_to_samples(0.001, 48_000.0), 1);
    }

    #[test]
    fn impulse_tail_decays() {
        let sr = 48_000;
        let mut reverb = SchroederReverb::new(sr);
        let window = 4800;
        let windows = 9;
        let mut buf = vec![0.0f32; window * windows * 2];
        buf[0] = 1.0;
        reverb.process(&mut buf);

        let left: Vec<f32> = buf.chunks_exact(2).map(|f| f[0]).collect();
        let right: Vec<f32> = buf.chunks_exact(2).map(|f| f[1]).collect();
        assert!(right.iter().all(|s| *s == 0.0));

        let energies: Vec<f32> = left.chunks(window).map(rms).collect();
        // skip the window holding the dry impulse
        for pair in energies[1..].windows(2) {
            assert!(pair[0] > 0.0);
            assert!(pair[1] < pair[0], "tail grew: {:?}", energies);
        }
        assert!(energies.iter().all(|e| e.is_finite()));
    }

    #[test]
    fn state_carries_across_blocks() {
        let mut whole = SchroederReverb::new(44_100);
        let mut split = SchroederReverb::new(44_100);
        let input: Vec<f32> = (0..4096).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();

        let mut a = input.clone();
        whole.process(&mut a);

        let mut b = input;
        let (first, second) = b.split_at_mut(1000);
        split.process(first);
        split.process(second);

        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }
}
