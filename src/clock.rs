use std::time::Instant;

/// Monotonic seconds since the engine was built. Shared by everything that
/// timestamps events so recordings and loop playback agree on "now".
#[derive(Clone, Copy, Debug)]
pub struct EngineClock {
    epoch: Instant,
}

impl EngineClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }

    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

impl Default for EngineClock {
    fn default() -> Self {
        Self::new()
    }
}
