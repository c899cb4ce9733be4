use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::EngineClock;

const IDLE_SLEEP: Duration = Duration::from_millis(10);
const MIN_SLEEP: f64 = 0.001;
const MAX_SLEEP: f64 = 0.02;

/// Shortest loop the library will hold, in seconds.
pub const MIN_LOOP_SECS: f64 = 0.05;

/// One note trigger inside a loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    /// Seconds from the start of the loop.
    pub offset: f64,
    pub note: u8,
}

/// A recorded phrase, replayed forever once stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Loop {
    events: Vec<Event>,
    duration: f64,
}

impl Loop {
    /// Sorts the events by offset. `None` for an empty phrase, a
    /// non-positive duration or any non-finite time. Durations below
    /// [`MIN_LOOP_SECS`] are stretched to it and offsets are clamped into
    /// the loop.
    pub fn new(mut events: Vec<Event>, duration: f64) -> Option<Self> {
        if events.is_empty() || !duration.is_finite() || duration <= 0.0 {
            return None;
        }
        if events.iter().any(|e| !e.offset.is_finite()) {
            return None;
        }
        let duration = duration.max(MIN_LOOP_SECS);
        for e in &mut events {
            e.offset = e.offset.clamp(0.0, duration);
        }
        events.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        Some(Self { events, duration })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

/// Receives the notes fired by loop playback.
pub trait NoteSink: Send + Sync {
    fn trigger(&self, note: u8);
}

/// Bounded history of recorded loops. Every change bumps a generation
/// counter so players know to rebuild their cursors.
pub struct LoopLibrary {
    loops: Mutex<VecDeque<Arc<Loop>>>,
    generation: AtomicU64,
    capacity: usize,
}

impl LoopLibrary {
    pub fn new(capacity: usize) -> Self {
        Self {
            loops: Mutex::new(VecDeque::new()),
            generation: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, lp: Loop) -> Arc<Loop> {
        let lp = Arc::new(lp);
        let mut loops = self.loops.lock();
        loops.push_back(lp.clone());
        while loops.len() > self.capacity {
            loops.pop_front();
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        lp
    }

    pub fn clear(&self) {
        let mut loops = self.loops.lock();
        loops.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn len(&self) -> usize {
        self.loops.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The current loops together with the generation they belong to.
    pub fn snapshot(&self) -> (u64, Vec<Arc<Loop>>) {
        let loops = self.loops.lock();
        (self.generation(), loops.iter().cloned().collect())
    }
}

struct Cursor {
    lp: Arc<Loop>,
    index: usize,
    loop_start: f64,
    next_due: f64,
}

impl Cursor {
    fn new(lp: Arc<Loop>, now: f64) -> Self {
        let next_due = now + lp.events[0].offset;
        Self { lp, index: 0, loop_start: now, next_due }
    }
}

/// Drift-free loop playback. Each cursor advances its virtual loop start by
/// exactly one loop length per wrap, so late wake-ups never shift later
/// events.
pub struct LoopPlayer {
    library: Arc<LoopLibrary>,
    generation: Option<u64>,
    cursors: Vec<Cursor>,
}

impl LoopPlayer {
    pub fn new(library: Arc<LoopLibrary>) -> Self {
        Self { library, generation: None, cursors: Vec::new() }
    }

    /// Fire every event due at or before `now` as `fire(due_time, note)` and
    /// return the soonest upcoming due time, if any loop is active.
    pub fn poll<F: FnMut(f64, u8)>(&mut self, now: f64, mut fire: F) -> Option<f64> {
        if self.generation != Some(self.library.generation()) {
            let (generation, loops) = self.library.snapshot();
            self.cursors = loops.into_iter().map(|lp| Cursor::new(lp, now)).collect();
            self.generation = Some(generation);
            debug!(loops = self.cursors.len(), "loop cursors rebuilt");
        }

        let mut soonest: Option<f64> = None;
        for cursor in &mut self.cursors {
            let events = cursor.lp.events();
            while now >= cursor.next_due {
                fire(cursor.next_due, events[cursor.index].note);
                cursor.index += 1;
                if cursor.index >= events.len() {
                    cursor.index = 0;
                    cursor.loop_start += cursor.lp.duration();
                }
                cursor.next_due = cursor.loop_start + events[cursor.index].offset;
            }
            soonest = Some(soonest.map_or(cursor.next_due, |s| s.min(cursor.next_due)));
        }
        soonest
    }

    pub fn active_loops(&self) -> usize {
        self.cursors.len()
    }
}

/// How long the playback thread may sleep before it has to look again.
pub fn sleep_interval(soonest: Option<f64>, now: f64) -> Duration {
    match soonest {
        Some(due) if (due - now).is_finite() => Duration::from_secs_f64((due - now).clamp(MIN_SLEEP, MAX_SLEEP)),
        _ => IDLE_SLEEP,
    }
}

pub fn spawn_loop_scheduler<S: NoteSink + 'static>(
    library: Arc<LoopLibrary>,
    sink: S,
    clock: EngineClock,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("loop-scheduler".into())
        .spawn(move || {
            info!("loop scheduler started");
            let mut player = LoopPlayer::new(library);
            while !shutdown.load(Ordering::Acquire) {
                let soonest = player.poll(clock.now(), |_, note| sink.trigger(note));
                std::thread::sleep(sleep_interval(soonest, clock.now()));
            }
            info!("loop scheduler stopped");
        })
}
