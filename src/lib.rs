//! Generative audio driven by two analog sensors. Humidity readings become
//! slow ambient drones, a bio signal fires short pulses, and recorded pulse
//! phrases loop back on their own timeline.

#[cfg(not(target_arch = "wasm32"))]
pub mod audio_io;
pub mod clock;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod notes;
pub mod scheduler;
pub mod state;
pub mod viz;
pub mod voices;

pub use clock::EngineClock;
pub use config::{EngineConfig, SensorMapping};
pub use engine::{Engine, EngineHandle, RenderEngine};
pub use error::EngineError;
pub use ingest::{SensorProcessor, SensorSample};
pub use scheduler::{Event, Loop, LoopLibrary, LoopPlayer, NoteSink};
