use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engine::RenderEngine;
use crate::error::EngineError;

/// A running output stream. Audio stops when this is dropped.
pub struct AudioOutput {
    _stream: cpal::Stream,
}

/// Open the default output device as stereo f32 and hand every callback
/// buffer to `engine`.
pub fn start_output(mut engine: RenderEngine, config: &EngineConfig) -> Result<AudioOutput, EngineError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(EngineError::NoOutputDevice)?;
    let stream_config = StreamConfig {
        channels: 2,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: BufferSize::Fixed(config.block_size as u32),
    };

    let audio_callback = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        engine.process_block(data);
    };
    let err_fn = |err| warn!("stream error: {err}");

    let stream = device.build_output_stream(&stream_config, audio_callback, err_fn, None)?;
    stream.play()?;
    let name = device.name().unwrap_or_default();
    info!(
        device = %name,
        sample_rate = config.sample_rate,
        block_size = config.block_size,
        "audio output started"
    );
    Ok(AudioOutput { _stream: stream })
}
