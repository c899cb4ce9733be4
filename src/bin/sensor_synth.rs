use clap::{Args as ClapArgs, Parser, Subcommand};
use crossbeam::channel::bounded;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sensor_synth::audio_io;
use sensor_synth::ingest::spawn_ingestion;
use sensor_synth::notes::ADC_MAX;
use sensor_synth::scheduler::spawn_loop_scheduler;
use sensor_synth::{Engine, EngineClock, EngineConfig, LoopPlayer, SensorProcessor, SensorSample};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const SENSOR_PERIOD: f64 = 0.1;
const VIZ_LOG_EVERY: u64 = 500;

/// Sensor-driven generative synth
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play live through the default output device
    Run(RunArgs),
    /// Render offline to a WAV file
    Render(RenderArgs),
    /// Generate a default config file and exit
    GenerateConfig(ConfigArgs),
}

#[derive(ClapArgs)]
struct RunArgs {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    seconds: Option<f64>,
    /// Record the first N seconds of pulses into a loop
    #[arg(long, default_value_t = 0.0)]
    record_secs: f64,
}

#[derive(ClapArgs)]
struct RenderArgs {
    /// Output WAV path
    #[arg(long)]
    out: PathBuf,
    /// Length of the render
    #[arg(long, default_value_t = 60.0)]
    seconds: f64,
    /// Seed for the synthetic sensors and voice jitter
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Record the first N seconds of pulses into a loop
    #[arg(long, default_value_t = 0.0)]
    record_secs: f64,
}

#[derive(ClapArgs)]
struct ConfigArgs {
    /// Output path for the generated configuration
    #[arg(long, default_value = "config.toml")]
    out: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_command(args)?,
        Commands::Render(args) => render_command(args)?,
        Commands::GenerateConfig(cfg) => {
            EngineConfig::generate_default(&cfg.out)?;
            info!(path = %cfg.out.display(), "generated default config");
        }
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> EngineConfig {
    match path {
        Some(p) => EngineConfig::load_or_default(p),
        None => EngineConfig::default(),
    }
}

/// Random walk standing in for the sensor board: humidity drifts slowly
/// around the mapped range, the bio channel wanders across the full ADC span.
struct SyntheticSensor {
    rng: StdRng,
    humidity: f64,
    bio: f64,
}

impl SyntheticSensor {
    fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), humidity: 300.0, bio: 200.0 }
    }

    fn next_sample(&mut self) -> SensorSample {
        self.humidity = (self.humidity + self.rng.gen_range(-6.0..=6.0)).clamp(150.0, 450.0);
        self.bio = (self.bio + self.rng.gen_range(-90.0..=90.0)).clamp(0.0, ADC_MAX as f64);
        SensorSample { humidity: self.humidity.round() as i32, bio: self.bio.round() as i32 }
    }
}

fn run_command(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = load_config(args.config.as_ref());
    let Engine { render, handle, viz } = Engine::new(&cfg);
    let clock = handle.clock();
    let shutdown = Arc::new(AtomicBool::new(false));

    let _output = audio_io::start_output(render, &cfg)?;
    let scheduler = spawn_loop_scheduler(handle.library().clone(), handle.clone(), clock, shutdown.clone())?;

    let (tx, rx) = bounded::<SensorSample>(256);
    let processor = SensorProcessor::new(handle.clone(), &cfg, clock.now());
    let ingest = spawn_ingestion(rx, processor, clock, shutdown.clone())?;

    let source_shutdown = shutdown.clone();
    let source = std::thread::Builder::new().name("synthetic-sensor".into()).spawn(move || {
        let mut sensor = SyntheticSensor::new(rand::thread_rng().gen());
        while !source_shutdown.load(Ordering::Acquire) {
            if tx.send(sensor.next_sample()).is_err() {
                break;
            }
            std::thread::sleep(Duration::from_secs_f64(SENSOR_PERIOD));
        }
    })?;

    let viz_shutdown = shutdown.clone();
    let drain = std::thread::Builder::new().name("viz-drain".into()).spawn(move || {
        let mut frames = 0u64;
        while !viz_shutdown.load(Ordering::Acquire) {
            if let Some(frame) = viz.pop(Duration::from_millis(100)) {
                viz.recycle(frame);
                frames += 1;
                if frames % VIZ_LOG_EVERY == 0 {
                    info!(frames, queued = viz.len(), capacity = viz.capacity(), "viz frames drained");
                }
            }
        }
    })?;

    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Release))?;

    handle.start_with_chime();
    if args.record_secs > 0.0 {
        handle.start_recording();
    }
    info!("streaming, press Ctrl+C to stop");

    let started = Instant::now();
    while !shutdown.load(Ordering::Acquire) {
        let elapsed = started.elapsed().as_secs_f64();
        if handle.is_recording() && elapsed >= args.record_secs {
            handle.stop_recording();
        }
        if args.seconds.map_or(false, |limit| elapsed >= limit) {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    handle.stop_and_clear();
    shutdown.store(true, Ordering::Release);
    for worker in [scheduler, ingest, source, drain] {
        let _ = worker.join();
    }
    info!("stopped");
    Ok(())
}

fn render_command(args: RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    use hound::{SampleFormat, WavSpec, WavWriter};

    let cfg = load_config(args.config.as_ref());
    let Engine { mut render, handle, .. } = Engine::with_clock(&cfg, EngineClock::new());
    let mut processor = SensorProcessor::new(handle.clone(), &cfg, 0.0).with_seed(args.seed);
    let mut sensor = SyntheticSensor::new(args.seed);
    let mut player = LoopPlayer::new(handle.library().clone());

    let spec = WavSpec {
        channels: 2,
        sample_rate: cfg.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&args.out, spec)?;

    handle.set_enabled(true);
    if args.record_secs > 0.0 {
        handle.start_recording_at(0.0);
    }

    let start_time = Instant::now();
    let block_secs = cfg.block_seconds();
    let blocks = (args.seconds.max(0.0) / block_secs).ceil() as usize;
    let mut buffer = vec![0.0f32; cfg.block_size * 2];
    let mut next_reading = 0.0;
    for block in 0..blocks {
        let now = block as f64 * block_secs;
        while next_reading <= now {
            processor.process(sensor.next_sample(), next_reading);
            next_reading += SENSOR_PERIOD;
        }
        if handle.is_recording() && now >= args.record_secs {
            handle.stop_recording_at(args.record_secs);
        }
        player.poll(now, |_, note| handle.trigger_pulse(note));

        render.process_block(&mut buffer);
        for sample in &buffer {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
    }

    writer.finalize()?;
    info!(
        path = %args.out.display(),
        seconds = args.seconds,
        loops = handle.loops().len(),
        took = start_time.elapsed().as_secs_f32(),
        "render finished"
    );
    Ok(())
}
