use sensor_synth::{Engine, EngineConfig, LoopPlayer, SensorProcessor, SensorSample};
use std::time::Duration;

fn rms(buf: &[f32]) -> f32 {
    (buf.iter().map(|s| s * s).sum::<f32>() / buf.len() as f32).sqrt()
}

#[test]
fn recorded_pulses_replay_through_the_render() {
    let cfg = EngineConfig::default();
    let Engine { mut render, handle, viz } = Engine::new(&cfg);
    handle.set_enabled(true);
    let mut processor = SensorProcessor::new(handle.clone(), &cfg, 0.0).with_seed(7);
    let mut player = LoopPlayer::new(handle.library().clone());

    handle.start_recording_at(0.0);
    processor.process(SensorSample { humidity: 300, bio: 1023 }, 0.25);
    processor.process(SensorSample { humidity: 300, bio: 700 }, 0.75);
    let lp = handle.stop_recording_at(1.0).expect("two pulses were recorded");
    assert_eq!(lp.events().len(), 2);

    let block_secs = cfg.block_seconds();
    let mut buffer = vec![0.0f32; cfg.block_size * 2];
    let mut fired = Vec::new();
    let mut loudest = 0.0f32;
    for block in 0..((4.0 / block_secs) as usize) {
        let now = 1.0 + block as f64 * block_secs;
        player.poll(now, |due, note| {
            fired.push((due, note));
            handle.trigger_pulse(note);
        });
        render.process_block(&mut buffer);
        assert!(buffer.iter().all(|s| s.abs() <= 1.0));
        loudest = loudest.max(rms(&buffer));
    }

    // the loop restarts at 1.0 and repeats every second
    let notes: Vec<u8> = fired.iter().map(|(_, n)| *n).collect();
    assert_eq!(&notes[..4], &[84, 65, 84, 65]);
    for pair in fired.windows(2).step_by(2) {
        assert!((pair[1].0 - pair[0].0 - 0.5).abs() < 1e-9);
    }
    assert!(loudest > 0.0);
    assert!(!viz.is_empty());
    let frame = viz.pop(Duration::from_millis(10)).expect("a viz frame");
    assert_eq!(frame.len(), cfg.block_size / cfg.viz_stride);
}

#[test]
fn disabling_freezes_a_running_instrument() {
    let cfg = EngineConfig::default();
    let Engine { mut render, handle, .. } = Engine::new(&cfg);
    handle.set_enabled(true);
    handle.add_ambient_voice_randomized(48, 0.12, 0.5);

    let mut buffer = vec![0.0f32; cfg.block_size * 2];
    render.process_block(&mut buffer);
    assert!(rms(&buffer) > 0.0);

    handle.set_enabled(false);
    let before = handle.voices().ambient_snapshot()[0].elapsed();
    for _ in 0..3 {
        render.process_block(&mut buffer);
        assert!(buffer.iter().all(|s| *s == 0.0));
    }
    assert_eq!(handle.voices().ambient_snapshot()[0].elapsed(), before);
}
