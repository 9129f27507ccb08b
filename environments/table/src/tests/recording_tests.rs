//! Rendering and recording tests.
//!
//! These tests define:
//! - Recording channel selection by mode string
//! - Frame sampling frequency and prepending of earlier recordings
//! - A per-buffer frame cap
//! - GIF export paths for the default and timelapse channels
//! - Captions and render resolutions

use crate::constants::*;
use crate::env::Env;
use crate::physics::World;
use crate::renderer::{Frame, Recorder, Renderer};
use crate::tests::fixtures::*;

// ============================================================================
// Recorder
// ============================================================================

#[test]
fn should_sample_frames_at_frequency() {
    let mut recorder = Recorder::new(2);
    assert!(!recorder.add_frame(|| Frame::blank(4, 4), false));

    recorder.start(None, None);
    let kept: Vec<bool> = (0..5).map(|_| recorder.add_frame(|| Frame::blank(4, 4), false)).collect();
    assert_eq!(kept, vec![true, false, true, false, true]);
    assert!(recorder.add_frame(|| Frame::blank(4, 4), true));
    assert!(recorder.stop(Some("run")));

    assert_eq!(recorder.recording("run").unwrap().len(), 4);
    assert!(!recorder.stop(None));
}

#[test]
fn should_prepend_existing_recording() {
    let mut recorder = Recorder::new(1);
    recorder.start(None, None);
    recorder.add_frame(|| Frame::blank(4, 4), false);
    recorder.stop(Some("first"));

    recorder.start(Some("first"), None);
    recorder.add_frame(|| Frame::blank(4, 4), false);
    recorder.stop(Some("second"));

    assert_eq!(recorder.recording("first").unwrap().len(), 1);
    assert_eq!(recorder.recording("second").unwrap().len(), 2);

    // Unknown ids start empty.
    recorder.start(Some("missing"), None);
    recorder.stop(Some("third"));
    assert_eq!(recorder.recording("third").unwrap().len(), 0);
}

#[test]
fn should_stop_keeping_frames_at_cap() {
    let mut recorder = Recorder::new(1);
    assert_eq!(recorder.max_frames(), Some(300));
    recorder.set_max_frames(Some(3));

    recorder.start(None, None);
    let kept: Vec<bool> = (0..5).map(|_| recorder.add_frame(|| Frame::blank(4, 4), true)).collect();
    assert_eq!(kept, vec![true, true, true, false, false]);
    assert!(recorder.is_full());
    recorder.stop(Some("capped"));
    assert_eq!(recorder.recording("capped").unwrap().len(), 3);

    // Prepended frames count toward the cap.
    recorder.start(Some("capped"), None);
    assert!(recorder.is_full());
    assert!(!recorder.add_frame(|| panic!("frame grabbed past the cap"), true));
    recorder.stop(None);

    recorder.set_max_frames(None);
    recorder.start(Some("capped"), None);
    for _ in 0..400 {
        recorder.add_frame(|| Frame::blank(1, 1), false);
    }
    assert!(!recorder.is_full());
    recorder.stop(Some("unlimited"));
    assert_eq!(recorder.recording("unlimited").unwrap().len(), 403);
}

#[test]
fn should_write_gif_and_clear_on_reset() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = Recorder::new(1);
    recorder.start(None, None);
    for _ in 0..3 {
        recorder.add_frame(|| Frame::blank(8, 6), false);
    }
    recorder.stop(Some("_a"));

    assert!(recorder.save(&dir.path().join("clip.gif"), true).unwrap());
    let written = dir.path().join("clip_a.gif");
    assert!(written.exists());
    assert!(std::fs::metadata(&written).unwrap().len() > 0);

    assert_eq!(recorder.num_recordings(), 0);
    assert!(!recorder.save(&dir.path().join("clip.gif"), true).unwrap());
}

// ============================================================================
// Environment Channels
// ============================================================================

#[test]
fn should_select_channel_by_mode() {
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)"]));

    assert!(!env.record_stop(None, "timelapse"));
    assert!(env.record_start(None, None, "timelapse"));
    assert!(env.record_stop(None, "timelapse"));

    assert!(!env.record_start(None, None, "slow_motion"));
    assert!(!env.record_stop(None, "slow_motion"));
}

#[test]
fn should_save_default_channel_while_stepping() {
    let dir = tempfile::tempdir().unwrap();
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)"]));
    env.reset(Some(0), None).unwrap();

    assert!(env.record_start(None, Some(1), "default"));
    for _ in 0..3 {
        env.step_simulation();
    }
    assert!(env.record_stop(Some("_0"), "default"));

    let path = dir.path().join("rollout.gif");
    assert!(env.record_save(&path, true, Some("default")).unwrap());
    assert!(dir.path().join("rollout_0.gif").exists());
}

#[test]
fn should_save_timelapse_next_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)", "inworkspace(hook)"]));
    env.reset(Some(1), None).unwrap();

    env.record_start(None, None, "timelapse");
    env.step(&[0.0; ACTION_DIM]).unwrap();
    env.record_stop(None, "timelapse");

    let path = dir.path().join("episode.gif");
    assert!(env.record_save(&path, true, None).unwrap());
    assert!(dir.path().join("episode_timelapse.gif").exists());
    assert!(!dir.path().join("episode.gif").exists());
}

#[test]
fn should_report_nothing_to_save() {
    let dir = tempfile::tempdir().unwrap();
    let mut env = build(hook_config(&["pick(hook, table)"], &[]));

    assert!(!env.record_save(&dir.path().join("empty.gif"), false, None).unwrap());
    assert!(!env.record_save(&dir.path().join("empty.gif"), false, Some("slow_motion")).unwrap());
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn should_caption_primitive_and_action() {
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)", "inworkspace(hook)"]));
    env.reset(Some(2), None).unwrap();
    assert_eq!(env.scene().renderer.caption(), "pick(hook, table)");

    env.step(&[1.0, 0.0, 0.0, 0.0]).unwrap();

    let caption = env.scene().renderer.caption();
    assert!(caption.starts_with("pick(hook, table)\nAction: [0.20, "), "{}", caption);
}

#[test]
fn should_render_at_mode_resolution() {
    let mut env = build(hook_config(&["pick(hook, table)"], &[]));

    let frame = env.render();
    assert_eq!((frame.width, frame.height), (RENDER_WIDTH, RENDER_HEIGHT));
    assert_eq!(frame.rgb.len(), (RENDER_WIDTH * RENDER_HEIGHT * 3) as usize);
    assert!(frame.rgb.iter().any(|&v| v != 0));

    env.set_render_mode("top_high_res");
    let frame = env.render();
    assert_eq!((frame.width, frame.height), (RENDER_WIDTH_HIGH_RES, RENDER_HEIGHT_HIGH_RES));
}

#[test]
fn should_draw_caption_text_into_frame() {
    let world = World::new();
    let mut renderer = Renderer::new();
    let plain = renderer.render(&world);

    renderer.set_caption("pick(hook, table)\nAction: [0.20, 0.00, 0.00, 0.00]");
    let captioned = renderer.render(&world);
    assert_eq!(captioned.rgb.len(), plain.rgb.len());
    assert_ne!(captioned.rgb, plain.rgb);

    renderer.set_mode("front_high_res");
    let high_res = renderer.render(&world);
    assert!(high_res.rgb.chunks(3).any(|px| px.iter().all(|&v| v > 200)));
}

#[test]
fn should_render_captioned_frames_while_recording() {
    let mut env = build(hook_config(&["pick(hook, table)"], &["on(hook, table)", "inworkspace(hook)"]));
    env.reset(Some(5), None).unwrap();
    env.scene_mut().recorder.set_max_frames(Some(2));

    assert!(env.record_start(None, Some(1), "default"));
    env.step(&[0.0; ACTION_DIM]).unwrap();
    assert!(env.record_stop(Some("_capped"), "default"));

    let frames = env.scene().recorder.recording("_capped").unwrap();
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| (f.width, f.height) == (RENDER_WIDTH, RENDER_HEIGHT)));
}
