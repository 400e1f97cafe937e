//! Integration tests for crossfade transitions through the decision loop
//!
//! Drives a spawned controller over scripted sinks on the paused tokio
//! clock, checking:
//! - Arm and commit timing against the configured window
//! - Back-to-back transitions when a track is shorter than the window
//! - Cancellation when a jump supersedes an in-flight transition
//! - Fade progress freezing across pause/resume
//! - Standby load failure leaving the active channel untouched

mod helpers;

use helpers::{drain_events, run_for, spawn_player};
use segue_common::events::PlaybackState;
use segue_common::{EngineParams, PlayerEvent, Track};
use std::path::Path;
use std::time::Duration;

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

#[tokio::test(start_paused = true)]
async fn test_three_track_chain_arms_and_commits_on_schedule() {
    let mut player = spawn_player(EngineParams::default());
    let one = player.library.add("/music/one.flac", 30.0);
    let two = player.library.add("/music/two.flac", 5.0);
    let three = player.library.add("/music/three.flac", 40.0);

    player
        .handle
        .replace_playlist(vec![one.clone(), two.clone(), three.clone()], false)
        .await
        .unwrap();
    player.handle.play(None).await.unwrap();
    assert_eq!(
        player.a.loaded_path().as_deref(),
        Some(Path::new("/music/one.flac"))
    );

    // Still outside the 4 s window at 25.9 s: nothing armed
    run_for(secs(25.9)).await;
    let events = drain_events(&mut player.events);
    assert!(!events
        .iter()
        .any(|e| matches!(e, PlayerEvent::TransitionStarted { .. })));
    assert!(!player.b.is_loaded());

    // 26.0 s: remaining time reaches the window, the standby channel arms
    // with the next track at silence
    run_for(secs(0.1)).await;
    let events = drain_events(&mut player.events);
    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::TransitionStarted { from_track, to_track, .. }
            if *from_track == one.id && *to_track == two.id
    )));
    assert!(player.b.is_loaded());
    assert!(player.b.volume() < 0.1);

    // Mid-fade both channels are audible
    run_for(secs(2.0)).await;
    assert!(player.a.volume() < 1.0);
    assert!(player.b.volume() > 0.0);

    // 30.0 s: all twenty steps done, the handoff commits
    run_for(secs(2.0)).await;
    let events = drain_events(&mut player.events);
    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::TrackFinished { track_id, completed: true, .. } if *track_id == one.id
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::TransitionCommitted { track_id, .. } if *track_id == two.id
    )));
    assert!(!player.a.is_loaded());
    assert!((player.b.volume() - 1.0).abs() < 1e-6);

    // The 5 s track came in already inside the window (it played through
    // the whole fade), so the next transition arms on the first tick
    run_for(secs(0.1)).await;
    let events = drain_events(&mut player.events);
    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::TransitionStarted { from_track, to_track, .. }
            if *from_track == two.id && *to_track == three.id
    )));
    assert_eq!(
        player.a.loaded_path().as_deref(),
        Some(Path::new("/music/three.flac"))
    );

    // That fade also runs its full window, then the 40 s track owns playback
    run_for(secs(4.0)).await;
    let events = drain_events(&mut player.events);
    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::TrackStarted { track_id, index: 2, .. } if *track_id == three.id
    )));
    assert!(!player.b.is_loaded());
    assert!((player.a.volume() - 1.0).abs() < 1e-6);

    let status = player.shared.status().await;
    let now = status.now_playing.expect("track three should be playing");
    assert_eq!(now.track_id, three.id);
    // Track three has been audible since it armed at 30.1 s
    assert!((3_900..=4_300).contains(&now.position_ms));
}

#[tokio::test(start_paused = true)]
async fn test_jump_while_armed_cancels_and_restarts_clean() {
    let mut player = spawn_player(EngineParams::default());
    let one = player.library.add("/music/one.flac", 30.0);
    let two = player.library.add("/music/two.flac", 30.0);
    player
        .handle
        .replace_playlist(vec![one.clone(), two.clone()], true)
        .await
        .unwrap();

    // One second into the fade
    run_for(secs(27.0)).await;
    assert!(player.b.is_loaded());
    assert!(player.b.volume() > 0.0);
    drain_events(&mut player.events);

    player.handle.jump_to(0).await.unwrap();
    let events = drain_events(&mut player.events);
    assert!(events
        .iter()
        .any(|e| matches!(e, PlayerEvent::TransitionCancelled { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::TrackFinished { track_id, completed: false, .. } if *track_id == one.id
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, PlayerEvent::TrackStarted { index: 0, .. })));

    // Only the restarted channel is live, at full volume from the top
    assert!(!player.b.is_loaded());
    assert!(player.a.is_loaded());
    assert!((player.a.volume() - 1.0).abs() < 1e-6);
    assert!(player.a.position() < secs(0.2));

    // And it plays on normally
    run_for(secs(5.0)).await;
    assert!(player.a.position() >= secs(4.9));
    assert_eq!(
        player.shared.playback_state().await,
        PlaybackState::Playing
    );
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_fade_and_resume_completes_it() {
    let mut player = spawn_player(EngineParams::default());
    let one = player.library.add("/music/one.flac", 30.0);
    let two = player.library.add("/music/two.flac", 30.0);
    player
        .handle
        .replace_playlist(vec![one, two], true)
        .await
        .unwrap();

    // One second into the fade: both channels partially up
    run_for(secs(27.0)).await;
    let fade_before = player.b.volume();
    assert!(fade_before > 0.0 && fade_before < 1.0);

    player.handle.pause().await.unwrap();
    run_for(secs(5.0)).await;

    // Fade step and both sink clocks held exactly where they were
    assert_eq!(player.b.volume(), fade_before);
    assert!(player.b.position() <= secs(1.1));
    assert_eq!(player.shared.playback_state().await, PlaybackState::Paused);
    drain_events(&mut player.events);

    // Resume: the remaining three seconds of fade run to commit
    player.handle.toggle().await.unwrap();
    run_for(secs(3.1)).await;
    let events = drain_events(&mut player.events);
    assert!(events
        .iter()
        .any(|e| matches!(e, PlayerEvent::TransitionCommitted { .. })));
    assert!(!player.a.is_loaded());
    assert!((player.b.volume() - 1.0).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn test_standby_load_failure_keeps_active_playing() {
    let mut player = spawn_player(EngineParams::default());
    let one = player.library.add("/music/one.flac", 30.0);
    // In the playlist but not in the library: the standby load will fail
    let missing = Track::local("/music/missing.flac");
    player
        .handle
        .replace_playlist(vec![one.clone(), missing], true)
        .await
        .unwrap();

    run_for(secs(26.1)).await;
    let events = drain_events(&mut player.events);
    let cancellations = events
        .iter()
        .filter(|e| matches!(
            e,
            PlayerEvent::TransitionCancelled { reason, .. } if reason.contains("standby load failed")
        ))
        .count();
    // Reported once, not retried every tick
    assert_eq!(cancellations, 1);
    assert!(!player.b.is_loaded());
    assert!((player.a.volume() - 1.0).abs() < 1e-6);
    assert_eq!(
        player.shared.playback_state().await,
        PlaybackState::Playing
    );

    // Track one still plays to its natural end; the hard advance then hits
    // the same missing file and playback stops
    run_for(secs(4.0)).await;
    assert_eq!(
        player.shared.playback_state().await,
        PlaybackState::Stopped
    );
    assert!(!player.a.is_loaded());
    assert!(!player.b.is_loaded());
}
