//! Playback monitor and full run tests against the scripted subsystem

mod helpers;

use adbplay::config::Settings;
use adbplay::error::Error;
use adbplay::playback::{play_file, Session};
use adbplay::subsystem::{PlayState, PrefetchEvents, PrefetchStatus, ResultCode};
use helpers::{capture_log, FakeSubsystem};
use std::path::Path;
use std::time::Duration;

const OPEN_SEQUENCE: [&str; 14] = [
    "create_engine",
    "engine.realize",
    "engine.get_interface(SL_IID_ENGINE)",
    "engine.create_output_mix",
    "outputMix.realize",
    "engine.create_audio_player",
    "audioPlayer.register_callback",
    "audioPlayer.realize",
    "audioPlayer.get_interface(SL_IID_PREFETCHSTATUS)",
    "prefetch.register_callback",
    "prefetch.set_callback_events_mask",
    "audioPlayer.get_interface(SL_IID_PLAY)",
    "play.register_callback",
    "play.set_callback_events_mask",
];

#[tokio::test]
async fn test_full_run_call_sequence() {
    let fake = FakeSubsystem::new().with_play_states(&[
        PlayState::Playing,
        PlayState::Playing,
        PlayState::Stopped,
    ]);
    let (log, capture) = capture_log();

    let polls = play_file(&fake, Path::new("/sdcard/song.mp3"), &Settings::default(), log)
        .await
        .unwrap();

    assert_eq!(polls, 1);
    let mut expected: Vec<&str> = OPEN_SEQUENCE.to_vec();
    expected.extend([
        "play.get_play_state",
        "play.set_play_state",
        "play.get_play_state",
        "play.get_play_state",
        "audioPlayer.destroy",
        "outputMix.destroy",
        "engine.destroy",
    ]);
    assert_eq!(fake.calls(), expected);
    assert_eq!(fake.last_set_state(), Some(PlayState::Playing));

    let messages = capture.messages();
    assert_eq!(messages[0], "Playing audio file: /sdcard/song.mp3");
    assert!(messages.contains(&"PlayState[before]=SL_PLAYSTATE_PLAYING".to_string()));
    assert!(messages.contains(&"PlayState[after]=SL_PLAYSTATE_PLAYING".to_string()));
    assert!(messages.contains(&"PlayState=SL_PLAYSTATE_STOPPED".to_string()));
    assert_eq!(messages.last().map(String::as_str), Some("SUCCESS: engine.destroy()"));
}

#[tokio::test]
async fn test_every_line_is_timestamped() {
    let fake = FakeSubsystem::new().with_play_states(&[PlayState::Stopped]);
    let (log, capture) = capture_log();

    play_file(&fake, Path::new("a.wav"), &Settings::default(), log)
        .await
        .unwrap();

    for line in capture.lines() {
        assert!(line.starts_with('['), "line without timestamp: {}", line);
        assert_eq!(&line[20..21], "]", "malformed timestamp: {}", line);
    }
}

#[tokio::test(start_paused = true)]
async fn test_polls_until_stopped_then_stops_polling() {
    let fake = FakeSubsystem::new().with_play_states(&[
        PlayState::Stopped,
        PlayState::Playing,
        PlayState::Playing,
        PlayState::Playing,
        PlayState::Stopped,
        PlayState::Playing,
    ]);
    let (log, _capture) = capture_log();
    let mut session = Session::new(&fake, log);
    session.open(Path::new("a.wav")).unwrap();

    let polls = session
        .run_until_stopped(Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(polls, 3);
    // before + after + three polls; the trailing Playing is never asked for
    assert_eq!(fake.count("play.get_play_state"), 5);
}

#[tokio::test(start_paused = true)]
async fn test_poll_interval_paces_the_loop() {
    let fake = FakeSubsystem::new().with_play_states(&[
        PlayState::Stopped,
        PlayState::Playing,
        PlayState::Playing,
        PlayState::Playing,
        PlayState::Stopped,
    ]);
    let (log, _capture) = capture_log();
    let mut session = Session::new(&fake, log);
    session.open(Path::new("a.wav")).unwrap();

    let start = tokio::time::Instant::now();
    session
        .run_until_stopped(Duration::from_millis(250))
        .await
        .unwrap();

    // Two waits: after the first and second polls
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(500) && elapsed < Duration::from_millis(750),
        "unexpected pacing: {:?}",
        elapsed
    );
}

#[tokio::test(start_paused = true)]
async fn test_never_stopped_never_returns() {
    let fake = FakeSubsystem::new().with_play_states(&[PlayState::Stopped, PlayState::Playing]);
    let (log, _capture) = capture_log();
    let mut session = Session::new(&fake, log);
    session.open(Path::new("a.wav")).unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(600),
        session.run_until_stopped(Duration::from_secs(1)),
    )
    .await;

    assert!(result.is_err(), "monitor returned for a player that never stops");
    assert!(fake.count("play.get_play_state") >= 600);
    assert_eq!(fake.count("audioPlayer.destroy"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_underflow_during_playback_aborts_without_teardown() {
    let fake = FakeSubsystem::new().with_play_states(&[PlayState::Stopped, PlayState::Playing]);
    let (log, capture) = capture_log();
    let mut session = Session::new(&fake, log);
    session.open(Path::new("a.wav")).unwrap();

    fake.set_prefetch(0, PrefetchStatus::Underflow);
    fake.fire_prefetch(PrefetchEvents::all());

    let result = session.run_until_stopped(Duration::from_secs(1)).await;

    assert!(matches!(result, Err(Error::Underflow { .. })));
    assert!(capture.contains_prefix("ABORTED: SL_PREFETCHSTATUS_UNDERFLOW"));
    assert!(fake.calls().iter().all(|c| !c.ends_with(".destroy")));
}

#[tokio::test]
async fn test_every_failure_code_is_fatal_without_teardown() {
    for code in ResultCode::FAILURES {
        let fake = FakeSubsystem::new().fail_on("outputMix.realize", code);
        let (log, capture) = capture_log();

        let result = play_file(&fake, Path::new("a.wav"), &Settings::default(), log).await;

        match result {
            Err(Error::SubsystemCall { operation, code: got }) => {
                assert_eq!(operation, "outputMix.realize");
                assert_eq!(got, code);
            }
            other => panic!("Expected SubsystemCall for {}, got {:?}", code, other),
        }
        let expected = format!(
            "ERROR: Failure in outputMix.realize(). Error code: {}",
            code.label()
        );
        assert!(capture.messages().contains(&expected));
        assert_eq!(fake.count("engine.create_audio_player"), 0);
        assert!(fake.calls().iter().all(|c| !c.ends_with(".destroy")));
    }
}

#[tokio::test]
async fn test_failure_at_each_step_stops_the_sequence() {
    for (index, operation) in OPEN_SEQUENCE.iter().enumerate() {
        let fake = FakeSubsystem::new().fail_on(operation, ResultCode::ContentNotFound);
        let (log, _capture) = capture_log();

        let result = play_file(&fake, Path::new("a.wav"), &Settings::default(), log).await;

        assert_eq!(
            result.err().and_then(|e| e.result_code()),
            Some(ResultCode::ContentNotFound),
            "{} should fail the run",
            operation
        );
        assert_eq!(fake.calls(), OPEN_SEQUENCE[..=index].to_vec());
    }
}

#[tokio::test]
async fn test_set_play_state_failure_is_fatal() {
    let fake = FakeSubsystem::new().fail_on("play.set_play_state", ResultCode::ResourceError);
    let (log, capture) = capture_log();

    let result = play_file(&fake, Path::new("a.wav"), &Settings::default(), log).await;

    assert_eq!(
        result.err().and_then(|e| e.result_code()),
        Some(ResultCode::ResourceError)
    );
    assert!(!capture.contains_prefix("PlayState[after]"));
}
