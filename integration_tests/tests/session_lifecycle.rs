mod common;

use std::time::{Duration, Instant};

use truth_proto::{encode_truth, EntityId, Pose, Truth};
use xs_core::{
    ClientConfig, InteractionEvent, InteractionOutcome, NullRenderer, OverflowPolicy, SessionError,
    SyncSession, TaskKind,
};

#[test]
fn start_without_server_is_recoverable() -> anyhow::Result<()> {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };
    let config = ClientConfig {
        host: "127.0.0.1".to_string(),
        truth_port: port,
        environment_port: port,
        connect_timeout_ms: 500,
        ..ClientConfig::default()
    };
    let err = SyncSession::start(&config).unwrap_err();
    assert!(matches!(err, SessionError::Environment(_)), "{err}");
    assert!(err.is_recoverable());
    Ok(())
}

#[test]
fn server_disconnect_is_reported_as_connection_lost() -> anyhow::Result<()> {
    let stage = common::FakeStage::start(
        common::environment_header(50, 50, 10.0, 0),
        Vec::new(),
        false,
    )?;
    let mut session = SyncSession::start(&stage.config())?;
    let mut renderer = NullRenderer;

    let truth = Truth {
        stage_id: EntityId(3),
        pose: Pose::new(1.0, 2.0, 0.5),
        ..Truth::default()
    };
    stage.send(&encode_truth(&truth))?;
    common::tick_until(&mut session, &mut renderer, |s| s.store().contains(EntityId(3)))?;

    stage.disconnect();
    let err = common::tick_until_error(&mut session, &mut renderer)?;
    match &err {
        SessionError::ConnectionLost { task, .. } => assert_eq!(*task, TaskKind::Reader),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_recoverable());
    assert_eq!(session.lost(), Some(TaskKind::Reader));

    // The mirror keeps its last known state after the loss.
    assert_eq!(session.store().get(EntityId(3)).map(|t| t.pose.y), Some(2.0));
    Ok(())
}

#[test]
fn blocking_outbound_fails_fast_after_the_server_goes_away() -> anyhow::Result<()> {
    let stage = common::FakeStage::start(
        common::environment_header(50, 50, 10.0, 0),
        Vec::new(),
        false,
    )?;
    let config = ClientConfig {
        outbound_capacity: 1,
        outbound_overflow: OverflowPolicy::Block,
        ..stage.config()
    };
    let mut session = SyncSession::start(&config)?;
    let mut renderer = NullRenderer;

    session.handle_interaction(InteractionEvent::SaveWorld, &mut renderer)?;
    stage.wait_received(1)?;
    stage.disconnect();

    // Each push either lands or blocks until the writer gives up.
    let deadline = Instant::now() + common::WAIT;
    let err = loop {
        match session.handle_interaction(InteractionEvent::SaveWorld, &mut renderer) {
            Ok(_) => assert!(Instant::now() < deadline, "outbound never closed"),
            Err(err) => break err,
        }
        std::thread::sleep(Duration::from_millis(5));
    };
    assert!(matches!(err, SessionError::Queue(_)), "{err}");

    let lost = common::tick_until_error(&mut session, &mut renderer)?;
    assert!(lost.is_recoverable(), "{lost}");
    Ok(())
}

#[test]
fn shutdown_is_prompt_and_idempotent() -> anyhow::Result<()> {
    let stage = common::FakeStage::start(
        common::environment_header(50, 50, 10.0, 0),
        Vec::new(),
        false,
    )?;
    let mut session = SyncSession::start(&stage.config())?;
    assert!(session.is_running());

    let begun = Instant::now();
    session.shutdown();
    assert!(begun.elapsed() < Duration::from_secs(2));
    assert!(!session.is_running());
    session.shutdown();

    let outcome = session.handle_interaction(InteractionEvent::DragStop, &mut NullRenderer)?;
    assert_eq!(outcome, InteractionOutcome::Ignored);
    Ok(())
}

#[test]
fn queued_moves_are_flushed_before_close() -> anyhow::Result<()> {
    let stage = common::FakeStage::start(
        common::environment_header(200, 200, 20.0, 0),
        Vec::new(),
        false,
    )?;
    let mut session = SyncSession::start(&stage.config())?;
    let mut renderer = NullRenderer;

    let truth = Truth {
        stage_id: EntityId(1),
        pose: Pose::new(1.0, 1.0, 0.0),
        ..Truth::default()
    };
    stage.send(&encode_truth(&truth))?;
    common::tick_until(&mut session, &mut renderer, |s| !s.store().is_empty())?;

    session.handle_interaction(InteractionEvent::DragStart { x: 1.0, y: 1.0 }, &mut renderer)?;
    for step in 1..=20 {
        let x = 1.0 + f64::from(step) * 0.1;
        session.handle_interaction(
            InteractionEvent::DragMove {
                x,
                y: 1.0,
                heading: None,
            },
            &mut renderer,
        )?;
    }
    session.handle_interaction(InteractionEvent::DragStop, &mut renderer)?;
    session.shutdown();

    let received = stage.wait_received(21)?;
    assert_eq!(received.len(), 21);
    assert_eq!(received.last().map(|r| r.x), Some(3000));
    Ok(())
}
