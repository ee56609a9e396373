//! End-to-end streaming dispatch against a scripted executor.
//!
//! Each test spawns through the public client surface, then pushes wire
//! events into the captured feed exactly as the executor would, and
//! asserts on what the hubs observed.

mod common;

use common::{event_log, executor_pair, init_tracing, record, snapshot, wait_until};
use procrelay::events::{CloseEvent, DataEvent, ErrorEvent};
use procrelay::executor::ExecutorCall;
use procrelay::protocol::{ExitStatus, OutputChunk, WireEvent};
use procrelay::{Command, RelayError};
use serde_json::json;

#[tokio::test]
async fn test_streaming_routes_interleaved_events_to_their_hubs() {
    init_tracing();
    let (client, mock) = executor_pair();
    let command = client.command("tail").args(["-f", "service.log"]);

    let log = event_log();
    {
        let log = log.clone();
        command
            .stdout()
            .on::<DataEvent<String>, _>(move |chunk| record(&log, format!("out:{chunk}")));
    }
    {
        let log = log.clone();
        command
            .stderr()
            .on::<DataEvent<String>, _>(move |chunk| record(&log, format!("err:{chunk}")));
    }
    {
        let log = log.clone();
        command.events().on::<CloseEvent, _>(move |status| {
            record(&log, format!("close:{}", status.code.unwrap_or(-1)))
        });
    }
    {
        let log = log.clone();
        command
            .events()
            .on::<ErrorEvent, _>(move |reason| record(&log, format!("error:{reason}")));
    }

    let child = command.spawn().await.unwrap();
    let pid = child.pid();

    assert!(mock.push_event(pid, &WireEvent::Stdout(OutputChunk::Text("one".into()))));
    assert!(mock.push_event(pid, &WireEvent::Stderr(OutputChunk::Text("warn".into()))));
    assert!(mock.push_event(pid, &WireEvent::Stdout(OutputChunk::Text("two".into()))));
    assert!(mock.push_event(pid, &WireEvent::Error("hiccup".into())));
    assert!(mock.push_event(
        pid,
        &WireEvent::Terminated(ExitStatus {
            code: Some(0),
            signal: None,
        })
    ));

    wait_until(|| snapshot(&log).len() == 5).await;
    assert_eq!(
        snapshot(&log),
        vec!["out:one", "err:warn", "out:two", "error:hiccup", "close:0"]
    );
}

#[tokio::test]
async fn test_spawn_sends_the_frozen_specification() {
    let (client, mock) = executor_pair();
    let command = client
        .command("worker")
        .args(["--shard", "3"])
        .current_dir("/srv/jobs");

    let child = command.spawn().await.unwrap();
    assert_eq!(child.pid(), 1000);

    let history = mock.call_history();
    assert_eq!(history.len(), 1);
    match &history[0] {
        ExecutorCall::Spawn(request) => {
            assert_eq!(request.program, "worker");
            assert_eq!(request.args, vec!["--shard", "3"]);
            assert_eq!(request.options.cwd.as_deref(), Some("/srv/jobs"));
            assert_eq!(request.options.env, None);
        }
        other => panic!("unexpected call: {other:?}"),
    }
}

#[tokio::test]
async fn test_spawn_snapshots_are_independent_across_dispatches() {
    let (client, mock) = executor_pair();

    let command = client.command("job").arg("one");
    command.spawn().await.unwrap();
    let command = command.arg("two");
    command.spawn().await.unwrap();

    let history = mock.call_history();
    match (&history[0], &history[1]) {
        (ExecutorCall::Spawn(first), ExecutorCall::Spawn(second)) => {
            assert_eq!(first.args, vec!["one"]);
            assert_eq!(second.args, vec!["one", "two"]);
        }
        other => panic!("unexpected calls: {other:?}"),
    }
}

#[tokio::test]
async fn test_child_write_and_kill_target_their_pid() {
    let (client, mock) = executor_pair();
    let child = client.command("repl").spawn().await.unwrap();

    child.write("help\n").await.unwrap();
    child.write(vec![0x04]).await.unwrap();
    child.kill().await.unwrap();

    let history = mock.call_history();
    assert!(history.contains(&ExecutorCall::StdinWrite {
        pid: child.pid(),
        data: OutputChunk::Text("help\n".into()),
    }));
    assert!(history.contains(&ExecutorCall::StdinWrite {
        pid: child.pid(),
        data: OutputChunk::Bytes(vec![0x04]),
    }));
    assert_eq!(
        history
            .iter()
            .filter(|call| matches!(call, ExecutorCall::Kill { pid } if *pid == child.pid()))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_spawn_transport_failure_surfaces_as_error() {
    let (client, mut mock) = executor_pair();
    mock.fail_next("spawn", "executor offline");

    let err = client.command("worker").spawn().await.unwrap_err();
    assert!(matches!(
        err,
        RelayError::Transport { ref operation, .. } if operation == "spawn"
    ));
}

#[tokio::test]
async fn test_feed_outlives_the_child_handle() {
    let (client, mock) = executor_pair();
    let command = client.command("daemon");

    let log = event_log();
    {
        let log = log.clone();
        command
            .stdout()
            .on::<DataEvent<String>, _>(move |chunk| record(&log, chunk.clone()));
    }

    let child = command.spawn().await.unwrap();
    let pid = child.pid();
    drop(child);

    assert!(mock.push_event(pid, &WireEvent::Stdout(OutputChunk::Text("alive".into()))));
    wait_until(|| !snapshot(&log).is_empty()).await;
    assert_eq!(snapshot(&log), vec!["alive"]);
}

#[tokio::test]
async fn test_raw_stream_mismatch_lands_on_the_error_hub() {
    let (client, mock) = executor_pair();
    let command: Command<Vec<u8>> = Command::new(client.executor(), "dump");

    let log = event_log();
    {
        let log = log.clone();
        command
            .stdout()
            .on::<DataEvent<Vec<u8>>, _>(move |chunk| record(&log, format!("data:{}", chunk.len())));
    }
    {
        let log = log.clone();
        command
            .events()
            .on::<ErrorEvent, _>(move |reason| record(&log, format!("error:{reason}")));
    }

    let child = command.spawn().await.unwrap();
    let pid = child.pid();

    // A text chunk on a raw stream is a payload violation, not data.
    mock.push_event(pid, &WireEvent::Stdout(OutputChunk::Text("oops".into())));
    mock.push_event(pid, &WireEvent::Stdout(OutputChunk::Bytes(vec![1, 2, 3])));

    wait_until(|| snapshot(&log).len() == 2).await;
    let observed = snapshot(&log);
    assert!(observed[0].starts_with("error:"));
    assert_eq!(observed[1], "data:3");
}

#[tokio::test]
async fn test_unknown_tags_and_malformed_messages_do_not_disturb_the_stream() {
    let (client, mock) = executor_pair();
    let command = client.command("stream");

    let log = event_log();
    {
        let log = log.clone();
        command
            .stdout()
            .on::<DataEvent<String>, _>(move |chunk| record(&log, chunk.clone()));
    }

    let child = command.spawn().await.unwrap();
    let pid = child.pid();

    assert!(mock.push_raw(pid, json!({"event": "Telemetry", "payload": {"cpu": 0.4}})));
    assert!(mock.push_raw(pid, json!(["not", "an", "event"])));
    assert!(mock.push_event(pid, &WireEvent::Stdout(OutputChunk::Text("still here".into()))));

    wait_until(|| !snapshot(&log).is_empty()).await;
    assert_eq!(snapshot(&log), vec!["still here"]);
}

#[tokio::test]
async fn test_close_once_listener_fires_exactly_once() {
    let (client, mock) = executor_pair();
    let command = client.command("flaky");

    let closes = event_log();
    let first = event_log();
    {
        let closes = closes.clone();
        command
            .events()
            .on::<CloseEvent, _>(move |status| record(&closes, format!("{:?}", status.code)));
    }
    {
        let first = first.clone();
        command.events().once::<CloseEvent, _>(move |_| record(&first, "first"));
    }

    let child = command.spawn().await.unwrap();
    let status = ExitStatus {
        code: Some(0),
        signal: None,
    };
    mock.push_event(child.pid(), &WireEvent::Terminated(status));
    mock.push_event(child.pid(), &WireEvent::Terminated(status));

    wait_until(|| snapshot(&closes).len() == 2).await;
    assert_eq!(snapshot(&first), vec!["first"]);
}

#[tokio::test]
async fn test_concurrent_children_keep_their_feeds_apart() {
    let (client, mock) = executor_pair();
    let first = client.command("worker").arg("a");
    let second = client.command("worker").arg("b");

    let first_log = event_log();
    let second_log = event_log();
    {
        let log = first_log.clone();
        first
            .stdout()
            .on::<DataEvent<String>, _>(move |chunk| record(&log, chunk.clone()));
    }
    {
        let log = second_log.clone();
        second
            .stdout()
            .on::<DataEvent<String>, _>(move |chunk| record(&log, chunk.clone()));
    }

    let first_child = first.spawn().await.unwrap();
    let second_child = second.spawn().await.unwrap();
    assert_ne!(first_child.pid(), second_child.pid());

    mock.push_event(
        first_child.pid(),
        &WireEvent::Stdout(OutputChunk::Text("from a".into())),
    );
    mock.push_event(
        second_child.pid(),
        &WireEvent::Stdout(OutputChunk::Text("from b".into())),
    );

    wait_until(|| !snapshot(&first_log).is_empty() && !snapshot(&second_log).is_empty()).await;
    assert_eq!(snapshot(&first_log), vec!["from a"]);
    assert_eq!(snapshot(&second_log), vec!["from b"]);
}
