//! Bot runtime integration tests: direct interface, tasks, persistence,
//! and the connection loop.

use chorus_rs_config::{ChorusConfig, ContextConfig, ContextWindow, StorageConfig, TimeConfig};
use chorus_rs_core::{BotRuntime, ChorusCoreError, FixedClock, LlmPair, TimeSource, TurnOutcome};
use chorus_rs_memory::MemoryError;
use chorus_rs_protocol::{
    BotIdentity, InboundMessage, LlmClient, PlatformError, PlatformEvent, Venue,
};
use chorus_rs_test_utils::{FixedLLM, RecordingLLM, RecordingPlatform, StreamingLLM};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const STAMP: &str = "01-02-2024 10:04 AM";

fn fixed_time() -> TimeSource {
    let instant = Utc
        .with_ymd_and_hms(2024, 1, 2, 15, 4, 0)
        .single()
        .expect("instant");
    TimeSource::with_clock(&TimeConfig::default(), Arc::new(FixedClock(instant))).expect("time")
}

fn config_in(root: &Path) -> ChorusConfig {
    ChorusConfig::builder()
        .storage(StorageConfig::rooted_at(root))
        .build()
}

fn start_named(
    root: &Path,
    identity: BotIdentity,
    config: ChorusConfig,
    smart: impl LlmClient + 'static,
    fast: impl LlmClient + 'static,
) -> Result<BotRuntime, ChorusCoreError> {
    BotRuntime::start_with_time(
        identity,
        Arc::new(config),
        root,
        LlmPair::new(Arc::new(smart), Arc::new(fast)),
        fixed_time(),
    )
}

fn start(
    root: &Path,
    smart: impl LlmClient + 'static,
    fast: impl LlmClient + 'static,
) -> BotRuntime {
    start_named(
        root,
        BotIdentity::new("Ada", true),
        config_in(root),
        smart,
        fast,
    )
    .expect("start bot")
}

#[tokio::test]
async fn fresh_bot_starts_with_seed_message() {
    let temp = tempdir().expect("tempdir");
    let runtime = start(temp.path(), FixedLLM::new("a"), FixedLLM::new("b"));

    let chatlog = runtime.chatlog().await.expect("chatlog");
    assert_eq!(
        chatlog,
        vec![format!(
            "Memory was initialized/reset at {STAMP} EST. Let the user know if appropriate."
        )]
    );
    let audit = fs::read_to_string(runtime.audit().path()).expect("audit");
    assert!(audit.starts_with(&format!("Log file created at {STAMP} EST.")));
}

#[tokio::test]
async fn direct_chat_renders_anonymous_and_named_authors() {
    let temp = tempdir().expect("tempdir");
    let runtime = start(
        temp.path(),
        StreamingLLM::from_strs(&["Sure", ", happy to help."]),
        FixedLLM::new("s"),
    );

    let tokens = Arc::new(Mutex::new(Vec::new()));
    let seen = tokens.clone();
    let reply = runtime
        .chat_direct(
            "hi",
            "",
            Some(Box::new(move |token: &str, so_far: &str| {
                seen.lock().push((token.to_string(), so_far.to_string()));
            })),
        )
        .await
        .expect("reply");
    assert_eq!(reply, "Sure, happy to help.");
    assert_eq!(
        tokens.lock().clone(),
        vec![
            ("Sure".to_string(), "Sure".to_string()),
            (", happy to help.".to_string(), "Sure, happy to help.".to_string()),
        ]
    );

    runtime
        .chat_direct("and me?", "Bob", None)
        .await
        .expect("reply");

    let chatlog = runtime.chatlog().await.expect("chatlog");
    assert_eq!(
        chatlog[1],
        format!("From an Anonymous User at {STAMP} via direct interface: hi")
    );
    assert_eq!(chatlog[2], "Sure, happy to help.");
    assert_eq!(
        chatlog[3],
        format!("From Bob at {STAMP} via direct interface: and me?")
    );
    let audit = fs::read_to_string(runtime.audit().path()).expect("audit");
    assert!(audit.contains("Ada Received Anonymous message via direct interface: hi"));
    assert!(audit.contains("Ada Received message from Bob via direct interface: and me?"));
}

#[tokio::test]
async fn direct_chat_omits_the_group_chat_hint() {
    let temp = tempdir().expect("tempdir");
    let (smart, calls) = RecordingLLM::new("ok");
    let runtime = start(temp.path(), smart, FixedLLM::new("s"));

    runtime.chat_direct("hi", "Bob", None).await.expect("reply");

    let calls = calls.lock().clone();
    assert!(!calls[0].system_prompt.contains("group chat"));
    assert!(calls[0].system_prompt.ends_with(&format!("Current Time: {STAMP} EST")));
}

#[tokio::test]
async fn task_uses_fast_model_without_history() {
    let temp = tempdir().expect("tempdir");
    let (fast, calls) = RecordingLLM::new("short version");
    let runtime = start(temp.path(), FixedLLM::new("unused"), fast);
    runtime.chat_direct("build history", "Bob", None).await.expect("reply");

    let answer = runtime
        .task("Summarize the text.", "A very long text.")
        .await
        .expect("task");

    assert_eq!(answer, "short version");
    let calls = calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].system_prompt, "Summarize the text.");
    assert!(!calls[0].streamed);
    assert_eq!(calls[0].messages.len(), 1);
    assert_eq!(calls[0].messages[0].content, "A very long text.");
    // Tasks never touch memory.
    assert_eq!(runtime.chatlog().await.expect("chatlog").len(), 3);
}

#[tokio::test]
async fn recent_window_limits_generation_history() {
    let temp = tempdir().expect("tempdir");
    let (smart, calls) = RecordingLLM::new("ok");
    let mut config = config_in(temp.path());
    config.context = ContextConfig {
        window: ContextWindow::Recent(2),
    };
    let runtime = start_named(
        temp.path(),
        BotIdentity::new("Ada", true),
        config,
        smart,
        FixedLLM::new("s"),
    )
    .expect("start");

    for text in ["one", "two", "three"] {
        runtime.chat_direct(text, "Bob", None).await.expect("reply");
    }

    let calls = calls.lock().clone();
    let last = calls.last().expect("call");
    assert_eq!(last.messages.len(), 2);
    assert!(last.messages[1].content.ends_with("three"));
    assert_eq!(runtime.chatlog().await.expect("chatlog").len(), 7);
}

#[tokio::test]
async fn memory_survives_restart() {
    let temp = tempdir().expect("tempdir");
    {
        let runtime = start(temp.path(), FixedLLM::new("Noted."), FixedLLM::new("s"));
        runtime
            .chat_direct("my name is Bob", "Bob", None)
            .await
            .expect("reply");
    }

    let restarted = start(temp.path(), FixedLLM::new("Hi Bob."), FixedLLM::new("s"));
    let chatlog = restarted.chatlog().await.expect("chatlog");
    assert_eq!(chatlog.len(), 3);
    assert_eq!(chatlog[2], "Noted.");
    assert!(temp.path().join("LTM").join("Ada_history.jsonl").exists());
}

#[tokio::test]
async fn unsaved_bots_forget_on_restart() {
    let temp = tempdir().expect("tempdir");
    let ephemeral = || BotIdentity::new("Eve", false);
    {
        let runtime = start_named(
            temp.path(),
            ephemeral(),
            config_in(temp.path()),
            FixedLLM::new("ok"),
            FixedLLM::new("s"),
        )
        .expect("start");
        runtime.chat_direct("hello", "Bob", None).await.expect("reply");
    }

    let restarted = start_named(
        temp.path(),
        ephemeral(),
        config_in(temp.path()),
        FixedLLM::new("ok"),
        FixedLLM::new("s"),
    )
    .expect("start");
    assert_eq!(restarted.chatlog().await.expect("chatlog").len(), 1);
    assert!(!temp.path().join("LTM").join("Eve_history.jsonl").exists());
}

#[tokio::test]
async fn reset_persists_a_fresh_seed() {
    let temp = tempdir().expect("tempdir");
    {
        let runtime = start(temp.path(), FixedLLM::new("ok"), FixedLLM::new("s"));
        runtime.chat_direct("hello", "Bob", None).await.expect("reply");
        runtime.reset().await.expect("reset");
        assert_eq!(runtime.chatlog().await.expect("chatlog").len(), 1);
    }

    let restarted = start(temp.path(), FixedLLM::new("ok"), FixedLLM::new("s"));
    assert_eq!(restarted.chatlog().await.expect("chatlog").len(), 1);
}

#[tokio::test]
async fn corrupt_snapshot_fails_startup() {
    let temp = tempdir().expect("tempdir");
    let memory_dir = temp.path().join("LTM");
    fs::create_dir_all(&memory_dir).expect("memory dir");
    fs::write(memory_dir.join("Ada_history.jsonl"), "not json\n").expect("write");

    let err = start_named(
        temp.path(),
        BotIdentity::new("Ada", true),
        config_in(temp.path()),
        FixedLLM::new("ok"),
        FixedLLM::new("s"),
    )
    .err()
    .expect("corrupt snapshot should fail");
    assert!(matches!(
        err,
        ChorusCoreError::Memory(MemoryError::Corrupt { .. })
    ));
    let audit = fs::read_to_string(temp.path().join("Logs").join("Ada_log.txt")).expect("audit");
    assert!(audit.contains("Failed to load memory"));
}

#[tokio::test]
async fn run_serves_events_until_the_feed_closes() {
    let temp = tempdir().expect("tempdir");
    let runtime = start(temp.path(), FixedLLM::new("Welcome!"), FixedLLM::new("s"));
    let platform = RecordingPlatform::new("bot-id");
    let (connection, events) = platform.connection();

    let serving = tokio::spawn({
        let runtime = runtime.clone();
        async move { runtime.run(connection).await }
    });
    events
        .send(PlatformEvent::Message(InboundMessage {
            author_id: "u1".to_string(),
            author_name: "Alice".to_string(),
            venue: Venue::channel("c1", "general"),
            content: "Hello".to_string(),
        }))
        .await
        .expect("send event");
    drop(events);

    let result = serving.await.expect("join");
    assert!(matches!(
        result,
        Err(ChorusCoreError::Platform(PlatformError::ConnectionLost(_)))
    ));
    assert_eq!(platform.final_text().as_deref(), Some("Welcome!"));
    assert_eq!(runtime.chatlog().await.expect("chatlog").len(), 3);
}

#[tokio::test]
async fn direct_chat_runs_alongside_a_platform_turn() {
    let temp = tempdir().expect("tempdir");
    let runtime = start(
        temp.path(),
        StreamingLLM::from_strs(&["Hi", " there", "!"]).with_delay(Duration::from_millis(20)),
        FixedLLM::new("greeted"),
    );
    let platform = RecordingPlatform::new("bot-id");
    let session = runtime.session(platform.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observed = seen.clone();

    let (outcome, direct) = tokio::join!(
        session.handle_message(InboundMessage {
            author_id: "id-Alice".to_string(),
            author_name: "Alice".to_string(),
            venue: Venue::channel("c1", "general"),
            content: "Hello".to_string(),
        }),
        runtime.chat_direct(
            "Hey",
            "Bob",
            Some(Box::new(move |_token: &str, so_far: &str| {
                observed.lock().push(so_far.to_string());
            })),
        )
    );

    let TurnOutcome::Responded { response, .. } = outcome else {
        panic!("expected a response");
    };
    assert_eq!(response, "Hi there!");
    assert_eq!(direct.expect("direct chat"), "Hi there!");
    assert_eq!(platform.final_text().as_deref(), Some("Hi there!"));
    assert_eq!(seen.lock().clone(), vec!["Hi", "Hi there", "Hi there!"]);

    let chatlog = runtime.chatlog().await.expect("chatlog");
    assert_eq!(chatlog.len(), 5);
    assert!(chatlog.iter().any(|line| line.starts_with("From Alice in channel general")));
    assert!(chatlog.iter().any(|line| line.starts_with("From Bob at ")));
    assert_eq!(chatlog.iter().filter(|line| *line == "Hi there!").count(), 2);
}
