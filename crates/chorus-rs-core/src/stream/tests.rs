use super::*;
use chorus_rs_protocol::LlmError;
use chorus_rs_test_utils::{FailingLLM, FixedLLM, StreamingLLM};
use pretty_assertions::assert_eq;

fn coordinator(llm: impl LlmClient + 'static) -> StreamCoordinator {
    StreamCoordinator::new(Arc::new(llm), Duration::from_secs(30))
}

fn history() -> Vec<Message> {
    vec![Message::user("hello", None, None)]
}

#[tokio::test(start_paused = true)]
async fn partial_text_is_always_a_prefix_of_the_result() {
    let llm = StreamingLLM::from_strs(&["Hel", "lo ", "the", "re!"])
        .with_delay(Duration::from_millis(50));
    let coordinator = coordinator(llm);
    let mut stream = coordinator.begin_stream("system".to_string(), history(), None);

    let mut samples = Vec::new();
    while !stream.is_done() {
        samples.push(stream.current_text());
        stream.changed().await;
    }
    let result = stream.await_completion().await.expect("completion");

    assert_eq!(result, "Hello there!");
    assert!(samples.len() > 1);
    for sample in samples {
        assert!(result.starts_with(&sample), "{sample:?} is not a prefix");
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_streams_get_distinct_ids() {
    let llm = StreamingLLM::from_strs(&["a", "b"]).with_delay(Duration::from_millis(100));
    let coordinator = coordinator(llm);

    let first = coordinator.begin_stream("system".to_string(), history(), None);
    let second = coordinator.begin_stream("system".to_string(), history(), None);
    assert_ne!(first.id(), second.id());
    assert_eq!(coordinator.active_count(), 2);

    assert_eq!(first.await_completion().await.expect("first"), "ab");
    assert_eq!(second.await_completion().await.expect("second"), "ab");
    assert_eq!(coordinator.active_count(), 0);
}

#[tokio::test]
async fn failures_propagate_and_keep_partial_text() {
    let coordinator = coordinator(FailingLLM::new("backend down").after_chunks(&["partial"]));
    let mut stream = coordinator.begin_stream("system".to_string(), history(), None);

    while !stream.is_done() {
        stream.changed().await;
    }
    assert_eq!(stream.current_text(), "partial");
    let err = stream.await_completion().await.unwrap_err();
    assert!(matches!(
        err,
        ChorusCoreError::Generation(LlmError::Provider(ref message)) if message == "backend down"
    ));
}

#[tokio::test(start_paused = true)]
async fn hung_generation_times_out() {
    let llm = StreamingLLM::from_strs(&["late"]).with_delay(Duration::from_secs(600));
    let coordinator = StreamCoordinator::new(Arc::new(llm), Duration::from_secs(5));
    let stream = coordinator.begin_stream("system".to_string(), history(), None);

    let err = stream.await_completion().await.unwrap_err();
    assert!(matches!(err, ChorusCoreError::GenerationTimeout(5)));
    assert_eq!(coordinator.active_count(), 0);
}

#[tokio::test]
async fn observer_sees_token_and_cumulative_text() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let observer: TokenObserver = Box::new(move |token, total| {
        sink.lock().push((token.to_string(), total.to_string()));
    });
    let coordinator = coordinator(StreamingLLM::from_strs(&["Hi", " you"]));
    let stream = coordinator.begin_stream("system".to_string(), history(), Some(observer));
    stream.await_completion().await.expect("completion");

    assert_eq!(
        seen.lock().clone(),
        vec![
            ("Hi".to_string(), "Hi".to_string()),
            (" you".to_string(), "Hi you".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn blank_generation_never_reports_content() {
    let coordinator = coordinator(FixedLLM::new("   "));
    let mut stream = coordinator.begin_stream("system".to_string(), history(), None);

    assert!(!stream.wait_for_content(Duration::from_millis(200)).await);
    assert_eq!(stream.await_completion().await.expect("completion"), "   ");
}
