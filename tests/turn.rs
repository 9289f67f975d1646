//! Turn processor tests over fake gateways

use speaking_gateway::config::TurnConfig;
use speaking_gateway::voice::{GenerationError, SttError, SynthesisError, TurnError};
use tokio_util::sync::CancellationToken;

mod common;
use common::{FakeLlm, FakeStt, FakeTts, Fakes};

fn turn_config(max_reply_chars: usize) -> TurnConfig {
    TurnConfig {
        max_reply_chars,
        prompt_template: None,
    }
}

#[tokio::test]
async fn test_turn_chains_stt_llm_tts() {
    let fakes = Fakes::happy();
    let processor = fakes.processor(turn_config(100));

    let audio = processor
        .process(&[1, 2, 3], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(audio, b"audio:Hi there!");
    assert_eq!(fakes.stt.received(), vec![vec![1, 2, 3]]);
    assert_eq!(fakes.llm.prompts(), vec!["hello".to_string()]);
    assert_eq!(fakes.tts.texts(), vec!["Hi there!".to_string()]);
}

#[tokio::test]
async fn test_turn_trims_transcript_and_reply() {
    let fakes = Fakes::new(
        FakeStt::new("   how are you?  \n"),
        FakeLlm::new("\n  Great, thanks!  "),
        FakeTts::new(),
    );
    let processor = fakes.processor(turn_config(100));

    processor.process(&[9], &CancellationToken::new()).await.unwrap();

    assert_eq!(fakes.llm.prompts(), vec!["how are you?".to_string()]);
    assert_eq!(fakes.tts.texts(), vec!["Great, thanks!".to_string()]);
}

#[tokio::test]
async fn test_turn_truncates_long_reply() {
    let long = "a".repeat(150);
    let fakes = Fakes::new(FakeStt::new("talk a lot"), FakeLlm::new(&long), FakeTts::new());
    let processor = fakes.processor(turn_config(100));

    processor.process(&[1], &CancellationToken::new()).await.unwrap();

    let texts = fakes.tts.texts();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].chars().count(), 100);
}

#[tokio::test]
async fn test_whitespace_transcript_is_no_speech() {
    let fakes = Fakes::new(FakeStt::new("   "), FakeLlm::new("unused"), FakeTts::new());
    let processor = fakes.processor(turn_config(100));

    let err = processor.process(&[1], &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, TurnError::NoSpeech));
    assert!(err.is_soft());
    assert!(fakes.llm.prompts().is_empty());
    assert!(fakes.tts.texts().is_empty());
}

#[tokio::test]
async fn test_blank_reply_is_empty_generation() {
    let fakes = Fakes::new(FakeStt::new("hello"), FakeLlm::new("  \n "), FakeTts::new());
    let processor = fakes.processor(turn_config(100));

    let err = processor.process(&[1], &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, TurnError::EmptyGeneration));
    assert!(fakes.tts.texts().is_empty());
}

#[tokio::test]
async fn test_stt_failure_stops_chain() {
    let fakes = Fakes::new(FakeStt::scripted(vec![None]), FakeLlm::new("unused"), FakeTts::new());
    let processor = fakes.processor(turn_config(100));

    let err = processor.process(&[1], &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, TurnError::Transcription(SttError::Unexpected(_))));
    assert!(!err.is_soft());
    assert!(fakes.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_llm_failure_skips_synthesis() {
    let fakes = Fakes::new(FakeStt::new("hello"), FakeLlm::failing(), FakeTts::new());
    let processor = fakes.processor(turn_config(100));

    let err = processor.process(&[1], &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err,
        TurnError::Generation(GenerationError::Status { status: 500, .. })
    ));
    assert!(fakes.tts.texts().is_empty());
}

#[tokio::test]
async fn test_tts_failure_is_reported() {
    let fakes = Fakes::new(FakeStt::new("hello"), FakeLlm::new("Hi"), FakeTts::failing());
    let processor = fakes.processor(turn_config(100));

    let err = processor.process(&[1], &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err,
        TurnError::Synthesis(SynthesisError::Status { status: 400, .. })
    ));
}

#[tokio::test]
async fn test_cancelled_token_aborts_turn() {
    let fakes = Fakes::happy();
    let processor = fakes.processor(turn_config(100));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = processor.process(&[1], &cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(fakes.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_prompt_template_wraps_transcript() {
    let fakes = Fakes::happy();
    let processor = fakes.processor(TurnConfig {
        max_reply_chars: 100,
        prompt_template: Some("Reply briefly to the learner: {text}".to_string()),
    });

    processor.process(&[1], &CancellationToken::new()).await.unwrap();

    assert_eq!(
        fakes.llm.prompts(),
        vec!["Reply briefly to the learner: hello".to_string()]
    );
}

#[test]
fn test_prompt_template_without_placeholder_appends() {
    let fakes = Fakes::happy();
    let processor = fakes.processor(TurnConfig {
        max_reply_chars: 100,
        prompt_template: Some("You are a tutor.".to_string()),
    });

    assert_eq!(processor.prompt_for("hi"), "You are a tutor.\n\nhi");
}
