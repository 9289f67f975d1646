//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use secrecy::SecretString;
use speaking_gateway::config::TurnConfig;
use speaking_gateway::voice::{
    GenerationError, Generator, Gateways, SttError, SynthesisError, Synthesizer, Transcriber,
    TurnProcessor,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_provider(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake provider");
    let addr = listener.local_addr().expect("fake provider addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake provider stopped");
    });
    format!("http://{addr}")
}

#[must_use]
pub fn test_key() -> SecretString {
    SecretString::from("test-key".to_string())
}

/// Wait on the cancellation token or the delay, whichever comes first
async fn wait(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

/// Transcriber replaying a script; `None` entries fail, the last entry repeats
pub struct FakeStt {
    script: Mutex<VecDeque<Option<String>>>,
    delay: Duration,
    auth_failure: bool,
    pub calls: AtomicUsize,
    pub received: Mutex<Vec<Vec<u8>>>,
}

impl FakeStt {
    #[must_use]
    pub fn new(transcript: &str) -> Self {
        Self::scripted(vec![Some(transcript.to_string())])
    }

    #[must_use]
    pub fn scripted(script: Vec<Option<String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            delay: Duration::ZERO,
            auth_failure: false,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Every call is rejected as an auth/quota failure
    #[must_use]
    pub fn unauthorized() -> Self {
        Self {
            auth_failure: true,
            ..Self::new("unused")
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().unwrap().clone()
    }

    fn next_outcome(&self) -> Option<String> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().flatten()
        } else {
            script.front().cloned().flatten()
        }
    }
}

#[async_trait]
impl Transcriber for FakeStt {
    async fn transcribe(&self, audio: &[u8], cancel: &CancellationToken) -> Result<String, SttError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().unwrap().push(audio.to_vec());
        if !wait(self.delay, cancel).await {
            return Err(SttError::Cancelled);
        }
        if self.auth_failure {
            return Err(SttError::Auth);
        }
        self.next_outcome()
            .ok_or_else(|| SttError::Unexpected("status 500 Internal Server Error".to_string()))
    }
}

/// Generator returning a fixed reply, or a status error when `None`
pub struct FakeLlm {
    reply: Option<String>,
    delay: Duration,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    #[must_use]
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for FakeLlm {
    async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !wait(self.delay, cancel).await {
            return Err(GenerationError::Cancelled);
        }
        self.reply.clone().ok_or(GenerationError::Status {
            status: 500,
            body: "upstream failure".to_string(),
        })
    }
}

/// Synthesizer that "encodes" text as `audio:<text>`
#[derive(Default)]
pub struct FakeTts {
    fail: bool,
    pub texts: Mutex<Vec<String>>,
}

impl FakeTts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Synthesizer for FakeTts {
    async fn synthesize(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SynthesisError> {
        self.texts.lock().unwrap().push(text.to_string());
        if cancel.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }
        if self.fail {
            return Err(SynthesisError::Status {
                status: 400,
                body: "bad voice".to_string(),
            });
        }
        Ok(format!("audio:{text}").into_bytes())
    }
}

/// Fakes bundled with handles for assertions
pub struct Fakes {
    pub stt: Arc<FakeStt>,
    pub llm: Arc<FakeLlm>,
    pub tts: Arc<FakeTts>,
}

impl Fakes {
    #[must_use]
    pub fn new(stt: FakeStt, llm: FakeLlm, tts: FakeTts) -> Self {
        Self {
            stt: Arc::new(stt),
            llm: Arc::new(llm),
            tts: Arc::new(tts),
        }
    }

    /// Happy path: "hello" → "Hi there!" → `audio:Hi there!`
    #[must_use]
    pub fn happy() -> Self {
        Self::new(FakeStt::new("hello"), FakeLlm::new("Hi there!"), FakeTts::new())
    }

    #[must_use]
    pub fn gateways(&self) -> Gateways {
        Gateways {
            stt: self.stt.clone(),
            llm: self.llm.clone(),
            tts: self.tts.clone(),
        }
    }

    #[must_use]
    pub fn processor(&self, config: TurnConfig) -> TurnProcessor {
        self.gateways().turn_processor(config)
    }
}
