use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::prompt::SYSTEM_MESSAGE;
use crate::provider::{ChatRequest, LlmProvider, Message, ProviderError, Role};

/// Turns a prompt into summary text through the configured provider.
///
/// Never fails: missing credentials, provider errors, timeouts and empty
/// completions all come back as `None` so the caller simply skips the thread.
pub struct Summarizer {
    provider: Option<Arc<dyn LlmProvider>>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl Summarizer {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            timeout,
        }
    }

    /// `false` when no credential was configured.
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn summarize(&self, prompt: &str) -> Option<String> {
        let Some(provider) = self.provider.as_ref() else {
            error!("no text-generation credential configured; skipping AI summary");
            return None;
        };

        let req = ChatRequest {
            model: self.model.clone(),
            system: SYSTEM_MESSAGE.to_string(),
            messages: vec![Message {
                role: Role::User,
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            max_tokens: None,
        };

        let result = match tokio::time::timeout(self.timeout, provider.send(&req)).await {
            Ok(r) => r,
            Err(_) => Err(ProviderError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(resp) => {
                let text = resp.content.trim();
                if text.is_empty() {
                    warn!(provider = provider.name(), "empty completion, no summary");
                    return None;
                }
                debug!(
                    provider = provider.name(),
                    tokens_in = resp.tokens_in,
                    tokens_out = resp.tokens_out,
                    "summary generated"
                );
                Some(text.to_string())
            }
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "summary request failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::provider::ChatResponse;

    struct Fixed {
        reply: Result<&'static str, u16>,
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl LlmProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(req.system, SYSTEM_MESSAGE);
            assert!((req.temperature - 0.2).abs() < f32::EPSILON);
            tokio::time::sleep(self.delay).await;
            match self.reply {
                Ok(text) => Ok(ChatResponse {
                    content: text.to_string(),
                    model: req.model.clone(),
                    tokens_in: 1,
                    tokens_out: 1,
                    stop_reason: "stop".to_string(),
                }),
                Err(status) => Err(ProviderError::Api {
                    status,
                    message: "nope".to_string(),
                }),
            }
        }
    }

    fn summarizer(reply: Result<&'static str, u16>, delay: Duration) -> (Summarizer, Arc<Fixed>) {
        let provider = Arc::new(Fixed {
            reply,
            calls: AtomicUsize::new(0),
            delay,
        });
        let s = Summarizer::new(
            Some(provider.clone() as Arc<dyn LlmProvider>),
            "gpt-4o-mini",
            0.2,
            Duration::from_millis(200),
        );
        (s, provider)
    }

    #[tokio::test]
    async fn returns_trimmed_text() {
        let (s, p) = summarizer(Ok(" progress \n"), Duration::ZERO);
        assert_eq!(s.summarize("prompt").await.as_deref(), Some("progress"));
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_and_blank_replies_become_none() {
        let (s, _) = summarizer(Err(500), Duration::ZERO);
        assert!(s.summarize("prompt").await.is_none());

        let (s, _) = summarizer(Ok("   "), Duration::ZERO);
        assert!(s.summarize("prompt").await.is_none());
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let (s, _) = summarizer(Ok("late"), Duration::from_secs(5));
        assert!(s.summarize("prompt").await.is_none());
    }

    #[tokio::test]
    async fn missing_credentials_skip_the_call() {
        let s = Summarizer::new(None, "m", 0.2, Duration::from_secs(1));
        assert!(!s.is_configured());
        assert!(s.summarize("prompt").await.is_none());
    }
}
