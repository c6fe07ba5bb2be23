use super::history::ConversationHistory;
use super::parse::{parse_response, EnrichmentResult, InputKind};
use super::prompts::{TEXT_PROMPT, VOICE_PROMPT};
use super::provider::CompletionProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::warn;

/// Tuning for the enrichment path
#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    /// Conversation turns kept as completion context
    pub max_history: usize,

    /// Delay before the single retry of a failed completion call
    pub retry_delay: Duration,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            max_history: 20,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl From<&crate::config::EnrichmentConfig> for EnrichmentSettings {
    fn from(cfg: &crate::config::EnrichmentConfig) -> Self {
        Self {
            max_history: cfg.max_history,
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
        }
    }
}

/// Turns finalized text into structured insight via the completion provider
///
/// Failures never escape this boundary: a failed call (after one delayed
/// retry) degrades to an explanatory result, so one bad completion cannot
/// interrupt a live session.
pub struct EnrichmentDispatcher {
    provider: Arc<dyn CompletionProvider>,
    history: Mutex<ConversationHistory>,
    retry_delay: Duration,
}

impl EnrichmentDispatcher {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: EnrichmentSettings) -> Self {
        Self {
            provider,
            history: Mutex::new(ConversationHistory::new(settings.max_history)),
            retry_delay: settings.retry_delay,
        }
    }

    /// Record a typed conversation turn without dispatching a completion
    pub async fn record_turn(&self, text: &str) {
        self.history.lock().await.push(text);
    }

    /// Enrich one turn. The prompt embeds prior history, newest text last.
    pub async fn process_text(&self, text: &str, kind: InputKind) -> EnrichmentResult {
        let prompt = {
            let mut history = self.history.lock().await;
            history.push(text);
            history.contextual_prompt(text)
        };
        let system_prompt = match kind {
            InputKind::Voice => VOICE_PROMPT,
            InputKind::Typed => TEXT_PROMPT,
        };

        let raw = match self.provider.complete(system_prompt, &prompt).await {
            Ok(raw) => raw,
            Err(first) => {
                warn!("completion call failed, retrying once: {first:#}");
                sleep(self.retry_delay).await;
                match self.provider.complete(system_prompt, &prompt).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!("completion retry failed: {e:#}");
                        return EnrichmentResult::failure(format!(
                            "Enrichment request failed: {e:#}"
                        ));
                    }
                }
            }
        };

        parse_response(&raw, kind).into()
    }
}
