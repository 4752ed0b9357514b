//! Shipment-field extraction: ask an LLM to read the label markup.
//!
//! The markup is truncated to a bounded prefix, sent with a schema-carrying
//! system prompt, and the JSON reply is parsed into [`ShipmentMetadata`].
//! Any failure (provider error, empty reply, malformed or incomplete JSON)
//! yields `None`. Extraction is a nice-to-have: it never decides whether a
//! label is usable.
//!
//! ## No key, no extractor
//!
//! [`resolve_extractor`] returns `None` when no API key is configured. That
//! is the offline mode, not an error: the desk simply never calls extraction.

use crate::config::DeskConfig;
use crate::item::ShipmentMetadata;
use crate::prompts::{extraction_system_message, extraction_user_message};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Something that infers shipment fields from label markup.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// `None` means nothing usable could be extracted.
    async fn extract(&self, markup: &str) -> Option<ShipmentMetadata>;
}

/// [`Extractor`] backed by any edgequake-llm provider.
pub struct LlmExtractor {
    provider: Arc<dyn LLMProvider>,
    char_limit: usize,
    options: CompletionOptions,
}

impl LlmExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &DeskConfig) -> Self {
        Self {
            provider,
            char_limit: config.extraction_char_limit,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, markup: &str) -> Option<ShipmentMetadata> {
        let start = Instant::now();
        let snippet = truncate_chars(markup, self.char_limit);
        let messages = vec![
            ChatMessage::system(extraction_system_message()),
            ChatMessage::user(extraction_user_message(snippet)),
        ];

        match self.provider.chat(&messages, Some(&self.options)).await {
            Ok(response) => {
                debug!(
                    "Extraction: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                let parsed = parse_shipment(&response.content);
                if parsed.is_none() {
                    warn!("Extraction reply did not match the shipment schema");
                }
                parsed
            }
            Err(e) => {
                warn!("Extraction call failed: {}", e);
                None
            }
        }
    }
}

/// Build `CompletionOptions` from the desk config.
fn build_options(config: &DeskConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// First `limit` characters of `s` (not bytes, so multi-byte text is safe).
pub fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*?)\n?```\s*$").unwrap());

/// Parse the model's reply. Tolerates a ```json fence around the object.
pub fn parse_shipment(reply: &str) -> Option<ShipmentMetadata> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return None;
    }
    let body = RE_JSON_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    match serde_json::from_str::<ShipmentMetadata>(body) {
        Ok(meta) => Some(meta),
        Err(e) => {
            debug!("Unparseable extraction reply: {}", e);
            None
        }
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Providers that can be auto-detected, in preference order, with the
/// environment variable holding their key and a cheap default model.
const KEYED_PROVIDERS: [(&str, &str, &str); 4] = [
    ("gemini", "GEMINI_API_KEY", "gemini-2.5-flash"),
    ("openai", "OPENAI_API_KEY", "gpt-4.1-nano"),
    ("anthropic", "ANTHROPIC_API_KEY", "claude-haiku-4-20250514"),
    ("mistral", "MISTRAL_API_KEY", "mistral-small-latest"),
];

/// Local providers need no key.
const LOCAL_PROVIDERS: [(&str, &str); 2] = [("ollama", "llama3.2"), ("lmstudio", "local-model")];

fn env_present(var: &str) -> bool {
    std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn default_model(provider: &str) -> Option<&'static str> {
    KEYED_PROVIDERS
        .iter()
        .find(|(name, _, _)| *name == provider)
        .map(|(_, _, model)| *model)
        .or_else(|| {
            LOCAL_PROVIDERS
                .iter()
                .find(|(name, _)| *name == provider)
                .map(|(_, model)| *model)
        })
}

/// `true` if a credential for `provider` is available (or none is needed).
fn credential_available(provider: &str) -> bool {
    if LOCAL_PROVIDERS.iter().any(|(name, _)| *name == provider) {
        return true;
    }
    match KEYED_PROVIDERS.iter().find(|(name, _, _)| *name == provider) {
        Some((_, var, _)) => env_present(var),
        // Unknown to us: let the factory decide.
        None => true,
    }
}

fn create_provider(name: &str, model: &str) -> Option<Arc<dyn LLMProvider>> {
    match ProviderFactory::create_llm_provider(name, model) {
        Ok(provider) => Some(provider),
        Err(e) => {
            warn!("Could not initialise LLM provider '{}': {}", name, e);
            None
        }
    }
}

/// Resolve the extraction provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
/// 2. **Named provider** (`config.provider_name`): only if its API key is
///    present (local providers need none).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **First provider with a key**, Gemini first.
///
/// Returns `None` when extraction is disabled or no credential is found.
pub fn resolve_extractor(config: &DeskConfig) -> Option<Arc<dyn Extractor>> {
    if !config.extraction_enabled {
        info!("Shipment extraction disabled");
        return None;
    }

    let provider = resolve_provider(config);
    if provider.is_none() {
        info!("No LLM API key configured; running without shipment extraction");
    }
    provider.map(|p| Arc::new(LlmExtractor::new(p, config)) as Arc<dyn Extractor>)
}

fn resolve_provider(config: &DeskConfig) -> Option<Arc<dyn LLMProvider>> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Some(Arc::clone(provider));
    }

    // 2) Named provider, gated on its key
    if let Some(ref name) = config.provider_name {
        let name = name.to_lowercase();
        if !credential_available(&name) {
            warn!("Provider '{}' selected but its API key is not set", name);
            return None;
        }
        let model = config
            .model
            .as_deref()
            .or_else(|| default_model(&name))
            .unwrap_or("default");
        return create_provider(&name, model);
    }

    // 3) Environment pair
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() && credential_available(&prov) {
            return create_provider(&prov, &model);
        }
    }

    // 4) First provider whose key is present
    KEYED_PROVIDERS
        .iter()
        .find(|(_, var, _)| env_present(var))
        .and_then(|(name, _, model)| {
            let model = config.model.as_deref().unwrap_or(model);
            create_provider(name, model)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&DeskConfig::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(512));
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("são paulo", 3), "são");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn truncate_at_extraction_limit() {
        let long = "^FDx".repeat(3000);
        assert_eq!(truncate_chars(&long, 5000).chars().count(), 5000);
    }

    #[test]
    fn parse_plain_json() {
        let meta = parse_shipment(
            r#"{"recipientName":"Maria Silva","trackingNumber":"BR123456789BR","carrier":"Correios","destination":"Campinas, SP"}"#,
        )
        .expect("valid reply");
        assert_eq!(meta.carrier, "Correios");
        assert_eq!(meta.tracking_number, "BR123456789BR");
    }

    #[test]
    fn parse_fenced_json() {
        let reply = "```json\n{\"recipientName\":\"A\",\"trackingNumber\":\"T\",\"carrier\":\"C\",\"destination\":\"D\"}\n```";
        assert!(parse_shipment(reply).is_some());
    }

    #[test]
    fn parse_rejects_missing_field() {
        let reply = r#"{"recipientName":"A","trackingNumber":"T","carrier":"C"}"#;
        assert!(parse_shipment(reply).is_none());
    }

    #[test]
    fn parse_rejects_empty_and_prose() {
        assert!(parse_shipment("").is_none());
        assert!(parse_shipment("   ").is_none());
        assert!(parse_shipment("I could not read this label.").is_none());
    }

    #[test]
    fn disabled_extraction_resolves_to_none() {
        let config = DeskConfig::builder()
            .extraction_enabled(false)
            .build()
            .unwrap();
        assert!(resolve_extractor(&config).is_none());
    }

    // ── LlmExtractor against in-process providers ──

    use crate::config::DEFAULT_EXTRACTION_CHAR_LIMIT;
    use edgequake_llm::{ChatRole, LLMResponse, LlmError, MockProvider};
    use std::sync::Mutex;

    const REPLY: &str = r#"{"recipientName":"Maria Silva","trackingNumber":"BR123456789BR","carrier":"Correios","destination":"Campinas, SP"}"#;

    /// Keeps the messages it was sent and answers with `reply`, or fails.
    struct RecordingProvider {
        reply: Option<String>,
        seen: Mutex<Vec<ChatMessage>>,
    }

    impl RecordingProvider {
        fn answering(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "recording-model"
        }

        fn max_context_length(&self) -> usize {
            32_000
        }

        async fn complete(&self, prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], None).await
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], Some(options)).await
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            match self.reply {
                Some(ref reply) => Ok(LLMResponse::new(reply.clone(), "recording-model")),
                None => Err(LlmError::ApiError("quota exhausted".into())),
            }
        }
    }

    fn extractor_for(provider: Arc<dyn LLMProvider>) -> LlmExtractor {
        LlmExtractor::new(provider, &DeskConfig::default())
    }

    #[tokio::test]
    async fn extract_parses_mock_reply() {
        let provider = MockProvider::new();
        provider.add_response(REPLY).await;

        let meta = extractor_for(Arc::new(provider))
            .extract("^XA^FDMaria Silva^FS^XZ")
            .await
            .expect("metadata");
        assert_eq!(meta.recipient_name, "Maria Silva");
        assert_eq!(meta.destination, "Campinas, SP");
    }

    #[tokio::test]
    async fn extract_parses_fenced_reply() {
        let provider = MockProvider::new();
        provider.add_response(format!("```json\n{REPLY}\n```")).await;

        let meta = extractor_for(Arc::new(provider))
            .extract(&"x".repeat(9000))
            .await
            .expect("metadata");
        assert_eq!(meta.carrier, "Correios");
    }

    #[tokio::test]
    async fn extract_sends_at_most_char_limit_of_markup() {
        let provider = RecordingProvider::answering(REPLY);
        let markup = "é".repeat(9000);

        let meta = extractor_for(provider.clone()).extract(&markup).await;
        assert!(meta.is_some());

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, ChatRole::System);
        assert_eq!(seen[1].role, ChatRole::User);
        let sent = seen[1]
            .content
            .strip_prefix("ZPL code:\n\n")
            .expect("user message prefix");
        assert_eq!(sent.chars().count(), DEFAULT_EXTRACTION_CHAR_LIMIT);
        assert!(markup.starts_with(sent));
    }

    #[tokio::test]
    async fn extract_short_markup_is_sent_whole() {
        let provider = RecordingProvider::answering(REPLY);
        extractor_for(provider.clone()).extract("^XA^XZ").await;

        let seen = provider.seen.lock().unwrap();
        assert!(seen[1].content.ends_with("^XA^XZ"));
    }

    #[tokio::test]
    async fn provider_error_yields_none() {
        let provider = RecordingProvider::failing();
        assert!(extractor_for(provider.clone()).extract("^XA^XZ").await.is_none());
        assert_eq!(provider.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unusable_reply_yields_none() {
        let provider = RecordingProvider::answering("Sorry, I cannot read this label.");
        assert!(extractor_for(provider).extract("^XA^XZ").await.is_none());
    }

    #[test]
    fn local_providers_need_no_key() {
        assert!(credential_available("ollama"));
        assert!(credential_available("lmstudio"));
        assert_eq!(default_model("gemini"), Some("gemini-2.5-flash"));
        assert_eq!(default_model("nope"), None);
    }
}
