//! Default Extraction and Summary Service backed by an `edgequake_llm`
//! provider, plus provider resolution from config and environment.

use crate::config::ExtractionConfig;
use crate::error::{LedgerError, ServiceError};
use crate::pipeline::encode::to_image_data;
use crate::prompts::{insight_message, schema_instruction};
use crate::service::{ExtractionRequest, ExtractionService, SummaryRequest, SummaryService};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Both services over one vision-capable chat provider.
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: usize,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        let label = match (&config.provider_name, &config.model) {
            (Some(p), Some(m)) => format!("{p}/{m}"),
            (Some(p), None) => p.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => "llm".to_string(),
        };
        Self {
            provider,
            label,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, LedgerError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ServiceError> {
        let options = self.options();
        let response = self
            .provider
            .chat(messages, Some(&options))
            .await
            .map_err(|e| classify_provider_error(&e.to_string()))?;
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

#[async_trait]
impl ExtractionService for LlmService {
    /// Message layout: system message with the instruction and the schema,
    /// then one user message carrying every frame in order.
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<String, ServiceError> {
        let schema_json = serde_json::to_string_pretty(request.schema)
            .map_err(|e| ServiceError::Provider(format!("schema serialisation: {e}")))?;
        let system = format!("{}\n\n{}", request.instruction, schema_instruction(&schema_json));
        let images = request.frames.iter().map(to_image_data).collect();

        let messages = vec![
            ChatMessage::system(&system),
            ChatMessage::user_with_images("Extract the transactions from these pages.", images),
        ];
        self.chat(&messages).await
    }

    fn name(&self) -> &str {
        &self.label
    }
}

#[async_trait]
impl SummaryService for LlmService {
    async fn summarize(&self, request: SummaryRequest<'_>) -> Result<String, ServiceError> {
        let messages = vec![ChatMessage::user(&insight_message(
            request.instruction,
            request.transactions_json,
        ))];
        self.chat(&messages).await
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Map a provider error message onto the service error taxonomy.
pub fn classify_provider_error(message: &str) -> ServiceError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("401")
        || lower.contains("403")
        || lower.contains("unauthorized")
        || lower.contains("forbidden")
        || lower.contains("invalid api key")
        || lower.contains("authentication")
    {
        ServiceError::Auth(message.to_string())
    } else if lower.contains("429") || lower.contains("rate limit") || lower.contains("quota") {
        ServiceError::RateLimited(message.to_string())
    } else if lower.contains("timed out") || lower.contains("timeout") {
        ServiceError::Transport(message.to_string())
    } else if lower.contains("connection")
        || lower.contains("network")
        || lower.contains("dns")
        || lower.contains("broken pipe")
    {
        ServiceError::Transport(message.to_string())
    } else {
        ServiceError::Provider(message.to_string())
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, LedgerError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        LedgerError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, …).
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **`OPENAI_API_KEY`** present → OpenAI with the configured or default model.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
///
/// Runs once per session; a missing credential surfaces here, before any
/// document is touched.
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, LedgerError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| LedgerError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
