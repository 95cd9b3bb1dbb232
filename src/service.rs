//! Request orchestration: resolves configuration, builds the provider
//! request, dispatches it once and normalizes the answer.

pub mod transport;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::attachment::{self, FileData};
use crate::error::AiError;
use crate::provider::{ModelDefinition, ProviderDefinition, ProviderRegistry};
use crate::response::{self, NormalizedResponse};
use crate::settings::{ModelSettings, RequestContext};
use crate::template::{self, substitute_variables, Bindings, TemplateEngine};

pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// System prompt sent by [`AiService::test_connection`].
pub const PROBE_SYSTEM_PROMPT: &str = "Teste de conexão";
/// User prompt sent by [`AiService::test_connection`].
pub const PROBE_USER_PROMPT: &str = "Olá";
/// Output token limit sent by [`AiService::test_connection`].
pub const PROBE_MAX_TOKENS: &str = "10";

/// Outcome of [`AiService::test_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Whether the provider answered 2xx.
    pub success: bool,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: &AiError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Provider-agnostic AI request service.
///
/// Holds no per-call state; concurrent calls share the registry read-only.
pub struct AiService {
    registry: Arc<ProviderRegistry>,
    transport: Box<dyn HttpTransport>,
}

impl AiService {
    /// Creates a service using the default `reqwest` transport.
    pub fn new(registry: impl Into<Arc<ProviderRegistry>>) -> Self {
        Self::with_transport(registry, Box::new(ReqwestTransport::new()))
    }

    /// Creates a service with a custom transport.
    pub fn with_transport(
        registry: impl Into<Arc<ProviderRegistry>>,
        transport: Box<dyn HttpTransport>,
    ) -> Self {
        Self {
            registry: registry.into(),
            transport,
        }
    }

    /// The provider registry.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Generates a response for `ctx`.
    ///
    /// Never fails: every error is reported through
    /// [`NormalizedResponse::error`].
    pub async fn generate_response(&self, ctx: &RequestContext) -> NormalizedResponse {
        match self.try_generate(ctx).await {
            Ok(response) => response,
            Err(e) if e.is_pre_flight() => {
                info!(
                    provider = %ctx.settings.provider,
                    model = %ctx.settings.model,
                    error = %e,
                    "Request rejected before dispatch"
                );
                NormalizedResponse::failure(e.to_string())
            }
            Err(e) => {
                warn!(
                    provider = %ctx.settings.provider,
                    model = %ctx.settings.model,
                    error = %e,
                    "Generation failed"
                );
                NormalizedResponse::failure(e.to_string())
            }
        }
    }

    /// Sends a fixed probe request to check credentials and reachability.
    /// The response body is not inspected.
    pub async fn test_connection(&self, settings: &ModelSettings) -> ConnectionStatus {
        let result = async {
            let request = self.prepare_probe(settings)?;
            self.send_checked(&request).await.map(|_| ())
        }
        .await;

        match result {
            Ok(()) => {
                info!(provider = %settings.provider, "Connection test succeeded");
                ConnectionStatus::ok()
            }
            Err(e) => {
                warn!(provider = %settings.provider, error = %e, "Connection test failed");
                ConnectionStatus::failed(&e)
            }
        }
    }

    /// Builds the concrete HTTP request for `ctx` without sending it.
    pub fn prepare_request(&self, ctx: &RequestContext) -> Result<HttpRequest, AiError> {
        let settings = &ctx.settings;
        let (provider, model, api_key) = self.resolve(settings)?;

        let mut prompt = substitute_variables(&ctx.prompt, &ctx.variables);
        let system_prompt = substitute_variables(&ctx.system_prompt, &ctx.variables);

        let mut file_data = None;
        if let Some(file) = &ctx.attached_file {
            debug!(file = %file.name, mime_type = %file.mime_type, size = file.size, "Processing attachment");
            let processed = attachment::process(file, model, &prompt)?;
            prompt = processed.prompt;
            file_data = processed.file_data;
        }

        let full_prompt = if system_prompt.is_empty() {
            prompt.clone()
        } else {
            format!("{system_prompt}\n\n{prompt}")
        };

        let mut bindings = sampling_bindings(settings);
        bindings.extend([
            ("model".to_string(), model.name.clone()),
            ("systemPrompt".to_string(), system_prompt),
            ("userPrompt".to_string(), prompt.clone()),
            ("fullPrompt".to_string(), full_prompt),
        ]);
        if let Some(data) = &file_data {
            bindings.extend(file_bindings(data));
        }

        let coercions = self.registry.coercions_for(&provider.id).clone();
        let engine = TemplateEngine::new(&bindings).with_coercions(coercions);

        let body = match (file_data.as_ref(), provider.file_processing()) {
            (Some(data), Some(processing)) => {
                let blocks =
                    attachment::build_content(&prompt, Some(data), &processing.content_structure);
                debug!(blocks = blocks.len(), strategy = ?processing.strategy, "Built multimodal content");
                engine.with_content(&blocks).apply(&provider.request_format.body)
            }
            _ => engine.apply(&provider.request_format.body),
        };

        Ok(build_http_request(provider, model, api_key, body))
    }

    fn prepare_probe(&self, settings: &ModelSettings) -> Result<HttpRequest, AiError> {
        let (provider, model, api_key) = self.resolve(settings)?;

        let bindings: Bindings = [
            ("model", model.name.as_str()),
            ("systemPrompt", PROBE_SYSTEM_PROMPT),
            ("userPrompt", PROBE_USER_PROMPT),
            ("fullPrompt", "Teste de conexão\n\nOlá"),
            ("temperature", "0.7"),
            ("maxTokens", PROBE_MAX_TOKENS),
            ("topP", "1"),
            ("frequencyPenalty", "0"),
            ("presencePenalty", "0"),
            ("topK", "1"),
            ("seed", "null"),
            ("stopSequences", "[]"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let body = TemplateEngine::new(&bindings)
            .with_coercions(self.registry.coercions_for(&provider.id).clone())
            .apply(&provider.request_format.body);

        Ok(build_http_request(provider, model, api_key, body))
    }

    fn resolve<'s>(
        &'s self,
        settings: &'s ModelSettings,
    ) -> Result<(&'s ProviderDefinition, &'s ModelDefinition, &'s str), AiError> {
        let (provider, model) = self.registry.resolve(&settings.provider, &settings.model)?;
        let api_key = settings
            .api_key()
            .ok_or_else(|| AiError::MissingApiKey(settings.provider.clone()))?;
        Ok((provider, model, api_key))
    }

    async fn try_generate(&self, ctx: &RequestContext) -> Result<NormalizedResponse, AiError> {
        let request = self.prepare_request(ctx)?;
        let response = self.send_checked(&request).await?;
        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;
        let provider = self
            .registry
            .provider(&ctx.settings.provider)
            .ok_or_else(|| AiError::ProviderNotFound(ctx.settings.provider.clone()))?;
        Ok(self.interpret(provider, body))
    }

    /// Sends `request` once. Non-2xx answers become [`AiError::Http`]; the
    /// body of a 2xx answer is returned unparsed.
    async fn send_checked(&self, request: &HttpRequest) -> Result<HttpResponse, AiError> {
        debug!(
            method = %request.method,
            headers = request.headers.len(),
            "Dispatching provider request"
        );

        let response = self.transport.send(request).await?;
        debug!(status = response.status, body_len = response.body.len(), "Received provider response");

        if !response.is_success() {
            return Err(http_error(&response));
        }
        Ok(response)
    }

    fn interpret(&self, provider: &ProviderDefinition, body: Value) -> NormalizedResponse {
        let extracted = response::extract_fields(&body, &provider.response_format);

        if let Some(message) = extracted.error {
            let error = AiError::Provider(message);
            warn!(provider = %provider.id, error = %error, "Provider reported an error in the response body");
            return NormalizedResponse {
                content: String::new(),
                usage: None,
                error: Some(error.to_string()),
                raw: Some(body),
            };
        }

        let usage = extracted
            .usage
            .map(|block| self.registry.usage_normalizer().normalize(block, &provider.id));

        info!(
            provider = %provider.id,
            content_len = extracted.content.len(),
            total_tokens = usage.as_ref().map(|u| u.total_tokens),
            "Generation succeeded"
        );

        NormalizedResponse {
            content: extracted.content,
            usage,
            error: None,
            raw: Some(body),
        }
    }
}

fn sampling_bindings(settings: &ModelSettings) -> Bindings {
    let stop_sequences = settings.stop_sequences.as_deref().unwrap_or_default();
    let stop_sequences = serde_json::to_string(stop_sequences).unwrap_or_else(|_| "[]".to_string());

    [
        ("temperature", settings.temperature.to_string()),
        ("maxTokens", settings.max_tokens.to_string()),
        ("topP", settings.top_p.to_string()),
        ("frequencyPenalty", settings.frequency_penalty.to_string()),
        ("presencePenalty", settings.presence_penalty.to_string()),
        ("topK", settings.top_k.unwrap_or(1).to_string()),
        (
            "seed",
            settings
                .seed
                .map_or_else(|| "null".to_string(), |s| s.to_string()),
        ),
        ("stopSequences", stop_sequences),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn file_bindings(data: &FileData) -> [(String, String); 3] {
    [
        ("fileName".to_string(), data.file_name.clone()),
        ("fileType".to_string(), data.mime_type.clone()),
        ("fileData".to_string(), data.data.clone()),
    ]
}

fn build_http_request(
    provider: &ProviderDefinition,
    model: &ModelDefinition,
    api_key: &str,
    body: Value,
) -> HttpRequest {
    let wire = Bindings::from([
        ("model".to_string(), model.name.clone()),
        ("apiKey".to_string(), api_key.to_string()),
    ]);

    let endpoint = template::render(&provider.request_format.endpoint, &wire);
    let headers = provider
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), template::render(value, &wire)))
        .collect();

    HttpRequest {
        method: provider.request_format.method.clone(),
        url: format!("{}{}", provider.base_url, endpoint),
        headers,
        body,
    }
}

fn http_error(response: &HttpResponse) -> AiError {
    let message = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|body| {
            body.pointer("/error/message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {}: {}", response.status, response.status_text));

    AiError::Http {
        status: response.status,
        message,
    }
}
