use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// The generative-model collaborator: an opaque text-completion function.
/// Network failures and timeouts surface as errors; the caller decides how
/// far they propagate.
#[async_trait]
pub trait TextCompleter: Send + Sync {
    async fn complete(&self, system_message: Option<&str>, prompt: &str) -> Result<String>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Enum-based provider selection, configured at startup.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    OpenAi(OpenAiProvider),
    Gemini(GeminiProvider),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProviderType {
    OpenAi,
    Gemini,
}

impl LlmProvider {
    pub fn new(
        provider_type: LlmProviderType,
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Self {
        match provider_type {
            LlmProviderType::OpenAi => {
                LlmProvider::OpenAi(OpenAiProvider::new(api_key, base_url, model))
            }
            LlmProviderType::Gemini => {
                LlmProvider::Gemini(GeminiProvider::new(api_key, base_url, model))
            }
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            LlmProvider::OpenAi(provider) => &provider.model,
            LlmProvider::Gemini(provider) => &provider.model,
        }
    }
}

#[async_trait]
impl TextCompleter for LlmProvider {
    async fn complete(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        match self {
            LlmProvider::OpenAi(provider) => provider.complete(system_message, prompt).await,
            LlmProvider::Gemini(provider) => provider.complete(system_message, prompt).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi(_) => "OpenAI",
            LlmProvider::Gemini(_) => "Gemini",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }
    }

    async fn complete(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = system_message {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let body = OpenAiRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.4,
        };

        info!(
            provider = "OpenAI",
            model = %self.model,
            prompt_length = prompt.len(),
            "Making completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(provider = "OpenAI", status = %status, error = %detail, "Completion request failed");
            return Err(anyhow::anyhow!("OpenAI API request failed: {}", detail));
        }

        let parsed: OpenAiResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No choices in OpenAI response"))?;

        Ok(choice.message.content)
    }
}

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: model.unwrap_or_else(|| "gemini-2.0-flash".to_string()),
        }
    }

    async fn complete(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        // Gemini has no separate system slot on this endpoint.
        let full_prompt = match system_message {
            Some(system) => format!("{}\n\n{}", system, prompt),
            None => prompt.to_string(),
        };

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: full_prompt }],
            }],
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        info!(
            provider = "Gemini",
            model = %self.model,
            prompt_length = prompt.len(),
            "Making completion request"
        );

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(provider = "Gemini", status = %status, error = %detail, "Completion request failed");
            return Err(anyhow::anyhow!("Gemini API request failed: {}", detail));
        }

        let parsed: GeminiResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| anyhow::anyhow!("No candidates in Gemini response"))?;

        Ok(text)
    }
}

/// Pulls the JSON payload out of a model response that may be wrapped in
/// markdown fences or surrounded by prose.
pub fn extract_json(content: &str) -> &str {
    if let Some(block) = fenced_block(content, "```json").or_else(|| fenced_block(content, "```")) {
        if block.starts_with('{') || block.starts_with('[') {
            return block;
        }
    }

    if let Some(span) = delimited_span(content, '{', '}').or_else(|| delimited_span(content, '[', ']'))
    {
        return span;
    }

    content.trim()
}

fn fenced_block<'a>(content: &'a str, fence: &str) -> Option<&'a str> {
    let start = content.find(fence)? + fence.len();
    let end = content[start..].find("```")?;
    Some(content[start..start + end].trim())
}

fn delimited_span(content: &str, open: char, close: char) -> Option<&str> {
    let start = content.find(open)?;
    let end = content.rfind(close)?;
    (end > start).then(|| &content[start..=end])
}

/// Parses a model response into a typed value after JSON extraction.
pub fn parse_json_response<T>(content: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let json = extract_json(content);
    serde_json::from_str::<T>(json)
        .map_err(|e| anyhow::anyhow!("Failed to parse JSON response: {}", e))
}
