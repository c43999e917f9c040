//! Google Gemini `generateContent` client.
//!
//! Sends the page image as base64 inline data together with the system
//! instruction and asks for a JSON response. Requires an API key from
//! `llm-config.json` or `GEMINI_API_KEY`.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzer::PageAnalyzer;
use crate::config::ExtractorConfig;
use crate::prompt::PAGE_PROMPT;
use crate::types::{CallError, PageBlob};
use probdex_core::{Error, Result};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "thinkingConfig")]
    thinking_config: GeminiThinkingConfig,
}

#[derive(Debug, Serialize)]
struct GeminiThinkingConfig {
    #[serde(rename = "thinkingBudget")]
    thinking_budget: i32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

/// Gemini vision client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    thinking_budget: i32,
}

impl GeminiClient {
    /// Build a client from configuration. Fails without an API key.
    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            Error::Config(
                "No Gemini API key: set api_key in llm-config.json or GEMINI_API_KEY".to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.call_timeout())
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            thinking_budget: config.thinking_budget(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, page: &PageBlob, instruction: &str) -> GeminiRequest {
        GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    text: instruction.to_string(),
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user".into()),
                parts: vec![
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: page.mime_type.clone(),
                            data: base64::engine::general_purpose::STANDARD.encode(&page.bytes),
                        },
                    },
                    GeminiPart::Text {
                        text: PAGE_PROMPT.to_string(),
                    },
                ],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                response_mime_type: "application/json".into(),
                thinking_config: GeminiThinkingConfig {
                    thinking_budget: self.thinking_budget,
                },
            },
        }
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(response: GeminiResponse) -> std::result::Result<String, CallError> {
    if let Some(error) = response.error {
        return Err(CallError::Malformed(format!("Gemini API error: {}", error.message)));
    }
    let text: String = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(CallError::Empty)
    } else {
        Ok(text)
    }
}

#[async_trait]
impl PageAnalyzer for GeminiClient {
    async fn analyze(&self, page: &PageBlob, instruction: &str) -> std::result::Result<String, CallError> {
        let url = format!("{}/{}:generateContent?key={}", API_BASE, self.model, self.api_key);
        let request = self.build_request(page, instruction);

        debug!("Gemini request: model={}, page={}, {} bytes", self.model, page.page, page.bytes.len());

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::from_status(status.as_u16(), body));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| CallError::Transport(format!("Failed to read response: {}", e)))?;
        response_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        let config = ExtractorConfig {
            api_key: Some("test-key".into()),
            ..Default::default()
        };
        GeminiClient::from_config(&config).unwrap()
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let config = ExtractorConfig::default();
        assert!(matches!(GeminiClient::from_config(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_request_shape() {
        let page = PageBlob {
            page: 1,
            bytes: b"png".to_vec(),
            mime_type: "image/png".into(),
            image_name: None,
        };
        let value = serde_json::to_value(client().build_request(&page, "rules")).unwrap();

        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "rules");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["inline_data"]["mime_type"], "image/png");
        assert_eq!(value["contents"][0]["parts"][0]["inline_data"]["data"], "cG5n");
        assert_eq!(value["contents"][0]["parts"][1]["text"], PAGE_PROMPT);
        assert_eq!(value["generationConfig"]["temperature"], 0.0);
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(value["generationConfig"]["thinkingConfig"]["thinkingBudget"], 32768);
    }

    #[test]
    fn test_response_text() {
        let ok: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"problems\""}, {"text": ": []}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(ok).unwrap(), "{\"problems\": []}");

        let empty: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(response_text(empty), Err(CallError::Empty));

        let blocked: GeminiResponse = serde_json::from_str(r#"{"candidates": [{}]}"#).unwrap();
        assert_eq!(response_text(blocked), Err(CallError::Empty));

        let error: GeminiResponse =
            serde_json::from_str(r#"{"error": {"message": "quota"}}"#).unwrap();
        assert!(matches!(response_text(error), Err(CallError::Malformed(_))));
    }
}
