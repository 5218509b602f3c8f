use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("provider response missing text content")]
    EmptyResponse,
}

/// A hosted vision model that can answer a text prompt about an image.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Model identifier reported in API responses (e.g. `gemini-2.0-flash`).
    fn model_name(&self) -> &str;

    /// Send the image plus prompt, return the model's raw text reply.
    async fn generate(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, VisionError>;
}

#[async_trait]
impl<P: VisionProvider + ?Sized> VisionProvider for Box<P> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    async fn generate(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, VisionError> {
        (**self).generate(image_bytes, mime_type, prompt).await
    }
}

// ── Gemini ────────────────────────────────────────────────────────────────────

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), model: model.into() }
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, VisionError> {
        debug!(model = %self.model, "calling Gemini generateContent");
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [
                { "text": prompt },
                { "inlineData": { "mimeType": mime_type, "data": STANDARD.encode(image_bytes) } }
            ]}],
            "generationConfig": { "temperature": 0.1 }
        });

        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(VisionError::Provider {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let json: serde_json::Value = resp.json().await?;
        json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or(VisionError::EmptyResponse)
    }
}

// ── OpenAI ────────────────────────────────────────────────────────────────────

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), model: model.into() }
    }
}

#[async_trait]
impl VisionProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, VisionError> {
        debug!(model = %self.model, "calling OpenAI chat completions");
        let data_url = format!("data:{};base64,{}", mime_type, STANDARD.encode(image_bytes));
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url, "detail": "high" } }
                ]
            }],
            "max_tokens": 1000,
            "temperature": 0.1
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(VisionError::Provider {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let json: serde_json::Value = resp.json().await?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(VisionError::EmptyResponse)
    }
}

// ── Mock ──────────────────────────────────────────────────────────────────────

/// Returns a canned reply; lets the analyzer be tested offline.
pub struct MockProvider {
    pub reply: String,
}

impl MockProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}

#[async_trait]
impl VisionProvider for MockProvider {
    fn model_name(&self) -> &str {
        "mock-vision"
    }

    async fn generate(
        &self,
        _image_bytes: &[u8],
        _mime_type: &str,
        _prompt: &str,
    ) -> Result<String, VisionError> {
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_ignores_inputs() {
        let p = MockProvider::new("hello");
        assert_eq!(p.generate(b"img", "image/png", "prompt").await.unwrap(), "hello");
        assert_eq!(p.model_name(), "mock-vision");
    }
}
