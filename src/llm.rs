//! The LLM boundary (§1, §6): `llm(prompt, schema) -> structured_json`,
//! temperature 0. Treated as a pure function - everything upstream of
//! this trait (chapter segmentation, doctrine extraction, minister
//! synthesis) only ever sees validated, typed output, never raw text.
//!
//! Splits into an HTTP-backed implementation and a deterministic mock
//! so everything downstream of this trait is testable offline.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

/// A structured LLM call at temperature 0. Implementations must be
/// side-effect free beyond the network/process call itself.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Issue a call and return the raw JSON the model produced.
    /// Callers are responsible for validating the shape (§9, "Dynamic
    /// LLM output": validate before trust).
    async fn complete_json(&self, prompt: &str, schema_hint: &str) -> Result<Value>;
}

/// Talks to an OpenAI-compatible `/chat/completions`-style endpoint
/// named by `LLM_ENDPOINT`. Requests JSON output at temperature 0.
pub struct HttpLlm {
    endpoint: String,
    client: reqwest::Client,
    timeout: std::time::Duration,
}

impl HttpLlm {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
            timeout: std::time::Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Llm for HttpLlm {
    async fn complete_json(&self, prompt: &str, schema_hint: &str) -> Result<Value> {
        let body = serde_json::json!({
            "temperature": 0.0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": schema_hint },
                { "role": "user", "content": prompt },
            ],
        });

        let resp = tokio::time::timeout(self.timeout, self.client.post(&self.endpoint).json(&body).send())
            .await
            .context("LLM call timed out")?
            .context("LLM call failed")?;

        let resp = resp.error_for_status().context("LLM endpoint returned an error status")?;
        let parsed: Value = resp.json().await.context("LLM response was not valid JSON")?;

        // Most OpenAI-compatible servers wrap the payload in
        // choices[0].message.content (itself a JSON string); unwrap
        // one layer if present, otherwise assume the body is the
        // structured payload already.
        if let Some(content) = parsed
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
        {
            serde_json::from_str(content).context("LLM message content was not valid JSON")
        } else {
            Ok(parsed)
        }
    }
}

/// Deterministic stand-in for tests and offline pipelines: returns
/// whatever JSON value it was seeded with, regardless of prompt.
pub struct MockLlm {
    pub responses: std::sync::Mutex<std::collections::VecDeque<Value>>,
}

impl MockLlm {
    pub fn new(responses: Vec<Value>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Llm for MockLlm {
    async fn complete_json(&self, _prompt: &str, _schema_hint: &str) -> Result<Value> {
        let mut q = self.responses.lock().unwrap();
        q.pop_front()
            .context("MockLlm exhausted its queued responses")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_llm_returns_queued_responses_in_order() {
        let llm = MockLlm::new(vec![serde_json::json!({"a": 1}), serde_json::json!({"a": 2})]);
        let first = llm.complete_json("p", "s").await.unwrap();
        let second = llm.complete_json("p", "s").await.unwrap();
        assert_eq!(first["a"], 1);
        assert_eq!(second["a"], 2);
    }

    #[tokio::test]
    async fn mock_llm_errors_when_exhausted() {
        let llm = MockLlm::new(vec![]);
        assert!(llm.complete_json("p", "s").await.is_err());
    }
}
