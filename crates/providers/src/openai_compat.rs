//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Azure OpenAI (same wire format, different URL and
//! auth header), Ollama, vLLM, and anything else that follows the OpenAI
//! chat completions contract.

use ac_domain::error::{Error, Result};
use ac_domain::usage::Usage;
use serde_json::{json, Value};

use crate::traits::{ModelClient, ModelReply, ModelRequest, Role, ToolCallRequest};
use crate::util::from_reqwest;

pub struct OpenAiCompatClient {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_model: "gpt-4o".into(),
            client,
        })
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn effective_model(&self, req: &ModelRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn build_body(&self, req: &ModelRequest) -> Value {
        let messages: Vec<Value> = req
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({ "role": role, "content": m.content })
            })
            .collect();

        let mut body = json!({
            "model": self.effective_model(req),
            "messages": messages,
        });
        if let Some(t) = req.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(m) = req.max_tokens {
            body["max_tokens"] = json!(m);
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }
        body
    }

    fn parse_response(&self, body: Value) -> Result<ModelReply> {
        let choice = body["choices"].get(0).ok_or_else(|| Error::Provider {
            provider: self.id.clone(),
            message: "response had no choices".into(),
        })?;
        let message = &choice["message"];
        let content = message["content"].as_str().unwrap_or_default().to_string();
        let finish_reason = choice["finish_reason"].as_str().map(str::to_string);

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|c| {
                        let name = c["function"]["name"].as_str()?.to_string();
                        let args_str = c["function"]["arguments"].as_str().unwrap_or("{}");
                        let arguments: Value =
                            serde_json::from_str(args_str).unwrap_or(Value::Null);
                        Some(ToolCallRequest {
                            tool_name: name,
                            arguments,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let usage_obj = &body["usage"];
        let usage = Usage::new(
            usage_obj["prompt_tokens"].as_u64().unwrap_or(0),
            usage_obj["completion_tokens"].as_u64().unwrap_or(0),
            usage_obj["prompt_tokens_details"]["cached_tokens"]
                .as_u64()
                .unwrap_or(0),
            0,
        );

        let model = body["model"].as_str().unwrap_or_default().to_string();

        Ok(ModelReply {
            content,
            tool_calls,
            usage,
            model,
            finish_reason,
        })
    }
}

#[async_trait::async_trait]
impl ModelClient for OpenAiCompatClient {
    async fn complete(&self, req: ModelRequest) -> Result<ModelReply> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&req);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {status}: {text}"),
            });
        }

        let parsed: Value = resp.json().await.map_err(from_reqwest)?;
        self.parse_response(parsed)
    }

    fn client_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ModelMessage;

    #[test]
    fn build_body_includes_messages_and_model() {
        let client =
            OpenAiCompatClient::new("test", "http://localhost:1234/v1", "sk-test").unwrap();
        let req = ModelRequest {
            messages: vec![ModelMessage {
                role: Role::User,
                content: "hello".into(),
            }],
            ..Default::default()
        };
        let body = client.build_body(&req);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[test]
    fn parse_response_extracts_usage_and_content() {
        let client =
            OpenAiCompatClient::new("test", "http://localhost:1234/v1", "sk-test").unwrap();
        let raw = json!({
            "model": "gpt-4o",
            "choices": [{
                "message": { "content": "hi there" },
                "finish_reason": "stop",
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 4 },
        });
        let reply = client.parse_response(raw).unwrap();
        assert_eq!(reply.content, "hi there");
        assert_eq!(reply.usage.input_tokens, 10);
        assert_eq!(reply.usage.output_tokens, 4);
        assert_eq!(reply.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn parse_response_missing_choices_is_an_error() {
        let client =
            OpenAiCompatClient::new("test", "http://localhost:1234/v1", "sk-test").unwrap();
        let raw = json!({ "model": "gpt-4o", "choices": [] });
        assert!(client.parse_response(raw).is_err());
    }
}
