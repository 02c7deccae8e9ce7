//! Request bodies, endpoints and response parsing for each backend.

use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::{BackendKind, LlmConfig, DEFAULT_OLLAMA_ENDPOINT};
use crate::error::{LlmError, Result};

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Characters of an error body kept in error messages.
const ERROR_BODY_CHARS: usize = 320;

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Where to POST for `config`.
pub fn endpoint(config: &LlmConfig) -> Result<Url> {
    let endpoint = config.endpoint.as_deref();
    let raw = match config.backend {
        BackendKind::OpenAi => {
            let endpoint = endpoint.unwrap_or(DEFAULT_OPENAI_ENDPOINT);
            if endpoint.contains("/chat/completions") {
                endpoint.to_string()
            } else {
                format!("{}/chat/completions", endpoint.trim_end_matches('/'))
            }
        }
        BackendKind::Ollama => {
            let endpoint = endpoint.unwrap_or(DEFAULT_OLLAMA_ENDPOINT);
            if endpoint.ends_with("/api/generate") {
                endpoint.to_string()
            } else {
                format!("{}/api/generate", endpoint.trim_end_matches('/'))
            }
        }
        BackendKind::Gemini => {
            let endpoint = endpoint.unwrap_or(DEFAULT_GEMINI_ENDPOINT);
            if endpoint.contains(":generateContent") {
                endpoint.to_string()
            } else {
                format!(
                    "{}/v1beta/models/{}:generateContent",
                    endpoint.trim_end_matches('/'),
                    config.model()
                )
            }
        }
    };

    let mut url = Url::parse(&raw).map_err(|e| LlmError::Endpoint {
        backend: config.backend.as_str(),
        endpoint: raw.clone(),
        message: e.to_string(),
    })?;
    if config.backend == BackendKind::Gemini && !url.query_pairs().any(|(k, _)| k == "key") {
        if let Some(key) = config.api_key.as_deref() {
            url.query_pairs_mut().append_pair("key", key);
        }
    }
    Ok(url)
}

/// JSON body for one prompt.
pub fn payload(config: &LlmConfig, prompt: &str) -> Value {
    match config.backend {
        BackendKind::OpenAi => {
            let mut payload = json!({
                "model": config.model(),
                "messages": [{"role": "user", "content": prompt}],
            });
            if let Some(temp) = config.temperature {
                payload["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = config.max_tokens {
                payload["max_tokens"] = json!(max_tokens);
            }
            payload
        }
        BackendKind::Ollama => {
            let mut payload = json!({
                "model": config.model(),
                "prompt": prompt,
                "stream": false,
            });
            let mut options = Map::new();
            if let Some(temp) = config.temperature {
                options.insert("temperature".to_string(), json!(temp));
            }
            if let Some(max_tokens) = config.max_tokens {
                options.insert("num_predict".to_string(), json!(max_tokens));
            }
            if !options.is_empty() {
                payload["options"] = Value::Object(options);
            }
            payload
        }
        BackendKind::Gemini => {
            let mut payload = json!({
                "contents": [{"parts": [{"text": prompt}]}],
            });
            let mut generation = Map::new();
            if let Some(temp) = config.temperature {
                generation.insert("temperature".to_string(), json!(temp));
            }
            if let Some(max_tokens) = config.max_tokens {
                generation.insert("maxOutputTokens".to_string(), json!(max_tokens));
            }
            if !generation.is_empty() {
                payload["generationConfig"] = Value::Object(generation);
            }
            payload
        }
    }
}

/// Pull the completion text out of a successful response body.
pub fn parse_response(backend: BackendKind, body: &str) -> Result<String> {
    let invalid = |e: serde_json::Error| LlmError::InvalidResponse {
        backend: backend.as_str(),
        message: e.to_string(),
    };

    let text = match backend {
        BackendKind::OpenAi => {
            let response: OpenAiResponse = serde_json::from_str(body).map_err(invalid)?;
            let choice = response
                .choices
                .first()
                .ok_or_else(|| LlmError::InvalidResponse {
                    backend: backend.as_str(),
                    message: "response did not include choices".to_string(),
                })?;
            content_text(&choice.message.content)
        }
        BackendKind::Ollama => {
            let response: OllamaResponse = serde_json::from_str(body).map_err(invalid)?;
            response.response
        }
        BackendKind::Gemini => {
            let value: Value = serde_json::from_str(body).map_err(invalid)?;
            value["candidates"]
                .as_array()
                .and_then(|candidates| candidates.first())
                .and_then(|candidate| candidate["content"]["parts"].as_array())
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|part| part["text"].as_str())
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .unwrap_or_default()
        }
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(LlmError::EmptyOutput {
            backend: backend.as_str(),
        });
    }
    Ok(text.to_string())
}

fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

pub fn truncate(value: &str) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(ERROR_BODY_CHARS).collect();
    if chars.next().is_some() {
        format!("{truncated}...")
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: BackendKind) -> LlmConfig {
        LlmConfig {
            api_key: Some("k".to_string()),
            ..LlmConfig::new(backend)
        }
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(
            endpoint(&config(BackendKind::OpenAi)).unwrap().as_str(),
            DEFAULT_OPENAI_ENDPOINT
        );

        let mut ollama = config(BackendKind::Ollama);
        ollama.endpoint = Some("http://gpu-box:11434/".to_string());
        assert_eq!(
            endpoint(&ollama).unwrap().as_str(),
            "http://gpu-box:11434/api/generate"
        );

        let gemini = endpoint(&config(BackendKind::Gemini)).unwrap();
        assert_eq!(
            gemini.path(),
            "/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(gemini.query(), Some("key=k"));
    }

    #[test]
    fn test_bad_endpoint_rejected() {
        let mut c = config(BackendKind::OpenAi);
        c.endpoint = Some("not a url".to_string());
        assert!(matches!(endpoint(&c), Err(LlmError::Endpoint { .. })));
    }

    #[test]
    fn test_payload_options() {
        let mut c = config(BackendKind::Ollama);
        c.max_tokens = Some(2048);
        let body = payload(&c, "write an adder");
        assert_eq!(body["prompt"], "write an adder");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 2048);

        let body = payload(&config(BackendKind::Gemini), "p");
        assert!(body.get("generationConfig").is_none());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "p");
    }

    #[test]
    fn test_parse_openai_parts() {
        let body = r#"{"choices":[{"message":{"content":[{"type":"text","text":"module a;"},{"type":"text","text":"endmodule"}]}}]}"#;
        assert_eq!(
            parse_response(BackendKind::OpenAi, body).unwrap(),
            "module a;\nendmodule"
        );
    }

    #[test]
    fn test_parse_gemini() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"  module g; endmodule "}]}}]}"#;
        assert_eq!(
            parse_response(BackendKind::Gemini, body).unwrap(),
            "module g; endmodule"
        );
    }

    #[test]
    fn test_empty_output_is_error() {
        let body = r#"{"candidates":[]}"#;
        assert!(matches!(
            parse_response(BackendKind::Gemini, body),
            Err(LlmError::EmptyOutput { backend: "gemini" })
        ));
        assert!(matches!(
            parse_response(BackendKind::Ollama, "{}"),
            Err(LlmError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        let long = "x".repeat(400);
        assert_eq!(truncate(&long).len(), ERROR_BODY_CHARS + 3);
    }
}
