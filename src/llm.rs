//! Relay to the hosted language model. Tries a fixed ordered list of model
//! identifiers and returns the first successful response; a quota signal
//! moves on to the next model. No retry or backoff beyond that ordered walk.

use anyhow::{anyhow, Context};
use serde_json::json;
use tracing::warn;

const MODELS_TO_TRY: [&str; 3] = [
    "gemini-2.5-flash",
    "gemini-3-flash-preview",
    "gemini-2.5-pro",
];

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

fn base_url() -> String {
    std::env::var("STRAXIAND_LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

fn api_key() -> anyhow::Result<String> {
    std::env::var("GEMINI_API_KEY").map_err(|_| anyhow!("GEMINI_API_KEY is not set"))
}

/// Raw candidate text from the first model that answers.
pub fn generate_raw(prompt: &str) -> anyhow::Result<String> {
    let key = api_key()?;
    let base = base_url();
    let mut last_failure = String::from("no models attempted");

    for model in MODELS_TO_TRY {
        let url = format!("{base}/v1beta/models/{model}:generateContent?key={key}");
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });

        // Failure strings are built from the status or transport kind only:
        // ureq's error Display includes the full URL, which carries the key.
        let resp = match ureq::post(&url).send_json(body) {
            Ok(resp) => resp,
            Err(ureq::Error::Status(429, _)) => {
                warn!(model, "model quota exceeded, trying next");
                last_failure = format!("{model}: quota exceeded");
                continue;
            }
            Err(ureq::Error::Status(code, _)) => {
                warn!(model, code, "model returned an error status, trying next");
                last_failure = format!("{model}: status code {code}");
                continue;
            }
            Err(ureq::Error::Transport(t)) => {
                warn!(model, kind = %t.kind(), "model call failed, trying next");
                last_failure = format!("{model}: {}", t.kind());
                continue;
            }
        };

        let payload: serde_json::Value = match resp.into_json() {
            Ok(v) => v,
            Err(e) => {
                warn!(model, error = %e, "model response was not JSON, trying next");
                last_failure = format!("{model}: {e}");
                continue;
            }
        };

        // Some error payloads still arrive with a 2xx status.
        if let Some(err) = payload.get("error") {
            let code = err.get("code").and_then(|v| v.as_i64()).unwrap_or(0);
            let message = err
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown model error");
            if code == 429 {
                warn!(model, "model quota exceeded, trying next");
            } else {
                warn!(model, code, message, "model returned an error, trying next");
            }
            last_failure = format!("{model}: {message}");
            continue;
        }

        match extract_candidate_text(&payload) {
            Some(text) => return Ok(text),
            None => {
                warn!(model, "model response had no candidate text, trying next");
                last_failure = format!("{model}: empty candidates");
            }
        }
    }

    Err(anyhow!("all models failed ({last_failure})"))
}

fn extract_candidate_text(payload: &serde_json::Value) -> Option<String> {
    let text = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()?;
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Strip markdown code fences the model wraps JSON answers in.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Structured endpoint: candidate text must parse as JSON once de-fenced.
pub fn generate_json(prompt: &str) -> anyhow::Result<serde_json::Value> {
    let raw = generate_raw(prompt)?;
    let clean = strip_code_fences(&raw);
    serde_json::from_str(&clean).context("model did not return valid JSON")
}

/// Chat endpoint: plain text expected, but a JSON object is tolerated by
/// picking the usual wrapper fields, matching the relay's historical
/// format looseness.
pub fn generate_text(prompt: &str) -> anyhow::Result<String> {
    let raw = generate_raw(prompt)?;
    let clean = strip_code_fences(&raw);
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&clean) {
        if let Some(obj) = value.as_object() {
            for key in ["response", "text", "content", "message"] {
                if let Some(s) = obj.get(key).and_then(|v| v.as_str()) {
                    if !s.trim().is_empty() {
                        return Ok(s.to_string());
                    }
                }
            }
        }
        if let Some(s) = value.as_str() {
            return Ok(s.to_string());
        }
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(
            strip_code_fences("```json\n{\"a\": 1}\n```"),
            "{\"a\": 1}"
        );
        assert_eq!(strip_code_fences("plain text"), "plain text");
    }

    #[test]
    fn candidate_text_extraction() {
        let payload = json!({
            "candidates": [{"content": {"parts": [{"text": "hello"}]}}]
        });
        assert_eq!(extract_candidate_text(&payload).as_deref(), Some("hello"));
        assert_eq!(extract_candidate_text(&json!({"candidates": []})), None);
    }
}
