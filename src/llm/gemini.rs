use std::time::Duration;

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::{ANALYST_SYSTEM_PROMPT, CONFIG};
use crate::llm::media::{resolve_image_mime, ImagePayload};
use crate::llm::prompt::{analysis_response_schema, build_analysis_instruction};
use crate::llm::report::{result_from_response_text, AnalysisError, AnalysisResult};
use crate::profile::UserProfile;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

fn redact_api_key(text: &str) -> String {
    let key = CONFIG.gemini_api_key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn build_safety_settings() -> Vec<Value> {
    let threshold = match CONFIG.gemini_safety_settings.as_str() {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        _ => "OFF",
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
    ]
}

fn summarize_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if payload.pointer("/systemInstruction").is_some() {
        summary.insert(
            "systemInstruction".to_string(),
            Value::String("analyst_system_prompt".to_string()),
        );
    }

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let parts: Vec<Value> = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| {
                    parts
                        .iter()
                        .map(|part| {
                            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                                json!({ "text": truncate_for_log(text, 200) })
                            } else if let Some(inline) = part.get("inlineData") {
                                let mime_type = inline
                                    .get("mimeType")
                                    .and_then(|value| value.as_str())
                                    .unwrap_or("unknown");
                                let data_len = inline
                                    .get("data")
                                    .and_then(|value| value.as_str())
                                    .map(|value| value.len())
                                    .unwrap_or(0);
                                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
                            } else {
                                json!({ "unknownPart": true })
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            summarized_contents.push(json!({ "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        let mut config = config.clone();
        if let Some(object) = config.as_object_mut() {
            // The schema is static and noisy; its presence is what matters.
            if object.remove("responseSchema").is_some() {
                object.insert("responseSchema".to_string(), json!("analysis_schema"));
            }
        }
        summary.insert("generationConfig".to_string(), config);
    }

    Value::Object(summary)
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn extract_text_from_response(response: GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            for part in content.parts.unwrap_or_default() {
                if let Some(text) = part.text {
                    if !text.trim().is_empty() {
                        text_parts.push(text);
                    }
                }
            }
        }
    }
    text_parts.join("\n")
}

fn build_analysis_payload(encoded_image: &str, mime_type: &str, instruction: &str) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": ANALYST_SYSTEM_PROMPT }] },
        "contents": [{
            "role": "user",
            "parts": [
                { "inlineData": { "mimeType": mime_type, "data": encoded_image } },
                { "text": instruction }
            ]
        }],
        "generationConfig": {
            "temperature": CONFIG.gemini_temperature,
            "topK": CONFIG.gemini_top_k,
            "topP": CONFIG.gemini_top_p,
            "maxOutputTokens": CONFIG.gemini_max_output_tokens,
            "responseMimeType": "application/json",
            "responseSchema": analysis_response_schema(),
        },
        "safetySettings": build_safety_settings(),
    })
}

/// One generateContent round trip. No retry: a failed attempt is fatal to
/// the current analysis and the session records the outcome as-is.
async fn call_gemini_api(model: &str, payload: Value) -> Result<GeminiResponse> {
    let client = get_http_client();
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
        model, CONFIG.gemini_api_key
    );

    if tracing::enabled!(tracing::Level::DEBUG) {
        let payload_summary = summarize_payload(&payload);
        debug!(target: "llm.gemini", model = model, payload = %payload_summary);
    }

    let response = client
        .post(&url)
        .timeout(Duration::from_secs(CONFIG.gemini_request_timeout_secs))
        .json(&payload)
        .send()
        .await
        .map_err(|err| {
            let err_text = redact_api_key(&err.to_string());
            warn!(
                "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                err_text,
                err.is_timeout(),
                err.is_connect(),
                err.status()
            );
            anyhow!("Gemini request failed: {}", err_text)
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, body_summary) = summarize_error_body(&redact_api_key(&body));
        warn!("Gemini API error: status={}, body={}", status, body_summary);
        let detail = message.unwrap_or(body_summary);
        return Err(anyhow!(
            "Gemini request failed with status {}: {}",
            status,
            detail
        ));
    }

    let value = response.json::<GeminiResponse>().await?;
    Ok(value)
}

/// The analysis orchestrator: encode the photo, build the instruction,
/// run one constrained-output model call, and normalize the outcome.
pub async fn analyze_meal_photo(
    image: &ImagePayload,
    profile: &UserProfile,
) -> Result<AnalysisResult, AnalysisError> {
    if image.is_empty() {
        return Err(AnalysisError::Encoding(anyhow!("image payload is empty")));
    }
    let mime_type = resolve_image_mime(image).ok_or_else(|| {
        AnalysisError::Encoding(anyhow!(
            "no model-supported image type for declared mime '{}'",
            image.mime_type
        ))
    })?;

    let encoded = general_purpose::STANDARD.encode(&image.bytes);
    let instruction = build_analysis_instruction(profile);
    let payload = build_analysis_payload(&encoded, &mime_type, &instruction);

    let model = &CONFIG.gemini_model;
    let metadata = json!({ "imageBytes": image.bytes.len(), "imageMime": mime_type });

    let text = log_llm_timing("gemini", model, "analyze_meal_photo", Some(metadata), || async {
        let response = call_gemini_api(model, payload).await?;
        Ok(extract_text_from_response(response))
    })
    .await
    .map_err(AnalysisError::Transport)?;

    if text.trim().is_empty() {
        return Err(AnalysisError::Transport(anyhow!(
            "Gemini returned no response text"
        )));
    }

    Ok(result_from_response_text(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_joins_text_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "{\"markdownReport\":" },
                    { "text": "  " },
                    { "text": "\"ok\"}" }
                ]}
            }]
        }))
        .unwrap();
        assert_eq!(
            extract_text_from_response(response),
            "{\"markdownReport\":\n\"ok\"}"
        );
    }

    #[test]
    fn empty_candidates_yield_empty_text() {
        let response: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(extract_text_from_response(response), "");
    }

    #[test]
    fn error_body_summary_prefers_api_error_message() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded"}}"#;
        let (message, summary) = summarize_error_body(body);
        assert_eq!(message.as_deref(), Some("Quota exceeded"));
        assert!(summary.contains("429"));
    }

    #[test]
    fn error_body_summary_handles_plain_text() {
        let (message, summary) = summarize_error_body("  upstream unavailable  ");
        assert_eq!(message, None);
        assert_eq!(summary, "upstream unavailable");
    }
}
