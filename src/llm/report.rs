use serde::{Deserialize, Serialize};
use tracing::warn;

/// One successful analysis: a markdown narrative (status summary and
/// forecast, no embedded step plan) plus the ordered action checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub markdown_report: String,
    pub execution_steps: Vec<String>,
}

const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze payload.";

/// Classified analysis failure. Both variants surface the same fixed
/// display message; transport internals stay in the logs.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{ANALYSIS_FAILED_MESSAGE}")]
    Encoding(#[source] anyhow::Error),
    #[error("{ANALYSIS_FAILED_MESSAGE}")]
    Transport(#[source] anyhow::Error),
}

impl AnalysisError {
    pub fn detail(&self) -> String {
        match self {
            AnalysisError::Encoding(source) => format!("encoding: {source:#}"),
            AnalysisError::Transport(source) => format!("transport: {source:#}"),
        }
    }
}

/// Maps response text to a result. Schema-constrained generation can
/// still return non-conforming text; "the model said something" degrades
/// to a raw-text report instead of failing the whole operation.
pub fn result_from_response_text(text: &str) -> AnalysisResult {
    match serde_json::from_str::<AnalysisResult>(text) {
        Ok(result) => result,
        Err(err) => {
            warn!("Analysis response did not match the expected shape: {err}");
            AnalysisResult {
                markdown_report: text.to_string(),
                execution_steps: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conforming_json_passes_through_unchanged() {
        let text = r###"{"markdownReport":"## Build Status\nAll green.","executionSteps":["1. Salad first.","2. Protein next."]}"###;
        let result = result_from_response_text(text);
        assert_eq!(result.markdown_report, "## Build Status\nAll green.");
        assert_eq!(
            result.execution_steps,
            vec!["1. Salad first.", "2. Protein next."]
        );
    }

    #[test]
    fn empty_step_list_is_a_valid_result() {
        let text = r#"{"markdownReport":"Nothing to do.","executionSteps":[]}"#;
        let result = result_from_response_text(text);
        assert!(result.execution_steps.is_empty());
    }

    #[test]
    fn non_json_text_degrades_to_raw_report() {
        let result = result_from_response_text("hello");
        assert_eq!(result.markdown_report, "hello");
        assert!(result.execution_steps.is_empty());
    }

    #[test]
    fn json_missing_a_required_field_degrades_to_raw_report() {
        let text = r#"{"markdownReport":"report only"}"#;
        let result = result_from_response_text(text);
        assert_eq!(result.markdown_report, text);
        assert!(result.execution_steps.is_empty());
    }

    #[test]
    fn error_variants_share_the_fixed_display_message() {
        let encoding = AnalysisError::Encoding(anyhow::anyhow!("no usable mime type"));
        let transport = AnalysisError::Transport(anyhow::anyhow!("status 503"));
        assert_eq!(encoding.to_string(), "Failed to analyze payload.");
        assert_eq!(encoding.to_string(), transport.to_string());
        assert!(transport.detail().contains("status 503"));
    }
}
