use chrono::{DateTime, Utc};

use crate::llm::media::ImagePayload;
use crate::llm::report::AnalysisResult;

/// The four-state analysis cycle: Idle -> Analyzing -> Result | Error,
/// with an explicit reset back to Idle. Each variant carries only the
/// data valid for that state, so a result and an error can never coexist.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    Idle,
    Analyzing,
    Result(AnalysisResult),
    Error(String),
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Analyzing => "analyzing",
            SessionPhase::Result(_) => "result",
            SessionPhase::Error(_) => "error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("an analysis is already in flight for this session")]
    AnalysisInFlight,
    #[error("no image is selected for this session")]
    NoImageSelected,
    #[error("session holds a completed outcome; reset it before continuing")]
    AwaitingReset,
}

#[derive(Debug)]
pub struct Session {
    phase: SessionPhase,
    selected_image: Option<ImagePayload>,
    generation: u64,
    last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Session {
            phase: SessionPhase::Idle,
            selected_image: None,
            generation: 0,
            last_activity: Utc::now(),
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn has_image(&self) -> bool {
        self.selected_image.is_some()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self.phase, SessionPhase::Analyzing)
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Select (or replace) the image to analyze. Only meaningful while
    /// idle; a held outcome must be reset first.
    pub fn select_image(&mut self, image: ImagePayload) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Idle => {
                self.selected_image = Some(image);
                self.touch();
                Ok(())
            }
            SessionPhase::Analyzing => Err(SessionError::AnalysisInFlight),
            SessionPhase::Result(_) | SessionPhase::Error(_) => Err(SessionError::AwaitingReset),
        }
    }

    pub fn clear_image(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Idle => {
                self.selected_image = None;
                self.touch();
                Ok(())
            }
            SessionPhase::Analyzing => Err(SessionError::AnalysisInFlight),
            SessionPhase::Result(_) | SessionPhase::Error(_) => Err(SessionError::AwaitingReset),
        }
    }

    /// Enter Analyzing, handing the selected image to the orchestrator.
    /// The selection is consumed: every path out of Result or Error goes
    /// through reset, so a fresh upload is required either way.
    pub fn begin_analysis(&mut self) -> Result<(u64, ImagePayload), SessionError> {
        match self.phase {
            SessionPhase::Idle => {}
            SessionPhase::Analyzing => return Err(SessionError::AnalysisInFlight),
            SessionPhase::Result(_) | SessionPhase::Error(_) => {
                return Err(SessionError::AwaitingReset)
            }
        }
        let Some(image) = self.selected_image.take() else {
            return Err(SessionError::NoImageSelected);
        };

        self.generation += 1;
        self.phase = SessionPhase::Analyzing;
        self.touch();
        Ok((self.generation, image))
    }

    /// Land an analysis outcome. A completion only applies when the
    /// session is still analyzing the same generation; anything else is a
    /// late arrival from before a reset and is dropped. Returns whether
    /// the outcome was applied.
    pub fn complete_analysis(
        &mut self,
        generation: u64,
        outcome: Result<AnalysisResult, String>,
    ) -> bool {
        if self.generation != generation || !self.is_analyzing() {
            return false;
        }
        self.phase = match outcome {
            Ok(result) => SessionPhase::Result(result),
            Err(message) => SessionPhase::Error(message),
        };
        self.touch();
        true
    }

    /// Back to Idle: discards any held outcome and the selected image, so
    /// re-submission requires a fresh image selection. Also invalidates
    /// any in-flight attempt.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.phase = SessionPhase::Idle;
        self.selected_image = None;
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_payload() -> ImagePayload {
        ImagePayload::new(vec![0x89, 0x50, 0x4E, 0x47], "image/png".to_string())
    }

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            markdown_report: "## Build Status\nStable.".to_string(),
            execution_steps: vec!["1. Water first.".to_string()],
        }
    }

    #[test]
    fn full_cycle_reaches_result_and_resets_clean() {
        let mut session = Session::new();
        session.select_image(png_payload()).unwrap();

        let (generation, image) = session.begin_analysis().unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert!(session.is_analyzing());

        assert!(session.complete_analysis(generation, Ok(sample_result())));
        assert_eq!(session.phase().as_str(), "result");
        // The selection was consumed by the analysis.
        assert!(!session.has_image());

        session.reset();
        assert_eq!(session.phase().as_str(), "idle");
        assert!(!session.has_image());
        // A fresh image selection is required before the next attempt.
        assert!(matches!(
            session.begin_analysis(),
            Err(SessionError::NoImageSelected)
        ));
    }

    #[test]
    fn analysis_requires_a_selected_image() {
        let mut session = Session::new();
        assert!(matches!(
            session.begin_analysis(),
            Err(SessionError::NoImageSelected)
        ));
    }

    #[test]
    fn in_flight_guard_rejects_reentrant_submission() {
        let mut session = Session::new();
        session.select_image(png_payload()).unwrap();
        session.begin_analysis().unwrap();

        assert!(matches!(
            session.begin_analysis(),
            Err(SessionError::AnalysisInFlight)
        ));
        assert!(matches!(
            session.select_image(png_payload()),
            Err(SessionError::AnalysisInFlight)
        ));
    }

    #[test]
    fn late_outcome_after_reset_is_ignored() {
        let mut session = Session::new();
        session.select_image(png_payload()).unwrap();
        let (generation, _) = session.begin_analysis().unwrap();

        session.reset();
        assert!(!session.complete_analysis(generation, Ok(sample_result())));
        assert_eq!(session.phase().as_str(), "idle");
        assert!(!session.has_image());
    }

    #[test]
    fn error_outcome_holds_message_and_no_result() {
        let mut session = Session::new();
        session.select_image(png_payload()).unwrap();
        let (generation, _) = session.begin_analysis().unwrap();

        assert!(session.complete_analysis(generation, Err("Failed to analyze payload.".to_string())));
        match session.phase() {
            SessionPhase::Error(message) => assert_eq!(message, "Failed to analyze payload."),
            other => panic!("unexpected phase {other:?}"),
        }

        // A held outcome blocks new selections until reset.
        assert!(matches!(
            session.select_image(png_payload()),
            Err(SessionError::AwaitingReset)
        ));
    }

    #[test]
    fn stale_generation_does_not_overwrite_newer_attempt() {
        let mut session = Session::new();
        session.select_image(png_payload()).unwrap();
        let (first, _) = session.begin_analysis().unwrap();
        session.reset();

        session.select_image(png_payload()).unwrap();
        let (second, _) = session.begin_analysis().unwrap();
        assert!(first < second);

        assert!(!session.complete_analysis(first, Err("stale".to_string())));
        assert!(session.is_analyzing());
        assert!(session.complete_analysis(second, Ok(sample_result())));
    }
}
