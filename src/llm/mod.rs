pub mod gemini;
pub mod media;
pub mod prompt;
pub mod report;

pub use gemini::analyze_meal_photo;
pub use media::ImagePayload;
pub use report::{AnalysisError, AnalysisResult};
