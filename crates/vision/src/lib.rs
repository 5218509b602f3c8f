pub mod analyzer;
pub mod provider;

pub use analyzer::{VisionAnalysis, VisionAnalyzer};
pub use provider::{GeminiProvider, MockProvider, OpenAiProvider, VisionError, VisionProvider};
