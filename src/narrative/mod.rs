//! Consulting narrative from an external language model
//!
//! [`NarrativeGenerator`] is the seam: production uses [`OpenAiGenerator`],
//! tests script their own.

mod openai;
mod prompt;

pub use openai::OpenAiGenerator;
pub use prompt::{system_prompt, user_prompt};

use crate::assumptions::InsuranceClass;
use crate::projection::ProjectionRow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Text produced by a successful generation.
///
/// Only this crate can construct one, which makes it usable as proof that
/// the external call succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrative(String);

impl Narrative {
    pub(crate) fn from_generated(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-blank lines, trimmed
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.0.lines().map(str::trim).filter(|l| !l.is_empty())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Document voice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    DataDriven,
    SalesImpact,
    QuietPremium,
}

impl Tone {
    pub fn description(&self) -> &'static str {
        match self {
            Tone::DataDriven => "professional, numbers-first, makes risk tangible",
            Tone::SalesImpact => "high-impact sales voice without exaggeration",
            Tone::QuietPremium => "understated premium report",
        }
    }
}

/// Everything the prompt is built from
#[derive(Debug, Clone, Serialize)]
pub struct NarrativeRequest {
    pub sales: i64,
    pub employees: u32,
    pub industry_code: String,
    pub income_rate: f64,
    pub concerns: String,
    pub insurance_class: InsuranceClass,
    pub tone: Tone,
    pub rows: Vec<ProjectionRow>,
}

#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("narrative request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("narrative service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode narrative response: {0}")]
    Decode(String),
    #[error("narrative service returned no text")]
    Empty,
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Raw generated text
    async fn generate(&self, request: &NarrativeRequest) -> Result<String, NarrativeError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed reply, or fails, and counts calls
    pub struct ScriptedGenerator {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        pub fn replying(text: &str) -> Self {
            Self {
                reply: Some(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NarrativeGenerator for ScriptedGenerator {
        async fn generate(&self, _request: &NarrativeRequest) -> Result<String, NarrativeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(text) => Ok(text.clone()),
                None => Err(NarrativeError::Status {
                    status: 503,
                    body: "unavailable".into(),
                }),
            }
        }
    }

    pub fn sample_request() -> NarrativeRequest {
        NarrativeRequest {
            sales: 900_000_000,
            employees: 7,
            industry_code: "552101".into(),
            income_rate: 12.0,
            concerns: "audit risk".into(),
            insurance_class: InsuranceClass::Regional,
            tone: Tone::DataDriven,
            rows: crate::projection::project_from(2025, 900_000_000.0, 12.0, InsuranceClass::Regional)
                .rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_skip_blank_lines() {
        let n = Narrative::from_generated("Summary\n\n   \n  Risks  \nRoadmap".into());
        let paras: Vec<_> = n.paragraphs().collect();
        assert_eq!(paras, vec!["Summary", "Risks", "Roadmap"]);
    }

    #[test]
    fn test_tone_serde_names() {
        let t: Tone = serde_json::from_str("\"quiet_premium\"").unwrap();
        assert_eq!(t, Tone::QuietPremium);
        assert_eq!(serde_json::to_string(&Tone::SalesImpact).unwrap(), "\"sales_impact\"");
        assert_eq!(Tone::default(), Tone::DataDriven);
    }
}
