//! Deliverable report document
//!
//! [`ReportRenderer`] turns a [`ReportDocument`] into bytes. The production
//! renderer is [`PdfRenderer`].

mod fonts;
mod layout;
mod pdf;

pub use fonts::{EmbeddedFont, Font, FontFace, ReportFonts};
pub use pdf::PdfRenderer;

use crate::assumptions::InsuranceClass;
use crate::narrative::Narrative;
use crate::projection::Projection;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

pub const REPORT_TITLE: &str =
    "Diligent Filing Risk & Corporate Conversion Consulting Report (estimate)";

/// Inputs echoed back in the report
#[derive(Debug, Clone, Serialize)]
pub struct InputSummary {
    pub sales: i64,
    pub employees: u32,
    pub industry_code: String,
    pub income_rate: f64,
    pub insurance_class: InsuranceClass,
    pub concerns: String,
}

/// Everything a renderer needs
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub title: String,
    pub client_email: String,
    pub generated_at: DateTime<FixedOffset>,
    pub inputs: InputSummary,
    pub narrative: Narrative,
    pub projection: Projection,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("report font unavailable: {0}")]
    Font(String),
    #[error("report layout failed: {0}")]
    Layout(String),
    #[error("failed to write PDF: {0}")]
    Pdf(String),
}

pub trait ReportRenderer: Send + Sync {
    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>, RenderError>;

    fn content_type(&self) -> &'static str {
        "application/pdf"
    }
}

/// Whole number with comma thousands separators
pub fn format_money(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `consulting_report_<local-part>_<YYYYMMDD_HHMM>.pdf`
pub fn report_filename(email: &str, at: &DateTime<FixedOffset>) -> String {
    let local: String = email
        .split('@')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'))
        .collect();
    let local = if local.is_empty() { "client".to_string() } else { local };
    format!("consulting_report_{}_{}.pdf", local, at.format("%Y%m%d_%H%M"))
}
