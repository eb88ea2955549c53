//! Consulting Report - Tax projection and gated report generation for small businesses
//!
//! This library provides:
//! - Industry income-rate lookup from an uploaded reference table
//! - Five-year individual vs. corporate tax and health-insurance projection
//! - Per-identity daily / monthly usage quotas and an audit trail
//! - Narrative generation through a language model
//! - PDF report rendering and an HTTP surface with approval gating

pub mod access;
pub mod assumptions;
pub mod clock;
pub mod config;
pub mod ledger;
pub mod narrative;
pub mod pipeline;
pub mod projection;
pub mod report;
pub mod table;
pub mod web;

// Re-export commonly used types
pub use access::{AccessControl, AccessError};
pub use assumptions::{Assumptions, InsuranceClass, TaxAssumptions};
pub use config::{AppConfig, ConfigError};
pub use ledger::{AuditTrail, Store, UsageLedger, UsageStatus};
pub use narrative::{Narrative, NarrativeGenerator, OpenAiGenerator, Tone};
pub use pipeline::{PipelineError, ReportRequest, ReportService};
pub use projection::{project, project_from, Projection, ProjectionEngine, ProjectionRow};
pub use report::{PdfRenderer, ReportRenderer};
pub use table::{resolve, resolve_upload, IndustryLookupResult, LookupStatus, LookupTable};
