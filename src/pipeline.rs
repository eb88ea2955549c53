//! Report generation pipeline
//!
//! Access gate, quota check, projection, narrative, charge, render. The quota
//! is checked before the narrative call and charged only after it succeeds.
//! Audit writes and the usage charge are side channels: their failures are
//! logged and never change the outcome.

use crate::access::{require_report_access, AccessControl, AccessError};
use crate::assumptions::{Assumptions, InsuranceClass};
use crate::clock;
use crate::ledger::{
    audit::events, AuditTrail, QuotaExceeded, QuotaPermit, Store, UsageLedger, UsageStatus,
};
use crate::narrative::{Narrative, NarrativeError, NarrativeGenerator, NarrativeRequest, Tone};
use crate::projection::{Projection, ProjectionConfig, ProjectionEngine};
use crate::report::{
    report_filename, InputSummary, RenderError, ReportDocument, ReportRenderer, REPORT_TITLE,
};
use chrono::{DateTime, Datelike, FixedOffset};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("usage limit reached: {} left today, {} left this month", .0.daily_left, .0.monthly_left)]
    QuotaExceeded(UsageStatus),
    #[error(transparent)]
    Narrative(#[from] NarrativeError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<QuotaExceeded> for PipelineError {
    fn from(e: QuotaExceeded) -> Self {
        PipelineError::QuotaExceeded(e.0)
    }
}

/// Largest accepted annual sales figure (one quadrillion)
pub const MAX_SALES: i64 = 1_000_000_000_000_000;

/// Inputs for a projection
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionInput {
    pub sales: i64,
    pub income_rate: f64,
    #[serde(default = "default_insurance_class")]
    pub insurance_class: InsuranceClass,
    #[serde(default)]
    pub base_year: Option<i32>,
}

fn default_insurance_class() -> InsuranceClass {
    InsuranceClass::Regional
}

impl ProjectionInput {
    /// Reject sales outside 0..=MAX_SALES and rates outside 0..=100
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sales < 0 {
            return Err(PipelineError::InvalidInput("sales must not be negative".into()));
        }
        if self.sales > MAX_SALES {
            return Err(PipelineError::InvalidInput(format!(
                "sales must not exceed {}",
                MAX_SALES
            )));
        }
        if !self.income_rate.is_finite() || !(0.0..=100.0).contains(&self.income_rate) {
            return Err(PipelineError::InvalidInput(
                "income rate must be between 0 and 100".into(),
            ));
        }
        Ok(())
    }

    pub fn project(&self, now: &DateTime<FixedOffset>) -> Result<Projection, PipelineError> {
        self.validate()?;
        let config = ProjectionConfig {
            base_year: self.base_year.unwrap_or_else(|| now.year()),
            insurance_class: self.insurance_class,
        };
        let engine = ProjectionEngine::new(Assumptions::default_pricing(), config);
        Ok(engine.project(self.sales as f64, self.income_rate))
    }
}

/// The full report form
#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    #[serde(flatten)]
    pub projection: ProjectionInput,
    #[serde(default)]
    pub employees: u32,
    #[serde(default)]
    pub industry_code: String,
    #[serde(default)]
    pub concerns: String,
    #[serde(default)]
    pub tone: Tone,
}

#[derive(Debug)]
pub struct GeneratedReport {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub narrative: Narrative,
    pub projection: Projection,
    /// Usage after this generation was charged
    pub usage: UsageStatus,
}

#[derive(Clone)]
pub struct ReportService {
    access: AccessControl,
    ledger: UsageLedger,
    audit: AuditTrail,
    generator: Arc<dyn NarrativeGenerator>,
    renderer: Arc<dyn ReportRenderer>,
}

impl ReportService {
    pub fn new(
        store: Store,
        access: AccessControl,
        generator: Arc<dyn NarrativeGenerator>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self::with_ledger(UsageLedger::new(store.clone()), store, access, generator, renderer)
    }

    pub fn with_ledger(
        ledger: UsageLedger,
        store: Store,
        access: AccessControl,
        generator: Arc<dyn NarrativeGenerator>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            access,
            ledger,
            audit: AuditTrail::new(store),
            generator,
            renderer,
        }
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub async fn generate(&self, email: &str, request: &ReportRequest) -> Result<GeneratedReport, PipelineError> {
        self.generate_at(email, request, &clock::now_local()).await
    }

    /// Store and render steps run on the blocking pool; only the narrative
    /// call is awaited on the async workers.
    pub async fn generate_at(
        &self,
        email: &str,
        request: &ReportRequest,
        now: &DateTime<FixedOffset>,
    ) -> Result<GeneratedReport, PipelineError> {
        let now = *now;
        let (email, permit, projection) = {
            let service = self.clone();
            let email = email.to_string();
            let input = request.projection.clone();
            run_blocking(move || service.admit(&email, &input, &now)).await?
        };

        let narrative_request = NarrativeRequest {
            sales: request.projection.sales,
            employees: request.employees,
            industry_code: request.industry_code.clone(),
            income_rate: request.projection.income_rate,
            concerns: request.concerns.clone(),
            insurance_class: request.projection.insurance_class,
            tone: request.tone,
            rows: projection.rows.clone(),
        };

        let started = Instant::now();
        let narrative = match self.generator.generate(&narrative_request).await {
            Ok(text) => Narrative::from_generated(text),
            Err(e) => {
                warn!("narrative failed for {}: {}", email, e);
                let audit = self.audit.clone();
                let detail = json!({ "error": e.to_string() });
                run_blocking(move || {
                    audit.record(Some(&email), events::NARRATIVE_FAIL, detail);
                    Ok(())
                })
                .await?;
                return Err(e.into());
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let service = self.clone();
        let request = request.clone();
        run_blocking(move || {
            service.audit.record(
                Some(&email),
                events::NARRATIVE_OK,
                json!({ "tone": request.tone, "elapsed_ms": elapsed_ms }),
            );
            service.deliver(&email, permit, &request, narrative, projection, &now)
        })
        .await
    }

    /// Access gate, validation, quota check and projection
    fn admit(
        &self,
        email: &str,
        input: &ProjectionInput,
        now: &DateTime<FixedOffset>,
    ) -> Result<(String, QuotaPermit, Projection), PipelineError> {
        let user = self.access.current_user(email)?;
        require_report_access(&user)?;
        input.validate()?;

        let permit = self.ledger.check_at(&user.email, user.is_admin, now).map_err(|e| {
            info!("quota exhausted for {}: {:?}", user.email, e.0);
            PipelineError::from(e)
        })?;

        let projection = input.project(now)?;
        Ok((user.email, permit, projection))
    }

    /// Charge, render and audit once the narrative exists
    fn deliver(
        &self,
        email: &str,
        permit: QuotaPermit,
        request: &ReportRequest,
        narrative: Narrative,
        projection: Projection,
        now: &DateTime<FixedOffset>,
    ) -> Result<GeneratedReport, PipelineError> {
        if let Err(e) = permit.charge_at(&self.ledger, &narrative, now) {
            warn!("usage charge for {} dropped: {}", email, e);
            self.audit
                .record(Some(email), events::USAGE_FAIL, json!({ "error": e.to_string() }));
        }

        let document = ReportDocument {
            title: REPORT_TITLE.to_string(),
            client_email: email.to_string(),
            generated_at: *now,
            inputs: InputSummary {
                sales: request.projection.sales,
                employees: request.employees,
                industry_code: request.industry_code.clone(),
                income_rate: request.projection.income_rate,
                insurance_class: request.projection.insurance_class,
                concerns: request.concerns.clone(),
            },
            narrative,
            projection,
        };

        let bytes = match self.renderer.render(&document) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("render failed for {}: {}", email, e);
                self.audit
                    .record(Some(email), events::RENDER_FAIL, json!({ "error": e.to_string() }));
                return Err(e.into());
            }
        };
        self.audit
            .record(Some(email), events::RENDER_OK, json!({ "size": bytes.len() }));
        info!("report for {}: {} bytes", email, bytes.len());

        Ok(GeneratedReport {
            filename: report_filename(email, now),
            content_type: self.renderer.content_type(),
            bytes,
            narrative: document.narrative,
            projection: document.projection,
            usage: self.ledger.status_at(email, now),
        })
    }
}

/// Run synchronous store or render work on the blocking pool
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}
