//! Five-year financial projection built from an income rate

mod engine;
mod rows;

pub use engine::{project, project_from, ProjectionConfig, ProjectionEngine, PROJECTION_YEARS};
pub use rows::{Projection, ProjectionRow, ProjectionSummary};
