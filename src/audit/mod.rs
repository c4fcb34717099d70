//! Audit pipeline that gates task completion.

pub mod pipeline;
pub mod types;
pub mod validators;

pub use pipeline::{AuditPipeline, StageValidator};
pub use types::{
    AuditOutcome, AuditRun, AuditRunStatus, AuditStageResult, AuditTrail, Severity, StageStatus,
    StageVerdict, Violation,
};
pub use validators::{FnValidator, RequireContent};
