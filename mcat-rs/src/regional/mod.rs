//! Regional mirror: model, history, reconciliation, storage and source

pub mod history;
pub mod model;
pub mod reconciler;
pub mod source;
pub mod store;

pub use history::{DataIntegrityViolation, MirrorIndex, RegionalHistory, RegionalState};
pub use model::{Attributes, Fingerprint, LocalRegional, ReconciliationPlan, RegionalRecord};
pub use reconciler::reconcile;
pub use source::{HttpRegionalSource, RegionalSource, SourceError, UnconfiguredSource};
pub use store::{ApplySummary, SqliteRegionalStore};
