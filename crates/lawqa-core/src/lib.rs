//! Core types and deterministic text rules shared across the question pipeline.

pub mod casenum;
pub mod mention;
pub mod plan;
pub mod retry;
pub mod settings;
pub mod text;
pub mod tools;

pub use casenum::{BracketStyle, CaseNumber, CaseNumberNormalizer};
pub use mention::{Mention, MentionKind, filter_mentions};
pub use plan::{Plan, PlanDraft, PlanStep, Task};
pub use retry::{RetryError, RetryPolicy};
pub use settings::Settings;
pub use tools::{ParamKind, ParamSpec, ParamValue, ToolArgs, ToolSpec, ValidationError};
