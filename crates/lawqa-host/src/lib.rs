//! Question pipeline host: sandbox adapter, execution loop, partial-result
//! store, registry tools, complaint drafting and the staged question pipeline.

mod error;
pub use error::PipelineError;

pub mod calc;
pub mod code;
pub mod complaint;
pub mod execution;
pub mod pipeline;
pub mod prompts;
pub mod sandbox;
pub mod solution;
pub mod stages;
pub mod tools;

pub use complaint::{Complaint, ComplaintKind, ComplaintWriter};
pub use execution::{Brief, ExecutionLoop, ExecutionReport};
pub use pipeline::{Answer, Outcome, QaPipeline, Services};
pub use sandbox::{
    HttpSandbox, HttpSandboxProvider, Sandbox, SandboxError, SandboxOutcome, SandboxProvider,
    SerializedSandbox,
};
pub use solution::{Snapshot, SolutionSpace};
pub use tools::{ToolError, ToolRegistry};
