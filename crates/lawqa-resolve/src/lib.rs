//! Reference resolution: turns informally written entity mentions into the
//! canonical keys the registry recognizes.

mod error;
pub use error::ResolveError;

pub mod candidate;
pub mod kinds;
pub mod resolver;

pub use candidate::{CandidatePipeline, Hit, Query, Source, Step};
pub use resolver::{EntityResolver, Resolution, annotate, apply};
