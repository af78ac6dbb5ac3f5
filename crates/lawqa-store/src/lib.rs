//! Registry layer: the lookup trait, table catalogue, document endpoints,
//! HTTP client and in-memory registry.

mod error;
pub use error::StoreError;

pub mod document;
pub mod http;
pub mod memory;
mod record;
pub mod table;

pub use document::{Document, DocumentService};
pub use http::HttpRegistry;
pub use memory::MemoryRegistry;
pub use record::{Lookup, Record};
pub use table::{Table, field};

use async_trait::async_trait;

/// Read-only lookup against the registry: `lookup(table, {field: value})`.
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    async fn lookup(&self, table: Table, conds: &[(&str, &str)]) -> Result<Lookup, StoreError>;
}
