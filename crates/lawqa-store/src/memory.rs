//! In-memory registry for tests and offline runs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{Document, DocumentService, Lookup, Record, RegistryLookup, StoreError, Table};

/// A registry held in memory. A lookup returns every record whose fields
/// equal all given conditions: one record as `One`, several as `Many`.
///
/// Generated documents are rendered as `endpoint` followed by one
/// `key: value` line per payload field; a report is named
/// `Word_<company_name>`.
#[derive(Default)]
pub struct MemoryRegistry {
    tables: HashMap<Table, Vec<Record>>,
    log: Mutex<Vec<(Table, Vec<(String, String)>)>>,
    documents: Mutex<Vec<(Document, Value)>>,
}

#[derive(Deserialize)]
struct Fixture {
    table: String,
    record: Record,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: Table, record: Record) {
        self.tables.entry(table).or_default().push(record);
    }

    /// Builder form of [`insert`](Self::insert) taking a JSON object.
    pub fn with(mut self, table: Table, record: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = record {
            self.insert(table, map);
        }
        self
    }

    /// Load JSONL fixtures of the form `{"table": "get_company_info", "record": {...}}`.
    pub fn from_jsonl(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Other(format!("{}: {e}", path.display())))?;
        let mut registry = Self::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let fixture: Fixture = serde_json::from_str(line)?;
            let table = Table::from_endpoint(&fixture.table).ok_or_else(|| StoreError::Payload {
                table: fixture.table.clone(),
                detail: "unknown table".into(),
            })?;
            registry.insert(table, fixture.record);
        }
        Ok(registry)
    }

    /// Every lookup made so far, in order.
    pub fn queries(&self) -> Vec<(Table, Vec<(String, String)>)> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Every document generated so far, with its payload.
    pub fn documents(&self) -> Vec<(Document, Value)> {
        self.documents.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DocumentService for MemoryRegistry {
    async fn generate(&self, document: Document, payload: &Value) -> Result<String, StoreError> {
        if let Ok(mut docs) = self.documents.lock() {
            docs.push((document, payload.clone()));
        }
        let Value::Object(fields) = payload else {
            return Err(StoreError::Payload {
                table: document.endpoint().to_string(),
                detail: "payload must be an object".into(),
            });
        };
        if document == Document::CompanyReport {
            let company = fields.get("company_name").and_then(Value::as_str).unwrap_or_default();
            return Ok(format!("Word_{company}"));
        }
        let mut text = document.endpoint().to_string();
        for (k, v) in fields {
            let v = match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            text.push_str(&format!("\n{k}: {v}"));
        }
        Ok(text)
    }
}

#[async_trait]
impl RegistryLookup for MemoryRegistry {
    async fn lookup(&self, table: Table, conds: &[(&str, &str)]) -> Result<Lookup, StoreError> {
        if let Ok(mut log) = self.log.lock() {
            log.push((
                table,
                conds
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ));
        }

        let mut hits: Vec<Record> = self
            .tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| {
                        conds
                            .iter()
                            .all(|(k, v)| r.get(*k).and_then(|x| x.as_str()) == Some(*v))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(match hits.len() {
            0 => Lookup::Empty,
            1 => Lookup::One(hits.remove(0)),
            _ => Lookup::Many(hits),
        })
    }
}
