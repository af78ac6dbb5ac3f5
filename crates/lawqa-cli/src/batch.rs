//! Line-delimited batch state: one `{id, question, answer}` object per line.
//!
//! The file is the batch's only progress record. Every answer rewrites the
//! whole file through a temporary sibling, so an interrupted run leaves
//! either the old or the new contents and can simply be started again.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

/// Prefix of every recorded failure. Such records are retried on the next run.
pub const ERROR_PREFIX: &str = "处理出错";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: Value,
    pub question: String,
    #[serde(default)]
    pub answer: String,
    /// Fields this tool does not interpret, preserved on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BatchRecord {
    pub fn is_pending(&self) -> bool {
        self.answer.is_empty() || self.answer.starts_with(ERROR_PREFIX)
    }

    pub fn id_text(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

pub fn read_records(path: &Path) -> anyhow::Result<Vec<BatchRecord>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("{}:{}: bad record", path.display(), n + 1))
        })
        .collect()
}

pub fn write_records(path: &Path, records: &[BatchRecord]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    for record in records {
        serde_json::to_writer(&mut tmp, record)?;
        tmp.write_all(b"\n")?;
    }
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Copy `input` to `output` with every answer blanked.
pub fn prepare(input: &Path, output: &Path) -> anyhow::Result<usize> {
    let mut records = read_records(input)?;
    for r in &mut records {
        r.answer.clear();
    }
    write_records(output, &records)?;
    Ok(records.len())
}

/// `id`, question and answer per record, blank line between records.
pub fn render_list(records: &[BatchRecord]) -> String {
    let mut out = String::new();
    for r in records {
        out.push_str(&format!("{}\n{}\n{}\n\n", r.id_text(), r.question, r.answer));
    }
    out
}

/// The state file shared by concurrent question workers.
pub struct StateFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StateFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn pending(&self) -> anyhow::Result<Vec<BatchRecord>> {
        Ok(read_records(&self.path)?
            .into_iter()
            .filter(BatchRecord::is_pending)
            .collect())
    }

    /// Store `answer` on the record with `id`. Writes are serialized.
    pub async fn record_answer(&self, id: &Value, answer: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = read_records(&self.path)?;
        for r in records.iter_mut().filter(|r| r.id == *id) {
            r.answer = answer.to_string();
        }
        write_records(&self.path, &records)?;
        debug!(id = %id, "answer recorded");
        Ok(())
    }
}
