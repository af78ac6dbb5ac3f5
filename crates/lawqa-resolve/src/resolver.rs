//! Entity resolution over a whole question: recognize, filter, resolve,
//! then rewrite the question with registry spellings.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::info;

use lawqa_ai::{MentionRecognizer, NameNormalizer};
use lawqa_core::{Mention, MentionKind, RetryPolicy, filter_mentions};
use lawqa_store::{RegistryLookup, StoreError, field};

use crate::ResolveError;
use crate::candidate::{Context, Hit};
use crate::kinds::pipeline_for;

/// Output of one resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub mentions: Vec<Mention>,
    /// The question with resolved mentions replaced by registry spellings.
    pub rewritten: String,
    /// `QUERY: …\nNER: {…}` form handed to later stages.
    pub annotated: String,
}

pub struct EntityResolver {
    recognizer: MentionRecognizer,
    registry: Arc<dyn RegistryLookup>,
    names: Arc<dyn NameNormalizer>,
    retry: RetryPolicy<StoreError>,
}

impl EntityResolver {
    pub fn new(
        recognizer: MentionRecognizer,
        registry: Arc<dyn RegistryLookup>,
        names: Arc<dyn NameNormalizer>,
        retry: RetryPolicy<StoreError>,
    ) -> Self {
        Self {
            recognizer,
            registry,
            names,
            retry,
        }
    }

    /// Recognized mentions that survive filtering, kinds corrected.
    pub async fn recognize(&self, question: &str) -> Result<Vec<Mention>, ResolveError> {
        let raw = self.recognizer.recognize(question).await?;
        let mut mentions = filter_mentions(&raw);
        for m in &mut mentions {
            m.correct_kind();
        }
        Ok(mentions)
    }

    /// Resolve one mention in place. A miss leaves it untouched.
    pub async fn resolve(&self, mention: &mut Mention) -> Result<(), ResolveError> {
        if let Some(hit) = self.lookup(mention.kind, &mention.content).await? {
            apply_hit(mention, &hit);
        }
        Ok(())
    }

    /// Resolve every mention; identical contents are looked up once and
    /// share the result.
    pub async fn resolve_all(&self, mentions: &mut [Mention]) -> Result<(), ResolveError> {
        let mut cache: HashMap<String, Option<Hit>> = HashMap::new();
        for mention in mentions.iter_mut() {
            let hit = match cache.get(&mention.content) {
                Some(hit) => hit.clone(),
                None => {
                    let hit = self.lookup(mention.kind, &mention.content).await?;
                    cache.insert(mention.content.clone(), hit.clone());
                    hit
                }
            };
            if let Some(hit) = hit {
                apply_hit(mention, &hit);
            }
        }
        Ok(())
    }

    /// Full pass over a question.
    pub async fn canonicalize(&self, question: &str) -> Result<Resolution, ResolveError> {
        let mut mentions = self.recognize(question).await?;
        self.resolve_all(&mut mentions).await?;

        let rewritten = apply(question, &mentions);
        let annotated = annotate(&rewritten, &mentions);
        info!(
            mentions = mentions.len(),
            resolved = mentions.iter().filter(|m| m.found).count(),
            "question canonicalized"
        );
        Ok(Resolution {
            mentions,
            rewritten,
            annotated,
        })
    }

    async fn lookup(&self, kind: MentionKind, content: &str) -> Result<Option<Hit>, ResolveError> {
        let Some(pipeline) = pipeline_for(kind) else {
            return Ok(None);
        };
        let cx = Context {
            registry: self.registry.as_ref(),
            names: self.names.as_ref(),
            retry: &self.retry,
        };
        pipeline.run(content, &cx).await
    }
}

fn apply_hit(mention: &mut Mention, hit: &Hit) {
    mention.resolve_to(hit.standardized.clone(), hit.table.schema_name());
    // An abbreviation resolved through the full-name field is now a name.
    if mention.kind == MentionKind::CompanyAbbreviation && hit.field == field::COMPANY_NAME {
        mention.kind = MentionKind::CompanyName;
    }
}

/// Replace, per resolved mention and in recognition order, the first
/// remaining occurrence of its raw content with its standardized form.
///
/// Later repeats of the same substring stay as written unless another
/// mention covers them. Mentions sharing content with an earlier one are
/// skipped: their replacement has already been made.
pub fn apply(question: &str, mentions: &[Mention]) -> String {
    let mut out = question.to_string();
    let mut applied: HashSet<&str> = HashSet::new();
    for m in mentions {
        if !applied.insert(m.content.as_str()) || !m.found {
            continue;
        }
        out = out.replacen(&m.content, &m.standardized, 1);
    }
    out
}

/// `QUERY: <question>\nNER: {'<label>': '<standardized>', ...}` over resolved
/// mentions. Docket numbers are labelled with the table that holds them
/// (`LegalDoc案号`); a later mention of the same label overrides an earlier one.
pub fn annotate(question: &str, mentions: &[Mention]) -> String {
    let mut entries: Vec<(String, &str)> = Vec::new();
    for m in mentions.iter().filter(|m| m.found) {
        let label = match (m.kind, &m.source) {
            (MentionKind::CaseNumber, Some(source)) => format!("{source}{}", m.kind.label()),
            _ => m.kind.label().to_string(),
        };
        match entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = m.standardized.as_str(),
            None => entries.push((label, m.standardized.as_str())),
        }
    }
    let ner = entries
        .iter()
        .map(|(l, v)| format!("'{l}': '{v}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("QUERY: {question}\nNER: {{{ner}}}")
}
