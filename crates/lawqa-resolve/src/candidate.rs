//! The candidate pipeline: ordered candidate sources, each paired with one
//! typed registry query, tried until the first non-empty result.
//!
//! Every entity kind resolves with the same shape:
//!
//! 1. the base form (raw content, or a canonicalised docket number) against
//!    the primary field
//! 2. variants: name-service suggestions plus deterministic augmentations of
//!    the base form and of every suggestion, in generation order
//! 3. kind-specific derived candidates
//!
//! Kinds differ only in their [`CandidatePipeline`] value (see
//! [`crate::kinds`]).

use std::collections::HashSet;

use tracing::{debug, info};

use lawqa_ai::NameNormalizer;
use lawqa_core::RetryPolicy;
use lawqa_core::text::{char_len, push_unique};
use lawqa_store::{RegistryLookup, StoreError, Table};

use crate::ResolveError;

/// Where a step takes its candidates from.
#[derive(Clone, Copy)]
pub enum Source {
    /// The base form alone.
    Base,
    /// Name-service suggestions and augmentations, computed once on first use.
    Variants,
    /// One candidate derived from the base form; the step is skipped on `None`.
    Derived(fn(&str) -> Option<String>),
}

/// One typed registry lookup.
#[derive(Clone, Copy)]
pub struct Query {
    pub table: Table,
    pub field: &'static str,
    /// Field carrying the authoritative spelling. `None` keeps the tried
    /// candidate, for keys that are already canonical (codes).
    pub answer: Option<&'static str>,
    /// Rewrites a candidate into the form stored by `table`.
    pub render: fn(&str) -> String,
}

impl Query {
    pub const fn new(table: Table, field: &'static str) -> Self {
        Self {
            table,
            field,
            answer: Some(field),
            render: as_is,
        }
    }

    pub const fn answer(mut self, field: Option<&'static str>) -> Self {
        self.answer = field;
        self
    }

    pub const fn render(mut self, render: fn(&str) -> String) -> Self {
        self.render = render;
        self
    }
}

#[derive(Clone, Copy)]
pub struct Step {
    pub source: Source,
    pub query: Query,
    /// Skip candidates longer than this many code points.
    pub max_chars: Option<usize>,
}

impl Step {
    pub const fn base(query: Query) -> Self {
        Self {
            source: Source::Base,
            query,
            max_chars: None,
        }
    }

    pub const fn variants(query: Query) -> Self {
        Self {
            source: Source::Variants,
            query,
            max_chars: None,
        }
    }

    pub const fn derived(derive: fn(&str) -> Option<String>, query: Query) -> Self {
        Self {
            source: Source::Derived(derive),
            query,
            max_chars: None,
        }
    }

    pub const fn max_chars(mut self, n: usize) -> Self {
        self.max_chars = Some(n);
        self
    }
}

/// Resolution recipe for one entity kind.
pub struct CandidatePipeline {
    pub name: &'static str,
    /// Base form derived from the mention content.
    pub base: fn(&str) -> String,
    /// Ask the name service for standardized variants.
    pub name_service: bool,
    /// Deterministic augmentations of one candidate.
    pub augment: fn(&str) -> Vec<String>,
    pub steps: Vec<Step>,
}

/// A registry hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub standardized: String,
    pub table: Table,
    pub field: &'static str,
}

/// Collaborators a pipeline run needs.
pub struct Context<'a> {
    pub registry: &'a dyn RegistryLookup,
    pub names: &'a dyn NameNormalizer,
    pub retry: &'a RetryPolicy<StoreError>,
}

impl CandidatePipeline {
    /// Try every step in order and stop at the first non-empty lookup.
    ///
    /// A miss everywhere is `Ok(None)`; lookup and name-service failures
    /// propagate.
    pub async fn run(&self, content: &str, cx: &Context<'_>) -> Result<Option<Hit>, ResolveError> {
        let base = (self.base)(content);
        let mut variants: Option<Vec<String>> = None;
        let mut tried: HashSet<(Table, &'static str, String)> = HashSet::new();

        for step in &self.steps {
            let candidates: Vec<String> = match step.source {
                Source::Base => vec![base.clone()],
                Source::Variants => {
                    if variants.is_none() {
                        variants = Some(self.variants(content, &base, cx).await?);
                    }
                    variants.clone().unwrap_or_default()
                }
                Source::Derived(derive) => derive(&base).into_iter().collect(),
            };

            for candidate in candidates {
                if step.max_chars.is_some_and(|max| char_len(&candidate) > max) {
                    continue;
                }
                let query = step.query;
                let key = (query.render)(&candidate);
                if !tried.insert((query.table, query.field, key.clone())) {
                    continue;
                }
                if let Some(hit) = self.query(&query, &key, cx).await? {
                    info!(
                        pipeline = self.name,
                        content,
                        candidate = %key,
                        table = %hit.table,
                        standardized = %hit.standardized,
                        "resolved mention"
                    );
                    return Ok(Some(hit));
                }
            }
        }

        debug!(pipeline = self.name, content, tried = tried.len(), "mention unresolved");
        Ok(None)
    }

    /// Name-service suggestions plus augmentations of the base form and of
    /// every suggestion, deduplicated in generation order, base excluded.
    async fn variants(
        &self,
        content: &str,
        base: &str,
        cx: &Context<'_>,
    ) -> Result<Vec<String>, ResolveError> {
        let mut seeds = vec![base.to_string()];
        if self.name_service {
            for v in cx.names.variants(content).await? {
                push_unique(&mut seeds, v);
            }
        }

        let mut out = Vec::new();
        for seed in seeds {
            for a in (self.augment)(&seed) {
                push_unique(&mut out, a);
            }
            push_unique(&mut out, seed);
        }
        out.retain(|c| c != base && !c.is_empty());
        debug!(pipeline = self.name, content, variants = ?out, "candidate variants");
        Ok(out)
    }

    async fn query(&self, query: &Query, key: &str, cx: &Context<'_>) -> Result<Option<Hit>, ResolveError> {
        let conds: &[(&str, &str)] = &[(query.field, key)];
        let result = cx
            .retry
            .run("registry lookup", move || cx.registry.lookup(query.table, conds))
            .await
            .map_err(|e| e.into_inner())?;

        let Some(record) = result.first() else {
            return Ok(None);
        };
        let standardized = query
            .answer
            .and_then(|f| record.get(f))
            .and_then(|v| v.as_str())
            .unwrap_or(key)
            .to_string();
        Ok(Some(Hit {
            standardized,
            table: query.table,
            field: query.answer.unwrap_or(query.field),
        }))
    }
}

pub fn as_is(s: &str) -> String {
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lawqa_ai::FixedNames;
    use lawqa_store::{MemoryRegistry, field};
    use serde_json::json;

    fn no_augment(_: &str) -> Vec<String> {
        Vec::new()
    }

    fn reverse(s: &str) -> Vec<String> {
        vec![s.chars().rev().collect()]
    }

    fn pipeline(augment: fn(&str) -> Vec<String>, name_service: bool) -> CandidatePipeline {
        CandidatePipeline {
            name: "test",
            base: as_is,
            name_service,
            augment,
            steps: vec![
                Step::base(Query::new(Table::CourtInfo, field::COURT_NAME)),
                Step::variants(Query::new(Table::CourtInfo, field::COURT_NAME)),
            ],
        }
    }

    #[tokio::test]
    async fn base_hit_skips_variants() {
        let registry =
            MemoryRegistry::new().with(Table::CourtInfo, json!({"法院名称": "北京市丰台区人民法院"}));
        let names = FixedNames::new();
        let retry = RetryPolicy::once();
        let cx = Context {
            registry: &registry,
            names: &names,
            retry: &retry,
        };
        let hit = pipeline(no_augment, true)
            .run("北京市丰台区人民法院", &cx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.table, Table::CourtInfo);
        assert_eq!(registry.queries().len(), 1);
    }

    #[tokio::test]
    async fn variants_tried_in_order_until_hit() {
        let registry = MemoryRegistry::new()
            .with(Table::CourtInfo, json!({"法院名称": "北京市丰台区人民法院"}));
        let names = FixedNames::new().with("丰台法院", &["丰台区人民法院", "北京市丰台区人民法院"]);
        let retry = RetryPolicy::once();
        let cx = Context {
            registry: &registry,
            names: &names,
            retry: &retry,
        };
        let hit = pipeline(no_augment, true)
            .run("丰台法院", &cx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.standardized, "北京市丰台区人民法院");
        let tried: Vec<String> = registry.queries().into_iter().map(|(_, c)| c[0].1.clone()).collect();
        assert_eq!(tried, vec!["丰台法院", "丰台区人民法院", "北京市丰台区人民法院"]);
    }

    #[tokio::test]
    async fn augmentations_precede_their_seed_and_skip_base() {
        let registry = MemoryRegistry::new();
        let names = FixedNames::new();
        let retry = RetryPolicy::once();
        let cx = Context {
            registry: &registry,
            names: &names,
            retry: &retry,
        };
        let hit = pipeline(reverse, false).run("甲乙", &cx).await.unwrap();
        assert!(hit.is_none());
        let tried: Vec<String> = registry.queries().into_iter().map(|(_, c)| c[0].1.clone()).collect();
        assert_eq!(tried, vec!["甲乙", "乙甲"]);
    }

    #[tokio::test]
    async fn missing_answer_field_keeps_candidate() {
        let registry = MemoryRegistry::new().with(Table::CompanyInfo, json!({"公司代码": "600151"}));
        let names = FixedNames::new();
        let retry = RetryPolicy::once();
        let cx = Context {
            registry: &registry,
            names: &names,
            retry: &retry,
        };
        let p = CandidatePipeline {
            name: "code",
            base: as_is,
            name_service: false,
            augment: no_augment,
            steps: vec![Step::base(
                Query::new(Table::CompanyInfo, field::STOCK_CODE).answer(None),
            )],
        };
        let hit = p.run("600151", &cx).await.unwrap().unwrap();
        assert_eq!(hit.standardized, "600151");
    }

    #[tokio::test]
    async fn max_chars_filters_long_candidates() {
        let registry = MemoryRegistry::new();
        let names = FixedNames::new().with("航天机电公司", &["上海航天汽车机电股份有限公司"]);
        let retry = RetryPolicy::once();
        let cx = Context {
            registry: &registry,
            names: &names,
            retry: &retry,
        };
        let p = CandidatePipeline {
            name: "short",
            base: as_is,
            name_service: true,
            augment: no_augment,
            steps: vec![
                Step::variants(Query::new(Table::CompanyInfo, field::COMPANY_ABBREVIATION))
                    .max_chars(5),
            ],
        };
        assert!(p.run("航天机电公司", &cx).await.unwrap().is_none());
        assert!(registry.queries().is_empty());
    }
}
