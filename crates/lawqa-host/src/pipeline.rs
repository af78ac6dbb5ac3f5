//! One question end to end, under a wall-clock budget.
//!
//! Stages run strictly in order: rewrite → resolve → filter → plan →
//! execute → combine → postprocess. Complaint questions leave after
//! resolution and are answered by the [`ComplaintWriter`]. When the budget expires the pipeline
//! future is dropped and a shorter path composes a degraded answer from the
//! question's [`SolutionSpace`] alone.

use std::sync::Arc;

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use lawqa_ai::{AiError, CompletionService};
use lawqa_core::{Plan, Settings};
use lawqa_resolve::EntityResolver;

use crate::complaint::{COMPLAINT_MARKER, ComplaintWriter};
use crate::error::PipelineError;
use crate::execution::{Brief, ExecutionLoop};
use crate::prompts;
use crate::sandbox::SandboxProvider;
use crate::solution::SolutionSpace;
use crate::stages::{self, Postprocessor};
use crate::tools::ToolRegistry;

/// External collaborators shared by every question.
#[derive(Clone)]
pub struct Services {
    pub completion: Arc<dyn CompletionService>,
    pub resolver: Arc<EntityResolver>,
    pub tools: Arc<ToolRegistry>,
    pub sandboxes: Arc<dyn SandboxProvider>,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub rewritten: String,
    pub annotated: String,
    pub plan: Plan,
}

/// How a budgeted run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Answered(String),
    /// Budget expired; answer composed from the best partial result.
    Degraded(String),
    /// Budget expired and no degraded answer could be composed in time.
    TimedOut,
}

pub struct QaPipeline {
    services: Services,
    settings: Settings,
}

impl QaPipeline {
    pub fn new(services: Services, settings: Settings) -> Self {
        Self { services, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.services.tools
    }

    /// Run within `question_budget`, falling back on expiry. Errors are
    /// returned only when the pipeline itself failed.
    pub async fn answer_within_budget(&self, id: &str, question: &str) -> Result<Outcome, PipelineError> {
        let space = SolutionSpace::new();
        match timeout(self.settings.question_budget, self.answer(id, question, &space)).await {
            Ok(Ok(answer)) => Ok(Outcome::Answered(answer.answer)),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(id, budget = ?self.settings.question_budget, "question budget expired, composing fallback");
                match timeout(self.settings.fallback_budget, self.fallback(question, &space)).await {
                    Ok(Ok(answer)) if !answer.is_empty() => Ok(Outcome::Degraded(answer)),
                    Ok(Err(e)) if e.is_fatal() => Err(e),
                    Ok(Err(e)) => {
                        warn!(id, error = %e, "fallback failed");
                        Ok(Outcome::TimedOut)
                    }
                    _ => Ok(Outcome::TimedOut),
                }
            }
        }
    }

    /// The full pipeline, writing partial results into `space`.
    pub async fn answer(&self, id: &str, question: &str, space: &SolutionSpace) -> Result<Answer, PipelineError> {
        let completion = self.services.completion.as_ref();
        let tools = self.services.tools.as_ref();
        let retry = self.settings.service_retry(AiError::is_retryable);

        let rewritten = stages::rewrite(completion, &retry, question).await?;
        self.pause().await;

        let resolution = self.services.resolver.canonicalize(&rewritten).await?;
        self.pause().await;

        if question.contains(COMPLAINT_MARKER) {
            let answer = ComplaintWriter::new(completion, tools, retry)
                .write(&resolution.rewritten)
                .await?;
            info!(id, "complaint written");
            return Ok(Answer {
                answer,
                rewritten: resolution.rewritten,
                annotated: resolution.annotated,
                plan: Plan::default(),
            });
        }

        let selection = stages::select_tables(completion, &retry, tools, &resolution.rewritten).await?;
        let schemas = prompts::schema_notes(&selection.schemas());
        let catalogue = tools.describe(&selection.tools);
        self.pause().await;

        let mut plan = stages::plan(
            completion,
            &retry,
            &resolution.rewritten,
            &resolution.annotated,
            &schemas,
            &catalogue,
        )
        .await?;
        self.pause().await;

        let sandbox = self.services.sandboxes.session(id);
        let exec = ExecutionLoop::new(completion, sandbox.as_ref(), space, &self.settings);
        for i in 0..plan.tasks.len() {
            let dependencies = prompts::dependency_notes(&plan.dependency_results(&plan.tasks[i]));
            let brief = Brief {
                question: &resolution.annotated,
                schemas: &schemas,
                tools: &catalogue,
                dependencies: &dependencies,
            };
            let task = &mut plan.tasks[i];
            let report = exec.run(task, brief).await?;
            info!(id, task = %task.id, attempts = report.attempts, succeeded = report.succeeded, "task finished");
        }
        self.pause().await;

        let (result, code) = collect(&plan, space);
        let combined = stages::combine(completion, &retry, &resolution.rewritten, &code, &result).await?;
        let answer = Postprocessor::new(tools).finish(question, &combined).await;
        info!(id, "question answered");

        Ok(Answer {
            answer,
            rewritten: resolution.rewritten,
            annotated: resolution.annotated,
            plan,
        })
    }

    /// Degraded answer from the best partial result alone.
    pub async fn fallback(&self, question: &str, space: &SolutionSpace) -> Result<String, PipelineError> {
        let snapshot = space.snapshot();
        let retry = self.settings.service_retry(AiError::is_retryable);
        let combined = stages::combine(
            self.services.completion.as_ref(),
            &retry,
            question,
            &snapshot.code,
            &snapshot.result,
        )
        .await?;
        Ok(Postprocessor::new(&self.services.tools).finish(question, &combined).await)
    }

    async fn pause(&self) {
        if !self.settings.stage_delay.is_zero() {
            sleep(self.settings.stage_delay).await;
        }
    }
}

/// Task results and code in plan order; the best partial result when no
/// task finished.
fn collect(plan: &Plan, space: &SolutionSpace) -> (String, String) {
    let done: Vec<_> = plan.tasks.iter().filter(|t| t.is_done()).collect();
    if done.is_empty() {
        let snapshot = space.snapshot();
        return (snapshot.result.clone(), snapshot.code.clone());
    }
    let result = done
        .iter()
        .filter_map(|t| t.result.as_deref())
        .collect::<Vec<_>>()
        .join("\n");
    let code = done
        .iter()
        .filter_map(|t| t.code.as_deref())
        .collect::<Vec<_>>()
        .join("\n\n");
    (result, code)
}
