//! Batch runner: pending questions through the pipeline with bounded
//! concurrency, answers recorded as they finish.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{error, info, warn};

use lawqa_host::{Outcome, PipelineError, QaPipeline};

use crate::batch::{BatchRecord, ERROR_PREFIX, StateFile};

/// How a batch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEnd {
    Completed { answered: usize, failed: usize },
    /// The completion service reported exhausted billing.
    BalanceDepleted,
    /// The batch wall-clock limit expired with questions still running.
    TimeLimit,
}

enum Handled {
    Answered,
    Failed,
}

/// Text recorded for a question. Fatal errors are returned instead.
pub fn answer_text(result: Result<Outcome, PipelineError>) -> Result<(String, bool), PipelineError> {
    match result {
        Ok(Outcome::Answered(answer)) => Ok((answer, true)),
        Ok(Outcome::Degraded(answer)) => Ok((format!("{ERROR_PREFIX}: 超时 {answer}"), false)),
        Ok(Outcome::TimedOut) => Ok((format!("{ERROR_PREFIX}: 超时"), false)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) if e.is_exhausted() => Ok((format!("{ERROR_PREFIX}: RetryError"), false)),
        Err(e) => Ok((format!("{ERROR_PREFIX}: {e}"), false)),
    }
}

async fn handle(pipeline: Arc<QaPipeline>, state: &StateFile, record: BatchRecord) -> anyhow::Result<Handled> {
    let id = record.id_text();
    info!(%id, question = %record.question, "question started");

    // The pipeline runs in its own task so a panic is recorded against this
    // question. Dropping the set aborts the task when the worker is aborted.
    let mut run = JoinSet::new();
    {
        let (id, question) = (id.clone(), record.question.clone());
        run.spawn(async move { pipeline.answer_within_budget(&id, &question).await });
    }
    let result = match run.join_next().await {
        Some(Ok(result)) => result,
        Some(Err(e)) if e.is_panic() => {
            error!(%id, error = %e, "question panicked");
            state.record_answer(&record.id, &format!("{ERROR_PREFIX}: {e}")).await?;
            return Ok(Handled::Failed);
        }
        Some(Err(e)) => return Err(e.into()),
        None => anyhow::bail!("question {id} was never started"),
    };
    if let Err(e) = &result {
        error!(%id, error = %e, "question failed");
    }
    let (answer, ok) = answer_text(result)?;
    state.record_answer(&record.id, &answer).await?;
    Ok(if ok { Handled::Answered } else { Handled::Failed })
}

fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<PipelineError>()
        .is_some_and(PipelineError::is_fatal)
}

pub async fn run_batch(
    pipeline: Arc<QaPipeline>,
    state: Arc<StateFile>,
    max_concurrency: usize,
    time_limit: Option<Duration>,
) -> anyhow::Result<BatchEnd> {
    let started = Utc::now();
    let deadline = time_limit.map(|limit| Instant::now() + limit);
    let pending = state.pending()?;
    info!(pending = pending.len(), max_concurrency, %started, "batch started");

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut workers = JoinSet::new();
    for record in pending {
        let pipeline = Arc::clone(&pipeline);
        let state = Arc::clone(&state);
        let semaphore = Arc::clone(&semaphore);
        workers.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            handle(pipeline, &state, record).await
        });
    }

    let (mut answered, mut failed) = (0, 0);
    loop {
        let next = match deadline {
            Some(at) => match timeout_at(at, workers.join_next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(remaining = workers.len(), "batch time limit reached");
                    workers.abort_all();
                    return Ok(BatchEnd::TimeLimit);
                }
            },
            None => workers.join_next().await,
        };
        let Some(joined) = next else { break };
        match joined {
            Ok(Ok(Handled::Answered)) => answered += 1,
            Ok(Ok(Handled::Failed)) => failed += 1,
            Ok(Err(e)) if is_fatal(&e) => {
                error!(error = %e, "balance depleted, stopping batch");
                workers.abort_all();
                return Ok(BatchEnd::BalanceDepleted);
            }
            Ok(Err(e)) => return Err(e),
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                error!(error = %e, "worker panicked");
                failed += 1;
            }
        }
    }

    let elapsed = Utc::now() - started;
    info!(answered, failed, elapsed_secs = elapsed.num_seconds(), "batch finished");
    Ok(BatchEnd::Completed { answered, failed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lawqa_ai::{AiError, CompletionService, FixedNames, Message, MentionRecognizer};
    use lawqa_core::{RetryPolicy, Settings};
    use lawqa_host::{Sandbox, SandboxError, SandboxOutcome, SandboxProvider, Services, ToolRegistry};
    use lawqa_resolve::EntityResolver;
    use lawqa_store::MemoryRegistry;

    struct Broke;

    #[async_trait]
    impl CompletionService for Broke {
        async fn complete(&self, _: &[Message], _: Option<u32>) -> Result<Message, AiError> {
            Err(AiError::BalanceDepleted("Arrearage".into()))
        }
    }

    /// Panics on questions containing "崩溃"; a gateway error otherwise.
    struct Flaky;

    #[async_trait]
    impl CompletionService for Flaky {
        async fn complete(&self, messages: &[Message], _: Option<u32>) -> Result<Message, AiError> {
            if messages.iter().any(|m| m.content.contains("崩溃")) {
                panic!("completion client crashed");
            }
            Err(AiError::Server {
                status: 503,
                body: "upstream connect error: load balancer unavailable".into(),
            })
        }
    }

    struct Idle;

    #[async_trait]
    impl Sandbox for Idle {
        async fn execute(&self, _: &str, _: bool) -> Result<SandboxOutcome, SandboxError> {
            Ok(SandboxOutcome::ok(""))
        }
    }

    impl SandboxProvider for Idle {
        fn session(&self, _: &str) -> Arc<dyn Sandbox> {
            Arc::new(Idle)
        }
    }

    fn pipeline(completion: Arc<dyn CompletionService>) -> Arc<QaPipeline> {
        let registry = Arc::new(MemoryRegistry::new());
        let resolver = EntityResolver::new(
            MentionRecognizer::new(Arc::clone(&completion), RetryPolicy::once()),
            registry.clone(),
            Arc::new(FixedNames::new()),
            RetryPolicy::once(),
        );
        Arc::new(QaPipeline::new(
            Services {
                completion,
                resolver: Arc::new(resolver),
                tools: Arc::new(ToolRegistry::new(registry)),
                sandboxes: Arc::new(Idle),
            },
            Settings::immediate(),
        ))
    }

    #[test]
    fn outcomes_map_to_recorded_text() {
        assert_eq!(
            answer_text(Ok(Outcome::Answered("张三".into()))).unwrap(),
            ("张三".to_string(), true)
        );
        assert_eq!(
            answer_text(Ok(Outcome::Degraded("张三".into()))).unwrap().0,
            "处理出错: 超时 张三"
        );
        assert_eq!(answer_text(Ok(Outcome::TimedOut)).unwrap().0, "处理出错: 超时");

        let exhausted = PipelineError::RetryExhausted {
            stage: "plan",
            attempts: 3,
            last: Box::new(AiError::RateLimited("slow".into()).into()),
        };
        assert_eq!(answer_text(Err(exhausted)).unwrap().0, "处理出错: RetryError");

        let other = PipelineError::SynthesisMalformed("IndentationError".into());
        assert!(answer_text(Err(other)).unwrap().0.starts_with("处理出错: synthesized code"));

        let fatal = PipelineError::Ai(AiError::BalanceDepleted("Arrearage".into()));
        assert!(answer_text(Err(fatal)).is_err());
    }

    #[tokio::test]
    async fn depleted_balance_stops_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.jsonl");
        std::fs::write(
            &path,
            "{\"id\": 1, \"question\": \"q1\", \"answer\": \"\"}\n{\"id\": 2, \"question\": \"q2\", \"answer\": \"\"}\n",
        )
        .unwrap();
        let state = Arc::new(StateFile::new(path));

        let end = run_batch(pipeline(Arc::new(Broke)), Arc::clone(&state), 1, None)
            .await
            .unwrap();
        assert_eq!(end, BatchEnd::BalanceDepleted);
        // Nothing was recorded: both questions stay pending for the next run.
        assert_eq!(state.pending().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_state_completes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.jsonl");
        std::fs::write(&path, "{\"id\": 1, \"question\": \"q1\", \"answer\": \"done\"}\n").unwrap();
        let end = run_batch(pipeline(Arc::new(Broke)), Arc::new(StateFile::new(path)), 4, None)
            .await
            .unwrap();
        assert_eq!(end, BatchEnd::Completed { answered: 0, failed: 0 });
    }

    #[tokio::test]
    async fn panics_and_transient_errors_keep_batch_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.jsonl");
        std::fs::write(
            &path,
            "{\"id\": 1, \"question\": \"崩溃\", \"answer\": \"\"}\n{\"id\": 2, \"question\": \"q2\", \"answer\": \"\"}\n",
        )
        .unwrap();
        let state = Arc::new(StateFile::new(path.clone()));

        let end = run_batch(pipeline(Arc::new(Flaky)), Arc::clone(&state), 2, None)
            .await
            .unwrap();
        assert_eq!(end, BatchEnd::Completed { answered: 0, failed: 2 });

        let records = crate::batch::read_records(&path).unwrap();
        assert!(records[0].answer.starts_with("处理出错: "));
        assert!(records[0].answer.contains("panicked"));
        assert_eq!(records[1].answer, "处理出错: RetryError");
    }
}
