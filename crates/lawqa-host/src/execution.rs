//! Self-correcting execution of one task.
//!
//! `Drafting → Executing → {Succeeded | Repairing → Executing}` with at most
//! `max_execution_attempts` executions in total. Every attempt's output is offered
//! to the [`SolutionSpace`], so a fully failed task still leaves its most
//! substantive partial result behind.
//!
//! Misindented code is not patched: the attempt is abandoned with
//! [`PipelineError::SynthesisMalformed`] and drafted afresh, up to
//! `synthesis_attempts` times. Redrafts spend the same execution budget.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use lawqa_ai::{AiError, CompletionService, Message, parse_code};
use lawqa_core::{RetryPolicy, Settings, Task};

use crate::code;
use crate::error::PipelineError;
use crate::prompts;
use crate::sandbox::{Sandbox, SandboxError, SandboxOutcome};
use crate::solution::SolutionSpace;

/// Context the synthesiser sees next to the task instruction.
#[derive(Debug, Clone, Copy)]
pub struct Brief<'a> {
    pub question: &'a str,
    pub schemas: &'a str,
    pub tools: &'a str,
    /// Rendered results of the tasks this one depends on; empty for none.
    pub dependencies: &'a str,
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Executions across all drafts.
    pub attempts: u32,
    pub succeeded: bool,
}

struct Attempted {
    success: Option<(String, String)>,
}

pub struct ExecutionLoop<'a> {
    completion: &'a dyn CompletionService,
    sandbox: &'a dyn Sandbox,
    space: &'a SolutionSpace,
    settings: &'a Settings,
}

impl<'a> ExecutionLoop<'a> {
    pub fn new(
        completion: &'a dyn CompletionService,
        sandbox: &'a dyn Sandbox,
        space: &'a SolutionSpace,
        settings: &'a Settings,
    ) -> Self {
        Self {
            completion,
            sandbox,
            space,
            settings,
        }
    }

    /// Run `task` to a terminal state. Exhausting the execution attempts is
    /// not an error: `task.result` stays `None`.
    pub async fn run(&self, task: &mut Task, brief: Brief<'_>) -> Result<ExecutionReport, PipelineError> {
        let instruction = task.instruction.as_str();
        let executed = AtomicU32::new(0);
        let executed = &executed;
        let synthesis = RetryPolicy::new(
            self.settings.synthesis_attempts,
            Duration::ZERO,
            |e: &PipelineError| matches!(e, PipelineError::SynthesisMalformed(_)),
        );
        let attempted = synthesis
            .run("synthesis", move || self.attempt(brief, instruction, executed))
            .await
            .map_err(|e| PipelineError::from_retry("synthesis", e))?;

        let attempts = executed.load(Ordering::Relaxed);
        let succeeded = attempted.success.is_some();
        if let Some((result, code)) = attempted.success {
            task.result = Some(result);
            task.code = Some(code);
        } else {
            warn!(task = %task.id, attempts, "task exhausted execution attempts");
        }
        Ok(ExecutionReport { attempts, succeeded })
    }

    async fn attempt(&self, brief: Brief<'_>, instruction: &str, executed: &AtomicU32) -> Result<Attempted, PipelineError> {
        let max = self.settings.max_execution_attempts.max(1);
        if executed.load(Ordering::Relaxed) >= max {
            return Ok(Attempted { success: None });
        }
        let draft = prompts::synthesize(brief.question, instruction, brief.dependencies, brief.schemas, brief.tools);
        let mut code = code::prepare(&self.complete_code(&draft).await?);

        loop {
            let n = executed.fetch_add(1, Ordering::Relaxed) + 1;
            let outcome = self.execute(&code).await?;
            if self.space.promote(&outcome.result, &code) {
                debug!(attempt = n, chars = outcome.result.chars().count(), "best result promoted");
            }
            if outcome.success {
                info!(attempt = n, "task executed");
                return Ok(Attempted {
                    success: Some((outcome.result, code)),
                });
            }
            if outcome.is_structural() && n < max {
                warn!(attempt = n, error = %outcome.error_value, "malformed code, drafting again");
                return Err(PipelineError::SynthesisMalformed(outcome.error_value));
            }
            warn!(attempt = n, max, ename = %outcome.error_name, "execution failed");
            if n >= max {
                return Ok(Attempted { success: None });
            }
            let fix = prompts::repair(brief.question, instruction, &code, &outcome.error_description());
            code = code::prepare(&self.complete_code(&fix).await?);
        }
    }

    async fn complete_code(&self, messages: &[Message]) -> Result<String, PipelineError> {
        let completion = self.completion;
        let max_tokens = Some(self.settings.code_max_tokens);
        self.settings
            .service_retry(AiError::is_retryable)
            .run("code synthesis", move || async move {
                let reply = completion.complete(messages, max_tokens).await?;
                parse_code(&reply.content)
            })
            .await
            .map_err(|e| PipelineError::from_retry("code synthesis", e))
    }

    async fn execute(&self, code: &str) -> Result<SandboxOutcome, PipelineError> {
        let sandbox = self.sandbox;
        self.settings
            .service_retry(SandboxError::is_retryable)
            .run("sandbox", move || sandbox.execute(code, false))
            .await
            .map_err(|e| PipelineError::from_retry("sandbox", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lawqa_ai::ReplayCompletion;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Plays back outcomes in order and records the code it was given.
    struct Scripted {
        outcomes: Mutex<VecDeque<SandboxOutcome>>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<SandboxOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn executions(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Sandbox for Scripted {
        async fn execute(&self, code: &str, preserve_context: bool) -> Result<SandboxOutcome, SandboxError> {
            assert!(!preserve_context);
            self.seen.lock().unwrap().push(code.to_string());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| SandboxError::Other("script exhausted".into()))
        }
    }

    fn codes(n: usize) -> ReplayCompletion {
        ReplayCompletion::new((0..n).map(|i| format!("```python\nprint({i})\n```")))
    }

    fn brief() -> Brief<'static> {
        Brief {
            question: "航天机电的法人是谁？",
            schemas: "CompanyInfo: 公司名称",
            tools: "get_company_info 工具",
            dependencies: "",
        }
    }

    #[tokio::test]
    async fn four_failures_leave_task_unset_and_keep_longest_output() {
        let settings = Settings::immediate();
        let completion = codes(4);
        let sandbox = Scripted::new(vec![
            SandboxOutcome::failed("短", "NameError", "name 'x' is not defined"),
            SandboxOutcome::failed("这是最长的一次部分输出结果", "KeyError", "'法人代表'"),
            SandboxOutcome::failed("", "TypeError", "bad"),
            SandboxOutcome::failed("中等长度输出", "KeyError", "'x'"),
            SandboxOutcome::ok("never reached"),
        ]);
        let space = SolutionSpace::new();
        let exec = ExecutionLoop::new(&completion, &sandbox, &space, &settings);

        let mut task = Task::new("1", "查询法人");
        let report = exec.run(&mut task, brief()).await.unwrap();

        assert_eq!(report, ExecutionReport { attempts: 4, succeeded: false });
        assert_eq!(sandbox.executions(), 4);
        assert!(task.result.is_none());
        assert_eq!(space.get_result(), "这是最长的一次部分输出结果");
        assert!(space.get_executed_code().ends_with("print(1)"));
    }

    #[tokio::test]
    async fn repair_prompt_carries_error_and_success_sets_task() {
        let settings = Settings::immediate();
        let completion = codes(2);
        let mut failed = SandboxOutcome::failed("", "NameError", "name 'x' is not defined");
        failed.traceback = "line 1".into();
        let sandbox = Scripted::new(vec![failed, SandboxOutcome::ok("法人代表: 张三")]);
        let space = SolutionSpace::new();
        let exec = ExecutionLoop::new(&completion, &sandbox, &space, &settings);

        let mut task = Task::new("1", "查询法人");
        let report = exec.run(&mut task, brief()).await.unwrap();

        assert_eq!(report, ExecutionReport { attempts: 2, succeeded: true });
        assert_eq!(task.result.as_deref(), Some("法人代表: 张三"));
        assert!(task.code.as_deref().unwrap().starts_with(code::TOOL_PRELUDE));

        let requests = completion.requests();
        let repair = &requests[1].last().unwrap().content;
        assert!(repair.contains("Error Name: NameError"));
        assert!(repair.contains("Traceback:\nline 1"));
        assert!(repair.contains("print(0)"));
    }

    #[tokio::test]
    async fn misindented_code_is_drafted_again() {
        let settings = Settings::immediate();
        let completion = codes(2);
        let sandbox = Scripted::new(vec![
            SandboxOutcome::failed("", "RunCodeException", "IndentationError: unexpected indent"),
            SandboxOutcome::ok("done"),
        ]);
        let space = SolutionSpace::new();
        let exec = ExecutionLoop::new(&completion, &sandbox, &space, &settings);

        let mut task = Task::new("1", "x");
        let report = exec.run(&mut task, brief()).await.unwrap();
        assert_eq!(report.attempts, 2);
        assert!(report.succeeded);

        // Both completions were fresh drafts, not repairs.
        for request in completion.requests() {
            assert!(!request.last().unwrap().content.contains("运行出错"));
        }
    }

    #[tokio::test]
    async fn persistent_malformed_code_exhausts_synthesis() {
        let settings = Settings {
            synthesis_attempts: 2,
            ..Settings::immediate()
        };
        let completion = codes(2);
        let broken = || SandboxOutcome::failed("", "RunCodeException", "IndentationError");
        let sandbox = Scripted::new(vec![broken(), broken()]);
        let space = SolutionSpace::new();
        let exec = ExecutionLoop::new(&completion, &sandbox, &space, &settings);

        let err = exec.run(&mut Task::new("1", "x"), brief()).await.unwrap_err();
        assert!(matches!(err, PipelineError::RetryExhausted { stage: "synthesis", attempts: 2, .. }));
    }

    #[tokio::test]
    async fn redrafts_share_the_execution_budget() {
        let settings = Settings {
            synthesis_attempts: 2,
            ..Settings::immediate()
        };
        let completion = codes(4);
        let sandbox = Scripted::new(vec![
            SandboxOutcome::failed("", "NameError", "x"),
            SandboxOutcome::failed("", "KeyError", "y"),
            SandboxOutcome::failed("", "RunCodeException", "IndentationError: unexpected indent"),
            SandboxOutcome::failed("", "TypeError", "z"),
            SandboxOutcome::ok("never reached"),
        ]);
        let space = SolutionSpace::new();
        let exec = ExecutionLoop::new(&completion, &sandbox, &space, &settings);

        let mut task = Task::new("1", "x");
        let report = exec.run(&mut task, brief()).await.unwrap();

        assert_eq!(report, ExecutionReport { attempts: 4, succeeded: false });
        assert_eq!(sandbox.executions(), 4);
        // draft, repair, repair, redraft
        assert_eq!(completion.requests().len(), 4);
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn shorter_success_does_not_shrink_the_best_partial() {
        let settings = Settings::immediate();
        let completion = codes(2);
        let sandbox = Scripted::new(vec![
            SandboxOutcome::failed("公司名称: 甲公司\n法人代表: 张三\n注册资本: 100万", "KeyError", "'x'"),
            SandboxOutcome::ok("张三"),
        ]);
        let space = SolutionSpace::new();
        let exec = ExecutionLoop::new(&completion, &sandbox, &space, &settings);

        let mut task = Task::new("1", "查询法人");
        let report = exec.run(&mut task, brief()).await.unwrap();

        assert!(report.succeeded);
        assert_eq!(task.result.as_deref(), Some("张三"));
        assert!(space.get_result().starts_with("公司名称: 甲公司"));
        assert!(space.get_executed_code().ends_with("print(0)"));
    }

    #[tokio::test]
    async fn dependency_results_reach_the_draft() {
        let settings = Settings::immediate();
        let completion = codes(1);
        let sandbox = Scripted::new(vec![SandboxOutcome::ok("上海市")]);
        let space = SolutionSpace::new();
        let exec = ExecutionLoop::new(&completion, &sandbox, &space, &settings);

        let brief = Brief {
            dependencies: "任务 1 的结果：\n注册地址: 上海市浦东新区",
            ..brief()
        };
        exec.run(&mut Task::new("2", "查询城市"), brief).await.unwrap();
        let requests = completion.requests();
        let draft = &requests[0].last().unwrap().content;
        assert!(draft.contains("注册地址: 上海市浦东新区"));
    }

    /// Looks the company up through the tool registry, surfacing rejected
    /// calls the way the interpreter does.
    struct Registered {
        tools: crate::tools::ToolRegistry,
    }

    #[async_trait]
    impl Sandbox for Registered {
        async fn execute(&self, code: &str, _: bool) -> Result<SandboxOutcome, SandboxError> {
            let name = if code.contains("print(0)") { "航天机电" } else { "上海航天汽车机电股份有限公司" };
            Ok(match self.tools.call_value("get_company_register", name).await {
                Ok(record) => SandboxOutcome::ok(record.to_string()),
                Err(e) => SandboxOutcome::from(&e),
            })
        }
    }

    #[tokio::test]
    async fn rejected_tool_arguments_reach_the_repair_prompt() {
        let store = lawqa_store::MemoryRegistry::new().with(
            lawqa_store::Table::CompanyRegister,
            serde_json::json!({"公司名称": "上海航天汽车机电股份有限公司", "法定代表人": "荆怀靖"}),
        );
        let sandbox = Registered {
            tools: crate::tools::ToolRegistry::new(std::sync::Arc::new(store)),
        };
        let settings = Settings::immediate();
        let completion = codes(2);
        let space = SolutionSpace::new();
        let exec = ExecutionLoop::new(&completion, &sandbox, &space, &settings);

        let mut task = Task::new("1", "查询工商信息");
        let report = exec.run(&mut task, brief()).await.unwrap();
        assert_eq!(report, ExecutionReport { attempts: 2, succeeded: true });
        assert!(task.result.unwrap().contains("荆怀靖"));

        let requests = completion.requests();
        let repair = &requests[1].last().unwrap().content;
        assert!(repair.contains("Error Name: get_company_register 参数错误"));
        assert!(repair.contains("Error Value: value 不能使用公司简称"));
    }
}
