//! A question naming a company by a stale, misspelled abbreviation is
//! answered in terms of the registry's canonical name only.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use lawqa_ai::{AiError, CompletionService, FixedNames, Message, MentionRecognizer};
use lawqa_core::{RetryPolicy, Settings};
use lawqa_host::{
    QaPipeline, Sandbox, SandboxError, SandboxOutcome, SandboxProvider, Services, SolutionSpace,
    ToolRegistry,
};
use lawqa_resolve::EntityResolver;
use lawqa_store::{MemoryRegistry, Table};

const CANONICAL: &str = "上海航天汽车机电股份有限公司";
const STALE: &str = "航天天机电";

fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let len = text[start..].find(close)?;
    Some(&text[start..start + len])
}

/// Stands in for the model: answers each stage from what its prompt carries.
#[derive(Default)]
struct Oracle {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionService for Oracle {
    async fn complete(&self, messages: &[Message], _: Option<u32>) -> Result<Message, AiError> {
        let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt.clone());

        let reply = if prompt.contains("[命名实体类型]") {
            format!("```json\n[{{\"type\": \"公司简称\", \"content\": \"{STALE}\"}}]\n```")
        } else if prompt.contains("请在不改变含义") {
            prompt.rsplit("问题：").next().unwrap_or_default().to_string()
        } else if prompt.contains("请选出") {
            "```json\n[{\"table_name\": \"CompanyInfo\", \"fields\": [\"注册地址\"]}]\n```".to_string()
        } else if prompt.contains("请制定") {
            "```json\n{\"plan\": \"查询注册地址\", \"steps\": [{\"id\": 1, \"description\": \"get_company_info 查询注册地址\", \"tool\": \"get_company_info\"}]}\n```".to_string()
        } else if prompt.contains("请编写") {
            let name = between(&prompt, "'公司名称': '", "'").unwrap_or(STALE);
            format!("```python\ninfo = get_company_info('{name}')\nprint(info['注册地址'])\n```")
        } else if prompt.contains("请根据运行结果回答") {
            let result = between(&prompt, "运行结果：\n", "\n").unwrap_or_default();
            format!("根据运行结果，注册地址为{result}")
        } else {
            return Err(AiError::Other(format!("unexpected prompt: {prompt}")));
        };
        Ok(Message::assistant(reply))
    }
}

/// Runs `get_company_info('<name>')` against the tool registry and records
/// the code it was given.
struct ToolSandbox {
    tools: Arc<ToolRegistry>,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Sandbox for ToolSandbox {
    async fn execute(&self, code: &str, _: bool) -> Result<SandboxOutcome, SandboxError> {
        self.seen.lock().unwrap().push(code.to_string());
        let Some(name) = between(code, "get_company_info('", "')") else {
            return Ok(SandboxOutcome::failed("", "NameError", "no lookup"));
        };
        let info = match self.tools.call_value("get_company_info", name).await {
            Ok(info) => info,
            Err(e) => return Ok(SandboxOutcome::from(&e)),
        };
        match info["注册地址"].as_str() {
            Some(addr) => Ok(SandboxOutcome::ok(addr)),
            None => Ok(SandboxOutcome::failed("{}", "KeyError", "'注册地址'")),
        }
    }
}

struct Provider(Arc<ToolSandbox>);

impl SandboxProvider for Provider {
    fn session(&self, _: &str) -> Arc<dyn Sandbox> {
        self.0.clone()
    }
}

#[tokio::test]
async fn stale_abbreviation_becomes_the_only_name_in_play() {
    let registry = Arc::new(MemoryRegistry::new().with(
        Table::CompanyInfo,
        json!({"公司名称": CANONICAL, "公司简称": "航天机电", "公司代码": "600151", "注册地址": "上海市浦东新区"}),
    ));
    let oracle = Arc::new(Oracle::default());
    let completion: Arc<dyn CompletionService> = oracle.clone();
    let tools = Arc::new(ToolRegistry::new(registry.clone()));
    let sandbox = Arc::new(ToolSandbox {
        tools: tools.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let resolver = EntityResolver::new(
        MentionRecognizer::new(completion.clone(), RetryPolicy::once()),
        registry,
        Arc::new(FixedNames::new()),
        RetryPolicy::once(),
    );
    let pipeline = QaPipeline::new(
        Services {
            completion,
            resolver: Arc::new(resolver),
            tools,
            sandboxes: Arc::new(Provider(sandbox.clone())),
        },
        Settings::immediate(),
    );

    let space = SolutionSpace::new();
    let answer = pipeline
        .answer("q1", &format!("{STALE}的注册地址在哪里？"), &space)
        .await
        .unwrap();

    assert_eq!(answer.rewritten, format!("{CANONICAL}的注册地址在哪里？"));
    assert!(answer.annotated.contains(&format!("'公司名称': '{CANONICAL}'")));
    assert_eq!(answer.answer, "注册地址为上海市浦东新区");
    assert_eq!(answer.plan.tasks[0].result.as_deref(), Some("上海市浦东新区"));

    let seen = sandbox.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains(&format!("get_company_info('{CANONICAL}')")));
    assert!(!seen[0].contains(STALE));
    assert!(!seen[0].contains("'航天机电'"));

    // Nothing after resolution saw the stale spelling.
    let prompts = oracle.prompts.lock().unwrap();
    let synthesis = prompts.iter().find(|p| p.contains("请编写")).unwrap();
    assert!(!synthesis.contains(STALE));
}
