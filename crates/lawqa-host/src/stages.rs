//! Sequential pipeline stages around resolution and execution.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use lawqa_ai::{AiError, CompletionService, Message, request_json};
use lawqa_core::casenum::{ascii_brackets_in_text, find_in_text};
use lawqa_core::{BracketStyle, Plan, PlanDraft, RetryPolicy};
use lawqa_store::field;

use crate::error::PipelineError;
use crate::prompts;
use crate::tools::{COMMON_TOOLS, REPORT_TOOL, ToolRegistry};

async fn complete_text(
    completion: &dyn CompletionService,
    messages: &[Message],
    retry: &RetryPolicy<AiError>,
    what: &'static str,
) -> Result<String, PipelineError> {
    retry
        .run(what, move || async move {
            let reply = completion.complete(messages, None).await?;
            Ok::<_, AiError>(reply.content)
        })
        .await
        .map_err(|e| PipelineError::from_retry(what, e))
}

/// `request_json` reports only the last error; a retryable one means the
/// attempts ran out.
fn exhausted(stage: &'static str, retry: &RetryPolicy<AiError>, e: AiError) -> PipelineError {
    if retry.is_retryable(&e) {
        PipelineError::RetryExhausted {
            stage,
            attempts: retry.max_attempts,
            last: Box::new(e.into()),
        }
    } else {
        e.into()
    }
}

// ── Rewrite ──

const PHRASES: &[(&str, &str)] = &[
    ("母公司", "控股公司"),
    ("审理当天", "判决当天"),
    ("审理日期", "判决当天"),
    ("审理时间", "判决当天"),
    ("圈资公司", "全资子公司"),
];

const QUERY_PREFIX: &str = "查询：";

/// Fixed phrase substitutions applied before and after the model rewrite.
pub fn substitute_phrases(question: &str) -> String {
    let mut out = PHRASES
        .iter()
        .fold(question.to_string(), |q, (from, to)| q.replace(from, to));
    if let Some(rest) = out.strip_prefix(QUERY_PREFIX) {
        out = rest.to_string();
    }
    out.trim().to_string()
}

/// Rewrite the question for clarity. An empty reply keeps the question.
pub async fn rewrite(
    completion: &dyn CompletionService,
    retry: &RetryPolicy<AiError>,
    question: &str,
) -> Result<String, PipelineError> {
    let question = substitute_phrases(question);
    let reply = complete_text(completion, &prompts::rewrite(&question), retry, "rewrite").await?;
    let rewritten = substitute_phrases(reply.trim());
    if rewritten.is_empty() {
        return Ok(question);
    }
    debug!(%rewritten, "question rewritten");
    Ok(rewritten)
}

// ── Table filter ──

/// One selected table with the fields the question needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSelection {
    pub table_name: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Tables and tools in scope for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub tables: Vec<TableSelection>,
    pub tools: Vec<&'static str>,
}

impl Selection {
    pub fn schemas(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.table_name.as_str()).collect()
    }

    /// `[{table_name, fields}]` as JSON text.
    pub fn render(&self) -> String {
        serde_json::to_string(&self.tables).unwrap_or_default()
    }
}

/// Pick tables and tools. Unknown tables are ignored; an empty selection
/// means the full catalogue.
pub async fn select_tables(
    completion: &dyn CompletionService,
    retry: &RetryPolicy<AiError>,
    tools: &ToolRegistry,
    question: &str,
) -> Result<Selection, PipelineError> {
    let catalogue = prompts::schema_notes(&[]);
    let picked: Vec<TableSelection> = request_json(
        completion,
        &prompts::select_tables(question, &catalogue),
        None,
        retry,
        "table filter",
    )
    .await
    .map_err(|e| exhausted("table filter", retry, e))?;
    let selection = expand_selection(tools, question, picked);
    info!(tables = ?selection.schemas(), tools = selection.tools.len(), "tables selected");
    Ok(selection)
}

/// Validate, merge and widen a raw table selection.
pub fn expand_selection(tools: &ToolRegistry, question: &str, picked: Vec<TableSelection>) -> Selection {
    let known: Vec<&str> = tools.schemas().collect();
    let mut tables: Vec<TableSelection> = Vec::new();
    for sel in picked {
        merge(&mut tables, &known, sel);
    }

    fn has(tables: &[TableSelection], name: &str) -> bool {
        tables.iter().any(|t| t.table_name == name)
    }
    fn bare(name: &str) -> TableSelection {
        TableSelection {
            table_name: name.to_string(),
            fields: Vec::new(),
        }
    }

    let mut extra = Vec::new();
    if has(&tables, "CompanyRegister")
        && !has(&tables, "CompanyInfo")
        && (question.contains("法人") || question.contains("法定代表人"))
    {
        extra.push(bare("CompanyInfo"));
    }
    if (has(&tables, "CourtInfo") || has(&tables, "CourtCode")) && question.contains("区县区划代码") {
        for name in ["AddrInfo", "AddrCode", "CourtInfo"] {
            extra.push(bare(name));
        }
    }
    for sel in extra {
        merge(&mut tables, &known, sel);
    }

    if tables.is_empty() {
        tables = known.iter().copied().map(bare).collect();
    }
    let schemas: Vec<&str> = tables.iter().map(|t| t.table_name.as_str()).collect();
    let mut tools = tools.tools_for(&schemas);
    let report = question.contains(REPORT_MARKER).then_some(REPORT_TOOL);
    for name in COMMON_TOOLS.into_iter().chain(report) {
        if !tools.contains(&name) {
            tools.push(name);
        }
    }
    Selection { tables, tools }
}

fn merge(tables: &mut Vec<TableSelection>, known: &[&str], sel: TableSelection) {
    if !known.contains(&sel.table_name.as_str()) {
        debug!(table = %sel.table_name, "unknown table ignored");
        return;
    }
    match tables.iter_mut().find(|t| t.table_name == sel.table_name) {
        Some(existing) => {
            for f in sel.fields {
                if !existing.fields.contains(&f) {
                    existing.fields.push(f);
                }
            }
        }
        None => tables.push(sel),
    }
}

// ── Planner ──

pub async fn plan(
    completion: &dyn CompletionService,
    retry: &RetryPolicy<AiError>,
    question: &str,
    annotated: &str,
    schemas: &str,
    tools: &str,
) -> Result<Plan, PipelineError> {
    let draft: PlanDraft = request_json(
        completion,
        &prompts::plan(annotated, schemas, tools),
        None,
        retry,
        "plan",
    )
    .await
    .map_err(|e| exhausted("plan", retry, e))?;
    info!(steps = draft.steps.len(), "plan drafted");
    Ok(draft.into_plan(question))
}

// ── Combiner ──

const RESULT_PREFIX: &str = "根据运行结果，";

/// Compose the answer from the executed code and its output.
pub async fn combine(
    completion: &dyn CompletionService,
    retry: &RetryPolicy<AiError>,
    question: &str,
    code: &str,
    result: &str,
) -> Result<String, PipelineError> {
    let reply = complete_text(completion, &prompts::combine(question, code, result), retry, "combine").await?;
    let reply = reply.trim();
    Ok(reply.strip_prefix(RESULT_PREFIX).unwrap_or(reply).to_string())
}

// ── Postprocessor ──

/// Questions asking for a consolidated company report.
const REPORT_MARKER: &str = "整合报告";

static MONEY_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d),(\d)").expect("money comma pattern"));
static AMOUNT_SPACING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s+(元|万元?|亿元?)").expect("amount spacing pattern")
});
static BRACKETED_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((\d+(?:\.\d+)?)\)(元|万元?|亿元?)").expect("bracketed amount pattern")
});
static REPORT_FILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Word_[^\n]+").expect("report file pattern"));
static CHINESE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})年(\d{1,2})月(\d{1,2})日").expect("date pattern"));
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").expect("iso date pattern"));
static CREDIT_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9A-HJ-NPQRTUWXY]{2}\d{6}[0-9A-HJ-NPQRTUWXY]{10}").expect("credit code pattern")
});

fn padded_date(caps: &Captures<'_>) -> String {
    format!("{}年{:0>2}月{:0>2}日", &caps[1], &caps[2], &caps[3])
}

/// Deterministic answer formatting.
pub fn format_answer(question: &str, answer: &str) -> String {
    let mut out = answer
        .replace(['（', '【'], "(")
        .replace(['）', '】'], ")");
    if question.contains("金额") || out.contains('元') {
        // Matches overlap on runs like 1,2,3; repeat until stable.
        loop {
            let next = MONEY_COMMA.replace_all(&out, "${1}${2}").into_owned();
            if next == out {
                break;
            }
            out = next;
        }
    }
    out = out.replace('℃', "度").replace("摄氏度", "度");
    out = AMOUNT_SPACING.replace_all(&out, "${1}${2}").into_owned();
    out = BRACKETED_AMOUNT.replace_all(&out, "${1}${2}").into_owned();
    out = ISO_DATE.replace_all(&out, padded_date).into_owned();
    out = CHINESE_DATE.replace_all(&out, padded_date).into_owned();
    if let Some(code) = CREDIT_CODE.find(question)
        && !out.contains(code.as_str())
    {
        out = format!("{}，{out}", code.as_str());
    }
    out
}

/// Formats the answer and appends document text the question asks for.
pub struct Postprocessor<'a> {
    tools: &'a ToolRegistry,
}

impl<'a> Postprocessor<'a> {
    pub fn new(tools: &'a ToolRegistry) -> Self {
        Self { tools }
    }

    /// Lookup failures leave the formatted answer as is. Report questions
    /// are answered with the generated file name alone.
    pub async fn finish(&self, question: &str, answer: &str) -> String {
        if question.contains(REPORT_MARKER)
            && let Some(file) = REPORT_FILE.find(answer)
        {
            return file.as_str().trim().to_string();
        }
        let mut out = format_answer(question, answer);
        let Some(case) = find_in_text(&out) else {
            return out;
        };
        let case = case.render(BracketStyle::Ascii);

        if question.contains(field::JUDGEMENT_RESULT)
            && let Some(verdict) = self.lookup("get_legal_document", &case, field::JUDGEMENT_RESULT).await
            && !out.contains(&verdict)
        {
            out = format!("{out}\n{verdict}");
        }
        if question.contains("摘要")
            && let Some(summary) = self.lookup("get_legal_abstract", &case, field::ABSTRACT).await
        {
            let kept: Vec<&str> = out.lines().filter(|l| !l.contains("摘要")).collect();
            out = format!("{}\n摘要: {summary}", kept.join("\n"));
        }
        out
    }

    /// Document text with embedded docket numbers in ASCII brackets.
    async fn lookup(&self, tool: &str, case: &str, name: &str) -> Option<String> {
        match self.tools.call_value(tool, case).await {
            Ok(value) => text_field(&value, name).map(|text| ascii_brackets_in_text(&text)),
            Err(e) => {
                warn!(tool, case, error = %e, "postprocessor lookup failed");
                None
            }
        }
    }
}

fn text_field(value: &Value, name: &str) -> Option<String> {
    let record = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    record
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lawqa_ai::ReplayCompletion;
    use lawqa_store::{MemoryRegistry, Table};
    use serde_json::json;
    use std::sync::Arc;

    fn tools() -> ToolRegistry {
        let store = MemoryRegistry::new()
            .with(
                Table::LegalDocument,
                json!({"案号": "(2019)川01民初1949号", "判决结果": "驳回原告诉讼请求"}),
            )
            .with(
                Table::LegalAbstract,
                json!({"案号": "（2019）川01民初1949号", "文本摘要": "原告诉被告合同纠纷，参见（2018）川01民初7号"}),
            );
        ToolRegistry::new(Arc::new(store))
    }

    fn retry() -> RetryPolicy<AiError> {
        RetryPolicy::new(2, std::time::Duration::ZERO, AiError::is_retryable)
    }

    #[test]
    fn phrases_are_substituted() {
        assert_eq!(
            substitute_phrases("查询：航天机电的母公司审理日期"),
            "航天机电的控股公司判决当天"
        );
    }

    #[tokio::test]
    async fn empty_rewrite_keeps_question() {
        let replay = ReplayCompletion::new(["  "]);
        let q = rewrite(&replay, &retry(), "圈资公司有几家").await.unwrap();
        assert_eq!(q, "全资子公司有几家");
    }

    #[test]
    fn selection_expands_and_merges() {
        let tools = tools();
        let picked = vec![
            TableSelection {
                table_name: "CompanyRegister".into(),
                fields: vec!["公司名称".into()],
            },
            TableSelection {
                table_name: "CompanyRegister".into(),
                fields: vec!["注册资本".into()],
            },
            TableSelection {
                table_name: "Nonsense".into(),
                fields: vec![],
            },
        ];
        let sel = expand_selection(&tools, "该公司的法定代表人是谁", picked);
        assert_eq!(sel.schemas(), vec!["CompanyRegister", "CompanyInfo"]);
        assert_eq!(sel.tables[0].fields, vec!["公司名称", "注册资本"]);
        assert!(sel.tools.contains(&"get_company_info"));
        assert!(sel.render().starts_with("[{\"table_name\":\"CompanyRegister\""));
    }

    #[test]
    fn court_district_code_pulls_address_tables() {
        let picked = vec![TableSelection {
            table_name: "CourtCode".into(),
            fields: vec![],
        }];
        let sel = expand_selection(&tools(), "该法院所在区县区划代码", picked);
        assert_eq!(sel.schemas(), vec!["CourtCode", "AddrInfo", "AddrCode", "CourtInfo"]);
    }

    #[test]
    fn empty_selection_means_full_catalogue() {
        let tools = tools();
        let sel = expand_selection(&tools, "随便问问", vec![]);
        assert_eq!(sel.tables.len(), tools.schemas().count());
    }

    #[tokio::test]
    async fn planner_builds_single_task() {
        let replay = ReplayCompletion::new([
            r#"```json
{"plan": "查询法人", "steps": [{"id": 1, "description": "调用 get_company_info"}]}
```"#,
        ]);
        let plan = plan(&replay, &retry(), "q", "QUERY: q\nNER: {}", "", "").await.unwrap();
        assert_eq!(plan.tasks.len(), 1);
        assert!(plan.tasks[0].instruction.contains("get_company_info"));
    }

    #[tokio::test]
    async fn combiner_strips_lead_in() {
        let replay = ReplayCompletion::new(["根据运行结果，法人是张三。"]);
        let answer = combine(&replay, &retry(), "q", "print(1)", "张三").await.unwrap();
        assert_eq!(answer, "法人是张三。");
    }

    #[test]
    fn formats_amounts_dates_and_units() {
        assert_eq!(
            format_answer("涉案金额是多少", "涉案金额为（1,234,567.5）元"),
            "涉案金额为1234567.5元"
        );
        assert_eq!(format_answer("q", "金额 12 万元"), "金额 12万元");
        assert_eq!(format_answer("q", "最高温度30℃"), "最高温度30度");
        assert_eq!(format_answer("q", "成立于2003年5月5日"), "成立于2003年05月05日");
        assert_eq!(format_answer("q", "上市日期2010-1-20"), "上市日期2010年01月20日");
        assert_eq!(format_answer("q", "【注】"), "(注)");
    }

    #[test]
    fn adjacent_thousands_separators_all_collapse() {
        assert_eq!(format_answer("q", "共1,2,3元"), "共123元");
        assert_eq!(format_answer("涉案金额", "1,234,567"), "1234567");
    }

    #[tokio::test]
    async fn report_questions_answer_with_the_file_name() {
        let tools = tools();
        let out = Postprocessor::new(&tools)
            .finish("请生成甲公司的整合报告", "已生成报告，文件为 Word_甲公司_20240101.docx\n请查收")
            .await;
        assert_eq!(out, "Word_甲公司_20240101.docx");
    }

    #[test]
    fn helper_tools_join_every_selection() {
        let picked = vec![TableSelection {
            table_name: "CompanyInfo".into(),
            fields: vec![],
        }];
        let sel = expand_selection(&tools(), "公司的注册资本是多少", picked.clone());
        assert!(sel.tools.contains(&"rank"));
        assert!(sel.tools.contains(&"convert_amount_unit"));
        assert!(!sel.tools.contains(&REPORT_TOOL));

        let sel = expand_selection(&tools(), "请生成甲公司的整合报告", picked);
        assert!(sel.tools.contains(&REPORT_TOOL));
    }

    #[test]
    fn prepends_credit_code_from_question() {
        let q = "统一社会信用代码为91310000132261826R的公司名称";
        assert_eq!(format_answer(q, "上海某某公司"), "91310000132261826R，上海某某公司");
        assert_eq!(
            format_answer(q, "91310000132261826R 对应上海某某公司"),
            "91310000132261826R 对应上海某某公司"
        );
    }

    #[tokio::test]
    async fn appends_judgement_and_abstract() {
        let tools = tools();
        let post = Postprocessor::new(&tools);

        let out = post
            .finish("(2019)川01民初1949号的判决结果", "案号（2019）川01民初1949号")
            .await;
        assert_eq!(out, "案号(2019)川01民初1949号\n驳回原告诉讼请求");

        let out = post
            .finish("案件摘要是什么", "案号(2019)川01民初1949号\n摘要见下")
            .await;
        assert_eq!(out, "案号(2019)川01民初1949号\n摘要: 原告诉被告合同纠纷，参见(2018)川01民初7号");
    }

    #[tokio::test]
    async fn missing_documents_leave_answer() {
        let tools = tools();
        let out = Postprocessor::new(&tools)
            .finish("判决结果", "案号(2020)京01民终5号")
            .await;
        assert_eq!(out, "案号(2020)京01民终5号");
    }
}
