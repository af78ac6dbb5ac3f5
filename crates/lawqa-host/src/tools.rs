//! Registry tools: explicit, immutable catalogue built once at startup.
//!
//! Each tool pairs a [`ToolSpec`] (rendered into prompts, validated at
//! dispatch) with what implements it: registry lookups, a computation on
//! the arguments, or a generated document. Dispatch turns bad arguments
//! into a [`ValidationError`] before any lookup is spent.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use lawqa_core::casenum::BracketStyle;
use lawqa_core::text::{char_len, no_chinese};
use lawqa_core::{CaseNumber, CaseNumberNormalizer, ParamKind, ParamSpec, ParamValue, ToolArgs, ToolSpec, ValidationError};
use lawqa_store::{Document, DocumentService, Lookup, RegistryLookup, StoreError, Table, field};

use crate::calc;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    Unknown(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ToolError {
    /// `(ename, evalue)` as the failed call surfaces in synthesized code.
    pub fn taxonomy(&self) -> (String, String) {
        match self {
            Self::Invalid(e) => e.taxonomy(),
            Self::Unknown(name) => ("NameError".to_string(), format!("name '{name}' is not defined")),
            Self::Store(e) => ("ToolException".to_string(), e.to_string()),
        }
    }
}

/// Extra argument check on the primary `value` parameter.
type Guard = fn(&str) -> Result<(), &'static str>;

/// Pure computation over validated arguments.
type Compute = fn(&ToolArgs) -> Result<Value, String>;

/// `(param, field)` bindings of one lookup.
type Bind = &'static [(&'static str, &'static str)];

/// One registry lookup: table plus `(param, field)` bindings.
struct Attempt {
    table: Table,
    bind: Bind,
}

enum Action {
    /// Registry lookups, first non-empty wins.
    Lookup(Vec<Attempt>),
    Compute(Compute),
    /// Court code of a docket number, read from its judgement record.
    CourtCode,
    /// Filing year from the docket number, or judgement year from the record.
    Year,
    /// Consolidated company report rendered by the document service.
    Report,
}

pub struct Tool {
    pub spec: ToolSpec,
    action: Action,
    guard: Option<Guard>,
    /// Rewrites the `value` argument before lookup.
    render: Option<fn(&str) -> String>,
    /// Always return a list, wrapping a single record.
    list: bool,
}

/// Catalogue of registry tools keyed by name.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Tool>,
    registry: Arc<dyn RegistryLookup>,
    documents: Arc<dyn DocumentService>,
}

// ── Guards ──

fn not_placeholder(value: &str) -> Result<(), &'static str> {
    if value.starts_with("示例") {
        Err("value 不能使用示例值")
    } else {
        Ok(())
    }
}

fn company_name_or_code(value: &str) -> Result<(), &'static str> {
    not_placeholder(value)?;
    if no_chinese(value) && char_len(value) > 6 {
        return Err("value 不能使用统一社会信用代码，请使用 get_company_register_name 工具");
    }
    Ok(())
}

fn full_company_name(value: &str) -> Result<(), &'static str> {
    not_placeholder(value)?;
    if no_chinese(value) {
        return Err("value 不能使用公司代码或统一社会信用代码");
    }
    if char_len(value) < 5 {
        return Err("value 不能使用公司简称，请先使用 get_company_info 工具获取公司名称");
    }
    Ok(())
}

fn credit_code(value: &str) -> Result<(), &'static str> {
    not_placeholder(value)?;
    if char_len(value) == 6 {
        return Err("value 不能使用公司代码，请使用 get_company_info 工具");
    }
    Ok(())
}

fn standard_case_number(value: &str) -> String {
    CaseNumberNormalizer::STANDARD.canonicalize(value)
}

fn full_width_case_number(value: &str) -> String {
    BracketStyle::FullWidth.apply(&CaseNumberNormalizer::STANDARD.canonicalize(value))
}

const VALUE: &str = "value";
const CASE_NUM: &str = "case_num";

// ── Binds ──

const BY_COMPANY_NAME: Bind = &[(VALUE, field::COMPANY_NAME)];
const BY_ABBREVIATION: Bind = &[(VALUE, field::COMPANY_ABBREVIATION)];
const BY_STOCK_CODE: Bind = &[(VALUE, field::STOCK_CODE)];
const BY_CREDIT_CODE: Bind = &[(VALUE, field::CREDIT_CODE)];
const BY_PARENT_COMPANY: Bind = &[(VALUE, field::PARENT_COMPANY)];
const BY_RELATED_COMPANY: Bind = &[(VALUE, field::RELATED_COMPANY)];
const BY_CASE_NUMBER: Bind = &[(VALUE, field::CASE_NUMBER)];
const BY_COURT_NAME: Bind = &[(VALUE, field::COURT_NAME)];
const BY_COURT_CODE: Bind = &[(VALUE, field::COURT_CODE)];
const BY_LAWFIRM_NAME: Bind = &[(VALUE, field::LAWFIRM_NAME)];
const BY_ADDRESS: Bind = &[(VALUE, field::ADDRESS)];
const BY_RESTRICTED_COMPANY: Bind = &[(VALUE, field::RESTRICTED_COMPANY)];
const BY_DISTRICT: Bind = &[
    ("province", field::PROVINCE),
    ("city", field::CITY),
    ("county", field::COUNTY),
];
const BY_CITY_AND_DATE: Bind = &[
    ("province", field::PROVINCE),
    ("city", field::CITY),
    ("date", field::DATE),
];

fn value_param(description: &'static str) -> Vec<ParamSpec> {
    vec![ParamSpec::required(VALUE, ParamKind::Text, description)]
}

fn lookup(attempts: &[(Table, Bind)]) -> Action {
    Action::Lookup(
        attempts
            .iter()
            .map(|&(table, bind)| Attempt { table, bind })
            .collect(),
    )
}

fn tool(name: &'static str, description: &'static str, params: Vec<ParamSpec>, example: &'static str, action: Action) -> Tool {
    Tool {
        spec: ToolSpec {
            name,
            description,
            params,
            example,
        },
        action,
        guard: None,
        render: None,
        list: false,
    }
}

impl Tool {
    fn guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    fn render(mut self, render: fn(&str) -> String) -> Self {
        self.render = Some(render);
        self
    }

    fn list(mut self) -> Self {
        self.list = true;
        self
    }
}

/// The full tool catalogue.
fn catalogue() -> Vec<Tool> {
    vec![
        tool(
            "get_company_info",
            "根据公司名称、公司简称或公司代码查找上市公司基本信息，结果为空说明该公司是非上市公司",
            value_param("公司名称、公司简称或公司代码"),
            "get_company_info(\"示例公司名称\")",
            lookup(&[
                (Table::CompanyInfo, BY_COMPANY_NAME),
                (Table::CompanyInfo, BY_ABBREVIATION),
                (Table::CompanyInfo, BY_STOCK_CODE),
            ]),
        )
        .guard(company_name_or_code),
        tool(
            "get_company_register",
            "根据公司名称，查询工商信息",
            value_param("公司名称"),
            "get_company_register(\"示例公司名称\")",
            lookup(&[(Table::CompanyRegister, BY_COMPANY_NAME)]),
        )
        .guard(full_company_name),
        tool(
            "get_company_register_name",
            "根据统一社会信用代码查询公司名称",
            value_param("统一社会信用代码"),
            "get_company_register_name(\"示例统一社会信用代码\")",
            lookup(&[(Table::CompanyRegisterName, BY_CREDIT_CODE)]),
        )
        .guard(credit_code),
        tool(
            "get_parent_company_info",
            "根据公司名称查询控股公司名称、投资比例、投资金额",
            value_param("公司名称"),
            "get_parent_company_info(\"示例公司名称\")",
            lookup(&[(Table::SubCompanyInfo, BY_COMPANY_NAME)]),
        )
        .guard(full_company_name),
        tool(
            "get_sub_company_info_list",
            "查询公司的子公司列表",
            value_param("公司名称"),
            "get_sub_company_info_list(\"示例公司名称\")",
            lookup(&[(Table::SubCompanyInfoList, BY_PARENT_COMPANY)]),
        )
        .guard(not_placeholder)
        .list(),
        tool(
            "get_legal_document",
            "根据案号查询裁判文书",
            value_param("案号"),
            "get_legal_document(\"(2020)示例案号\")",
            lookup(&[(Table::LegalDocument, BY_CASE_NUMBER)]),
        )
        .guard(not_placeholder)
        .render(standard_case_number),
        tool(
            "get_legal_document_list",
            "根据关联公司查询所有裁判文书",
            value_param("公司名称"),
            "get_legal_document_list(\"示例公司名称\")",
            lookup(&[(Table::LegalDocumentList, BY_RELATED_COMPANY)]),
        )
        .guard(full_company_name)
        .list(),
        tool(
            "get_legal_abstract",
            "根据案号查询文本摘要",
            value_param("案号"),
            "get_legal_abstract(\"(2020)示例案号\")",
            lookup(&[(Table::LegalAbstract, BY_CASE_NUMBER)]),
        )
        .guard(not_placeholder)
        .render(full_width_case_number),
        tool(
            "get_xzgxf_info",
            "根据案号查询限制高消费相关信息",
            value_param("案号"),
            "get_xzgxf_info(\"(2020)示例案号\")",
            lookup(&[(Table::XzgxfInfo, BY_CASE_NUMBER)]),
        )
        .guard(not_placeholder)
        .render(full_width_case_number),
        tool(
            "get_xzgxf_info_list",
            "根据企业名称查询所有限制高消费相关信息",
            value_param("限制高消费企业名称"),
            "get_xzgxf_info_list(\"示例公司名称\")",
            lookup(&[(Table::XzgxfInfoList, BY_RESTRICTED_COMPANY)]),
        )
        .guard(full_company_name)
        .list(),
        tool(
            "get_court_info",
            "根据法院名称查询法院名录",
            value_param("法院名称"),
            "get_court_info(\"示例法院名称\")",
            lookup(&[(Table::CourtInfo, BY_COURT_NAME)]),
        )
        .guard(not_placeholder),
        tool(
            "get_court_code",
            "根据法院名称或者法院代字查询法院代字等相关数据",
            value_param("法院名称或法院代字"),
            "get_court_code(\"示例法院名称\")",
            lookup(&[(Table::CourtCode, BY_COURT_NAME), (Table::CourtCode, BY_COURT_CODE)]),
        )
        .guard(not_placeholder),
        tool(
            "get_lawfirm_info",
            "根据律师事务所查询律师事务所名录",
            value_param("律师事务所名称"),
            "get_lawfirm_info(\"示例律师事务所名称\")",
            lookup(&[(Table::LawfirmInfo, BY_LAWFIRM_NAME)]),
        )
        .guard(not_placeholder),
        tool(
            "get_lawfirm_log",
            "根据律师事务所查询律师事务所统计数据",
            value_param("律师事务所名称"),
            "get_lawfirm_log(\"示例律师事务所名称\")",
            lookup(&[(Table::LawfirmLog, BY_LAWFIRM_NAME)]),
        )
        .guard(not_placeholder),
        tool(
            "get_address_info",
            "根据地址查该地址对应的省份城市区县",
            value_param("地址"),
            "get_address_info(\"示例地址\")",
            lookup(&[(Table::AddressInfo, BY_ADDRESS)]),
        )
        .guard(not_placeholder),
        tool(
            "get_address_code",
            "根据省市区查询区划代码",
            vec![
                ParamSpec::required("province", ParamKind::Text, "省份"),
                ParamSpec::required("city", ParamKind::Text, "城市"),
                ParamSpec::required("county", ParamKind::Text, "区县"),
            ],
            "get_address_code(\"示例省份\", \"示例城市\", \"示例区县\")",
            lookup(&[(Table::AddressCode, BY_DISTRICT)]),
        ),
        tool(
            "get_temp_info",
            "根据日期及省份城市查询天气相关信息",
            vec![
                ParamSpec::required("province", ParamKind::Text, "省份"),
                ParamSpec::required("city", ParamKind::Text, "城市"),
                ParamSpec::required("date", ParamKind::Text, "日期，格式 yyyy年M月d日"),
            ],
            "get_temp_info(\"示例省份\", \"示例城市\", \"示例日期\")",
            lookup(&[(Table::TempInfo, BY_CITY_AND_DATE)]),
        ),
        tool(
            "extract_code_from_case_num",
            "提取案号的法院代字，案号查不到裁判文书时返回 None",
            vec![ParamSpec::required(CASE_NUM, ParamKind::Text, "案号")],
            "extract_code_from_case_num(\"(2020)示例案号\")",
            Action::CourtCode,
        ),
        tool(
            "extract_year_from_case_num",
            "根据案号查询判决日期、起诉日期或立案日期的年份",
            vec![
                ParamSpec::required(CASE_NUM, ParamKind::Text, "案号"),
                ParamSpec::optional("type", ParamKind::Text, "日期类型：判决日期、起诉日期或立案日期，默认起诉日期"),
            ],
            "extract_year_from_case_num(\"(2020)示例案号\", \"判决日期\")",
            Action::Year,
        ),
        tool(
            "get_sum",
            "求和，可以对数字列表或带千、万、亿单位的金额字符串列表求和",
            vec![ParamSpec::required("nums", ParamKind::Amounts, "数字或金额字符串列表")],
            "get_sum([\"5千万\", \"1亿\", \"0.3亿\"])",
            Action::Compute(get_sum),
        ),
        tool(
            "rank",
            "排序接口，返回按照 values 排序的 keys，用于查询最高、第二等需要排序的信息",
            vec![
                ParamSpec::required("keys", ParamKind::TextList, "键"),
                ParamSpec::required("values", ParamKind::NumberList, "值"),
                ParamSpec::optional("is_desc", ParamKind::Flag, "是否从大到小排序，默认从小到大"),
            ],
            "rank(keys=[\"a\", \"b\", \"c\"], values=[2, 1, 3])",
            Action::Compute(rank),
        ),
        tool(
            "convert_to_float",
            "处理金额字符串，换算万、亿单位",
            vec![ParamSpec::required("amount_str", ParamKind::Text, "金额字符串")],
            "convert_to_float(\"2.3亿\")",
            Action::Compute(convert_to_float),
        ),
        tool(
            "convert_amount_unit",
            "金额单位转换，单位可选亿元、万元、元",
            vec![
                ParamSpec::required("amount", ParamKind::Number, "数值"),
                ParamSpec::required("from_unit", ParamKind::Text, "原始单位"),
                ParamSpec::required("to_unit", ParamKind::Text, "转换后的单位"),
                ParamSpec::optional("decimal_places", ParamKind::Number, "保留几位小数"),
            ],
            "convert_amount_unit(8400, \"万元\", \"亿元\", 1)",
            Action::Compute(convert_amount_unit),
        ),
        tool(
            REPORT_TOOL,
            "通过传入结构化信息制作公司数据报告，返回报告文件名称",
            vec![
                ParamSpec::required("company_name", ParamKind::Text, "公司名称"),
                ParamSpec::required("company_register_info", ParamKind::Record, "工商信息"),
                ParamSpec::optional("sub_company_info_list", ParamKind::Records, "子公司信息"),
                ParamSpec::optional("legal_doc_list", ParamKind::Records, "裁判文书"),
                ParamSpec::optional("xzgxf_info_list", ParamKind::Records, "限制高消费"),
            ],
            "save_dict_list_to_word(\"示例公司名称\", company_register_info)",
            Action::Report,
        ),
    ]
}

// ── Computations ──

fn text_arg<'a>(args: &'a ToolArgs, name: &str) -> Result<&'a str, String> {
    args.get(name)
        .and_then(ParamValue::as_text)
        .ok_or_else(|| format!("{name} 不能为空"))
}

fn number_arg(args: &ToolArgs, name: &str) -> Result<f64, String> {
    args.get(name)
        .and_then(ParamValue::as_number)
        .ok_or_else(|| format!("{name} 不能为空"))
}

fn get_sum(args: &ToolArgs) -> Result<Value, String> {
    let total = match args.get("nums") {
        Some(ParamValue::NumberList(nums)) => calc::sum_amounts(nums, &[])?,
        Some(ParamValue::TextList(amounts)) => calc::sum_amounts(&[], amounts)?,
        _ => return Err("nums 需要数字或金额字符串列表".to_string()),
    };
    Ok(calc::number(total))
}

fn rank(args: &ToolArgs) -> Result<Value, String> {
    let keys = match args.get("keys") {
        Some(ParamValue::TextList(keys)) => keys.as_slice(),
        _ => return Err("keys 不能为空".to_string()),
    };
    let values = match args.get("values") {
        Some(ParamValue::NumberList(values)) => values.as_slice(),
        _ => return Err("values 不能为空".to_string()),
    };
    let descending = matches!(args.get("is_desc"), Some(ParamValue::Flag(true)));
    Ok(Value::from(calc::rank(keys, values, descending)))
}

fn convert_to_float(args: &ToolArgs) -> Result<Value, String> {
    calc::convert_to_float(text_arg(args, "amount_str")?).map(calc::number)
}

fn convert_amount_unit(args: &ToolArgs) -> Result<Value, String> {
    let decimals = match args.get("decimal_places") {
        None => None,
        Some(ParamValue::Number(n)) if *n >= 0.0 => Some(*n as usize),
        Some(_) => return Err("decimal_places 需要非负整数".to_string()),
    };
    calc::convert_amount_unit(
        number_arg(args, "amount")?,
        text_arg(args, "from_unit")?,
        text_arg(args, "to_unit")?,
        decimals,
    )
}

/// Offered with every selection.
pub const COMMON_TOOLS: [&str; 4] = ["convert_amount_unit", "convert_to_float", "get_sum", "rank"];

/// Offered when the question asks for a consolidated report.
pub const REPORT_TOOL: &str = "save_dict_list_to_word";

const DATE_KINDS: [&str; 3] = ["判决日期", "起诉日期", "立案日期"];
const JUDGEMENT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Schema name → tools that read it, for the table filter.
const TABLE_TOOLS: &[(&str, &[&str])] = &[
    ("CompanyInfo", &["get_company_info"]),
    ("CompanyRegister", &["get_company_register", "get_company_register_name"]),
    ("UnifiedSocialCreditCodeName", &["get_company_register_name"]),
    ("SubCompanyInfo", &["get_parent_company_info", "get_sub_company_info_list"]),
    (
        "LegalDoc",
        &[
            "get_legal_document",
            "get_legal_document_list",
            "get_legal_abstract",
            "extract_year_from_case_num",
            "extract_code_from_case_num",
        ],
    ),
    ("LegalAbstract", &["get_legal_abstract"]),
    ("XzgxfInfo", &["get_xzgxf_info", "get_xzgxf_info_list", "extract_year_from_case_num"]),
    ("CourtInfo", &["get_court_info", "extract_code_from_case_num"]),
    ("CourtCode", &["get_court_code", "extract_code_from_case_num"]),
    ("LawfirmInfo", &["get_lawfirm_info"]),
    ("LawfirmLog", &["get_lawfirm_log"]),
    ("AddrInfo", &["get_address_info"]),
    ("AddrCode", &["get_address_code"]),
    ("TempInfo", &["get_temp_info"]),
];

impl ToolRegistry {
    pub fn new<R: RegistryLookup + DocumentService + 'static>(registry: Arc<R>) -> Self {
        let tools = catalogue().into_iter().map(|t| (t.spec.name, t)).collect();
        Self {
            tools,
            registry: registry.clone(),
            documents: registry,
        }
    }

    pub fn documents(&self) -> &dyn DocumentService {
        self.documents.as_ref()
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name).map(|t| &t.spec)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.keys().copied()
    }

    /// Known schema names, in catalogue order.
    pub fn schemas(&self) -> impl Iterator<Item = &'static str> {
        TABLE_TOOLS.iter().map(|(schema, _)| *schema)
    }

    /// Tools reading the given schemas, deduplicated, in catalogue order.
    pub fn tools_for(&self, schemas: &[&str]) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        for (schema, tools) in TABLE_TOOLS {
            if schemas.contains(schema) {
                for t in tools.iter() {
                    if !out.contains(t) {
                        out.push(t);
                    }
                }
            }
        }
        out
    }

    /// Catalogue text for the named tools; unknown names are skipped.
    pub fn describe(&self, names: &[&str]) -> String {
        names
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| t.spec.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Validate `args` and run the tool.
    pub async fn call(&self, name: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        tool.spec.validate(args)?;

        let mut texts: BTreeMap<&str, String> = BTreeMap::new();
        for (k, v) in args {
            if let Some(s) = v.as_text() {
                texts.insert(k.as_str(), s.trim().to_string());
            }
        }
        for (param, value) in texts.iter_mut() {
            if value.starts_with("示例") {
                return Err(ValidationError::new(name, format!("{param} 不能使用示例值")).into());
            }
            if *param == VALUE {
                if let Some(guard) = tool.guard {
                    guard(value).map_err(|m| ValidationError::new(name, m))?;
                }
                if let Some(render) = tool.render {
                    *value = render(value);
                }
            }
        }

        let invalid = |message: String| ValidationError::new(name, message);
        let case_num = texts.get(CASE_NUM).map(String::as_str).unwrap_or_default();
        match &tool.action {
            Action::Lookup(attempts) => {
                let mut result = Lookup::Empty;
                for attempt in attempts {
                    let conds: Vec<(&str, &str)> = attempt
                        .bind
                        .iter()
                        .filter_map(|(param, field)| texts.get(param).map(|v| (*field, v.as_str())))
                        .collect();
                    debug!(tool = name, table = %attempt.table, ?conds, "tool lookup");
                    result = self.registry.lookup(attempt.table, &conds).await?;
                    if !result.is_empty() {
                        break;
                    }
                }
                Ok(if tool.list {
                    Value::Array(result.into_records().into_iter().map(Value::Object).collect())
                } else {
                    result.into_value()
                })
            }
            Action::Compute(compute) => Ok(compute(args).map_err(invalid)?),
            Action::CourtCode => {
                let document = self.legal_document(case_num).await?;
                Ok(document
                    .field(field::CASE_NUMBER)
                    .and_then(CaseNumber::parse)
                    .map_or(Value::Null, |c| Value::String(c.court_code)))
            }
            Action::Year => {
                let kind = texts.get("type").map_or("起诉日期", String::as_str);
                if !DATE_KINDS.contains(&kind) {
                    return Err(invalid("type 请使用 判决日期、起诉日期 或 立案日期".to_string()).into());
                }
                if kind == "判决日期" {
                    let document = self.legal_document(case_num).await?;
                    let date = document
                        .field(field::DATE)
                        .ok_or_else(|| invalid(format!("{case_num} 没有对应的裁判文书")))?;
                    let judged = NaiveDateTime::parse_from_str(date, JUDGEMENT_DATE_FORMAT)
                        .map_err(|e| invalid(format!("无法解析判决日期 {date}: {e}")))?;
                    return Ok(Value::from(judged.year()));
                }
                let year = CaseNumber::parse(&standard_case_number(case_num))
                    .and_then(|c| c.year.parse::<i64>().ok())
                    .ok_or_else(|| invalid("案号缺少年份，请使用问题的年份或案号".to_string()))?;
                Ok(Value::from(year))
            }
            Action::Report => {
                let company = texts.get("company_name").map(String::as_str).unwrap_or_default();
                let register = match args.get("company_register_info") {
                    Some(ParamValue::Record(record)) => vec![Value::Object(record.clone())],
                    _ => Vec::new(),
                };
                let records = |key: &str| -> Vec<Value> {
                    match args.get(key) {
                        Some(ParamValue::Records(list)) => list.iter().cloned().map(Value::Object).collect(),
                        _ => Vec::new(),
                    }
                };
                let sections = json!({
                    "工商信息": register,
                    "子公司信息": records("sub_company_info_list"),
                    "裁判文书": records("legal_doc_list"),
                    "限制高消费": records("xzgxf_info_list"),
                });
                let payload = json!({"company_name": company, "dict_list": sections.to_string()});
                let file = self.documents.generate(Document::CompanyReport, &payload).await?;
                Ok(Value::String(file))
            }
        }
    }

    async fn legal_document(&self, case_num: &str) -> Result<Lookup, StoreError> {
        let case = standard_case_number(case_num);
        debug!(%case, "judgement record lookup");
        self.registry
            .lookup(Table::LegalDocument, &[(field::CASE_NUMBER, case.as_str())])
            .await
    }

    /// Convenience for single-`value` tools.
    pub async fn call_value(&self, name: &str, value: &str) -> Result<Value, ToolError> {
        let mut args = ToolArgs::new();
        args.insert(VALUE.to_string(), ParamValue::Text(value.to_string()));
        self.call(name, &args).await
    }
}
