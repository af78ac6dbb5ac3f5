//! Civil complaints (民事起诉状).
//!
//! The parties, counsel, court and date are extracted from the question in
//! one structured completion. A party written as `<company>法人` (or
//! `<company>的法人`) is the company's legal representative suing or sued as
//! a citizen; every other party is the company itself. Party details come
//! from the company and law-firm directories, and the complaint text is
//! rendered by the registry's document service.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use lawqa_ai::{AiError, CompletionService, parse_json};
use lawqa_core::RetryPolicy;
use lawqa_store::Document;

use crate::error::PipelineError;
use crate::prompts;
use crate::tools::ToolRegistry;

/// Questions containing this are answered with a generated complaint.
pub const COMPLAINT_MARKER: &str = "民事起诉状";

const REPRESENTATIVE: &str = "法人";
const OF_REPRESENTATIVE: &str = "的法人";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintKind {
    CompanySuesCompany,
    CitizenSuesCitizen,
    CompanySuesCitizen,
    CitizenSuesCompany,
}

impl ComplaintKind {
    pub const ALL: [ComplaintKind; 4] = [
        Self::CompanySuesCompany,
        Self::CitizenSuesCitizen,
        Self::CompanySuesCitizen,
        Self::CitizenSuesCompany,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::CompanySuesCompany => "公司起诉公司",
            Self::CitizenSuesCitizen => "公民起诉公民",
            Self::CompanySuesCitizen => "公司起诉公民",
            Self::CitizenSuesCompany => "公民起诉公司",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == label.trim())
    }

    fn of(plaintiff_citizen: bool, defendant_citizen: bool) -> Self {
        match (plaintiff_citizen, defendant_citizen) {
            (false, false) => Self::CompanySuesCompany,
            (true, true) => Self::CitizenSuesCitizen,
            (false, true) => Self::CompanySuesCitizen,
            (true, false) => Self::CitizenSuesCompany,
        }
    }

    pub fn document(&self) -> Document {
        match self {
            Self::CompanySuesCompany => Document::CompanySueCompany,
            Self::CitizenSuesCitizen => Document::CitizensSueCitizens,
            Self::CompanySuesCitizen => Document::CompanySueCitizens,
            Self::CitizenSuesCompany => Document::CitizensSueCompany,
        }
    }
}

/// Fields extracted from the question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ComplaintDraft {
    pub plaintiff_name: String,
    pub defendant_name: String,
    pub cause: String,
    pub plaintiff_lawfirm_name: String,
    pub defendant_lawfirm_name: String,
    pub court_name: String,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One side of the complaint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    /// Company to look up; the representative marker is stripped.
    pub company: String,
    /// Sues or is sued as the company's legal representative.
    pub citizen: bool,
    pub lawfirm: String,
}

impl Party {
    fn new(name: &str, lawfirm: &str, question: &str) -> Self {
        let name = name.trim();
        let citizen = name.contains(REPRESENTATIVE) || question.contains(&format!("{name}{OF_REPRESENTATIVE}"));
        let company = name
            .strip_suffix(OF_REPRESENTATIVE)
            .or_else(|| name.strip_suffix(REPRESENTATIVE))
            .unwrap_or(name);
        Self {
            company: company.to_string(),
            citizen,
            lawfirm: lawfirm.trim().to_string(),
        }
    }
}

/// A validated complaint request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complaint {
    pub kind: ComplaintKind,
    pub plaintiff: Party,
    pub defendant: Party,
    pub cause: String,
    pub court_name: String,
    pub date: String,
}

impl Complaint {
    /// Validate the extracted kind, then let the representative markers
    /// decide each side: the model's label is only trusted to be one of the
    /// four kinds.
    pub fn from_draft(question: &str, draft: ComplaintDraft) -> Result<Self, AiError> {
        if ComplaintKind::from_label(&draft.kind).is_none() {
            return Err(AiError::Malformed {
                expected: "complaint type",
                detail: draft.kind,
            });
        }
        let plaintiff = Party::new(&draft.plaintiff_name, &draft.plaintiff_lawfirm_name, question);
        let defendant = Party::new(&draft.defendant_name, &draft.defendant_lawfirm_name, question);
        Ok(Self {
            kind: ComplaintKind::of(plaintiff.citizen, defendant.citizen),
            plaintiff,
            defendant,
            cause: draft.cause.trim().to_string(),
            court_name: draft.court_name.trim().to_string(),
            date: draft.date.trim().to_string(),
        })
    }
}

/// Directory records for one party.
#[derive(Debug, Clone, Default)]
struct PartyRecords {
    company: Map<String, Value>,
    lawfirm: Map<String, Value>,
}

impl PartyRecords {
    fn company(&self, key: &str) -> Value {
        text(&self.company, key)
    }

    fn lawfirm(&self, key: &str) -> Value {
        text(&self.lawfirm, key)
    }
}

fn text(record: &Map<String, Value>, key: &str) -> Value {
    record.get(key).cloned().unwrap_or_else(|| Value::String(String::new()))
}

/// Payload fields for one side, prefixed with its role (原告 or 被告).
fn party_fields(payload: &mut Map<String, Value>, role: &str, citizen: bool, records: &PartyRecords) {
    let mut put = |suffix: &str, value: Value| {
        payload.insert(format!("{role}{suffix}"), value);
    };
    let blank = || Value::String(String::new());
    if citizen {
        put("", records.company("法人代表"));
        put("性别", blank());
        put("生日", blank());
        put("民族", blank());
        put("工作单位", records.company("公司名称"));
    } else {
        put("", records.company("公司名称"));
        put("法定代表人", records.company("法人代表"));
    }
    put("地址", records.company("注册地址"));
    put("联系方式", records.company("联系电话"));
    put("委托诉讼代理人", records.lawfirm("律师事务所名称"));
    put("委托诉讼代理人联系方式", records.lawfirm("通讯电话"));
}

/// The document service payload for `complaint`.
fn payload(complaint: &Complaint, plaintiff: &PartyRecords, defendant: &PartyRecords) -> Value {
    let mut payload = Map::new();
    party_fields(&mut payload, "原告", complaint.plaintiff.citizen, plaintiff);
    party_fields(&mut payload, "被告", complaint.defendant.citizen, defendant);
    for (key, value) in [
        ("诉讼请求", complaint.cause.as_str()),
        ("事实和理由", ""),
        ("证据", ""),
        ("法院名称", complaint.court_name.as_str()),
        ("起诉日期", complaint.date.as_str()),
    ] {
        payload.insert(key.to_string(), Value::String(value.to_string()));
    }
    Value::Object(payload)
}

pub struct ComplaintWriter<'a> {
    completion: &'a dyn CompletionService,
    tools: &'a ToolRegistry,
    retry: RetryPolicy<AiError>,
}

impl<'a> ComplaintWriter<'a> {
    pub fn new(completion: &'a dyn CompletionService, tools: &'a ToolRegistry, retry: RetryPolicy<AiError>) -> Self {
        Self {
            completion,
            tools,
            retry,
        }
    }

    /// Extract and validate the complaint request. An unknown complaint type
    /// is retried like any malformed completion.
    pub async fn extract(&self, question: &str) -> Result<Complaint, PipelineError> {
        let completion = self.completion;
        let messages = prompts::complaint(question);
        let messages = messages.as_slice();
        self.retry
            .run("complaint", move || async move {
                let reply = completion.complete(messages, None).await?;
                let draft: ComplaintDraft = parse_json(&reply.content)?;
                Complaint::from_draft(question, draft)
            })
            .await
            .map_err(|e| PipelineError::from_retry("complaint", e))
    }

    /// The complaint text for `question`.
    pub async fn write(&self, question: &str) -> Result<String, PipelineError> {
        let complaint = self.extract(question).await?;
        info!(kind = complaint.kind.label(), "complaint extracted");
        let plaintiff = self.records(&complaint.plaintiff).await;
        let defendant = self.records(&complaint.defendant).await;
        let body = payload(&complaint, &plaintiff, &defendant);
        Ok(self
            .tools
            .documents()
            .generate(complaint.kind.document(), &body)
            .await?)
    }

    /// Missing or rejected directory entries leave blank fields.
    async fn records(&self, party: &Party) -> PartyRecords {
        PartyRecords {
            company: self.record("get_company_info", &party.company).await,
            lawfirm: self.record("get_lawfirm_info", &party.lawfirm).await,
        }
    }

    async fn record(&self, tool: &str, value: &str) -> Map<String, Value> {
        if value.is_empty() {
            return Map::new();
        }
        match self.tools.call_value(tool, value).await {
            Ok(Value::Object(record)) => record,
            Ok(Value::Array(items)) => match items.into_iter().next() {
                Some(Value::Object(record)) => record,
                _ => Map::new(),
            },
            Ok(_) => Map::new(),
            Err(e) => {
                warn!(tool, value, error = %e, "complaint party lookup failed");
                Map::new()
            }
        }
    }
}
