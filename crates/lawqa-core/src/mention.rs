//! Entity mentions recognised in a question, and the rules that decide which
//! ones are worth resolving.
//!
//! The recogniser is a language model and its output is noisy: overlapping
//! spans, placeholder values, whole questions misfiled as entities. Filtering
//! is purely lexical and happens before any lookup is spent on a mention.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::text::{all_digits, char_len, has_digits, no_digits};

/// Entity kinds the recogniser is asked to label. Serialised with the labels
/// used in prompts and registry field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MentionKind {
    #[serde(rename = "案号", alias = "case_number")]
    CaseNumber,
    #[serde(rename = "法院名称", alias = "court_name")]
    CourtName,
    #[serde(rename = "律师事务所名称", alias = "lawfirm_name")]
    LawfirmName,
    #[serde(rename = "公司名称", alias = "company_name")]
    CompanyName,
    #[serde(rename = "公司简称", alias = "company_abbreviation")]
    CompanyAbbreviation,
    #[serde(rename = "公司代码", alias = "stock_code")]
    StockCode,
    #[serde(rename = "统一社会信用代码", alias = "unified_credit_code")]
    UnifiedCreditCode,
    #[serde(rename = "地名", alias = "location_name")]
    LocationName,
}

impl MentionKind {
    pub const ALL: [MentionKind; 8] = [
        Self::CaseNumber,
        Self::LawfirmName,
        Self::CompanyName,
        Self::CompanyAbbreviation,
        Self::StockCode,
        Self::UnifiedCreditCode,
        Self::CourtName,
        Self::LocationName,
    ];

    /// Label used in prompts and in the NER annotation.
    pub fn label(self) -> &'static str {
        match self {
            Self::CaseNumber => "案号",
            Self::CourtName => "法院名称",
            Self::LawfirmName => "律师事务所名称",
            Self::CompanyName => "公司名称",
            Self::CompanyAbbreviation => "公司简称",
            Self::StockCode => "公司代码",
            Self::UnifiedCreditCode => "统一社会信用代码",
            Self::LocationName => "地名",
        }
    }

    /// One-line description handed to the recogniser.
    pub fn description(self) -> &'static str {
        match self {
            Self::CaseNumber => {
                "法院或其他司法机关给予案件的唯一识别编号，通常包含年份、案件类型代码和序号等信息。"
            }
            Self::CourtName => "司法机构的官方名称，通常包含行政区划和级别信息。",
            Self::LawfirmName => "提供法律服务的专业机构的正式名称。",
            Self::CompanyName => "企业或组织在工商登记中使用的完整法定名称。",
            Self::CompanyAbbreviation => "公司名称的简化形式，通常用于日常交流或媒体报道。",
            Self::StockCode => "用于识别上市公司的唯一代码，通常由数字或字母组成。",
            Self::UnifiedCreditCode => {
                "中国大陆地区企业、事业单位和其他组织的唯一身份代码，由18位阿拉伯数字或大写英文字母组成。"
            }
            Self::LocationName => "指特定地理位置的名称，可以是国家、省份、城市、区县、街道等。",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == label)
    }
}

impl fmt::Display for MentionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A text span hypothesised to name an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    #[serde(rename = "type")]
    pub kind: MentionKind,
    pub content: String,
    /// Registry spelling once resolved; equal to `content` otherwise.
    pub standardized: String,
    pub found: bool,
    /// Registry table that produced the hit, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Mention {
    pub fn new(kind: MentionKind, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            kind,
            standardized: content.clone(),
            content,
            found: false,
            source: None,
        }
    }

    /// Fix kinds the recogniser commonly gets wrong.
    ///
    /// - six ASCII digits are a stock code
    /// - a company name of at most four characters is an abbreviation
    /// - a "stock code" longer than ten characters is a unified credit code
    pub fn correct_kind(&mut self) {
        if char_len(&self.content) == 6 && all_digits(&self.content) {
            self.kind = MentionKind::StockCode;
        }
        match self.kind {
            MentionKind::CompanyName if char_len(&self.content) <= 4 => {
                self.kind = MentionKind::CompanyAbbreviation;
            }
            MentionKind::StockCode if char_len(&self.content) > 10 => {
                self.kind = MentionKind::UnifiedCreditCode;
            }
            _ => {}
        }
    }

    /// Record a registry hit.
    pub fn resolve_to(&mut self, standardized: impl Into<String>, source: impl Into<String>) {
        self.standardized = standardized.into();
        self.source = Some(source.into());
        self.found = true;
    }
}

// ── Filtering ──

/// Substrings that mark a placeholder rather than a real value.
const PLACEHOLDER_MARKERS: &[&str] = &["未提供", "未知"];

/// Whole-content values that name a category, not an entity.
const GENERIC_CONTENT: &[&str] = &[
    "公司",
    "子公司",
    "子公司列表",
    "全资子公司",
    "法院",
    "法院名称",
    "人民法院",
    "中级人民法院",
];

const LITIGANT_ROLES: &[&str] = &["原告", "被告"];

/// Query phrases that the recogniser sometimes returns as a court name.
const COURT_QUERY_PHRASES: &[&str] = &["哪几家", "最基层的", "审理法院"];

const COURT_WORD: &str = "法院";

/// Turn raw recogniser output into the mentions worth resolving.
///
/// Drops entries that are not `{type, content}` objects with a known type,
/// entries carrying any extra field, empty or placeholder content, and the
/// kind-specific junk described on [`keep`]. Exact `(type, content)`
/// duplicates are removed, first occurrence kept. Kinds are corrected with
/// [`Mention::correct_kind`] only after filtering.
pub fn filter_mentions(raw: &[Value]) -> Vec<Mention> {
    let mut seen: HashSet<(MentionKind, String)> = HashSet::new();
    let mut out = Vec::new();

    for entry in raw {
        let Some(mention) = parse_entry(entry) else {
            debug!(entry = %entry, "dropping malformed mention");
            continue;
        };
        if !keep(&mention) {
            debug!(kind = %mention.kind, content = %mention.content, "filtered mention");
            continue;
        }
        if seen.insert((mention.kind, mention.content.clone())) {
            out.push(mention);
        }
    }
    out
}

fn parse_entry(entry: &Value) -> Option<Mention> {
    let obj = entry.as_object()?;
    // Anything beyond {type, content} is a misfiled free-text answer.
    if obj.len() != 2 {
        return None;
    }
    let kind = MentionKind::from_label(obj.get("type")?.as_str()?)
        .or_else(|| serde_json::from_value(obj.get("type")?.clone()).ok())?;
    let content = obj.get("content")?.as_str()?;
    Some(Mention::new(kind, content))
}

/// Lexical plausibility rules per kind.
fn keep(m: &Mention) -> bool {
    let c = m.content.as_str();
    if c.is_empty() {
        return false;
    }
    if PLACEHOLDER_MARKERS.iter().any(|p| c.contains(p)) {
        return false;
    }
    if GENERIC_CONTENT.contains(&c) {
        return false;
    }

    match m.kind {
        MentionKind::LawfirmName => !LITIGANT_ROLES.iter().any(|r| c.contains(r)),
        MentionKind::CourtName => {
            !COURT_QUERY_PHRASES.iter().any(|p| c.contains(p))
                && c.contains(COURT_WORD)
                // A court code like 皖01 must stay as written.
                && !has_digits(c)
                && char_len(c) >= 4
        }
        MentionKind::CaseNumber => {
            // "(2019)年湖北襄阳市中级人民法院民初1613号" mixes a court in; leave it.
            has_digits(c) && !c.contains(COURT_WORD) && char_len(c) >= 4
        }
        MentionKind::UnifiedCreditCode | MentionKind::StockCode => !no_digits(c),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contents(ms: &[Mention]) -> Vec<&str> {
        ms.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn drops_malformed_entries() {
        let raw = vec![
            json!({"type": "公司名称"}),
            json!({"content": "上海某某有限公司"}),
            json!({"type": "公司名称", "content": "上海某某有限公司", "answer": "x"}),
            json!({"type": "不存在的类型", "content": "abc"}),
            json!("just a string"),
            json!({"type": "公司名称", "content": "北京某某科技有限公司"}),
        ];
        let ms = filter_mentions(&raw);
        assert_eq!(contents(&ms), vec!["北京某某科技有限公司"]);
    }

    #[test]
    fn accepts_english_kind_names() {
        let raw = vec![json!({"type": "stock_code", "content": "600000"})];
        let ms = filter_mentions(&raw);
        assert_eq!(ms[0].kind, MentionKind::StockCode);
    }

    #[test]
    fn drops_placeholders_and_generic_words() {
        let raw = vec![
            json!({"type": "公司名称", "content": ""}),
            json!({"type": "公司名称", "content": "未提供公司名称"}),
            json!({"type": "公司名称", "content": "未知"}),
            json!({"type": "公司名称", "content": "子公司"}),
            json!({"type": "法院名称", "content": "中级人民法院"}),
        ];
        assert!(filter_mentions(&raw).is_empty());
    }

    #[test]
    fn lawfirm_with_litigant_role_dropped() {
        let raw = vec![
            json!({"type": "律师事务所名称", "content": "原告律师事务所"}),
            json!({"type": "律师事务所名称", "content": "北京市金杜律师事务所"}),
        ];
        assert_eq!(contents(&filter_mentions(&raw)), vec!["北京市金杜律师事务所"]);
    }

    #[test]
    fn court_rules() {
        let raw = vec![
            json!({"type": "法院名称", "content": "哪几家法院"}),
            json!({"type": "法院名称", "content": "皖01法院"}),
            json!({"type": "法院名称", "content": "县法院"}),
            json!({"type": "法院名称", "content": "北京丰台区"}),
            json!({"type": "法院名称", "content": "北京丰台区人民法院"}),
        ];
        assert_eq!(contents(&filter_mentions(&raw)), vec!["北京丰台区人民法院"]);
    }

    #[test]
    fn case_number_rules() {
        let raw = vec![
            json!({"type": "案号", "content": "民终号"}),
            json!({"type": "案号", "content": "(2019)湖北襄阳市中级人民法院民初1613号"}),
            json!({"type": "案号", "content": "1号"}),
            json!({"type": "案号", "content": "(2020)皖05民终1584号"}),
        ];
        assert_eq!(contents(&filter_mentions(&raw)), vec!["(2020)皖05民终1584号"]);
    }

    #[test]
    fn codes_need_digits() {
        let raw = vec![
            json!({"type": "统一社会信用代码", "content": "ABCDEFG"}),
            json!({"type": "公司代码", "content": "浦发银行"}),
            json!({"type": "统一社会信用代码", "content": "91310000677833266F"}),
        ];
        assert_eq!(contents(&filter_mentions(&raw)), vec!["91310000677833266F"]);
    }

    #[test]
    fn duplicates_removed_first_kept() {
        let raw = vec![
            json!({"type": "公司名称", "content": "上海航天汽车机电股份有限公司"}),
            json!({"type": "公司简称", "content": "航天机电"}),
            json!({"type": "公司名称", "content": "上海航天汽车机电股份有限公司"}),
            json!({"type": "公司名称", "content": "航天机电"}),
        ];
        let ms = filter_mentions(&raw);
        assert_eq!(ms.len(), 3);
        let mut pairs: Vec<_> = ms.iter().map(|m| (m.kind, m.content.clone())).collect();
        pairs.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.label().cmp(b.0.label())));
        pairs.dedup();
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn kind_correction() {
        let mut m = Mention::new(MentionKind::CompanyName, "600000");
        m.correct_kind();
        assert_eq!(m.kind, MentionKind::StockCode);

        let mut m = Mention::new(MentionKind::CompanyName, "航天机电");
        m.correct_kind();
        assert_eq!(m.kind, MentionKind::CompanyAbbreviation);

        let mut m = Mention::new(MentionKind::StockCode, "91310000677833266F");
        m.correct_kind();
        assert_eq!(m.kind, MentionKind::UnifiedCreditCode);
    }

    #[test]
    fn new_mention_defaults_standardized_to_content() {
        let m = Mention::new(MentionKind::CourtName, "北京市丰台区人民法院");
        assert_eq!(m.standardized, m.content);
        assert!(!m.found);
    }
}
