//! Per-kind resolution recipes.

use std::sync::LazyLock;

use lawqa_core::casenum::BracketStyle;
use lawqa_core::text::{char_len, collapse_doubled, push_unique, remove_first};
use lawqa_core::{CaseNumberNormalizer, MentionKind};
use lawqa_store::{Table, field};

use crate::candidate::{CandidatePipeline, Query, Step, as_is};

const COMPANY_SUFFIX: &str = "公司";
const LIMITED: &str = "有限公司";
const JOINT_STOCK_LIMITED: &str = "股份有限公司";
const FIRM_SUFFIX: &str = "事务所";
const LAWYER: &str = "律师";
const QUALIFIERS: [&str; 2] = ["市", "省"];

/// Abbreviation only keys short candidates.
const ABBREVIATION_MAX_CHARS: usize = 5;

// ── Companies ──

// Every company hit standardizes to the registered full name.
const BY_REGISTER_NAME: Query = Query::new(Table::CompanyRegister, field::COMPANY_NAME);
const BY_LISTED_NAME: Query = Query::new(Table::CompanyInfo, field::COMPANY_NAME);
const BY_ABBREVIATION: Query = Query::new(Table::CompanyInfo, field::COMPANY_ABBREVIATION)
    .answer(Some(field::COMPANY_NAME));

/// Drop the first province/city qualifier, one candidate each.
fn drop_qualifiers(name: &str, out: &mut Vec<String>) {
    for q in QUALIFIERS {
        let dropped = remove_first(name, q);
        if dropped != name {
            push_unique(out, dropped);
        }
    }
}

/// Company-name augmentations.
///
/// - `航天天机电` → `航天机电` (transcription doubling)
/// - `航天机电公司` → `航天机电` (redundant suffix)
/// - `…有限公司` → `…股份有限公司` (equivalent legal form)
/// - `上海市…` → `上海…`, `安徽省…` → `安徽…`
pub fn augment_company(name: &str) -> Vec<String> {
    let mut out = Vec::new();

    let collapsed = collapse_doubled(name);
    if collapsed != name {
        push_unique(&mut out, collapsed);
    }
    if char_len(name) > 2
        && let Some(stripped) = name.strip_suffix(COMPANY_SUFFIX)
    {
        push_unique(&mut out, stripped.to_string());
    }
    if char_len(name) > 4
        && !name.ends_with(JOINT_STOCK_LIMITED)
        && let Some(stem) = name.strip_suffix(LIMITED)
    {
        push_unique(&mut out, format!("{stem}{JOINT_STOCK_LIMITED}"));
    }

    let mut qualified = vec![name.to_string()];
    qualified.extend(out.iter().cloned());
    for candidate in qualified {
        drop_qualifiers(&candidate, &mut out);
    }
    out
}

/// Full legal names: business register, then listed companies by name, then
/// by abbreviation for names that were really abbreviations (`航天机电公司`).
static COMPANY_NAME: LazyLock<CandidatePipeline> = LazyLock::new(|| CandidatePipeline {
    name: "company_name",
    base: as_is,
    name_service: true,
    augment: augment_company,
    steps: vec![
        Step::base(BY_REGISTER_NAME),
        Step::variants(BY_REGISTER_NAME),
        Step::base(BY_LISTED_NAME),
        Step::variants(BY_LISTED_NAME),
        Step::base(BY_ABBREVIATION),
        Step::variants(BY_ABBREVIATION).max_chars(ABBREVIATION_MAX_CHARS),
    ],
});

/// Abbreviations: listed companies by abbreviation first, then the full-name
/// tables.
static COMPANY_ABBREVIATION: LazyLock<CandidatePipeline> = LazyLock::new(|| CandidatePipeline {
    name: "company_abbreviation",
    base: as_is,
    name_service: true,
    augment: augment_company,
    steps: vec![
        Step::base(BY_ABBREVIATION),
        Step::variants(BY_ABBREVIATION),
        Step::base(BY_REGISTER_NAME),
        Step::variants(BY_REGISTER_NAME),
        Step::base(BY_LISTED_NAME),
        Step::variants(BY_LISTED_NAME),
    ],
});

fn no_augment(_: &str) -> Vec<String> {
    Vec::new()
}

static STOCK_CODE: LazyLock<CandidatePipeline> = LazyLock::new(|| CandidatePipeline {
    name: "stock_code",
    base: as_is,
    name_service: false,
    augment: no_augment,
    steps: vec![Step::base(
        Query::new(Table::CompanyInfo, field::STOCK_CODE).answer(None),
    )],
});

static CREDIT_CODE: LazyLock<CandidatePipeline> = LazyLock::new(|| CandidatePipeline {
    name: "unified_credit_code",
    base: as_is,
    name_service: false,
    augment: no_augment,
    steps: vec![Step::base(
        Query::new(Table::CompanyRegisterName, field::CREDIT_CODE).answer(None),
    )],
});

// ── Case numbers ──

fn canonical_case_number(raw: &str) -> String {
    CaseNumberNormalizer::STANDARD.canonicalize(raw)
}

fn augment_case_number(canonical: &str) -> Vec<String> {
    CaseNumberNormalizer::STANDARD.augment(canonical)
}

fn full_width(s: &str) -> String {
    BracketStyle::FullWidth.apply(s)
}

/// Judgement documents key by ASCII brackets; abstracts and
/// consumption-restriction records by full-width brackets.
static CASE_NUMBER: LazyLock<CandidatePipeline> = LazyLock::new(|| {
    let document = Query::new(Table::LegalDocument, field::CASE_NUMBER);
    let abstract_ = Query::new(Table::LegalAbstract, field::CASE_NUMBER).render(full_width);
    let restriction = Query::new(Table::XzgxfInfo, field::CASE_NUMBER).render(full_width);
    CandidatePipeline {
        name: "case_number",
        base: canonical_case_number,
        name_service: false,
        augment: augment_case_number,
        steps: vec![
            Step::base(document),
            Step::variants(document),
            Step::base(abstract_),
            Step::variants(abstract_),
            Step::base(restriction),
            Step::variants(restriction),
        ],
    }
});

// ── Law firms and courts ──

pub fn augment_organisation(name: &str) -> Vec<String> {
    let mut out = Vec::new();
    let collapsed = collapse_doubled(name);
    if collapsed != name {
        push_unique(&mut out, collapsed);
    }
    drop_qualifiers(name, &mut out);
    out
}

/// `金杜事务所` → `金杜律师事务所`.
pub fn insert_lawyer(name: &str) -> Option<String> {
    let prefix = name.strip_suffix(FIRM_SUFFIX)?;
    (!prefix.contains(LAWYER)).then(|| format!("{prefix}{LAWYER}{FIRM_SUFFIX}"))
}

fn augment_lawfirm(name: &str) -> Vec<String> {
    let mut out = augment_organisation(name);
    if let Some(qualified) = insert_lawyer(name) {
        push_unique(&mut out, qualified);
    }
    out
}

static LAWFIRM: LazyLock<CandidatePipeline> = LazyLock::new(|| {
    let query = Query::new(Table::LawfirmInfo, field::LAWFIRM_NAME);
    CandidatePipeline {
        name: "lawfirm",
        base: as_is,
        name_service: true,
        augment: augment_lawfirm,
        steps: vec![
            Step::base(query),
            Step::variants(query),
            Step::derived(insert_lawyer, query),
        ],
    }
});

fn augment_court(name: &str) -> Vec<String> {
    let collapsed = collapse_doubled(name);
    if collapsed != name { vec![collapsed] } else { Vec::new() }
}

static COURT: LazyLock<CandidatePipeline> = LazyLock::new(|| {
    let query = Query::new(Table::CourtInfo, field::COURT_NAME);
    CandidatePipeline {
        name: "court",
        base: as_is,
        name_service: true,
        augment: augment_court,
        steps: vec![Step::base(query), Step::variants(query)],
    }
});

/// Resolution recipe for `kind`. Locations are not resolved.
pub fn pipeline_for(kind: MentionKind) -> Option<&'static CandidatePipeline> {
    let pipeline: &'static CandidatePipeline = match kind {
        MentionKind::CompanyName => &COMPANY_NAME,
        MentionKind::CompanyAbbreviation => &COMPANY_ABBREVIATION,
        MentionKind::StockCode => &STOCK_CODE,
        MentionKind::UnifiedCreditCode => &CREDIT_CODE,
        MentionKind::CaseNumber => &CASE_NUMBER,
        MentionKind::LawfirmName => &LAWFIRM,
        MentionKind::CourtName => &COURT,
        MentionKind::LocationName => return None,
    };
    Some(pipeline)
}
