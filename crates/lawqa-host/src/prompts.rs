//! Prompt templates. Content is static configuration; only the slots vary.

use lawqa_ai::Message;

/// Short schema notes per registry table, keyed by schema name.
pub const TABLE_SCHEMAS: &[(&str, &str)] = &[
    ("CompanyInfo", "上市公司基本信息：公司名称、公司简称、英文名称、关联证券、公司代码、曾用简称、所属市场、所属行业、成立日期、上市日期、法人代表、总经理、董秘、邮政编码、注册地址、办公地址、联系电话、传真、官方网址、电子邮箱、入选指数、主营业务、经营范围、机构简介、每股面值、首发价格、首发募资净额、首发主承销商"),
    ("CompanyRegister", "公司工商信息：公司名称、登记状态、统一社会信用代码、法定代表人、注册资本、成立日期、企业地址、联系电话、联系邮箱、注册号、组织机构代码、参保人数、行业一级、行业二级、行业三级、曾用名、企业简介、经营范围"),
    ("UnifiedSocialCreditCodeName", "统一社会信用代码与公司名称的对应：公司名称、统一社会信用代码"),
    ("SubCompanyInfo", "子公司关系：关联上市公司全称、上市公司关系、上市公司参股比例、上市公司投资金额、公司名称"),
    ("LegalDoc", "裁判文书：关联公司、标题、案号、文书类型、原告、被告、原告律师事务所、被告律师事务所、案由、涉案金额、判决结果、日期、文件名"),
    ("LegalAbstract", "裁判文书摘要：文件名、案号、文本摘要"),
    ("XzgxfInfo", "限制高消费：限制高消费企业名称、案号、法定代表人、申请人、涉案金额、执行法院、立案日期、限高发布日期"),
    ("CourtInfo", "法院名录：法院名称、法院负责人、成立日期、法院地址、法院联系电话、法院官网"),
    ("CourtCode", "法院代字：法院名称、行政级别、法院级别、法院代字、区划代码、级别"),
    ("LawfirmInfo", "律师事务所名录：律师事务所名称、律师事务所唯一编码、律师事务所负责人、事务所注册资本、事务所成立日期、律师事务所地址、通讯电话、通讯邮箱、律所登记机关"),
    ("LawfirmLog", "律师事务所业务统计：律师事务所名称、业务量排名、服务已上市公司、报告期间所服务上市公司违规事件、报告期所服务上市公司接受立案调查"),
    ("AddrInfo", "地址解析：地址、省份、城市、区县"),
    ("AddrCode", "区划代码：省份、城市、城市区划代码、区县、区县区划代码"),
    ("TempInfo", "天气：日期、省份、城市、天气、最高温度、最低温度、湿度"),
];

pub fn schema_notes(schemas: &[&str]) -> String {
    TABLE_SCHEMAS
        .iter()
        .filter(|(name, _)| schemas.is_empty() || schemas.contains(name))
        .map(|(name, notes)| format!("{name}: {notes}"))
        .collect::<Vec<_>>()
        .join("\n")
}

const SYSTEM: &str = "你是一个法律领域的数据分析助手，通过调用工具查询数据库回答用户问题。";

pub fn rewrite(question: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM),
        Message::user(format!(
            "请在不改变含义的前提下改写下面的问题，使其表述清楚、实体完整。只输出改写后的问题。\n问题：{question}"
        )),
    ]
}

pub fn select_tables(question: &str, catalogue: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM),
        Message::user(format!(
            "数据表如下：\n{catalogue}\n\n请选出回答问题需要用到的数据表及字段，\
             以 ```json [{{\"table_name\": \"...\", \"fields\": [\"...\"]}}] ``` 格式输出。\n问题：{question}"
        )),
    ]
}

pub fn plan(annotated: &str, schemas: &str, tools: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM),
        Message::user(format!(
            "数据表：\n{schemas}\n\n可用工具：\n{tools}\n\n{annotated}\n\n\
             请制定解决问题的步骤，以 ```json {{\"plan\": \"...\", \"steps\": [{{\"id\": 1, \"description\": \"...\", \
             \"tool\": \"...\", \"params\": {{}}, \"output\": \"...\"}}]}} ``` 格式输出。"
        )),
    ]
}

/// Results of finished prerequisite tasks, one block per task.
pub fn dependency_notes(results: &[(&str, &str)]) -> String {
    results
        .iter()
        .map(|(id, result)| format!("任务 {id} 的结果：\n{result}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn synthesize(question: &str, instruction: &str, dependencies: &str, schemas: &str, tools: &str) -> Vec<Message> {
    let dependencies = if dependencies.is_empty() {
        String::new()
    } else {
        format!("前置任务结果：\n{dependencies}\n\n")
    };
    vec![
        Message::system(SYSTEM),
        Message::user(format!(
            "数据表：\n{schemas}\n\n可用工具：\n{tools}\n\n问题：{question}\n\n{dependencies}任务：\n{instruction}\n\n\
             请编写 python 代码完成任务，使用 print 输出每一步的结果，代码放在 ```python ``` 中。"
        )),
    ]
}

pub fn repair(question: &str, instruction: &str, code: &str, error: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM),
        Message::user(format!(
            "问题：{question}\n\n任务：\n{instruction}\n\n代码：\n```python\n{code}\n```\n\n运行出错：\n{error}\n\n\
             请修正代码，完整输出修正后的代码，代码放在 ```python ``` 中。"
        )),
    ]
}

pub fn complaint(question: &str) -> Vec<Message> {
    vec![
        Message::system("你是一名信息提取的专家。"),
        Message::user(format!(
            "[民事起诉状类型]\n公司起诉公司、公民起诉公民、公司起诉公民、公民起诉公司\n\n\
             当原告或被告名称后面直接跟\"法人\"时，应将其视为公民，保留\"法人\"在名称中；否则视为公司。\n\n\
             [问题]\n{question}\n\n\
             请提取信息，以 ```json {{\"plaintiff_name\": \"原告名称\", \"defendant_name\": \"被告名称\", \
             \"cause\": \"案由\", \"plaintiff_lawfirm_name\": \"原告律师事务所名称\", \
             \"defendant_lawfirm_name\": \"被告律师事务所名称\", \"court_name\": \"受理法院名称\", \
             \"date\": \"yyyy-MM-dd\", \"type\": \"民事起诉状类型\"}} ``` 格式输出。"
        )),
    ]
}

pub fn combine(question: &str, code: &str, result: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM),
        Message::user(format!(
            "问题：{question}\n\n执行的代码：\n```python\n{code}\n```\n\n运行结果：\n{result}\n\n\
             请根据运行结果回答问题，答案需包含查询到的关键信息。"
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_notes_filter_by_name() {
        let notes = schema_notes(&["CourtInfo"]);
        assert!(notes.starts_with("CourtInfo: "));
        assert_eq!(notes.lines().count(), 1);
        assert_eq!(schema_notes(&[]).lines().count(), TABLE_SCHEMAS.len());
    }

    #[test]
    fn synthesis_lists_prerequisite_results() {
        let notes = dependency_notes(&[("1", "注册地址: 上海市")]);
        let body = &synthesize("q", "查询城市", &notes, "", "")[1].content;
        assert!(body.contains("前置任务结果：\n任务 1 的结果：\n注册地址: 上海市\n\n任务："));
        assert!(!synthesize("q", "x", "", "", "")[1].content.contains("前置任务结果"));
    }

    #[test]
    fn repair_carries_code_and_error() {
        let msgs = repair("q", "step", "print(x)", "Error Name: NameError");
        let body = &msgs[1].content;
        assert!(body.contains("print(x)"));
        assert!(body.contains("Error Name: NameError"));
    }
}
