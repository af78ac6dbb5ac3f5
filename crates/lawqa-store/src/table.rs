//! Registry tables and the field names the resolver and tools query by.

use std::fmt;

/// A registry table, addressed by its lookup endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// Listed companies (name, abbreviation, stock code).
    CompanyInfo,
    /// Business register, keyed by full company name.
    CompanyRegister,
    /// Unified credit code → company name.
    CompanyRegisterName,
    SubCompanyInfo,
    SubCompanyInfoList,
    /// Judgement documents, standard docket numbers.
    LegalDocument,
    LegalDocumentList,
    /// Judgement abstracts, full-width docket numbers.
    LegalAbstract,
    /// Consumption-restriction records.
    XzgxfInfo,
    XzgxfInfoList,
    CourtInfo,
    CourtCode,
    LawfirmInfo,
    LawfirmLog,
    AddressInfo,
    AddressCode,
    TempInfo,
}

impl Table {
    pub const ALL: [Table; 17] = [
        Table::CompanyInfo,
        Table::CompanyRegister,
        Table::CompanyRegisterName,
        Table::SubCompanyInfo,
        Table::SubCompanyInfoList,
        Table::LegalDocument,
        Table::LegalDocumentList,
        Table::LegalAbstract,
        Table::XzgxfInfo,
        Table::XzgxfInfoList,
        Table::CourtInfo,
        Table::CourtCode,
        Table::LawfirmInfo,
        Table::LawfirmLog,
        Table::AddressInfo,
        Table::AddressCode,
        Table::TempInfo,
    ];

    /// Endpoint path segment, e.g. `get_company_info`.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::CompanyInfo => "get_company_info",
            Self::CompanyRegister => "get_company_register",
            Self::CompanyRegisterName => "get_company_register_name",
            Self::SubCompanyInfo => "get_sub_company_info",
            Self::SubCompanyInfoList => "get_sub_company_info_list",
            Self::LegalDocument => "get_legal_document",
            Self::LegalDocumentList => "get_legal_document_list",
            Self::LegalAbstract => "get_legal_abstract",
            Self::XzgxfInfo => "get_xzgxf_info",
            Self::XzgxfInfoList => "get_xzgxf_info_list",
            Self::CourtInfo => "get_court_info",
            Self::CourtCode => "get_court_code",
            Self::LawfirmInfo => "get_lawfirm_info",
            Self::LawfirmLog => "get_lawfirm_log",
            Self::AddressInfo => "get_address_info",
            Self::AddressCode => "get_address_code",
            Self::TempInfo => "get_temp_info",
        }
    }

    /// Schema name shown to the planner, e.g. `CompanyInfo`.
    pub fn schema_name(&self) -> &'static str {
        match self {
            Self::CompanyInfo => "CompanyInfo",
            Self::CompanyRegister => "CompanyRegister",
            Self::CompanyRegisterName => "UnifiedSocialCreditCodeName",
            Self::SubCompanyInfo | Self::SubCompanyInfoList => "SubCompanyInfo",
            Self::LegalDocument | Self::LegalDocumentList => "LegalDoc",
            Self::LegalAbstract => "LegalAbstract",
            Self::XzgxfInfo | Self::XzgxfInfoList => "XzgxfInfo",
            Self::CourtInfo => "CourtInfo",
            Self::CourtCode => "CourtCode",
            Self::LawfirmInfo => "LawfirmInfo",
            Self::LawfirmLog => "LawfirmLog",
            Self::AddressInfo => "AddrInfo",
            Self::AddressCode => "AddrCode",
            Self::TempInfo => "TempInfo",
        }
    }

    pub fn from_endpoint(name: &str) -> Option<Table> {
        Self::ALL.into_iter().find(|t| t.endpoint() == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Field names as stored by the registry.
pub mod field {
    pub const COMPANY_NAME: &str = "公司名称";
    pub const COMPANY_ABBREVIATION: &str = "公司简称";
    pub const STOCK_CODE: &str = "公司代码";
    pub const CREDIT_CODE: &str = "统一社会信用代码";
    pub const PARENT_COMPANY: &str = "关联上市公司全称";
    pub const RELATED_COMPANY: &str = "关联公司";
    pub const CASE_NUMBER: &str = "案号";
    pub const COURT_NAME: &str = "法院名称";
    pub const COURT_CODE: &str = "法院代字";
    pub const LAWFIRM_NAME: &str = "律师事务所名称";
    pub const ADDRESS: &str = "地址";
    pub const PROVINCE: &str = "省份";
    pub const CITY: &str = "城市";
    pub const COUNTY: &str = "区县";
    pub const DATE: &str = "日期";
    pub const RESTRICTED_COMPANY: &str = "限制高消费企业名称";
    pub const JUDGEMENT_RESULT: &str = "判决结果";
    pub const ABSTRACT: &str = "文本摘要";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_round_trip() {
        for table in Table::ALL {
            assert_eq!(Table::from_endpoint(table.endpoint()), Some(table));
        }
        assert_eq!(Table::from_endpoint("get_nothing"), None);
    }

    #[test]
    fn display_is_endpoint() {
        assert_eq!(Table::LegalAbstract.to_string(), "get_legal_abstract");
    }
}
