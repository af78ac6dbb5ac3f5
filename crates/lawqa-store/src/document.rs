//! Document generation endpoints: civil complaints and company reports.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::StoreError;

/// A document the registry service can render from a JSON payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    /// Civil complaint, company against company.
    CompanySueCompany,
    /// Civil complaint, citizen against citizen.
    CitizensSueCitizens,
    /// Civil complaint, company against citizen.
    CompanySueCitizens,
    /// Civil complaint, citizen against company.
    CitizensSueCompany,
    /// Consolidated company report saved as a Word file.
    CompanyReport,
}

impl Document {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::CompanySueCompany => "get_company_sue_company",
            Self::CitizensSueCitizens => "get_citizens_sue_citizens",
            Self::CompanySueCitizens => "get_company_sue_citizens",
            Self::CitizensSueCompany => "get_citizens_sue_company",
            Self::CompanyReport => "save_dict_list_to_word",
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Renders documents and returns the service's text response: the complaint
/// text, or the report's file name.
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn generate(&self, document: Document, payload: &Value) -> Result<String, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints() {
        assert_eq!(Document::CompanyReport.to_string(), "save_dict_list_to_word");
        assert_eq!(Document::CitizensSueCompany.endpoint(), "get_citizens_sue_company");
    }
}
