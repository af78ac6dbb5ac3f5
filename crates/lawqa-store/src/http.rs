//! HTTP client for the registry lookup service.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{Document, DocumentService, Lookup, RegistryLookup, StoreError, Table};

/// Registry client posting `{query_conds, need_fields}` to
/// `{base_url}/{endpoint}` with a bearer token.
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    query_conds: Map<String, Value>,
    need_fields: &'a [&'a str],
}

impl HttpRegistry {
    /// `base_url` should be like `https://host/law_api/s1_b` (no trailing slash).
    pub fn new(base_url: String, token: String) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    pub fn with_client(client: reqwest::Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, table: Table) -> String {
        format!("{}/{}", self.base_url, table.endpoint())
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<reqwest::Response, StoreError> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl RegistryLookup for HttpRegistry {
    async fn lookup(&self, table: Table, conds: &[(&str, &str)]) -> Result<Lookup, StoreError> {
        let url = self.url(table);
        let body = LookupRequest {
            query_conds: conds
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
            need_fields: &[],
        };

        debug!(url = %url, ?conds, "registry lookup");
        let payload: Value = self.post(&url, &body).await?.json().await?;
        let result = Lookup::from_value(payload);
        debug!(%table, hit = !result.is_empty(), "registry response");
        Ok(result)
    }
}

#[async_trait]
impl DocumentService for HttpRegistry {
    async fn generate(&self, document: Document, payload: &Value) -> Result<String, StoreError> {
        let url = format!("{}/{}", self.base_url, document.endpoint());
        debug!(url = %url, "document request");
        Ok(self.post(&url, payload).await?.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let client = HttpRegistry::new("http://localhost:4000/law_api/".into(), "t".into());
        assert_eq!(client.base_url, "http://localhost:4000/law_api");
        assert_eq!(
            client.url(Table::CompanyRegister),
            "http://localhost:4000/law_api/get_company_register"
        );
    }

    #[test]
    fn request_body_shape() {
        let body = LookupRequest {
            query_conds: [("案号".to_string(), Value::from("(2020)皖05民终1584号"))]
                .into_iter()
                .collect(),
            need_fields: &[],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"query_conds": {"案号": "(2020)皖05民终1584号"}, "need_fields": []})
        );
    }
}
