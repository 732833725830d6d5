/// Airtable API 客户端
///
/// 从 Airtable 表格中读取目标公司列表
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::company_directory::CompanyDirectory;
use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult, ConfigError};
use crate::models::Company;

const NAME_FIELD: &str = "Company Name";
const CAREER_PAGE_FIELD: &str = "Career Page URL";

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<Record>,
    /// 还有下一页时返回
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Record {
    id: String,
    #[serde(default)]
    fields: RecordFields,
}

#[derive(Debug, Default, Deserialize)]
struct RecordFields {
    #[serde(rename = "Company Name")]
    name: Option<String>,
    #[serde(rename = "Career Page URL")]
    career_page_url: Option<String>,
}

/// Airtable 客户端
pub struct AirtableClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    view: String,
}

impl AirtableClient {
    /// 创建新的 Airtable 客户端；缺少密钥或 base id 时返回配置错误
    pub fn new(config: &Config) -> AppResult<Self> {
        if config.airtable_api_key.is_empty() {
            return Err(ConfigError::Missing("AIRTABLE_API_KEY".to_string()).into());
        }
        if config.airtable_base_id.is_empty() {
            return Err(ConfigError::Missing("AIRTABLE_BASE_ID".to_string()).into());
        }

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: format!(
                "{}/{}/{}",
                config.airtable_api_url.trim_end_matches('/'),
                config.airtable_base_id,
                config.airtable_table
            ),
            api_key: config.airtable_api_key.clone(),
            view: config.airtable_view.clone(),
        })
    }

    async fn fetch_page(&self, offset: Option<&str>) -> AppResult<RecordPage> {
        let mut query = vec![("view", self.view.as_str())];
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }

        let response = self
            .http
            .get(&self.endpoint)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::BadResponse {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        response
            .json::<RecordPage>()
            .await
            .map_err(|e| AppError::api_request_failed(&self.endpoint, e))
    }
}

#[async_trait]
impl CompanyDirectory for AirtableClient {
    async fn fetch_companies(&self) -> AppResult<Vec<Company>> {
        let mut companies = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page = self.fetch_page(offset.as_deref()).await?;
            debug!("Airtable 返回 {} 条记录", page.records.len());

            for record in page.records {
                match (record.fields.name, record.fields.career_page_url) {
                    (Some(name), Some(url)) if !name.trim().is_empty() && !url.trim().is_empty() => {
                        companies.push(Company {
                            id: record.id,
                            name: name.trim().to_string(),
                            career_page_url: url.trim().to_string(),
                        });
                    }
                    _ => warn!(
                        "跳过记录 {}：缺少 '{}' 或 '{}'",
                        record.id, NAME_FIELD, CAREER_PAGE_FIELD
                    ),
                }
            }

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        info!("✓ 从 Airtable 读取了 {} 家公司", companies.len());
        Ok(companies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> Config {
        Config {
            airtable_api_url: server.uri(),
            airtable_api_key: "key123".to_string(),
            airtable_base_id: "app42".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_companies_follows_pagination() {
        let server = MockServer::start().await;

        // 先挂载的 mock 优先匹配
        Mock::given(method("GET"))
            .and(path("/app42/Companies"))
            .and(query_param("offset", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    { "id": "rec2", "fields": { "Company Name": "Globex", "Career Page URL": "https://globex.example/jobs" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/app42/Companies"))
            .and(query_param("view", "Grid view"))
            .and(header("authorization", "Bearer key123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    { "id": "rec1", "fields": { "Company Name": "Acme", "Career Page URL": "https://acme.example/careers" } },
                    { "id": "recX", "fields": { "Company Name": "No URL Inc" } }
                ],
                "offset": "page2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AirtableClient::new(&config_for(&server)).unwrap();
        let companies = client.fetch_companies().await.unwrap();

        assert_eq!(
            companies,
            vec![
                Company {
                    id: "rec1".to_string(),
                    name: "Acme".to_string(),
                    career_page_url: "https://acme.example/careers".to_string(),
                },
                Company {
                    id: "rec2".to_string(),
                    name: "Globex".to_string(),
                    career_page_url: "https://globex.example/jobs".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_error_status_is_bad_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("AUTHENTICATION_REQUIRED"))
            .mount(&server)
            .await;

        let client = AirtableClient::new(&config_for(&server)).unwrap();
        let err = client.fetch_companies().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Api(ApiError::BadResponse { status: 401, .. })
        ));
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let err = AirtableClient::new(&Config::default()).err().unwrap();
        assert!(matches!(err, AppError::Config(ConfigError::Missing(_))));
    }
}
