//! 公司目录：流程开始时读取一次目标公司列表

use std::path::PathBuf;

use async_trait::async_trait;

use crate::clients::airtable_client::AirtableClient;
use crate::config::Config;
use crate::error::{AppResult, ConfigError};
use crate::models::{load_companies_from_toml, Company};

#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    async fn fetch_companies(&self) -> AppResult<Vec<Company>>;
}

/// 本地 TOML 文件中的公司列表
pub struct TomlCompanyDirectory {
    path: PathBuf,
}

impl TomlCompanyDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CompanyDirectory for TomlCompanyDirectory {
    async fn fetch_companies(&self) -> AppResult<Vec<Company>> {
        load_companies_from_toml(&self.path).await.map_err(|e| {
            ConfigError::InvalidFile {
                path: self.path.display().to_string(),
                reason: format!("{:#}", e),
            }
            .into()
        })
    }
}

/// 配置了 `companies_file` 时使用本地文件，否则使用 Airtable
pub fn company_directory(config: &Config) -> AppResult<Box<dyn CompanyDirectory>> {
    match &config.companies_file {
        Some(path) => Ok(Box::new(TomlCompanyDirectory::new(path.clone()))),
        None => Ok(Box::new(AirtableClient::new(config)?)),
    }
}
