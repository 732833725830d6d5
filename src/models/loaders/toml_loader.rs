use crate::models::company::Company;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize)]
struct CompanyFile {
    #[serde(default, rename = "company")]
    companies: Vec<CompanyEntry>,
}

#[derive(Debug, Deserialize)]
struct CompanyEntry {
    id: Option<String>,
    name: String,
    career_page_url: String,
}

/// 从 TOML 文件加载公司列表
///
/// 文件格式：
/// ```toml
/// [[company]]
/// name = "Example"
/// career_page_url = "https://example.com/careers"
/// ```
/// 未填写 `id` 时使用从 1 开始的序号。
pub async fn load_companies_from_toml(toml_file_path: &Path) -> Result<Vec<Company>> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let companies = parse_companies(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    tracing::info!(
        "从 {} 加载了 {} 家公司",
        toml_file_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy(),
        companies.len()
    );

    Ok(companies)
}

fn parse_companies(content: &str) -> Result<Vec<Company>> {
    let file: CompanyFile = toml::from_str(content)?;

    Ok(file
        .companies
        .into_iter()
        .enumerate()
        .map(|(index, entry)| Company {
            id: entry.id.unwrap_or_else(|| (index + 1).to_string()),
            name: entry.name,
            career_page_url: entry.career_page_url,
        })
        .collect())
}
