use serde::{Deserialize, Serialize};

/// 标题提取失败时使用的占位标题
pub const UNKNOWN_POSITION: &str = "Unknown Position";

/// 从招聘页面发现的职位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    /// UUID v4，全局唯一
    pub id: String,
    pub title: String,
    /// 由调用方填写，列表发现阶段为空
    #[serde(default)]
    pub company: String,
    /// 绝对地址
    pub application_url: String,
}

impl JobPosting {
    pub fn new(title: Option<String>, application_url: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.unwrap_or_else(|| UNKNOWN_POSITION.to_string()),
            company: String::new(),
            application_url,
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }
}
