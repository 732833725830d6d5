use serde::{Deserialize, Serialize};

/// 目标公司（来自外部公司目录，只读）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub career_page_url: String,
}
