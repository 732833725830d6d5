//! 申请处理上下文
//!
//! 封装"我正在处理哪家公司的哪个职位"这一信息

use std::fmt::Display;

use crate::models::JobPosting;

/// 申请处理上下文
#[derive(Debug, Clone)]
pub struct ApplicationCtx {
    pub posting: JobPosting,

    /// 公司序号（仅用于日志显示，从1开始）
    pub company_index: usize,
}

impl ApplicationCtx {
    pub fn new(posting: JobPosting, company_index: usize) -> Self {
        Self {
            posting,
            company_index,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.posting.id
    }

    pub fn application_url(&self) -> &str {
        &self.posting.application_url
    }
}

impl Display for ApplicationCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[公司#{} {} | {}]",
            self.company_index, self.posting.company, self.posting.title
        )
    }
}
