//! 失败记录写入服务 - 业务能力层
//!
//! 只负责"把最终失败的申请追加到文件"，不关心流程

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

use crate::models::ApplicationStatus;

/// 失败记录写入服务
///
/// 职责：
/// - 将重试后仍然失败的申请追加到 warn 文件
/// - 一次只写一条记录
pub struct WarnWriter {
    warn_file_path: String,
}

impl WarnWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    /// 追加一条失败记录
    ///
    /// # 参数
    /// - `status`: 申请状态（应为 failed）
    /// - `target`: 失败的招聘页或申请地址
    pub fn write(&self, status: &ApplicationStatus, target: &str) -> Result<()> {
        debug!("写入失败记录: {} | {}", status.company, target);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)
            .with_context(|| format!("无法打开失败记录文件: {}", self.warn_file_path))?;

        let warn_msg = format!(
            "{} | 公司 {} | 职位 {} | {} | 原因: {}\n",
            status.updated_at.format("%Y-%m-%d %H:%M:%S"),
            status.company,
            status.job_id,
            target,
            status.error.as_deref().unwrap_or("未知错误")
        );

        file.write_all(warn_msg.as_bytes())?;

        Ok(())
    }
}

impl Default for WarnWriter {
    fn default() -> Self {
        Self::with_path("failed_applications.txt")
    }
}
