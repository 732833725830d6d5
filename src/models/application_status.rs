use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// 单次申请的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationState {
    Pending,
    Submitted,
    Failed,
}

/// 一次申请提交的结果，由调用方维护
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationStatus {
    pub job_id: String,
    pub company: String,
    pub status: ApplicationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Local>,
}

impl ApplicationStatus {
    pub fn pending(job_id: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            company: company.into(),
            status: ApplicationState::Pending,
            error: None,
            updated_at: Local::now(),
        }
    }

    pub fn submitted(mut self) -> Self {
        self.status = ApplicationState::Submitted;
        self.error = None;
        self.updated_at = Local::now();
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = ApplicationState::Failed;
        self.error = Some(error.into());
        self.updated_at = Local::now();
        self
    }
}
