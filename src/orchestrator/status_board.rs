//! 申请状态看板
//!
//! 记录本次运行中每个职位的申请状态，调用方维护，核心组件不感知。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::{ApplicationState, ApplicationStatus};

#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<HashMap<String, ApplicationStatus>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ApplicationStatus>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn upsert(&self, status: ApplicationStatus) {
        self.lock().insert(status.job_id.clone(), status);
    }

    /// 更新已有记录；记录不存在时返回 `None`
    pub fn update(
        &self,
        job_id: &str,
        change: impl FnOnce(ApplicationStatus) -> ApplicationStatus,
    ) -> Option<ApplicationStatus> {
        let mut board = self.lock();
        let current = board.remove(job_id)?;
        let updated = change(current);
        board.insert(job_id.to_string(), updated.clone());
        Some(updated)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn count(&self, state: ApplicationState) -> usize {
        self.lock().values().filter(|s| s.status == state).count()
    }

    /// 按更新时间排序的快照
    pub fn snapshot(&self) -> Vec<ApplicationStatus> {
        let mut statuses: Vec<_> = self.lock().values().cloned().collect();
        statuses.sort_by_key(|s| s.updated_at);
        statuses
    }
}
