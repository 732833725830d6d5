//! HTTP 入口：`POST /api/submit-application`
//!
//! 校验请求后把整次申请交给 [`RunLauncher`] 在后台执行，立即返回。
//! 同一时刻只允许一次运行，运行中再次提交返回 409。

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplicationRequest {
    /// 简历文本，用于 LLM 上下文
    pub cv: String,
    /// 需要上传的简历文件
    pub cv_path: PathBuf,
    #[serde(default)]
    pub knowledge_base: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitApplicationResponse {
    pub success: bool,
    pub message: String,
}

impl SubmitApplicationResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// 运行结束（无论成败）时释放"运行中"标记
pub struct RunGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// 后台启动一次完整的申请运行；`guard` 必须活到运行结束
pub trait RunLauncher: Send + Sync {
    fn launch(&self, request: SubmitApplicationRequest, guard: RunGuard);
}

pub struct AppState {
    launcher: Arc<dyn RunLauncher>,
    busy: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(launcher: Arc<dyn RunLauncher>) -> Self {
        Self {
            launcher,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn try_acquire(&self) -> Option<RunGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunGuard {
                busy: self.busy.clone(),
            })
    }
}

#[post("/submit-application")]
async fn submit_application(
    state: web::Data<AppState>,
    body: web::Json<SubmitApplicationRequest>,
) -> HttpResponse {
    let request = body.into_inner();

    if request.cv.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(SubmitApplicationResponse::rejected("cv must not be empty"));
    }
    if !request.cv_path.is_file() {
        warn!("⚠️ 简历文件不存在: {}", request.cv_path.display());
        return HttpResponse::BadRequest().json(SubmitApplicationResponse::rejected(format!(
            "cv file not found: {}",
            request.cv_path.display()
        )));
    }

    let Some(guard) = state.try_acquire() else {
        return HttpResponse::Conflict().json(SubmitApplicationResponse::rejected(
            "An application run is already in progress",
        ));
    };

    info!("📨 收到申请请求，简历: {}", request.cv_path.display());
    state.launcher.launch(request, guard);

    HttpResponse::Ok().json(SubmitApplicationResponse::ok("Application process started"))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").service(submit_application));
}
