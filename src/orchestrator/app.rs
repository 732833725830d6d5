//! 应用生命周期 - 编排层
//!
//! 1. **初始化**：日志文件、启动信息、创建（尚未启动的）浏览器会话
//! 2. **运行**：启动 HTTP 服务，每次请求在后台跑一次完整流水线
//! 3. **清理**：HTTP 服务退出后关闭浏览器
//!
//! 浏览器会话只有一个，由本模块持有，跨多次运行复用。

use std::sync::Arc;

use actix_web::{web, App as HttpApp, HttpServer};
use anyhow::{Context, Result};
use tracing::{error, info};

use crate::api::{self, AppState, RunGuard, RunLauncher, SubmitApplicationRequest};
use crate::browser::BrowserSession;
use crate::clients::company_directory;
use crate::config::Config;
use crate::orchestrator::ApplicationPipeline;
use crate::services::LlmService;
use crate::utils::logging::{init_log_file, log_startup, print_final_stats, RunStats};

/// 应用主结构
pub struct App {
    config: Config,
    session: Arc<BrowserSession>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(&config);

        // 浏览器在第一次打开页面时才真正启动
        let session = Arc::new(BrowserSession::new(&config));

        Ok(Self { config, session })
    }

    /// 启动 HTTP 服务，直到收到退出信号
    pub async fn run(self) -> Result<()> {
        let launcher: Arc<dyn RunLauncher> = Arc::new(PipelineLauncher {
            config: self.config.clone(),
            session: self.session.clone(),
        });
        let state = web::Data::new(AppState::new(launcher));

        info!("🌐 HTTP 服务启动: http://{}", self.config.http_bind);
        HttpServer::new(move || HttpApp::new().app_data(state.clone()).configure(api::configure))
            .bind(self.config.http_bind.as_str())
            .with_context(|| format!("无法监听地址: {}", self.config.http_bind))?
            .run()
            .await
            .context("HTTP 服务异常退出")?;

        info!("🛑 HTTP 服务已停止，正在关闭浏览器...");
        self.session.close_session().await?;
        Ok(())
    }
}

/// 在后台执行流水线
struct PipelineLauncher {
    config: Config,
    session: Arc<BrowserSession>,
}

impl RunLauncher for PipelineLauncher {
    fn launch(&self, request: SubmitApplicationRequest, guard: RunGuard) {
        let config = self.config.clone();
        let session = self.session.clone();

        tokio::spawn(async move {
            let _guard = guard;
            match run_once(&config, session, request).await {
                Ok(stats) => {
                    print_final_stats(&stats, &config.output_log_file, &config.warn_file)
                }
                Err(e) => error!("❌ 本次申请运行失败: {:#}", e),
            }
        });
    }
}

/// 一次完整的申请运行
pub async fn run_once(
    config: &Config,
    session: Arc<BrowserSession>,
    request: SubmitApplicationRequest,
) -> Result<RunStats> {
    let directory = company_directory(config)?;
    let generator = Arc::new(LlmService::new(
        config,
        &request.cv,
        &request.knowledge_base,
    ));

    let pipeline = ApplicationPipeline::new(session, generator, request.cv_path, config);
    pipeline.run(directory.as_ref()).await
}
