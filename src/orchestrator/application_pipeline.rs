//! 申请流水线 - 编排层
//!
//! ## 职责
//!
//! 1. **读取公司**：从公司目录读取目标公司（失败则整次运行失败）
//! 2. **扫描职位**：每家公司一个发现作业
//! 3. **逐个申请**：每个职位一个申请作业，委托 `ApplicationFlow`
//! 4. **状态看板**：维护每个职位的 `ApplicationStatus`
//! 5. **失败记录**：重试后仍失败的作业写入 warn 文件
//!
//! 所有作业都经过同一个 `RetryQueue`，同一时刻只有一个作业在操作浏览器。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::browser::PageProvider;
use crate::clients::CompanyDirectory;
use crate::config::Config;
use crate::models::{ApplicationState, ApplicationStatus, Company, JobPosting};
use crate::orchestrator::status_board::StatusBoard;
use crate::queue::{JobOutcome, QueueJob, RetryPolicy, RetryQueue};
use crate::services::{ListingDiscoverer, ResponseGenerator, WarnWriter};
use crate::utils::logging::{log_companies_loaded, RunStats};
use crate::workflow::{ApplicationCtx, ApplicationFlow};

/// 作业对应的公司和地址，用于写失败记录
#[derive(Debug, Clone)]
struct JobTarget {
    company: String,
    url: String,
    discovery: bool,
}

struct Shared<P> {
    discoverer: ListingDiscoverer<P>,
    flow: ApplicationFlow<P>,
    queue: RetryQueue,
    board: StatusBoard,
    targets: Mutex<HashMap<String, JobTarget>>,
}

/// 申请流水线
pub struct ApplicationPipeline<P> {
    shared: Arc<Shared<P>>,
    warn_writer: WarnWriter,
}

impl<P: PageProvider + 'static> ApplicationPipeline<P> {
    pub fn new(
        pages: Arc<P>,
        generator: Arc<dyn ResponseGenerator>,
        cv_path: impl Into<PathBuf>,
        config: &Config,
    ) -> Self {
        let shared = Shared {
            discoverer: ListingDiscoverer::new(pages.clone()),
            flow: ApplicationFlow::new(pages, generator, cv_path, config.verbose_logging),
            queue: RetryQueue::new(RetryPolicy::from(&config.queue)),
            board: StatusBoard::new(),
            targets: Mutex::new(HashMap::new()),
        };

        Self {
            shared: Arc::new(shared),
            warn_writer: WarnWriter::with_path(&config.warn_file),
        }
    }

    /// 执行一次完整的申请流程，返回统计信息
    ///
    /// 读取公司列表失败直接返回错误；单个作业的失败只体现在统计和 warn 文件中。
    pub async fn run(&self, directory: &dyn CompanyDirectory) -> Result<RunStats> {
        info!("\n🏢 正在读取公司列表...");
        let companies = directory
            .fetch_companies()
            .await
            .context("读取公司列表失败")?;

        if companies.is_empty() {
            warn!("⚠️ 公司列表为空，程序结束");
            return Ok(RunStats::default());
        }
        log_companies_loaded(companies.len());

        let total = companies.len();
        for (index, company) in companies.into_iter().enumerate() {
            self.shared.enqueue_discovery(company, index + 1);
        }

        self.shared.queue.wait_idle().await;

        let mut stats = self.settle();
        stats.companies = total;
        Ok(stats)
    }

    pub fn statuses(&self) -> Vec<ApplicationStatus> {
        self.shared.board.snapshot()
    }

    /// 根据作业的最终结果更新看板并写失败记录
    fn settle(&self) -> RunStats {
        let mut stats = RunStats::default();
        let targets = self.shared.targets_snapshot();

        for outcome in self.shared.queue.outcomes() {
            let JobOutcome::Dropped { id, error, .. } = outcome else {
                continue;
            };
            let Some(target) = targets.get(&id) else {
                continue;
            };

            let status = if target.discovery {
                stats.companies_failed += 1;
                ApplicationStatus::pending(&id, &target.company).failed(&error)
            } else {
                let failed = ApplicationStatus::pending(&id, &target.company).failed(&error);
                self.shared
                    .board
                    .update(&id, |current| current.failed(&error))
                    .unwrap_or(failed)
            };

            if let Err(e) = self.warn_writer.write(&status, &target.url) {
                error!("写入失败记录失败: {:#}", e);
            }
        }

        stats.postings = self.shared.board.len();
        stats.submitted = self.shared.board.count(ApplicationState::Submitted);
        stats.failed = self.shared.board.count(ApplicationState::Failed);
        stats
    }
}

impl<P: PageProvider + 'static> Shared<P> {
    fn register(&self, job_id: &str, target: JobTarget) {
        self.targets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(job_id.to_string(), target);
    }

    fn targets_snapshot(&self) -> HashMap<String, JobTarget> {
        self.targets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn enqueue_discovery(self: &Arc<Self>, company: Company, company_index: usize) {
        let job_id = format!("discover-{}", company.id);
        self.register(
            &job_id,
            JobTarget {
                company: company.name.clone(),
                url: company.career_page_url.clone(),
                discovery: true,
            },
        );

        let shared = self.clone();
        self.queue.enqueue(QueueJob::new(job_id, move || {
            let shared = shared.clone();
            let company = company.clone();
            async move {
                info!("[公司 {}] 🔍 {}", company_index, company.name);
                let postings = shared
                    .discoverer
                    .discover(&company.career_page_url)
                    .await
                    .with_context(|| format!("[公司 {}] 扫描 {} 的职位失败", company_index, company.name))?;

                for posting in postings {
                    shared.enqueue_application(posting.with_company(&company.name), company_index);
                }
                Ok(())
            }
        }));
    }

    fn enqueue_application(self: &Arc<Self>, posting: JobPosting, company_index: usize) {
        let ctx = ApplicationCtx::new(posting, company_index);
        let job_id = ctx.job_id().to_string();

        self.register(
            &job_id,
            JobTarget {
                company: ctx.posting.company.clone(),
                url: ctx.application_url().to_string(),
                discovery: false,
            },
        );
        self.board
            .upsert(ApplicationStatus::pending(&job_id, &ctx.posting.company));

        let shared = self.clone();
        self.queue.enqueue(QueueJob::new(job_id, move || {
            let shared = shared.clone();
            let ctx = ctx.clone();
            async move {
                shared.flow.run(&ctx).await?;
                shared.board.update(ctx.job_id(), ApplicationStatus::submitted);
                info!("{} ✅ 申请成功", ctx);
                Ok(())
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePages;
    use crate::config::QueueSettings;
    use crate::error::{AppError, AppResult};
    use async_trait::async_trait;

    struct StaticDirectory(AppResult<Vec<Company>>);

    #[async_trait]
    impl CompanyDirectory for StaticDirectory {
        async fn fetch_companies(&self) -> AppResult<Vec<Company>> {
            match &self.0 {
                Ok(companies) => Ok(companies.clone()),
                Err(_) => Err(AppError::navigation_failed("https://api.airtable.com", "offline")),
            }
        }
    }

    struct FixedGenerator;

    #[async_trait]
    impl ResponseGenerator for FixedGenerator {
        async fn generate_response(&self, _prompt: &str) -> AppResult<String> {
            Ok("Jane Doe".to_string())
        }
    }

    fn company(id: &str, name: &str, url: &str) -> Company {
        Company {
            id: id.to_string(),
            name: name.to_string(),
            career_page_url: url.to_string(),
        }
    }

    fn test_config(warn_file: &std::path::Path) -> Config {
        Config {
            warn_file: warn_file.display().to_string(),
            queue: QueueSettings {
                max_retries: 1,
                retry_base_delay_ms: 1,
                job_timeout_secs: 5,
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_run_submits_and_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        let warn_file = dir.path().join("failed.txt");
        let cv = tempfile::NamedTempFile::new().unwrap();

        let pages = FakePages::new()
            .with_page(
                "https://acme.example/careers",
                r#"<div class="jobs-list">
                    <div class="job-card"><h2>Backend</h2><a href="/apply/1">Apply</a></div>
                    <div class="job-card"><h2>Frontend</h2><a href="/apply/2">Apply</a></div>
                </div>"#,
            )
            .with_page(
                "https://acme.example/apply/1",
                r#"<form><input name="name"><button type="submit">Go</button></form>"#,
            )
            .with_page(
                "https://acme.example/apply/2",
                r#"<form><input name="name">
                    <iframe src="https://www.google.com/recaptcha/api2/anchor"></iframe>
                    <button type="submit">Go</button></form>"#,
            )
            .with_after_submit(r#"<div class="application-confirmed">Thanks</div>"#);

        let pipeline = ApplicationPipeline::new(
            Arc::new(pages.clone()),
            Arc::new(FixedGenerator),
            cv.path(),
            &test_config(&warn_file),
        );
        let directory = StaticDirectory(Ok(vec![
            company("rec1", "Acme", "https://acme.example/careers"),
            company("rec2", "Broken", "https://broken.example/careers"),
        ]));

        let stats = pipeline.run(&directory).await.unwrap();

        assert_eq!(
            stats,
            RunStats {
                companies: 2,
                companies_failed: 1,
                postings: 2,
                submitted: 1,
                failed: 1,
            }
        );

        let statuses = pipeline.statuses();
        let failed = statuses
            .iter()
            .find(|s| s.status == ApplicationState::Failed)
            .unwrap();
        assert_eq!(failed.company, "Acme");
        assert!(failed.error.as_deref().unwrap().contains("人机验证"));

        let log = std::fs::read_to_string(&warn_file).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.contains("https://broken.example/careers"));
        assert!(log.contains("https://acme.example/apply/2"));

        // 每个页面用完都被关闭
        assert_eq!(pages.opened(), pages.closed());
    }

    #[tokio::test]
    async fn test_directory_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cv = tempfile::NamedTempFile::new().unwrap();
        let pipeline = ApplicationPipeline::new(
            Arc::new(FakePages::new()),
            Arc::new(FixedGenerator),
            cv.path(),
            &test_config(&dir.path().join("failed.txt")),
        );

        let err = pipeline
            .run(&StaticDirectory(Err(AppError::Timeout { seconds: 1 })))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("读取公司列表失败"));
        assert!(pipeline.statuses().is_empty());
    }
}
