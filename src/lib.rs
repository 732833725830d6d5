//! # Auto Apply
//!
//! 一个自动投递职位申请的 Rust 服务
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure / Browser）
//! - `browser/` - 唯一的浏览器会话，懒启动，按需开页
//! - `PageDriver` / `PageProvider` - 组件对页面的能力需求
//! - `selector` - 有序候选选择器，按顺序取第一个命中的
//!
//! ### ② 业务能力层（Services / Clients）
//! - `services/` - 描述"我能做什么"，只处理单个页面
//! - `ListingDiscoverer` - 扫描招聘页，得到职位列表
//! - `FormSchemaExtractor` - 读取申请表单字段
//! - `FormSubmitter` - 填写并提交表单
//! - `LlmService` - 为字段生成回答
//! - `clients/` - 公司目录（Airtable / TOML）
//!
//! ### ③ 流程层（Workflow）
//! - `ApplicationFlow` - 一个职位的完整流程（schema → LLM → submit）
//!
//! ### ④ 编排层（Orchestration）
//! - `RetryQueue` - 串行执行作业，失败按指数退避重试
//! - `orchestrator/application_pipeline` - 一次运行：公司 → 职位 → 申请
//! - `orchestrator/app` - HTTP 服务与资源生命周期
//!
//! ## 模块结构

pub mod api;
pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod queue;
pub mod selector;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{BrowserSession, PageDriver, PageProvider};
pub use config::Config;
pub use error::{is_terminal, AppError, AppResult};
pub use models::{ApplicationState, ApplicationStatus, Company, FormField, FormFieldSchema, JobPosting};
pub use orchestrator::{App, ApplicationPipeline};
pub use queue::{JobOutcome, QueueJob, RetryPolicy, RetryQueue};
pub use selector::SelectorList;
pub use workflow::{ApplicationCtx, ApplicationFlow};
