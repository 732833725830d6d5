//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责运行调度和资源管理，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 初始化日志、创建浏览器会话
//! - 启动 HTTP 服务，每个请求后台执行一次运行
//! - 退出时关闭浏览器
//!
//! ### `application_pipeline` - 一次运行
//! - 读取公司列表
//! - 发现作业 / 申请作业全部进入同一个 `RetryQueue`
//! - 汇总统计、写失败记录
//!
//! ### `status_board` - 申请状态看板
//!
//! ## 层次关系
//!
//! ```text
//! app (HTTP 服务 + BrowserSession)
//!     ↓
//! application_pipeline (Vec<Company> → RetryQueue)
//!     ↓
//! workflow::ApplicationFlow (处理单个 JobPosting)
//!     ↓
//! services (能力层：discover / schema / submit / llm / warn)
//!     ↓
//! browser (PageProvider / PageDriver)
//! ```

pub mod app;
pub mod application_pipeline;
pub mod status_board;

pub use app::App;
pub use application_pipeline::ApplicationPipeline;
pub use status_board::StatusBoard;
