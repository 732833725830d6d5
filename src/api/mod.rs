//! API 模块
//!
//! 对外暴露的 HTTP 接口

pub mod routes;

pub use routes::{configure, AppState, RunGuard, RunLauncher, SubmitApplicationRequest};
