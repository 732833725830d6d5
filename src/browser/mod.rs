//! 浏览器层
//!
//! - `session` - 唯一的浏览器实例（懒启动、可显式关闭）
//! - `page` - 组件对页面的能力需求（`PageDriver` / `PageProvider`）
//! - `headless` / `connection` - 启动本地浏览器或连接已有浏览器

pub mod connection;
pub mod headless;
pub mod page;
pub mod session;

#[cfg(test)]
pub(crate) mod fake;

pub use page::{PageDriver, PageLease, PageProvider};
pub use session::BrowserSession;
