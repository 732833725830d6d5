//! 页面能力抽象
//!
//! 业务组件只依赖这里的 trait，不直接接触 chromiumoxide。

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::AppResult;

/// 单个页面（标签页）的操作能力
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// 导航到 URL 并等待页面加载完成
    async fn goto(&self, url: &str) -> AppResult<()>;

    /// 当前地址（跟随重定向之后）
    async fn current_url(&self) -> AppResult<Option<String>>;

    /// 当前 DOM 序列化后的 HTML
    async fn content(&self) -> AppResult<String>;

    /// 向控件输入文本
    async fn type_into(&self, selector: &str, value: &str) -> AppResult<()>;

    /// 为文件控件提供本地文件
    async fn upload_file(&self, selector: &str, path: &Path) -> AppResult<()>;

    /// 设置下拉框的值
    async fn select_option(&self, selector: &str, value: &str) -> AppResult<()>;

    async fn click(&self, selector: &str) -> AppResult<()>;

    /// 点击并同时等待随之而来的导航完成
    async fn click_and_wait_for_navigation(&self, selector: &str) -> AppResult<()>;

    async fn close(&self) -> AppResult<()>;
}

/// 为每个逻辑操作提供一个新页面
#[async_trait]
pub trait PageProvider: Send + Sync {
    type Page: PageDriver + 'static;

    async fn open_page(&self) -> AppResult<Self::Page>;
}

/// 释放页面；关闭失败只记录日志，不覆盖操作本身的结果
pub async fn release_page<P: PageDriver + ?Sized>(page: &P) {
    if let Err(e) = page.close().await {
        warn!("关闭页面失败: {}", e);
    }
}

/// 页面租约
///
/// 正常结束时调用 [`PageLease::release`] 关闭页面；如果租约在此之前被丢弃
/// （例如作业超时、future 被取消），在后台关闭页面。
pub struct PageLease<D: PageDriver + 'static> {
    page: Arc<D>,
    released: bool,
}

impl<D: PageDriver + 'static> PageLease<D> {
    pub fn new(page: D) -> Self {
        Self {
            page: Arc::new(page),
            released: false,
        }
    }

    pub async fn release(mut self) {
        release_page(self.page.as_ref()).await;
        self.released = true;
    }
}

impl<D: PageDriver + 'static> Deref for PageLease<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.page
    }
}

impl<D: PageDriver + 'static> Drop for PageLease<D> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let page = self.page.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("页面未正常释放，后台关闭");
                handle.spawn(async move {
                    release_page(page.as_ref()).await;
                });
            }
            Err(_) => warn!("⚠️ 没有可用的运行时，页面无法关闭"),
        }
    }
}
