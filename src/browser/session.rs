//! 浏览器会话管理 - 基础设施层
//!
//! 整个进程只持有一个浏览器实例：第一次需要时启动（或连接），之后复用，
//! 直到调用方显式关闭。每个逻辑操作（发现列表 / 提取表单 / 提交）各自打开一个页面，
//! 互不共享导航和 DOM 状态。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Browser;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::connection::connect_to_browser;
use crate::browser::headless::launch_headless_browser;
use crate::browser::page::PageProvider;
use crate::config::{BrowserSettings, Config};
use crate::error::{AppResult, BrowserError};
use crate::infrastructure::JsExecutor;

struct LiveBrowser {
    browser: Arc<Browser>,
    events: JoinHandle<()>,
}

/// 浏览器会话管理器
pub struct BrowserSession {
    settings: BrowserSettings,
    navigation_timeout: Duration,
    settle_delay: Duration,
    live: Mutex<Option<LiveBrowser>>,
}

impl BrowserSession {
    pub fn new(config: &Config) -> Self {
        Self {
            settings: config.browser.clone(),
            navigation_timeout: config.navigation_timeout(),
            settle_delay: config.settle_delay(),
            live: Mutex::new(None),
        }
    }

    /// 返回已有的浏览器；没有（或已退出）时启动一个新的
    pub async fn ensure_session(&self) -> AppResult<Arc<Browser>> {
        let mut live = self.live.lock().await;

        if let Some(existing) = live.as_ref() {
            if !existing.events.is_finished() {
                return Ok(existing.browser.clone());
            }
            warn!("⚠️ 浏览器已退出，重新启动");
            *live = None;
        }

        let (browser, events) = match self.settings.debug_port {
            Some(port) => connect_to_browser(port).await?,
            None => launch_headless_browser(&self.settings).await?,
        };
        let browser = Arc::new(browser);

        *live = Some(LiveBrowser {
            browser: browser.clone(),
            events,
        });

        Ok(browser)
    }

    /// 在给定浏览器中打开一个新页面
    pub async fn new_page(&self, browser: &Browser) -> AppResult<JsExecutor> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(BrowserError::PageCreationFailed)?;
        debug!("已创建新页面");

        Ok(JsExecutor::new(page, self.navigation_timeout, self.settle_delay))
    }

    /// 关闭浏览器并清空缓存；没有会话时什么也不做
    ///
    /// 通过调试端口连接的浏览器不属于本进程，只断开连接，不关闭它。
    pub async fn close_session(&self) -> AppResult<()> {
        let Some(live) = self.live.lock().await.take() else {
            debug!("没有活动的浏览器会话");
            return Ok(());
        };

        match Arc::try_unwrap(live.browser) {
            Ok(mut browser) if self.settings.debug_port.is_none() => {
                browser.close().await?;
                if let Err(e) = browser.wait().await {
                    warn!("等待浏览器进程退出失败: {}", e);
                }
            }
            Ok(_) => debug!("断开与外部浏览器的连接"),
            Err(_) => warn!("⚠️ 浏览器仍被引用，直接释放"),
        }
        live.events.abort();

        info!("🛑 浏览器会话已关闭");
        Ok(())
    }

    /// 当前是否持有浏览器
    pub async fn is_active(&self) -> bool {
        self.live.lock().await.is_some()
    }
}

#[async_trait]
impl PageProvider for BrowserSession {
    type Page = JsExecutor;

    async fn open_page(&self) -> AppResult<JsExecutor> {
        let browser = self.ensure_session().await?;
        self.new_page(&browser).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let session = BrowserSession::new(&Config::default());
        assert!(!session.is_active().await);
        tokio_test::assert_ok!(session.close_session().await);
        tokio_test::assert_ok!(session.close_session().await);
        assert!(!session.is_active().await);
    }

    #[tokio::test]
    #[ignore] // 需要本机安装 Chrome/Chromium：cargo test -- --ignored
    async fn test_session_is_reused() {
        let session = BrowserSession::new(&Config::default());
        let first = session.ensure_session().await.expect("启动浏览器失败");
        let second = session.ensure_session().await.expect("获取浏览器失败");
        assert!(Arc::ptr_eq(&first, &second));
        drop((first, second));
        session.close_session().await.expect("关闭浏览器失败");
        assert!(!session.is_active().await);
    }
}
