//! JS 执行器 - 基础设施层
//!
//! 持有一个 chromiumoxide 页面，实现 [`PageDriver`] 的全部能力

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::browser::page::PageDriver;
use crate::error::{AppError, AppResult, BrowserError};

/// 网络空闲检测脚本的返回值
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdleReport {
    idle: bool,
    resources: u64,
    waited_ms: u64,
}

/// JS 执行器
///
/// 职责：
/// - 持有一个 Page 资源（一个逻辑操作一个页面）
/// - 暴露导航、读取 DOM、输入、上传、点击能力
/// - 不认识职位 / 表单 / 申请
pub struct JsExecutor {
    page: Page,
    navigation_timeout: Duration,
    settle_delay: Duration,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page, navigation_timeout: Duration, settle_delay: Duration) -> Self {
        Self {
            page,
            navigation_timeout,
            settle_delay,
        }
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        result
            .into_value()
            .map_err(|e| BrowserError::ScriptFailed(e.to_string()).into())
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).map_err(|e| BrowserError::ScriptFailed(e.to_string()).into())
    }

    async fn find(&self, selector: &str) -> AppResult<Element> {
        self.page.find_element(selector).await.map_err(|_| {
            BrowserError::ElementNotFound {
                selector: selector.to_string(),
            }
            .into()
        })
    }

    /// 在导航超时内等待，超时视为导航失败
    async fn bounded<F>(&self, url: &str, fut: F) -> AppResult<()>
    where
        F: Future<Output = Result<(), CdpError>>,
    {
        match timeout(self.navigation_timeout, fut).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AppError::navigation_failed(url, e)),
            Err(_) => Err(AppError::navigation_failed(
                url,
                format!("等待超过 {} 秒", self.navigation_timeout.as_secs()),
            )),
        }
    }

    /// 等待页面进入网络空闲：`readyState` 为 complete，且资源请求数量在
    /// `settle_delay` 内保持不变；最长等待 `navigation_timeout`
    ///
    /// 超时或脚本失败只记录日志，页面内容仍按当前状态读取。
    async fn wait_for_network_idle(&self) {
        let js_code = network_idle_script(self.navigation_timeout, self.settle_delay);

        // 脚本自身有时限，这里再加一层保护
        let grace = self.navigation_timeout + Duration::from_secs(1);
        match timeout(grace, self.eval_as::<IdleReport>(js_code)).await {
            Ok(Ok(report)) if report.idle => debug!(
                "网络空闲 (资源 {} 个，等待 {} ms)",
                report.resources, report.waited_ms
            ),
            Ok(Ok(report)) => warn!(
                "⚠️ 等待网络空闲超时 (资源 {} 个，等待 {} ms)",
                report.resources, report.waited_ms
            ),
            Ok(Err(e)) => warn!("⚠️ 网络空闲检测失败: {}", e),
            Err(_) => warn!("⚠️ 网络空闲检测无响应"),
        }
    }

    async fn url_for_log(&self) -> String {
        self.page.url().await.ok().flatten().unwrap_or_default()
    }
}

/// 网络空闲检测脚本：轮询 `readyState` 和资源请求数量
fn network_idle_script(navigation_timeout: Duration, settle_delay: Duration) -> String {
    let timeout_ms = navigation_timeout.as_millis().min(u128::from(u64::MAX)) as u64;
    let idle_ms = settle_delay.as_millis().clamp(250, 10_000) as u64;
    format!(
        r#"
        (async () => {{
            const timeoutMs = {timeout_ms};
            const idleMs = {idle_ms};
            const interval = 250;
            const resources = () => {{
                try {{ return performance.getEntriesByType('resource').length; }} catch (_) {{ return 0; }}
            }};

            const start = Date.now();
            let lastCount = resources();
            let stableMs = 0;

            while (Date.now() - start < timeoutMs) {{
                await new Promise(r => setTimeout(r, interval));
                const count = resources();
                if (document.readyState === 'complete' && count === lastCount) {{
                    stableMs += interval;
                    if (stableMs >= idleMs) {{
                        return {{ idle: true, resources: count, waitedMs: Date.now() - start }};
                    }}
                }} else {{
                    stableMs = 0;
                }}
                lastCount = count;
            }}
            return {{ idle: false, resources: lastCount, waitedMs: Date.now() - start }};
        }})()
        "#
    )
}

#[async_trait]
impl PageDriver for JsExecutor {
    async fn goto(&self, url: &str) -> AppResult<()> {
        debug!("导航到: {}", url);
        self.bounded(url, async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok(())
        })
        .await?;

        self.wait_for_network_idle().await;
        Ok(())
    }

    async fn current_url(&self) -> AppResult<Option<String>> {
        Ok(self.page.url().await?)
    }

    async fn content(&self) -> AppResult<String> {
        Ok(self.page.content().await?)
    }

    async fn type_into(&self, selector: &str, value: &str) -> AppResult<()> {
        let element = self.find(selector).await?;
        element.click().await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn upload_file(&self, selector: &str, path: &Path) -> AppResult<()> {
        let element = self.find(selector).await?;
        let params = SetFileInputFilesParams::builder()
            .files(vec![path.display().to_string()])
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(BrowserError::ScriptFailed)?;
        self.page.execute(params).await?;
        debug!("已上传文件 {} 到 {}", path.display(), selector);
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> AppResult<()> {
        let js_code = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) return false;
                el.value = {};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()
            "#,
            serde_json::to_string(selector).unwrap_or_default(),
            serde_json::to_string(value).unwrap_or_default()
        );

        if self.eval_as::<bool>(js_code).await? {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            }
            .into())
        }
    }

    async fn click(&self, selector: &str) -> AppResult<()> {
        self.find(selector).await?.click().await?;
        Ok(())
    }

    async fn click_and_wait_for_navigation(&self, selector: &str) -> AppResult<()> {
        let element = self.find(selector).await?;
        let url = self.url_for_log().await;

        self.bounded(&url, async {
            futures::try_join!(
                async { element.click().await.map(|_| ()) },
                async { self.page.wait_for_navigation().await.map(|_| ()) },
            )?;
            Ok(())
        })
        .await?;

        self.wait_for_network_idle().await;
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        self.page.clone().close().await?;
        Ok(())
    }
}
