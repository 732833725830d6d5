//! 内存中的假页面，用于在没有浏览器的情况下测试业务组件

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scraper::Html;

use crate::browser::page::{PageDriver, PageProvider};
use crate::error::{AppError, AppResult, BrowserError};
use crate::selector;

/// 点击提交之后页面的表现
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitBehavior {
    /// 跳转到 `with_after_submit` 设置的页面
    #[default]
    Navigate,
    /// 点击生效但等待导航失败
    Fail,
    /// 点击生效但导航永远不结束
    Hang,
}

#[derive(Default)]
struct FakeState {
    pages: HashMap<String, String>,
    redirects: HashMap<String, String>,
    hanging: HashSet<String>,
    after_submit: Option<String>,
    submit_behavior: SubmitBehavior,
    actions: Vec<String>,
    opened: usize,
    closed: usize,
}

/// 假页面工厂：按 URL 返回预设的 HTML，并记录所有操作
#[derive(Clone, Default)]
pub struct FakePages {
    state: Arc<Mutex<FakeState>>,
}

impl FakePages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.lock().pages.insert(url.to_string(), html.to_string());
        self
    }

    /// 导航到 `from` 时实际落在 `to`
    pub fn with_redirect(self, from: &str, to: &str) -> Self {
        self.lock().redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// 导航到 `url` 永远不会结束
    pub fn with_hanging_page(self, url: &str) -> Self {
        self.lock().hanging.insert(url.to_string());
        self
    }

    pub fn with_submit_behavior(self, behavior: SubmitBehavior) -> Self {
        self.lock().submit_behavior = behavior;
        self
    }

    /// 点击提交后展示的页面
    pub fn with_after_submit(self, html: &str) -> Self {
        self.lock().after_submit = Some(html.to_string());
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.lock().actions.clone()
    }

    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state poisoned")
    }
}

#[async_trait]
impl PageProvider for FakePages {
    type Page = FakePage;

    async fn open_page(&self) -> AppResult<FakePage> {
        self.lock().opened += 1;
        Ok(FakePage {
            state: self.state.clone(),
            current: Mutex::new(None),
        })
    }
}

pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
    current: Mutex<Option<(String, String)>>,
}

impl FakePage {
    fn record(&self, action: String) {
        self.state.lock().expect("fake state poisoned").actions.push(action);
    }

    fn current_html(&self) -> String {
        self.current
            .lock()
            .expect("fake page poisoned")
            .as_ref()
            .map(|(_, html)| html.clone())
            .unwrap_or_default()
    }

    fn require(&self, selector: &str) -> AppResult<()> {
        if has_element(&self.current_html(), selector) {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            }
            .into())
        }
    }
}

fn has_element(html: &str, selector: &str) -> bool {
    let document = Html::parse_document(html);
    !selector::resolve(&document, &[selector]).is_empty()
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> AppResult<()> {
        let (landed, html, hangs) = {
            let state = self.state.lock().expect("fake state poisoned");
            let landed = state.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
            let html = state.pages.get(&landed).cloned();
            let hangs = state.hanging.contains(url);
            (landed, html, hangs)
        };
        self.record(format!("goto {}", url));
        if hangs {
            std::future::pending::<()>().await;
        }
        match html {
            Some(html) => {
                *self.current.lock().expect("fake page poisoned") = Some((landed, html));
                Ok(())
            }
            None => Err(AppError::navigation_failed(url, "404")),
        }
    }

    async fn current_url(&self) -> AppResult<Option<String>> {
        Ok(self
            .current
            .lock()
            .expect("fake page poisoned")
            .as_ref()
            .map(|(url, _)| url.clone()))
    }

    async fn content(&self) -> AppResult<String> {
        Ok(self.current_html())
    }

    async fn type_into(&self, selector: &str, value: &str) -> AppResult<()> {
        self.require(selector)?;
        self.record(format!("type {}={}", selector, value));
        Ok(())
    }

    async fn upload_file(&self, selector: &str, path: &Path) -> AppResult<()> {
        self.require(selector)?;
        self.record(format!("upload {}={}", selector, path.display()));
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> AppResult<()> {
        self.require(selector)?;
        self.record(format!("select {}={}", selector, value));
        Ok(())
    }

    async fn click(&self, selector: &str) -> AppResult<()> {
        self.require(selector)?;
        self.record(format!("click {}", selector));
        Ok(())
    }

    async fn click_and_wait_for_navigation(&self, selector: &str) -> AppResult<()> {
        self.require(selector)?;
        self.record(format!("submit {}", selector));
        let (behavior, after) = {
            let state = self.state.lock().expect("fake state poisoned");
            (state.submit_behavior, state.after_submit.clone())
        };
        match behavior {
            SubmitBehavior::Navigate => {}
            SubmitBehavior::Fail => {
                return Err(AppError::navigation_failed(selector, "等待导航超时"));
            }
            SubmitBehavior::Hang => std::future::pending::<()>().await,
        }
        if let Some(html) = after {
            let mut current = self.current.lock().expect("fake page poisoned");
            let url = current.as_ref().map(|(url, _)| url.clone()).unwrap_or_default();
            *current = Some((url, html));
        }
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        self.state.lock().expect("fake state poisoned").closed += 1;
        Ok(())
    }
}
