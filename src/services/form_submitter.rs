//! 申请表单提交 - 业务能力层
//!
//! 单次提交的阶段：
//!
//! ```text
//! Navigating → FillingFields → ChallengeCheck ─(有验证码)→ 中止
//!                                   │
//!                                   └→ Submitting → Verifying → 成功 / 无法确认
//! ```
//!
//! 任何阶段都不会回退；无论从哪个阶段结束，页面都会被关闭。

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use scraper::Html;
use tracing::{debug, info, warn};

use crate::browser::{PageDriver, PageLease, PageProvider};
use crate::error::{AppResult, AutomationError};
use crate::selector::{self, attr_equals, SelectorList};
use crate::services::form_schema::control_kind;

/// 人机验证 iframe 的来源特征
pub const CHALLENGE_SELECTORS: &[&str] = &[
    r#"iframe[src*="recaptcha"]"#,
    r#"iframe[src*="hcaptcha"]"#,
    r#"iframe[src*="challenges.cloudflare.com"]"#,
];

pub const SUBMIT_SELECTORS: &[&str] = &[
    r#"button[type="submit"]"#,
    r#"input[type="submit"]"#,
    "form button:not([type])",
];

/// 提交成功后页面上会出现的标记
pub const SUCCESS_SELECTORS: &[&str] = &[
    ".success-message",
    ".application-confirmed",
    r#"[data-test="success"]"#,
    ".thank-you",
    "#application_confirmation",
    r#"[data-ui="application-submitted"]"#,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Navigating,
    FillingFields,
    ChallengeCheck,
    Submitting,
    Verifying,
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionStage::Navigating => "navigating",
            SubmissionStage::FillingFields => "filling_fields",
            SubmissionStage::ChallengeCheck => "challenge_check",
            SubmissionStage::Submitting => "submitting",
            SubmissionStage::Verifying => "verifying",
        };
        f.write_str(name)
    }
}

/// 对单个字段要做的页面操作
#[derive(Debug, Clone, PartialEq, Eq)]
enum FillAction {
    Upload { selector: String },
    Select { selector: String, value: String },
    Click { selector: String },
    Type { selector: String, value: String },
}

/// 表单提交器
///
/// 记录已经点击过提交的地址：同一地址不会被第二次提交。
pub struct FormSubmitter<P> {
    pages: Arc<P>,
    clicked: Mutex<HashSet<String>>,
}

impl<P: PageProvider> FormSubmitter<P> {
    pub fn new(pages: Arc<P>) -> Self {
        Self {
            pages,
            clicked: Mutex::new(HashSet::new()),
        }
    }

    fn clicked(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.clicked.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 该地址此前已经点击过提交时返回 `SubmitOutcomeUnknown`
    pub fn ensure_not_clicked(&self, application_url: &str) -> AppResult<()> {
        if self.clicked().contains(application_url) {
            return Err(AutomationError::SubmitOutcomeUnknown {
                url: application_url.to_string(),
                reason: "此前已点击过提交，不再重复提交".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// 填写并提交申请表单
    ///
    /// 只有在提交后的页面上找到成功标记才返回 `Ok(true)`；
    /// 找不到时返回 `SubmissionUnverified`，即使表单可能已经被接收。
    pub async fn submit(
        &self,
        application_url: &str,
        field_values: &BTreeMap<String, String>,
        cv_file_path: &Path,
    ) -> AppResult<bool> {
        self.ensure_not_clicked(application_url)?;

        let cv_exists = tokio::fs::metadata(cv_file_path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !cv_exists {
            return Err(AutomationError::CvFileMissing {
                path: cv_file_path.display().to_string(),
            }
            .into());
        }

        let page = PageLease::new(self.pages.open_page().await?);
        let result = self
            .submit_on(&*page, application_url, field_values, cv_file_path)
            .await;
        page.release().await;

        match &result {
            Ok(_) => info!("✅ 申请已提交: {}", application_url),
            Err(e) => warn!("⚠️ 提交失败 {}: {}", application_url, e),
        }
        result
    }

    async fn submit_on<D: PageDriver>(
        &self,
        page: &D,
        url: &str,
        field_values: &BTreeMap<String, String>,
        cv_file_path: &Path,
    ) -> AppResult<bool> {
        enter(SubmissionStage::Navigating, url);
        page.goto(url).await?;

        enter(SubmissionStage::FillingFields, url);
        let plan = plan_fill(&page.content().await?, url, field_values)?;
        for action in plan {
            match action {
                FillAction::Upload { selector } => page.upload_file(&selector, cv_file_path).await?,
                FillAction::Select { selector, value } => page.select_option(&selector, &value).await?,
                FillAction::Click { selector } => page.click(&selector).await?,
                FillAction::Type { selector, value } => page.type_into(&selector, &value).await?,
            }
        }

        enter(SubmissionStage::ChallengeCheck, url);
        let submit_selector = find_submit_control(&page.content().await?, url)?;

        // 从这里开始任何失败都不能重试
        enter(SubmissionStage::Submitting, url);
        self.clicked().insert(url.to_string());
        let landed = async {
            page.click_and_wait_for_navigation(&submit_selector).await?;
            enter(SubmissionStage::Verifying, url);
            page.content().await
        }
        .await
        .map_err(|e| AutomationError::SubmitOutcomeUnknown {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if has_success_marker(&landed) {
            Ok(true)
        } else {
            Err(AutomationError::SubmissionUnverified {
                url: url.to_string(),
            }
            .into())
        }
    }
}

fn enter(stage: SubmissionStage, url: &str) {
    debug!("[{}] {}", stage, url);
}

/// 页面上名为 `name` 的表单控件
fn control_selector(name: &str) -> String {
    let attr = attr_equals("name", name);
    format!("input{attr}, textarea{attr}, select{attr}")
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "y" | "on" | "1" | "checked"
    )
}

/// 根据当前页面决定每个字段怎么填
fn plan_fill(
    html: &str,
    url: &str,
    field_values: &BTreeMap<String, String>,
) -> AppResult<Vec<FillAction>> {
    let document = Html::parse_document(html);
    let mut plan = Vec::with_capacity(field_values.len());

    for (name, value) in field_values {
        let selector = control_selector(name);
        let Some(control) = selector::resolve(&document, &[selector.as_str()]).into_iter().next()
        else {
            return Err(AutomationError::FieldNotFound {
                url: url.to_string(),
                field: name.clone(),
            }
            .into());
        };

        let action = match control_kind(control).as_str() {
            "file" => FillAction::Upload { selector },
            "select" => FillAction::Select {
                selector,
                value: value.clone(),
            },
            "radio" => {
                // 优先选中值相同的选项
                let option = format!("input{}{}", attr_equals("name", name), attr_equals("value", value));
                if !selector::resolve(&document, &[option.as_str()]).is_empty() {
                    FillAction::Click { selector: option }
                } else if is_truthy(value) {
                    FillAction::Click { selector }
                } else {
                    continue;
                }
            }
            "checkbox" if is_truthy(value) => FillAction::Click { selector },
            "checkbox" => continue,
            _ => FillAction::Type {
                selector,
                value: value.clone(),
            },
        };
        plan.push(action);
    }

    Ok(plan)
}

/// 检查验证码并找到提交按钮，返回命中的选择器
fn find_submit_control(html: &str, url: &str) -> AppResult<String> {
    let document = Html::parse_document(html);

    if let Some(challenge) = SelectorList::new(CHALLENGE_SELECTORS).resolve(&document) {
        warn!("🛑 检测到人机验证 ({}): {}", challenge.selector, url);
        return Err(AutomationError::ChallengeDetected {
            url: url.to_string(),
        }
        .into());
    }

    SelectorList::new(SUBMIT_SELECTORS)
        .resolve(&document)
        .map(|resolved| resolved.selector.to_string())
        .ok_or_else(|| {
            AutomationError::SubmitControlNotFound {
                url: url.to_string(),
            }
            .into()
        })
}

fn has_success_marker(html: &str) -> bool {
    let document = Html::parse_document(html);
    SelectorList::new(SUCCESS_SELECTORS).matches_any(&document)
}
