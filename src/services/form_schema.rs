//! 表单结构提取 - 业务能力层

use std::sync::Arc;

use scraper::{ElementRef, Html};
use tracing::{debug, info};

use crate::browser::{PageDriver, PageLease, PageProvider};
use crate::error::{AppResult, AutomationError};
use crate::models::{FormField, FormFieldSchema};
use crate::selector::{self, attr_equals, element_text};

/// 表单中需要填写的控件
pub const FORM_CONTROLS: &str = "input, textarea, select";

/// 不需要填写的控件类型
const SKIPPED_KINDS: &[&str] = &["submit", "button", "hidden", "reset", "image"];

/// 表单结构提取器
///
/// 每次调用都重新读取页面，不做缓存。
pub struct FormSchemaExtractor<P> {
    pages: Arc<P>,
}

impl<P: PageProvider> FormSchemaExtractor<P> {
    pub fn new(pages: Arc<P>) -> Self {
        Self { pages }
    }

    pub async fn extract_schema(&self, application_url: &str) -> AppResult<FormFieldSchema> {
        let page = PageLease::new(self.pages.open_page().await?);
        let result = extract_on(&*page, application_url).await;
        page.release().await;

        if let Ok(schema) = &result {
            info!("📝 表单共 {} 个字段: {}", schema.len(), application_url);
        }
        result
    }
}

async fn extract_on<D: PageDriver>(page: &D, application_url: &str) -> AppResult<FormFieldSchema> {
    page.goto(application_url).await?;
    let html = page.content().await?;
    parse_form_schema(&html, application_url)
}

/// 解析页面中第一个表单的字段结构
pub fn parse_form_schema(html: &str, url: &str) -> AppResult<FormFieldSchema> {
    let document = Html::parse_document(html);

    let Some(form) = selector::resolve(&document, &["form"]).into_iter().next() else {
        return Err(AutomationError::NoFormFound {
            url: url.to_string(),
        }
        .into());
    };

    let mut schema = FormFieldSchema::new();
    for control in selector::resolve(form, &[FORM_CONTROLS]) {
        let Some(name) = control.value().attr("name").map(str::trim) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let kind = control_kind(control);
        if SKIPPED_KINDS.contains(&kind.as_str()) {
            continue;
        }

        let field = FormField {
            name: name.to_string(),
            required: control.value().attr("required").is_some(),
            label: control_label(&document, control).unwrap_or_else(|| name.to_string()),
            options: control_options(control, &kind),
            kind,
        };
        debug!("字段 {} ({}): {}", field.name, field.kind, field.label);
        schema.insert(field);
    }

    Ok(schema)
}

/// 控件类型：input 取 `type`（缺省为 text），其余取标签名
pub fn control_kind(control: ElementRef<'_>) -> String {
    let element = control.value();
    if element.name() == "input" {
        element
            .attr("type")
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "text".to_string())
    } else {
        element.name().to_ascii_lowercase()
    }
}

/// 下拉框的非空选项值、单选按钮自身的值
fn control_options(control: ElementRef<'_>, kind: &str) -> Vec<String> {
    match kind {
        "select" => selector::resolve(control, &["option"])
            .into_iter()
            .filter_map(|option| {
                let value = option
                    .value()
                    .attr("value")
                    .map(|v| v.trim().to_string())
                    .unwrap_or_else(|| element_text(option));
                (!value.is_empty()).then_some(value)
            })
            .collect(),
        "radio" => control
            .value()
            .attr("value")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| vec![v.to_string()])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// 标签优先级：aria-label → placeholder → label[for] → 外层 label
fn control_label(document: &Html, control: ElementRef<'_>) -> Option<String> {
    let element = control.value();
    let non_empty = |text: &str| {
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    };

    element
        .attr("aria-label")
        .and_then(non_empty)
        .or_else(|| element.attr("placeholder").and_then(non_empty))
        .or_else(|| {
            let id = element.id()?;
            let query = format!("label{}", attr_equals("for", id));
            selector::resolve(document, &[query])
                .into_iter()
                .map(element_text)
                .find(|text| !text.is_empty())
        })
        .or_else(|| enclosing_label_text(control))
}

/// 外层 `<label>` 自身的文字（不含被包裹控件里的文字）
fn enclosing_label_text(control: ElementRef<'_>) -> Option<String> {
    let label = control
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "label")?;

    let text = label
        .children()
        .filter_map(|child| child.value().as_text())
        .flat_map(|text| text.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}
