//! 选择器解析 - 按优先级尝试一组 CSS 选择器
//!
//! 列表顺序即优先级：靠前的是特定平台的标记，靠后的是通用兜底。
//! 第一个命中至少一个元素的选择器胜出，返回它的全部匹配结果。

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// 可以在其中执行选择器的上下文（整个文档或某个元素）
pub trait SelectorScope<'a> {
    fn select_all(&self, selector: &Selector) -> Vec<ElementRef<'a>>;
}

impl<'a> SelectorScope<'a> for &'a Html {
    fn select_all(&self, selector: &Selector) -> Vec<ElementRef<'a>> {
        let document: &'a Html = *self;
        document.select(selector).collect()
    }
}

impl<'a> SelectorScope<'a> for ElementRef<'a> {
    fn select_all(&self, selector: &Selector) -> Vec<ElementRef<'a>> {
        self.select(selector).collect()
    }
}

/// 一次解析的结果：命中的选择器及其全部元素
#[derive(Debug)]
pub struct Resolved<'a, 's> {
    pub selector: &'s str,
    pub elements: Vec<ElementRef<'a>>,
}

/// 预编译的有序选择器列表
#[derive(Debug, Clone)]
pub struct SelectorList {
    entries: Vec<(String, Selector)>,
}

impl SelectorList {
    /// 编译选择器；无法解析的选择器会被跳过并记录警告
    pub fn new<S: AsRef<str>>(selectors: &[S]) -> Self {
        let entries = selectors
            .iter()
            .filter_map(|raw| {
                let raw = raw.as_ref();
                match Selector::parse(raw) {
                    Ok(selector) => Some((raw.to_string(), selector)),
                    Err(e) => {
                        warn!("跳过无效选择器 '{}': {:?}", raw, e);
                        None
                    }
                }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按顺序尝试，返回第一个非空的匹配集合
    pub fn resolve<'a, C: SelectorScope<'a>>(&self, context: C) -> Option<Resolved<'a, '_>> {
        self.entries.iter().find_map(|(raw, selector)| {
            let elements = context.select_all(selector);
            (!elements.is_empty()).then(|| Resolved {
                selector: raw.as_str(),
                elements,
            })
        })
    }

    /// 第一个命中选择器的第一个元素
    pub fn resolve_first<'a, C: SelectorScope<'a>>(&self, context: C) -> Option<ElementRef<'a>> {
        self.resolve(context)
            .and_then(|resolved| resolved.elements.into_iter().next())
    }

    /// 任意一个选择器命中即为真
    pub fn matches_any<'a, C: SelectorScope<'a>>(&self, context: C) -> bool {
        self.resolve(context).is_some()
    }
}

/// 对选择器列表进行一次性解析，返回匹配的元素（可能为空）
pub fn resolve<'a, C: SelectorScope<'a>, S: AsRef<str>>(
    context: C,
    selectors: &[S],
) -> Vec<ElementRef<'a>> {
    SelectorList::new(selectors)
        .resolve(context)
        .map(|resolved| resolved.elements)
        .unwrap_or_default()
}

/// 构造属性等值选择器，例如 `[name="email"]`
pub fn attr_equals(attr: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!(r#"[{}="{}"]"#, attr, escaped)
}

/// 元素的可见文本，合并连续空白
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
