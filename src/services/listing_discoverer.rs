//! 职位列表发现 - 业务能力层
//!
//! 打开公司招聘页，按优先级选择器找到职位卡片，
//! 从每张卡片里取出标题和申请链接。

use std::collections::HashSet;
use std::sync::Arc;

use scraper::Html;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{PageDriver, PageLease, PageProvider};
use crate::error::{AppError, AppResult, AutomationError};
use crate::models::JobPosting;
use crate::selector::{element_text, SelectorList};

/// 职位卡片选择器：先是各招聘平台的固定结构，后是通用写法
pub const LISTING_SELECTORS: &[&str] = &[
    ".opening",
    ".posting",
    r#"[data-ui="job"]"#,
    ".jobs-list .job-card",
    ".careers-list .position",
    ".job-listings .job-item",
    r#"[data-test="job-listing"]"#,
    ".job-search-results .job",
];

pub const TITLE_SELECTORS: &[&str] = &[
    ".title",
    ".position-title",
    r#"[data-test="job-title"]"#,
    "h2",
    "h3",
];

pub const LINK_SELECTORS: &[&str] = &[
    r#"a[data-test="job-link"]"#,
    "a.job-link",
    "a[href]",
];

/// 职位列表发现器
pub struct ListingDiscoverer<P> {
    pages: Arc<P>,
}

impl<P: PageProvider> ListingDiscoverer<P> {
    pub fn new(pages: Arc<P>) -> Self {
        Self { pages }
    }

    /// 发现招聘页上的全部职位
    ///
    /// 一张卡片都没有时返回 `NoListingsFound`；页面在任何情况下都会被关闭。
    pub async fn discover(&self, career_page_url: &str) -> AppResult<Vec<JobPosting>> {
        info!("🔍 正在扫描招聘页: {}", career_page_url);

        let page = PageLease::new(self.pages.open_page().await?);
        let result = discover_on(&*page, career_page_url).await;
        page.release().await;

        if let Ok(postings) = &result {
            info!("✓ 找到 {} 个职位: {}", postings.len(), career_page_url);
        }
        result
    }
}

async fn discover_on<D: PageDriver>(page: &D, career_page_url: &str) -> AppResult<Vec<JobPosting>> {
    page.goto(career_page_url).await?;

    // 以最终落地地址为基准解析相对链接
    let base_url = page
        .current_url()
        .await?
        .filter(|url| !url.is_empty() && url != "about:blank")
        .unwrap_or_else(|| career_page_url.to_string());
    let html = page.content().await?;

    parse_listings(&html, &base_url)
}

/// 从页面 HTML 中解析职位
///
/// 标题缺失的卡片使用占位标题；拿不到 http(s) 链接的卡片被跳过；
/// 同一页面上重复的申请地址只保留第一次出现。
pub fn parse_listings(html: &str, page_url: &str) -> AppResult<Vec<JobPosting>> {
    let base = Url::parse(page_url).map_err(|e| AppError::navigation_failed(page_url, e))?;
    let document = Html::parse_document(html);

    let cards = SelectorList::new(LISTING_SELECTORS);
    let Some(resolved) = cards.resolve(&document) else {
        return Err(AutomationError::NoListingsFound {
            url: page_url.to_string(),
        }
        .into());
    };
    debug!(
        "职位卡片选择器 '{}' 命中 {} 个元素",
        resolved.selector,
        resolved.elements.len()
    );

    let titles = SelectorList::new(TITLE_SELECTORS);
    let links = SelectorList::new(LINK_SELECTORS);
    let mut seen = HashSet::new();
    let mut postings = Vec::new();

    for card in resolved.elements {
        let title = titles
            .resolve_first(card)
            .map(element_text)
            .filter(|text| !text.is_empty());

        // 卡片本身可能就是一个链接
        let href = links
            .resolve_first(card)
            .and_then(|link| link.value().attr("href"))
            .or_else(|| card.value().attr("href"));

        let Some(application_url) = href.and_then(|href| absolute_url(&base, href)) else {
            warn!(
                "跳过没有有效链接的职位卡片: {}",
                title.as_deref().unwrap_or("<无标题>")
            );
            continue;
        };

        if seen.insert(application_url.clone()) {
            postings.push(JobPosting::new(title, application_url));
        }
    }

    Ok(postings)
}

/// 将 href 规范化为绝对地址；只接受 http / https
fn absolute_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePages;
    use crate::models::job_posting::UNKNOWN_POSITION;

    const CAREERS: &str = "https://co.example/careers";

    fn urls(postings: &[JobPosting]) -> Vec<&str> {
        postings.iter().map(|p| p.application_url.as_str()).collect()
    }

    #[test]
    fn test_relative_link_is_normalized() {
        let html = r#"
            <div class="jobs-list">
                <div class="job-card"><h2>Engineer</h2><a href="/apply/42">Apply</a></div>
            </div>
        "#;
        let postings = parse_listings(html, CAREERS).unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].title, "Engineer");
        assert_eq!(postings[0].application_url, "https://co.example/apply/42");
        assert!(postings[0].company.is_empty());
    }

    #[test]
    fn test_no_cards_is_no_listings_found() {
        let html = r#"<main><p>We are not hiring right now.</p></main>"#;
        let err = parse_listings(html, CAREERS).unwrap_err();
        assert!(matches!(
            err,
            AppError::Automation(AutomationError::NoListingsFound { .. })
        ));
    }

    #[test]
    fn test_only_last_selector_matches() {
        let html = r#"
            <div class="job-search-results">
                <div class="job"><span class="title">A</span><a href="/a">a</a></div>
                <div class="job"><span class="title">B</span><a href="/b">b</a></div>
            </div>
        "#;
        let postings = parse_listings(html, CAREERS).unwrap();
        assert_eq!(
            urls(&postings),
            vec!["https://co.example/a", "https://co.example/b"]
        );
    }

    #[test]
    fn test_earlier_selector_wins_over_generic_markup() {
        let html = r#"
            <div class="opening"><a href="/gh/1">Platform Engineer</a></div>
            <div class="jobs-list">
                <div class="job-card"><h2>Other</h2><a href="/other">x</a></div>
            </div>
        "#;
        let postings = parse_listings(html, CAREERS).unwrap();
        assert_eq!(urls(&postings), vec!["https://co.example/gh/1"]);
    }

    #[test]
    fn test_cards_without_link_are_excluded() {
        let html = r#"
            <div class="jobs-list">
                <div class="job-card"><h2>Has title only</h2></div>
                <div class="job-card"></div>
                <div class="job-card"><h2>Kept</h2><a href="https://jobs.example/kept">go</a></div>
                <div class="job-card"><h2>Mail</h2><a href="mailto:hr@co.example">mail</a></div>
            </div>
        "#;
        let postings = parse_listings(html, CAREERS).unwrap();
        assert_eq!(urls(&postings), vec!["https://jobs.example/kept"]);
    }

    #[test]
    fn test_missing_title_uses_placeholder() {
        let html = r#"<div class="careers-list"><div class="position"><a href="apply?id=7">x</a></div></div>"#;
        let postings = parse_listings(html, CAREERS).unwrap();
        assert_eq!(postings[0].title, UNKNOWN_POSITION);
        assert_eq!(postings[0].application_url, "https://co.example/apply?id=7");
    }

    #[test]
    fn test_duplicate_urls_are_emitted_once() {
        let html = r#"
            <ul class="job-listings">
                <li class="job-item"><h3>Dup</h3><a href="/apply/1">a</a></li>
                <li class="job-item"><h3>Dup again</h3><a href="/apply/1">b</a></li>
            </ul>
        "#;
        let postings = parse_listings(html, CAREERS).unwrap();
        assert_eq!(postings.len(), 1);
        assert_ne!(postings[0].id, "");
    }

    #[tokio::test]
    async fn test_discover_releases_page_and_follows_redirect() {
        let pages = FakePages::new()
            .with_redirect("https://co.example/jobs", "https://careers.co.example/list/")
            .with_page(
                "https://careers.co.example/list/",
                r#"<a class="posting" href="role-1"><h2>Role</h2></a>"#,
            );
        let discoverer = ListingDiscoverer::new(Arc::new(pages.clone()));

        let postings = discoverer.discover("https://co.example/jobs").await.unwrap();
        assert_eq!(
            urls(&postings),
            vec!["https://careers.co.example/list/role-1"]
        );
        assert_eq!(pages.opened(), 1);
        assert_eq!(pages.closed(), 1);
    }

    #[tokio::test]
    async fn test_discover_releases_page_on_failure() {
        let pages = FakePages::new().with_page(CAREERS, "<p>nothing</p>");
        let discoverer = ListingDiscoverer::new(Arc::new(pages.clone()));

        tokio_test::assert_err!(discoverer.discover(CAREERS).await);
        tokio_test::assert_err!(discoverer.discover("https://co.example/missing").await);
        assert_eq!(pages.opened(), 2);
        assert_eq!(pages.closed(), 2);
    }

    #[tokio::test]
    async fn test_timed_out_attempts_still_close_their_pages() {
        use crate::queue::{JobOutcome, QueueJob, RetryPolicy, RetryQueue};
        use std::time::Duration;

        let pages = FakePages::new().with_hanging_page(CAREERS);
        let discoverer = Arc::new(ListingDiscoverer::new(Arc::new(pages.clone())));
        let queue = RetryQueue::new(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            job_timeout: Some(Duration::from_millis(30)),
        });

        queue.enqueue(QueueJob::new("discover", move || {
            let discoverer = discoverer.clone();
            async move {
                discoverer.discover(CAREERS).await?;
                Ok(())
            }
        }));
        queue.wait_idle().await;

        // 被取消的尝试在后台关闭页面
        for _ in 0..50 {
            if pages.closed() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(pages.opened(), 3);
        assert_eq!(pages.closed(), 3);
        assert!(matches!(
            queue.outcomes().as_slice(),
            [JobOutcome::Dropped { retries: 2, terminal: false, .. }]
        ));
    }
}
