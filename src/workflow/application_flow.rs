//! 单个职位的申请流程 - 流程层
//!
//! 流程顺序：
//! 1. 读取表单结构
//! 2. 为每个字段生成回答（文件控件直接使用简历）
//! 3. 填写并提交，确认成功标记

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::browser::PageProvider;
use crate::models::FormFieldSchema;
use crate::services::llm_service::field_prompt;
use crate::services::{FormSchemaExtractor, FormSubmitter, ResponseGenerator};
use crate::utils::logging::truncate_text;
use crate::workflow::application_ctx::ApplicationCtx;

/// 申请流程
///
/// - 编排"提取 → 生成 → 提交"
/// - 不持有页面，只依赖业务能力（services）
/// - 失败直接返回，重试交给队列
pub struct ApplicationFlow<P> {
    extractor: FormSchemaExtractor<P>,
    submitter: FormSubmitter<P>,
    generator: Arc<dyn ResponseGenerator>,
    cv_path: PathBuf,
    verbose_logging: bool,
}

impl<P: PageProvider> ApplicationFlow<P> {
    pub fn new(
        pages: Arc<P>,
        generator: Arc<dyn ResponseGenerator>,
        cv_path: impl Into<PathBuf>,
        verbose_logging: bool,
    ) -> Self {
        Self {
            extractor: FormSchemaExtractor::new(pages.clone()),
            submitter: FormSubmitter::new(pages),
            generator,
            cv_path: cv_path.into(),
            verbose_logging,
        }
    }

    pub async fn run(&self, ctx: &ApplicationCtx) -> Result<()> {
        // 已经点过提交的职位不再读取表单和询问 LLM
        self.submitter
            .ensure_not_clicked(ctx.application_url())
            .with_context(|| format!("{} 跳过重复提交", ctx))?;

        info!("{} 📝 读取申请表单...", ctx);
        let schema = self
            .extractor
            .extract_schema(ctx.application_url())
            .await
            .with_context(|| format!("{} 读取表单失败", ctx))?;

        let values = self
            .generate_values(&schema, ctx)
            .await
            .with_context(|| format!("{} 生成回答失败", ctx))?;

        info!("{} 📤 正在提交申请...", ctx);
        self.submitter
            .submit(ctx.application_url(), &values, &self.cv_path)
            .await
            .with_context(|| format!("{} 提交申请失败", ctx))?;

        Ok(())
    }

    /// 文件控件填简历路径（提交时会上传简历），其余字段逐个询问 LLM
    async fn generate_values(
        &self,
        schema: &FormFieldSchema,
        ctx: &ApplicationCtx,
    ) -> Result<BTreeMap<String, String>> {
        let mut values = BTreeMap::new();

        for field in schema.iter() {
            let value = if field.is_file() {
                self.cv_path.display().to_string()
            } else if field.is_checkbox() && field.required {
                // 必填勾选框（如同意条款）直接勾选
                "yes".to_string()
            } else {
                let answer = self.generator.generate_response(&field_prompt(field)).await?;
                if field.is_choice() && !field.options.is_empty() {
                    match field.match_option(&answer) {
                        Some(option) => option.to_string(),
                        None if field.required => {
                            warn!("{} 回答 {:?} 不在 {} 的选项中，使用第一个选项", ctx, answer, field.name);
                            field.options[0].clone()
                        }
                        None => {
                            warn!("{} 回答 {:?} 不在 {} 的选项中，跳过", ctx, answer, field.name);
                            continue;
                        }
                    }
                } else {
                    answer
                }
            };

            if self.verbose_logging {
                info!("{}   {} = {}", ctx, field.label, truncate_text(&value, 60));
            } else {
                debug!("{} 字段 {} 已生成", ctx, field.name);
            }
            values.insert(field.name.clone(), value);
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakePages, SubmitBehavior};
    use crate::error::{is_terminal, AppResult};
    use crate::models::JobPosting;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const APPLY: &str = "https://co.example/apply/42";

    /// 记录收到的提示，按固定格式回答
    #[derive(Default)]
    struct EchoGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResponseGenerator for EchoGenerator {
        async fn generate_response(&self, prompt: &str) -> AppResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(format!("answer #{}", self.prompts.lock().unwrap().len()))
        }
    }

    fn ctx() -> ApplicationCtx {
        ApplicationCtx::new(
            JobPosting::new(Some("Engineer".to_string()), APPLY.to_string()).with_company("Acme"),
            1,
        )
    }

    #[tokio::test]
    async fn test_flow_generates_one_answer_per_text_field() {
        let cv = tempfile::NamedTempFile::new().unwrap();
        let pages = FakePages::new()
            .with_page(
                APPLY,
                r#"<form>
                    <input name="full_name" required>
                    <textarea name="motivation"></textarea>
                    <input type="file" name="resume">
                    <button type="submit">Send</button>
                </form>"#,
            )
            .with_after_submit(r#"<p class="success-message">Done</p>"#);
        let generator = Arc::new(EchoGenerator::default());
        let flow = ApplicationFlow::new(Arc::new(pages.clone()), generator.clone(), cv.path(), false);

        flow.run(&ctx()).await.unwrap();

        let prompts = generator.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("full_name"));
        assert!(prompts[1].contains("motivation"));

        let actions = pages.actions();
        assert!(actions.iter().any(|a| a.starts_with("upload ")));
        assert!(actions.iter().any(|a| a.ends_with("=answer #1")));
        // 提取表单和提交各用一个页面
        assert_eq!(pages.opened(), 2);
        assert_eq!(pages.closed(), 2);
    }

    #[tokio::test]
    async fn test_challenge_stays_terminal_through_context() {
        let cv = tempfile::NamedTempFile::new().unwrap();
        let pages = FakePages::new().with_page(
            APPLY,
            r#"<form>
                <input name="email">
                <iframe src="https://newassets.hcaptcha.com/captcha/v1"></iframe>
                <button type="submit">Send</button>
            </form>"#,
        );
        let flow = ApplicationFlow::new(
            Arc::new(pages),
            Arc::new(EchoGenerator::default()),
            cv.path(),
            true,
        );

        let err = flow.run(&ctx()).await.unwrap_err();
        assert!(is_terminal(&err));
        assert!(format!("{:#}", err).contains("提交申请失败"));
    }

    #[tokio::test]
    async fn test_choice_answers_are_mapped_to_options() {
        let cv = tempfile::NamedTempFile::new().unwrap();
        let pages = FakePages::new()
            .with_page(
                APPLY,
                r#"<form>
                    <select name="country" required>
                        <option value="nl">Netherlands</option>
                        <option value="be">Belgium</option>
                    </select>
                    <select name="team"><option value="core">Core</option></select>
                    <input type="checkbox" name="consent" required>
                    <button type="submit">Send</button>
                </form>"#,
            )
            .with_after_submit(r#"<p class="success-message">Done</p>"#);
        // 回答不是任何选项
        let flow = ApplicationFlow::new(
            Arc::new(pages.clone()),
            Arc::new(EchoGenerator::default()),
            cv.path(),
            false,
        );

        flow.run(&ctx()).await.unwrap();

        let actions = pages.actions();
        assert!(actions.iter().any(|a| a.starts_with("select ") && a.ends_with("=nl")));
        assert!(!actions.iter().any(|a| a.contains(r#"[name="team"]"#)));
        assert!(actions.iter().any(|a| a.starts_with("click ") && a.contains("consent")));
    }

    #[tokio::test]
    async fn test_clicked_posting_is_not_processed_again() {
        let cv = tempfile::NamedTempFile::new().unwrap();
        let pages = FakePages::new()
            .with_page(
                APPLY,
                r#"<form><input name="email"><button type="submit">Send</button></form>"#,
            )
            .with_submit_behavior(SubmitBehavior::Fail);
        let generator = Arc::new(EchoGenerator::default());
        let flow = ApplicationFlow::new(Arc::new(pages.clone()), generator.clone(), cv.path(), false);

        let first = flow.run(&ctx()).await.unwrap_err();
        assert!(is_terminal(&first));

        let second = flow.run(&ctx()).await.unwrap_err();
        assert!(is_terminal(&second));
        assert_eq!(generator.prompts.lock().unwrap().len(), 1);
        assert_eq!(pages.opened(), 2);
    }
}
