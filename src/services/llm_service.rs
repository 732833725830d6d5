//! LLM 服务 - 业务能力层
//!
//! 只负责"根据简历和知识库回答表单问题"，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Gemini 的 OpenAI 兼容端点）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppResult, LlmError};
use crate::models::FormField;

/// 回答生成器：每个表单字段调用一次
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate_response(&self, prompt: &str) -> AppResult<String>;
}

/// LLM 服务
///
/// 职责：
/// - 持有候选人的简历和补充知识（作为系统消息）
/// - 对单个字段的提示生成回答
/// - 不出现 JobPosting / Company
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    system_message: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config, cv_content: &str, knowledge_base: &str) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            system_message: build_system_message(cv_content, knowledge_base),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let failed = |reason: String| LlmError::ApiCallFailed {
            model: self.model_name.clone(),
            reason,
        };

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| failed(e.to_string()))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| failed(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(1024u32)
            .build()
            .map_err(|e| failed(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            failed(e.to_string())
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content)
    }
}

#[async_trait]
impl ResponseGenerator for LlmService {
    async fn generate_response(&self, prompt: &str) -> AppResult<String> {
        self.send_to_llm(prompt, Some(&self.system_message)).await
    }
}

fn build_system_message(cv_content: &str, knowledge_base: &str) -> String {
    format!(
        r#"You fill in job application forms on behalf of a candidate.
Base every answer on the candidate's CV and additional knowledge below.

CV Content:
{}

Additional Knowledge:
{}

Answers must be relevant to the question, professional, honest and accurate.
Return only the text to put into the form field, without quotes or commentary."#,
        cv_content.trim(),
        knowledge_base.trim()
    )
}

/// 字段用途（从字段名和标签推断）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldHint {
    Name,
    Email,
    Phone,
    Link,
    LongText,
    Other,
}

static FIELD_PATTERNS: LazyLock<Vec<(FieldHint, Regex)>> = LazyLock::new(|| {
    [
        (FieldHint::Email, r"(?i)e[_-]?mail"),
        (FieldHint::Phone, r"(?i)phone|telephone|mobile|contact[_-]?number"),
        (FieldHint::Name, r"(?i)^(full[_ -]?)?name$|first[_ -]?name|last[_ -]?name|candidate[_-]?name"),
        (FieldHint::Link, r"(?i)linkedin|github|portfolio|website|url"),
        (FieldHint::LongText, r"(?i)cover[_ -]?letter|motivation|why|about|summary|describe"),
    ]
    .into_iter()
    .map(|(hint, pattern)| (hint, Regex::new(pattern).expect("invalid field pattern")))
    .collect()
});

/// 推断字段用途；textarea 没有其他线索时按长文本处理
pub fn classify_field(field: &FormField) -> FieldHint {
    let haystacks = [field.name.as_str(), field.label.as_str()];
    FIELD_PATTERNS
        .iter()
        .find(|(_, re)| haystacks.iter().any(|text| re.is_match(text)))
        .map(|(hint, _)| *hint)
        .unwrap_or(if field.kind == "textarea" {
            FieldHint::LongText
        } else {
            FieldHint::Other
        })
}

/// 为单个字段构造提示
pub fn field_prompt(field: &FormField) -> String {
    if field.is_choice() && !field.options.is_empty() {
        return format!(
            "Choose the best option for the field: {}\nField label: {}\nOptions: {}\nAnswer with exactly one option from the list and nothing else.",
            field.name,
            field.label,
            field.options.join(" | ")
        );
    }
    if field.is_checkbox() {
        return format!(
            "Decide whether to tick the checkbox: {}\nField label: {}\nAnswer with 'yes' or 'no' only.",
            field.name, field.label
        );
    }

    let guidance = match classify_field(field) {
        FieldHint::Name | FieldHint::Email | FieldHint::Phone => {
            "Answer with the exact value from the CV and nothing else."
        }
        FieldHint::Link => "Answer with a single URL taken from the CV or knowledge, or leave a short 'N/A'.",
        FieldHint::LongText => "Write two or three concise paragraphs.",
        FieldHint::Other => "Keep the answer short, one sentence at most.",
    };

    format!(
        "Generate a {} response for the field: {}\nField label: {}\n{}",
        field.kind, field.name, field.label, guidance
    )
}
