use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误（启动、页面、导航、脚本）
    #[error(transparent)]
    Browser(#[from] BrowserError),
    /// 页面自动化流程错误（列表、表单、验证码、提交）
    #[error(transparent)]
    Automation(#[from] AutomationError),
    /// API 调用错误
    #[error(transparent)]
    Api(#[from] ApiError),
    /// LLM 服务错误
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// 单次任务执行超时
    #[error("任务执行超时 ({seconds} 秒)")]
    Timeout { seconds: u64 },
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {0}")]
    LaunchFailed(String),
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 创建页面失败
    #[error("创建页面失败: {0}")]
    PageCreationFailed(#[source] chromiumoxide::error::CdpError),
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },
    /// 执行脚本或解析脚本结果失败
    #[error("执行脚本失败: {0}")]
    ScriptFailed(String),
    /// 页面上找不到元素
    #[error("找不到元素: {selector}")]
    ElementNotFound { selector: String },
    /// 其他 CDP 协议错误
    #[error("CDP 调用失败: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// 自动化流程错误
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("页面上没有找到职位列表: {url}")]
    NoListingsFound { url: String },
    #[error("页面上没有找到表单: {url}")]
    NoFormFound { url: String },
    #[error("检测到人机验证，需要人工处理: {url}")]
    ChallengeDetected { url: String },
    #[error("找不到提交按钮: {url}")]
    SubmitControlNotFound { url: String },
    #[error("无法确认申请已提交成功: {url}")]
    SubmissionUnverified { url: String },
    /// 已点击提交，之后的步骤失败，无法判断表单是否已被接收
    #[error("已点击提交，结果未知 ({url}): {reason}")]
    SubmitOutcomeUnknown { url: String, reason: String },
    #[error("表单中不存在字段 {field}: {url}")]
    FieldNotFound { url: String, field: String },
    #[error("简历文件不存在: {path}")]
    CvFileMissing { path: String },
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): status={status}, body={body}")]
    BadResponse {
        endpoint: String,
        status: u16,
        body: String,
    },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API调用失败 (模型: {model}): {reason}")]
    ApiCallFailed { model: String, reason: String },
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取或解析失败
    #[error("配置文件 {path} 无效: {reason}")]
    InvalidFile { path: String, reason: String },
    /// 缺少必需的配置项
    #[error("缺少配置项 {0}")]
    Missing(String),
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::Cdp(err))
    }
}

impl AppError {
    /// 是否值得重试
    ///
    /// 验证码、已提交但无法确认、简历缺失、字段缺失以及配置错误都不会因为重试而改变结果；
    /// 已经点击过提交的任务重试会造成重复申请。
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Automation(e) => !matches!(
                e,
                AutomationError::ChallengeDetected { .. }
                    | AutomationError::SubmissionUnverified { .. }
                    | AutomationError::SubmitOutcomeUnknown { .. }
                    | AutomationError::CvFileMissing { .. }
                    | AutomationError::FieldNotFound { .. }
            ),
            AppError::Config(_) => false,
            AppError::Browser(_) | AppError::Api(_) | AppError::Llm(_) | AppError::Timeout { .. } => {
                true
            }
        }
    }

    /// 创建导航失败错误
    pub fn navigation_failed(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.into(),
            reason: reason.to_string(),
        })
    }

    /// 创建API请求失败错误
    pub fn api_request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        })
    }
}

/// 判断一个 anyhow 错误链中是否包含不可重试的 [`AppError`]
pub fn is_terminal(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<AppError>())
        .any(|app_err| !app_err.is_retryable())
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
