use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "auto_apply.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 服务监听地址
    pub http_bind: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 最终失败的申请写入的文件
    pub warn_file: String,
    /// 导航等待上限（秒）
    pub navigation_timeout_secs: u64,
    /// 网络空闲判定窗口（毫秒）：资源请求数量保持不变这么久即视为空闲
    pub settle_delay_ms: u64,
    // --- 浏览器配置 ---
    pub browser: BrowserSettings,
    // --- 队列配置 ---
    pub queue: QueueSettings,
    // --- 公司目录 ---
    pub airtable_api_url: String,
    pub airtable_api_key: String,
    pub airtable_base_id: String,
    pub airtable_table: String,
    pub airtable_view: String,
    /// 本地公司列表（TOML），设置后优先于 Airtable
    pub companies_file: Option<PathBuf>,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
}

/// 浏览器启动配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// 是否使用无头模式
    pub headless: bool,
    /// 禁用沙盒（容器内运行时通常需要）
    pub no_sandbox: bool,
    /// 浏览器可执行文件路径，为空时自动查找
    pub chrome_executable: Option<PathBuf>,
    /// 连接已有浏览器的调试端口，设置后不再自行启动浏览器
    pub debug_port: Option<u16>,
    /// 额外的启动参数
    pub extra_args: Vec<String>,
}

/// 重试队列配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// 最大重试次数
    pub max_retries: u32,
    /// 重试退避的基础延迟（毫秒），第 n 次重试等待 base * 2^n
    pub retry_base_delay_ms: u64,
    /// 单次任务执行上限（秒），0 表示不限制
    pub job_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_bind: "127.0.0.1:3000".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            warn_file: "failed_applications.txt".to_string(),
            navigation_timeout_secs: 30,
            settle_delay_ms: 1000,
            browser: BrowserSettings::default(),
            queue: QueueSettings::default(),
            airtable_api_url: "https://api.airtable.com/v0".to_string(),
            airtable_api_key: String::new(),
            airtable_base_id: String::new(),
            airtable_table: "Companies".to_string(),
            airtable_view: "Grid view".to_string(),
            companies_file: None,
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-2.0-flash".to_string(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            no_sandbox: true,
            chrome_executable: None,
            debug_port: None,
            extra_args: vec![
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay_ms: 500,
            job_timeout_secs: 300,
        }
    }
}

impl QueueSettings {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_secs > 0).then(|| Duration::from_secs(self.job_timeout_secs))
    }
}

impl Config {
    /// 加载配置：先读 TOML 文件（`CONFIG_PATH`，不存在则使用默认值），再应用环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let base = if Path::new(&path).exists() {
            Self::from_file(Path::new(&path))?
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::InvalidFile { reason, .. } => ConfigError::InvalidFile {
                path: path.display().to_string(),
                reason,
            }
            .into(),
            other => other.into(),
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFile {
            path: String::new(),
            reason: e.to_string(),
        })
    }

    /// 使用环境变量覆盖配置
    pub fn with_env_overrides(self) -> AppResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        if let Some(v) = lookup("HTTP_BIND") {
            self.http_bind = v;
        }
        if let Some(v) = parse_var(&lookup, "VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        if let Some(v) = lookup("OUTPUT_LOG_FILE") {
            self.output_log_file = v;
        }
        if let Some(v) = lookup("WARN_FILE") {
            self.warn_file = v;
        }
        if let Some(v) = parse_var(&lookup, "NAVIGATION_TIMEOUT_SECS", "u64")? {
            self.navigation_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "HEADLESS", "bool")? {
            self.browser.headless = v;
        }
        if let Some(v) = parse_var(&lookup, "NO_SANDBOX", "bool")? {
            self.browser.no_sandbox = v;
        }
        if let Some(v) = lookup("CHROME_EXECUTABLE") {
            self.browser.chrome_executable = Some(PathBuf::from(v));
        }
        if let Some(v) = parse_var(&lookup, "BROWSER_DEBUG_PORT", "u16")? {
            self.browser.debug_port = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "MAX_RETRIES", "u32")? {
            self.queue.max_retries = v;
        }
        if let Some(v) = parse_var(&lookup, "RETRY_BASE_DELAY_MS", "u64")? {
            self.queue.retry_base_delay_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "JOB_TIMEOUT_SECS", "u64")? {
            self.queue.job_timeout_secs = v;
        }
        if let Some(v) = lookup("AIRTABLE_API_URL") {
            self.airtable_api_url = v;
        }
        if let Some(v) = lookup("AIRTABLE_API_KEY") {
            self.airtable_api_key = v;
        }
        if let Some(v) = lookup("AIRTABLE_BASE_ID") {
            self.airtable_base_id = v;
        }
        if let Some(v) = lookup("COMPANIES_FILE") {
            self.companies_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("LLM_API_KEY") {
            self.llm_api_key = v;
        }
        if let Some(v) = lookup("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Some(v) = lookup("LLM_MODEL_NAME") {
            self.llm_model_name = v;
        }
        Ok(self)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var_name: &str,
    expected_type: &str,
) -> AppResult<Option<T>> {
    match lookup(var_name) {
        None => Ok(None),
        Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.queue.max_retries, 3);
        assert!(config.browser.headless);
        assert_eq!(config.airtable_table, "Companies");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            http_bind = "0.0.0.0:8080"

            [queue]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.http_bind, "0.0.0.0:8080");
        assert_eq!(config.queue.max_retries, 5);
        assert_eq!(config.queue.retry_base_delay_ms, 500);
        assert_eq!(config.airtable_view, "Grid view");
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default()
            .with_overrides(lookup_from(&[
                ("MAX_RETRIES", "1"),
                ("BROWSER_DEBUG_PORT", "9222"),
                ("LLM_MODEL_NAME", "gemini-pro"),
            ]))
            .unwrap();
        assert_eq!(config.queue.max_retries, 1);
        assert_eq!(config.browser.debug_port, Some(9222));
        assert_eq!(config.llm_model_name, "gemini-pro");
    }

    #[test]
    fn test_invalid_env_value_is_config_error() {
        let err = Config::default()
            .with_overrides(lookup_from(&[("MAX_RETRIES", "many")]))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Config(ConfigError::EnvVarParseFailed { .. })
        ));
    }

    #[test]
    fn test_zero_job_timeout_disables_timeout() {
        let settings = QueueSettings {
            job_timeout_secs: 0,
            ..QueueSettings::default()
        };
        assert!(settings.job_timeout().is_none());
    }
}
