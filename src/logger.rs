//! 日志初始化

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// 第三方库默认只输出警告
const NOISY_TARGETS: &[(&str, &str)] = &[
    ("chromiumoxide", "warn"),
    ("tungstenite", "warn"),
    ("hyper", "warn"),
    ("reqwest", "warn"),
    ("actix_server", "warn"),
    ("html5ever", "error"),
    ("selectors", "error"),
];

/// 构造过滤规则：`RUST_LOG` 优先，否则按 `verbose_logging` 选择 debug / info
pub fn build_filter(verbose_logging: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose_logging { "debug" } else { "info" };
        let directives = std::iter::once(level.to_string())
            .chain(
                NOISY_TARGETS
                    .iter()
                    .map(|(target, lvl)| format!("{}={}", target, lvl)),
            )
            .collect::<Vec<_>>()
            .join(",");
        EnvFilter::new(directives)
    })
}

/// 初始化全局日志；重复调用时保留第一次的设置
pub fn init(config: &Config) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(config.verbose_logging))
        .with(fmt::layer().with_target(false))
        .try_init();
}
