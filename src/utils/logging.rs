use anyhow::{Context, Result};
/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::fs;
use tracing::info;

use crate::config::Config;

/// 一次运行的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub companies: usize,
    pub companies_failed: usize,
    pub postings: usize,
    pub submitted: usize,
    pub failed: usize,
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n自动申请日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 自动申请服务");
    info!("🌐 监听地址: {}", config.http_bind);
    info!(
        "🔁 最多重试 {} 次，单次作业上限 {} 秒",
        config.queue.max_retries, config.queue.job_timeout_secs
    );
    match config.browser.debug_port {
        Some(port) => info!("🧭 浏览器: 连接调试端口 {}", port),
        None => info!("🧭 浏览器: 按需启动（无头模式: {}）", config.browser.headless),
    }
    info!("{}", "=".repeat(60));
}

/// 记录公司加载信息
pub fn log_companies_loaded(total: usize) {
    info!("✓ 找到 {} 家待处理的公司", total);
    info!("💡 所有作业在同一个队列中依次执行\n");
}

/// 打印最终统计信息
pub fn print_final_stats(stats: &RunStats, log_file_path: &str, warn_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        "🏢 公司: {} (扫描失败 {})",
        stats.companies, stats.companies_failed
    );
    info!("✅ 已提交: {}/{}", stats.submitted, stats.postings);
    info!("❌ 失败: {}", stats.failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
    if stats.failed + stats.companies_failed > 0 {
        info!("失败记录: {}", warn_file_path);
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
