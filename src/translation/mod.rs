//! 翻译模块
//!
//! - **core**: 会话上下文、请求合并队列、后端通信、渲染和页面翻译服务
//! - **pipeline**: 文本处理管道（分段、过滤、语言/代码识别、分批）
//! - **storage**: 译文缓存
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use transor::translation::translate_dom_content;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dom = transor::parsers::html_to_dom(b"<p>Hello world</p>", "utf-8")?;
//! let translated_dom = translate_dom_content(dom, "zh-CN", None).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
pub mod config;

/// 核心模块
pub mod core;

/// 错误处理模块
pub mod error;

/// 文本处理管道模块
pub mod pipeline;

/// 缓存模块
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use self::core::{
    PageReport, PageTranslator, PendingTranslation, QueueStatsSnapshot, TranslationContext,
    TranslationQueue,
};

pub use config::{constants, ConfigManager, DisplayStyle, TranslationSettings};

pub use error::{ErrorSeverity, TranslationError, TranslationResult};

pub use pipeline::{TextFilter, TextGroup};

pub use storage::{CacheStats, TranslationCache};

// ============================================================================
// 便利函数
// ============================================================================

/// 用已加载的配置（配置文件、环境变量）把 DOM 翻译为目标语言
///
/// # 参数
///
/// * `dom` - 要翻译的HTML DOM结构
/// * `target_lang` - 目标语言代码（如 "zh-CN", "ja"）
/// * `api_url` - 可选的翻译后端 URL
pub async fn translate_dom_content(
    dom: markup5ever_rcdom::RcDom,
    target_lang: &str,
    api_url: Option<&str>,
) -> TranslationResult<markup5ever_rcdom::RcDom> {
    let mut settings = config::load_settings();
    settings.target_lang = target_lang.to_string();
    if let Some(url) = api_url {
        settings.api.url = url.to_string();
    }

    let translator = PageTranslator::from_settings(settings)?;
    translator.translate_dom(dom).await
}
