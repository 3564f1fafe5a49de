//! 翻译配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ApiConfig, ConfigManager, DisplayStyle, QueueConfig, TranslationSettings};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 调度相关
    pub const DEBOUNCE_MS: u64 = 100;
    pub const MAX_WAIT_MS: u64 = 1000;
    pub const LONG_TEXT_THRESHOLD: usize = 500;

    // 批次处理相关
    pub const DEFAULT_BATCH_SIZE: usize = 20;
    pub const MIN_BATCH_SIZE: usize = 5;
    pub const MAX_BATCH_SIZE: usize = 50;
    pub const BATCH_SIZE_STEP: usize = 5;
    pub const MAX_TOKENS_PER_BATCH: usize = 2000;
    pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 3;
    pub const FAST_RESPONSE_MS: u64 = 1000;
    pub const SLOW_RESPONSE_MS: u64 = 3000;
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    // token 估算
    pub const CJK_CHARS_PER_TOKEN: f64 = 1.5;
    pub const OTHER_CHARS_PER_TOKEN: f64 = 4.0;

    // 缓存设置
    pub const DEFAULT_CACHE_SIZE: usize = 1000;
    pub const EVICTION_FRACTION: f64 = 0.2;

    // 默认语言与后端
    pub const DEFAULT_TARGET_LANG: &str = "zh-CN";
    pub const DEFAULT_SOURCE_LANG: &str = "auto";
    pub const DEFAULT_ENGINE: &str = "google";
    pub const DEFAULT_API_URL: &str = "http://localhost:1188/translate";

    // 页面标记
    pub const ORIGINAL_CLASS: &str = "transor-original";
    pub const TRANSLATION_CLASS: &str = "transor-translation";
    pub const TIP_CLASS: &str = "transor-tip";
    pub const PROCESSED_ATTR: &str = "data-transor-processed";
    pub const TIP_ATTR: &str = "data-transor-tip";
    pub const SOURCE_ATTR: &str = "data-transor-source";
    pub const WRAPPER_TAG: &str = "font";

    /// 带有这些 class 的子树已经被处理过
    pub const MARKER_CLASSES: &[&str] = &[
        "transor-original",
        "transor-translation",
        "transor-inline",
        "transor-bilingual",
        "transor-tip",
        "transor-replace",
    ];

    /// 页面作者声明不翻译的 class
    pub const NO_TRANSLATE_CLASSES: &[&str] = &["notranslate", "transor-ignore"];

    // 跳过的元素
    pub const EXCLUDED_TAGS: &[&str] = &[
        "script", "style", "noscript", "pre", "code", "textarea", "input", "select", "option",
        "svg", "math", "canvas", "iframe", "template", "kbd", "samp", "head", "object", "embed",
        "video", "audio",
    ];

    // 行内元素
    pub const INLINE_TAGS: &[&str] = &[
        "a", "abbr", "b", "bdi", "bdo", "cite", "data", "dfn", "em", "font", "i", "label", "mark",
        "q", "s", "small", "span", "strong", "sub", "sup", "time", "u", "var", "del", "ins",
        "acronym", "big", "tt", "nobr", "button", "img", "wbr",
    ];

    // 这些祖先中的短文本使用提示框样式
    pub const COMPACT_CONTAINERS: &[&str] = &["nav", "footer"];
    pub const SHORT_TEXT_WORDS: usize = 3;

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "transor.toml",
        ".transor.toml",
        "~/.config/transor/config.toml",
    ];
}

/// 加载配置，失败时退回默认配置
pub fn load_settings() -> TranslationSettings {
    match ConfigManager::new() {
        Ok(manager) => manager.into_settings(),
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            TranslationSettings::default()
        }
    }
}
