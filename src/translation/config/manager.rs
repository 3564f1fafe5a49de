//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{helpers::config_error, TranslationError, TranslationResult};

/// 译文在页面上的显示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStyle {
    /// 短文本或导航/页脚中使用提示框，其余使用双语块
    #[default]
    Universal,
    /// 译文紧跟在原文之后
    Inline,
    /// 译文作为块元素放在原文下方
    Bilingual,
    /// 译文作为悬停提示
    Tip,
    /// 用译文替换原文
    Replace,
}

impl DisplayStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayStyle::Universal => "universal",
            DisplayStyle::Inline => "inline",
            DisplayStyle::Bilingual => "bilingual",
            DisplayStyle::Tip => "tip",
            DisplayStyle::Replace => "replace",
        }
    }
}

impl fmt::Display for DisplayStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayStyle {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "universal" => Ok(DisplayStyle::Universal),
            "inline" => Ok(DisplayStyle::Inline),
            "bilingual" => Ok(DisplayStyle::Bilingual),
            "tip" => Ok(DisplayStyle::Tip),
            "replace" => Ok(DisplayStyle::Replace),
            other => Err(config_error(format!("未知的显示样式: {}", other))),
        }
    }
}

/// 请求合并队列配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    pub debounce_ms: u64,
    pub max_wait_ms: u64,
    pub long_text_threshold: usize,

    pub initial_batch_size: usize,
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    pub batch_size_step: usize,
    pub max_tokens_per_batch: usize,
    pub max_concurrent_batches: usize,

    pub fast_response_ms: u64,
    pub slow_response_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            debounce_ms: constants::DEBOUNCE_MS,
            max_wait_ms: constants::MAX_WAIT_MS,
            long_text_threshold: constants::LONG_TEXT_THRESHOLD,

            initial_batch_size: constants::DEFAULT_BATCH_SIZE,
            min_batch_size: constants::MIN_BATCH_SIZE,
            max_batch_size: constants::MAX_BATCH_SIZE,
            batch_size_step: constants::BATCH_SIZE_STEP,
            max_tokens_per_batch: constants::MAX_TOKENS_PER_BATCH,
            max_concurrent_batches: constants::DEFAULT_MAX_CONCURRENT_BATCHES,

            fast_response_ms: constants::FAST_RESPONSE_MS,
            slow_response_ms: constants::SLOW_RESPONSE_MS,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl QueueConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fast_response(&self) -> Duration {
        Duration::from_millis(self.fast_response_ms)
    }

    pub fn slow_response(&self) -> Duration {
        Duration::from_millis(self.slow_response_ms)
    }
}

/// 翻译后端配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: constants::DEFAULT_API_URL.to_string(),
            api_key: None,
            timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 一次翻译会话的全部设置
///
/// 会话创建后设置不再变化；切换目标语言或引擎需要新建会话。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationSettings {
    pub target_lang: String,
    pub source_lang: String,
    pub engine: String,
    pub display_style: DisplayStyle,

    /// 在内置列表之外额外跳过的标签
    pub excluded_tags: Vec<String>,
    /// 在内置列表之外额外跳过的 class
    pub excluded_classes: Vec<String>,

    pub cache_size: usize,
    pub queue: QueueConfig,
    pub api: ApiConfig,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),
            engine: constants::DEFAULT_ENGINE.to_string(),
            display_style: DisplayStyle::default(),
            excluded_tags: Vec::new(),
            excluded_classes: Vec::new(),
            cache_size: constants::DEFAULT_CACHE_SIZE,
            queue: QueueConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl TranslationSettings {
    /// 创建带指定目标语言的默认配置
    pub fn with_target_lang(target_lang: &str) -> Self {
        Self {
            target_lang: target_lang.to_string(),
            ..Self::default()
        }
    }

    /// 源语言是否为自动检测
    pub fn is_auto_source(&self) -> bool {
        self.source_lang.eq_ignore_ascii_case("auto") || self.source_lang.is_empty()
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.target_lang.trim().is_empty() {
            return Err(config_error("目标语言不能为空"));
        }

        if self.engine.trim().is_empty() {
            return Err(config_error("翻译引擎不能为空"));
        }

        if self.cache_size == 0 {
            return Err(config_error("缓存大小不能为0"));
        }

        let queue = &self.queue;
        if queue.max_concurrent_batches == 0 {
            return Err(config_error("最大并发批次数不能为0"));
        }

        if queue.min_batch_size == 0 || queue.min_batch_size > queue.max_batch_size {
            return Err(config_error(format!(
                "批次大小范围无效: [{}, {}]",
                queue.min_batch_size, queue.max_batch_size
            )));
        }

        if queue.max_tokens_per_batch == 0 {
            return Err(config_error("单批次 token 上限不能为0"));
        }

        if queue.request_timeout_secs == 0 {
            return Err(config_error("请求超时不能为0"));
        }

        if !(self.api.url.starts_with("http://") || self.api.url.starts_with("https://")) {
            return Err(config_error(format!("API URL 无效: {}", self.api.url)));
        }

        Ok(())
    }

    /// 应用环境变量覆盖（只处理显式设置的变量）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, translation, EnvResult, EnvVar};

        fn apply<T>(value: Option<EnvResult<T>>, target: &mut T) {
            match value {
                Some(Ok(v)) => *target = v,
                Some(Err(e)) => tracing::warn!("忽略无效的环境变量: {}", e),
                None => {}
            }
        }

        apply(translation::TargetLang::get_set(), &mut self.target_lang);
        apply(translation::SourceLang::get_set(), &mut self.source_lang);
        apply(translation::Engine::get_set(), &mut self.engine);

        let mut style = self.display_style.as_str().to_string();
        apply(translation::DisplayStyle::get_set(), &mut style);
        if let Ok(parsed) = style.parse() {
            self.display_style = parsed;
        }

        if let Some(Ok(url)) = translation::ApiUrl::get_set() {
            tracing::info!("环境变量覆盖 API URL: {}", url);
            self.api.url = url;
        }

        let mut api_key = self.api.api_key.clone().unwrap_or_default();
        apply(translation::ApiKey::get_set(), &mut api_key);
        if !api_key.is_empty() {
            self.api.api_key = Some(api_key);
        }

        let mut timeout = self.queue.request_timeout();
        apply(translation::RequestTimeout::get_set(), &mut timeout);
        self.queue.request_timeout_secs = timeout.as_secs();

        apply(
            translation::MaxConcurrentBatches::get_set(),
            &mut self.queue.max_concurrent_batches,
        );
        apply(cache::Size::get_set(), &mut self.cache_size);
    }
}

/// 配置管理器
pub struct ConfigManager {
    settings: TranslationSettings,
}

impl ConfigManager {
    /// 按默认搜索路径加载配置，再应用环境变量覆盖
    pub fn new() -> TranslationResult<Self> {
        let mut settings = Self::load_settings()?;
        settings.apply_env_overrides();
        settings.validate()?;

        Ok(Self { settings })
    }

    /// 从指定文件加载配置，再应用环境变量覆盖
    pub fn from_file(path: &str) -> TranslationResult<Self> {
        Self::load_dotenv();

        let expanded = shellexpand::tilde(path);
        let mut settings = Self::load_from_file(&expanded)?;
        settings.apply_env_overrides();
        settings.validate()?;

        Ok(Self { settings })
    }

    /// 获取配置
    pub fn get_settings(&self) -> &TranslationSettings {
        &self.settings
    }

    pub fn into_settings(self) -> TranslationSettings {
        self.settings
    }

    fn load_settings() -> TranslationResult<TranslationSettings> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::debug!("未找到配置文件，使用默认配置");
        Ok(TranslationSettings::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &str) -> TranslationResult<TranslationSettings> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("读取配置文件失败 {}: {}", path, e)))?;

        if path.ends_with(".toml") {
            toml::from_str(&content)
                .map_err(|e| config_error(format!("解析TOML配置失败: {}", e)))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| config_error(format!("解析JSON配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::debug!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let settings = TranslationSettings::default();
        let content = toml::to_string_pretty(&settings)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = TranslationSettings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.is_auto_source());
        assert_eq!(settings.display_style, DisplayStyle::Universal);
        assert_eq!(settings.queue.initial_batch_size, 20);
        assert_eq!(settings.queue.debounce(), Duration::from_millis(100));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let mut settings = TranslationSettings::default();
        settings.queue.min_batch_size = 60;
        assert!(settings.validate().is_err());

        let mut settings = TranslationSettings::default();
        settings.cache_size = 0;
        assert!(matches!(
            settings.validate(),
            Err(TranslationError::ConfigError(_))
        ));

        let mut settings = TranslationSettings::default();
        settings.queue.max_concurrent_batches = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: TranslationSettings = toml::from_str(
            r#"
            target_lang = "ja"
            display_style = "bilingual"

            [queue]
            debounce_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(settings.target_lang, "ja");
        assert_eq!(settings.display_style, DisplayStyle::Bilingual);
        assert_eq!(settings.queue.debounce_ms, 50);
        assert_eq!(settings.queue.max_wait_ms, constants::MAX_WAIT_MS);
        assert_eq!(settings.engine, constants::DEFAULT_ENGINE);
    }

    #[test]
    fn test_display_style_parsing() {
        assert_eq!("TIP".parse::<DisplayStyle>().unwrap(), DisplayStyle::Tip);
        assert!("fancy".parse::<DisplayStyle>().is_err());
        assert_eq!(DisplayStyle::Replace.to_string(), "replace");
    }

    #[test]
    fn test_example_config_roundtrip() {
        let path = std::env::temp_dir().join(format!("transor-example-{}.toml", std::process::id()));
        let path_str = path.to_string_lossy().to_string();

        ConfigManager::generate_example_config(&path_str).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: TranslationSettings = toml::from_str(&content).unwrap();
        assert_eq!(parsed, TranslationSettings::default());

        std::fs::remove_file(&path).unwrap();
    }
}
