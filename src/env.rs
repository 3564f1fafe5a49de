//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 仅当变量被显式设置时返回值
    fn get_set() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "TRANSOR_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "TRANSOR_TARGET_LANG";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("zh-CN".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Target language tag, e.g. zh-CN, en, ja";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang_tag(value, Self::NAME, false)
        }
    }

    /// 源语言
    pub struct SourceLang;
    impl EnvVar<String> for SourceLang {
        const NAME: &'static str = "TRANSOR_SOURCE_LANG";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("auto".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Declared source language ('auto' disables the source-language skip)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang_tag(value, Self::NAME, true)
        }
    }

    /// 翻译引擎标识
    pub struct Engine;
    impl EnvVar<String> for Engine {
        const NAME: &'static str = "TRANSOR_ENGINE";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("google".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Translation engine identifier forwarded to the backend";

        fn parse(value: &str) -> EnvResult<String> {
            let engine = value.trim().to_lowercase();
            if engine.is_empty()
                || !engine
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Engine must be a non-empty identifier ([a-z0-9_-])".to_string(),
                });
            }
            Ok(engine)
        }
    }

    /// 显示样式
    pub struct DisplayStyle;
    impl EnvVar<String> for DisplayStyle {
        const NAME: &'static str = "TRANSOR_DISPLAY_STYLE";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("universal".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Display style: universal, inline, bilingual, tip, replace";

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                s @ ("universal" | "inline" | "bilingual" | "tip" | "replace") => Ok(s.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid display style '{}'. Use: universal, inline, bilingual, tip, replace",
                        value
                    ),
                }),
            }
        }
    }

    /// API URL
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "TRANSOR_API_URL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("http://localhost:1188/translate".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Translation backend endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// API 密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "TRANSOR_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Bearer token sent to the translation backend";

        fn parse(value: &str) -> EnvResult<String> {
            let key = value.trim();
            if key.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API key must not be empty".to_string(),
                });
            }
            Ok(key.to_string())
        }
    }

    /// 单个批次请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "TRANSOR_REQUEST_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(30));
        const DESCRIPTION: &'static str = "Per-batch request timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_usize(value, Self::NAME, 1, 300)?;
            Ok(Duration::from_secs(seconds as u64))
        }
    }

    /// 最大并发批次数
    pub struct MaxConcurrentBatches;
    impl EnvVar<usize> for MaxConcurrentBatches {
        const NAME: &'static str = "TRANSOR_MAX_CONCURRENT_BATCHES";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Maximum number of translation batches in flight";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 32)
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存容量
    pub struct Size;
    impl EnvVar<usize> for Size {
        const NAME: &'static str = "TRANSOR_CACHE_SIZE";
        const DEFAULT: Option<usize> = Some(1000);
        const DESCRIPTION: &'static str = "Maximum number of cached translations";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 1_000_000)
        }
    }
}

/// 解析语言标签，形如 `en`、`zh-CN`、`zh-Hant`
fn parse_lang_tag(value: &str, var_name: &str, allow_auto: bool) -> EnvResult<String> {
    let tag = value.trim();
    if allow_auto && tag.eq_ignore_ascii_case("auto") {
        return Ok("auto".to_string());
    }

    let mut parts = tag.split('-');
    let primary = parts.next().unwrap_or_default();
    let primary_ok = (2..=3).contains(&primary.len())
        && primary.chars().all(|c| c.is_ascii_alphabetic());
    let rest_ok = parts.all(|p| (2..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()));

    if primary_ok && rest_ok {
        Ok(tag.to_string())
    } else {
        Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid language tag '{}'{}",
                value,
                if allow_auto { " (use 'auto' or e.g. 'en', 'zh-CN')" } else { " (e.g. 'en', 'zh-CN')" }
            ),
        })
    }
}

/// 正整数解析（闭区间）
pub fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    fn line(name: &str, description: &str) -> String {
        format!("- `{}`: {}\n", name, description)
    }

    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    docs.push_str(&line(core::LogLevel::NAME, core::LogLevel::DESCRIPTION));

    docs.push_str("\n## Translation\n\n");
    docs.push_str(&line(translation::TargetLang::NAME, translation::TargetLang::DESCRIPTION));
    docs.push_str(&line(translation::SourceLang::NAME, translation::SourceLang::DESCRIPTION));
    docs.push_str(&line(translation::Engine::NAME, translation::Engine::DESCRIPTION));
    docs.push_str(&line(translation::DisplayStyle::NAME, translation::DisplayStyle::DESCRIPTION));
    docs.push_str(&line(translation::ApiUrl::NAME, translation::ApiUrl::DESCRIPTION));
    docs.push_str(&line(translation::ApiKey::NAME, translation::ApiKey::DESCRIPTION));
    docs.push_str(&line(translation::RequestTimeout::NAME, translation::RequestTimeout::DESCRIPTION));
    docs.push_str(&line(
        translation::MaxConcurrentBatches::NAME,
        translation::MaxConcurrentBatches::DESCRIPTION,
    ));

    docs.push_str("\n## Cache\n\n");
    docs.push_str(&line(cache::Size::NAME, cache::Size::DESCRIPTION));

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert!(core::LogLevel::parse("loud").is_err());
    }

    #[test]
    fn test_lang_tag_parsing() {
        assert_eq!(translation::TargetLang::parse("zh-CN").unwrap(), "zh-CN");
        assert_eq!(translation::TargetLang::parse(" en ").unwrap(), "en");
        assert!(translation::TargetLang::parse("auto").is_err());
        assert!(translation::TargetLang::parse("english!").is_err());

        assert_eq!(translation::SourceLang::parse("AUTO").unwrap(), "auto");
        assert_eq!(translation::SourceLang::parse("ja").unwrap(), "ja");
    }

    #[test]
    fn test_display_style_parsing() {
        assert_eq!(translation::DisplayStyle::parse("Bilingual").unwrap(), "bilingual");
        assert!(translation::DisplayStyle::parse("fancy").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(translation::ApiUrl::parse("http://localhost:1188").is_ok());
        assert!(translation::ApiUrl::parse("https://api.example.com").is_ok());
        assert!(translation::ApiUrl::parse("ftp://example.com").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(translation::MaxConcurrentBatches::parse("4").unwrap(), 4);
        assert!(translation::MaxConcurrentBatches::parse("0").is_err());
        assert!(translation::MaxConcurrentBatches::parse("many").is_err());
        assert_eq!(
            translation::RequestTimeout::parse("12").unwrap(),
            Duration::from_secs(12)
        );
        assert!(cache::Size::parse("0").is_err());
    }

    #[test]
    fn test_env_docs_lists_variables() {
        let docs = generate_env_docs();
        assert!(docs.contains("TRANSOR_TARGET_LANG"));
        assert!(docs.contains("TRANSOR_CACHE_SIZE"));
    }
}
