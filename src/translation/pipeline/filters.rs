//! 文本过滤器模块
//!
//! 在文本进入翻译队列之前排除明显不需要翻译的内容

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// 不翻译的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterReason {
    TooShort,
    Url,
    Email,
    NoLetters,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterReason::TooShort => "too short",
            FilterReason::Url => "url",
            FilterReason::Email => "email",
            FilterReason::NoLetters => "no letters",
        };
        f.write_str(s)
    }
}

/// 文本过滤器
pub struct TextFilter {
    min_chars: usize,
    regex_cache: RegexCache,
}

/// 缓存的正则表达式
#[derive(Default)]
struct RegexCache {
    url_regex: OnceLock<Option<Regex>>,
    email_regex: OnceLock<Option<Regex>>,
}

impl TextFilter {
    /// 创建新的文本过滤器，少于 2 个字符的文本不翻译
    pub fn new() -> Self {
        Self::with_min_chars(2)
    }

    pub fn with_min_chars(min_chars: usize) -> Self {
        Self {
            min_chars,
            regex_cache: RegexCache::default(),
        }
    }

    /// 判断文本是否需要翻译
    pub fn should_translate(&self, text: &str) -> bool {
        self.rejection_reason(text).is_none()
    }

    /// 返回拒绝翻译的原因，需要翻译时返回 `None`
    pub fn rejection_reason(&self, text: &str) -> Option<FilterReason> {
        let trimmed = text.trim();

        if trimmed.chars().count() < self.min_chars {
            return Some(FilterReason::TooShort);
        }

        if self.is_url(trimmed) {
            return Some(FilterReason::Url);
        }

        if self.is_email(trimmed) {
            return Some(FilterReason::Email);
        }

        if !trimmed.chars().any(|c| c.is_alphabetic()) {
            return Some(FilterReason::NoLetters);
        }

        None
    }

    /// 检查是否为URL
    fn is_url(&self, text: &str) -> bool {
        if text.contains(char::is_whitespace) {
            return false;
        }

        if text.starts_with("http://") || text.starts_with("https://") || text.starts_with("ftp://")
        {
            return true;
        }

        self.regex_cache
            .url_regex
            .get_or_init(|| Regex::new(r"^(?:www\.)[^\s]+\.[a-zA-Z]{2,}(?:/[^\s]*)?$").ok())
            .as_ref()
            .is_some_and(|re| re.is_match(text))
    }

    /// 检查是否为邮箱
    fn is_email(&self, text: &str) -> bool {
        if text.len() > 100 || !text.contains('@') || !text.contains('.') {
            return false;
        }

        self.regex_cache
            .email_regex
            .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
            .as_ref()
            .is_some_and(|re| re.is_match(text))
    }
}

impl Default for TextFilter {
    fn default() -> Self {
        Self::new()
    }
}
