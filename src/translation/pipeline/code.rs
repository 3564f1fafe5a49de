//! 代码文本识别模块
//!
//! 判断一段文本是否更像源代码而不是自然语言，用于在翻译前排除代码片段。

use std::ops::RangeInclusive;
use std::sync::OnceLock;

use regex::Regex;

/// 代码识别策略
pub trait CodeDetector: Send + Sync {
    fn looks_like_code(&self, text: &str) -> bool;
}

/// 语法特征
const CODE_PATTERNS: &[&str] = &[
    // 函数声明
    r"\bfunction\s*[\w$]*\s*\(",
    r"\b(?:def|fn|func)\s+\w+\s*\(",
    r"\)\s*\{",
    r"\breturn\b[^;\n]*;",
    // 变量声明
    r"\b(?:var|let|const)\s+[\w$]+\s*=",
    // 控制流
    r"\b(?:if|for|while|switch|catch)\s*\(",
    r"\}\s*else\b",
    // HTML 标签
    r"</?[a-zA-Z][\w-]*(?:\s[^<>]*)?/?>",
    // JSON / 数组字面量
    r#"\{\s*"[^"\n]+"\s*:"#,
    r#"\[\s*(?:-?\d+|"[^"\n]*"|true|false|null)\s*,"#,
    // 注释
    r"(?m)^\s*//",
    r"/\*[\s\S]*?\*/",
    // 方法调用
    r"\b\w+\.\w+\s*\(",
    // 运算符
    r"=>|===|!==|&&|\|\||::|\+=|->",
    // 模块与类型关键字
    r"\b(?:import|export|class|interface|struct|impl|public|private|static|async|await)\s+[\w{*]",
    // 语句结尾的分号
    r"(?m);\s*$",
];

/// 自然语言信号
const CJK_PUNCTUATION: &str = r"[，。！？；：“”‘’（）【】《》、]";
const CJK_RUN: &str = r"[\x{4e00}-\x{9fff}]{4,}";
const CAPITALIZED_PAIR: &str = r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b";

const FUNCTION_WORDS: &[&str] = &[
    "the", "and", "of", "is", "are", "was", "were", "with", "that", "this", "you", "your", "have",
    "has",
];

const SYMBOLS: &str = "{}[]()<>;=+-*/&|!:$_#%^~`@\\\"";

/// 预编译的正则集合
struct RegexCache {
    patterns: OnceLock<Vec<Regex>>,
    cjk_punctuation: OnceLock<Option<Regex>>,
    cjk_run: OnceLock<Option<Regex>>,
    capitalized_pair: OnceLock<Option<Regex>>,
}

impl RegexCache {
    const fn new() -> Self {
        Self {
            patterns: OnceLock::new(),
            cjk_punctuation: OnceLock::new(),
            cjk_run: OnceLock::new(),
            capitalized_pair: OnceLock::new(),
        }
    }

    fn patterns(&self) -> &[Regex] {
        self.patterns.get_or_init(|| {
            CODE_PATTERNS
                .iter()
                .filter_map(|pattern| match Regex::new(pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!("代码特征正则无效 {}: {}", pattern, e);
                        None
                    }
                })
                .collect()
        })
    }

    fn single<'a>(cell: &'a OnceLock<Option<Regex>>, pattern: &str) -> Option<&'a Regex> {
        cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
    }
}

static REGEX_CACHE: RegexCache = RegexCache::new();

/// 单段文本的分析结果
#[derive(Debug, Clone, PartialEq)]
pub struct CodeAnalysis {
    pub pattern_matches: usize,
    pub symbol_density: f64,
    pub natural_language_signals: usize,
    pub average_line_length: f64,
}

/// 基于语法特征和符号密度的代码识别
#[derive(Debug, Clone)]
pub struct HeuristicCodeDetector {
    pub min_pattern_matches: usize,
    pub symbol_density_threshold: f64,
    pub line_length_range: RangeInclusive<f64>,
}

impl Default for HeuristicCodeDetector {
    fn default() -> Self {
        Self {
            min_pattern_matches: 3,
            symbol_density_threshold: 0.18,
            line_length_range: 10.0..=120.0,
        }
    }
}

impl HeuristicCodeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&self, text: &str) -> CodeAnalysis {
        CodeAnalysis {
            pattern_matches: count_pattern_matches(text),
            symbol_density: symbol_density(text),
            natural_language_signals: count_natural_language_signals(text),
            average_line_length: average_line_length(text),
        }
    }
}

impl CodeDetector for HeuristicCodeDetector {
    fn looks_like_code(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }

        let analysis = self.analyze(trimmed);
        let syntax_like = analysis.pattern_matches >= self.min_pattern_matches
            || analysis.symbol_density > self.symbol_density_threshold;

        syntax_like
            && analysis.natural_language_signals == 0
            && self.line_length_range.contains(&analysis.average_line_length)
    }
}

fn count_pattern_matches(text: &str) -> usize {
    REGEX_CACHE
        .patterns()
        .iter()
        .filter(|re| re.is_match(text))
        .count()
}

/// 符号字符占非空白字符的比例
fn symbol_density(text: &str) -> f64 {
    let mut total = 0usize;
    let mut symbols = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if SYMBOLS.contains(c) {
            symbols += 1;
        }
    }

    if total == 0 {
        0.0
    } else {
        symbols as f64 / total as f64
    }
}

fn count_natural_language_signals(text: &str) -> usize {
    let mut signals = 0;

    if RegexCache::single(&REGEX_CACHE.cjk_punctuation, CJK_PUNCTUATION)
        .is_some_and(|re| re.is_match(text))
    {
        signals += 1;
    }

    if RegexCache::single(&REGEX_CACHE.cjk_run, CJK_RUN).is_some_and(|re| re.is_match(text)) {
        signals += 1;
    }

    let function_words = text
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| !word.is_empty())
        .filter(|word| FUNCTION_WORDS.contains(&word.to_ascii_lowercase().as_str()))
        .count();
    if function_words >= 2 {
        signals += 1;
    }

    if RegexCache::single(&REGEX_CACHE.capitalized_pair, CAPITALIZED_PAIR)
        .is_some_and(|re| re.is_match(text))
    {
        signals += 1;
    }

    signals
}

fn average_line_length(text: &str) -> f64 {
    let lengths: Vec<usize> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.chars().count())
        .collect();

    if lengths.is_empty() {
        0.0
    } else {
        lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
    }
}
