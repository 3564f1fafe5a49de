//! 语言检测模块
//!
//! 通过字符所属 Unicode 区段的比例猜测文本语言。只统计字母类字符，
//! 空白、数字和标点不参与计算。

/// 语言检测策略
pub trait LanguageDetector: Send + Sync {
    /// 文本是否属于指定语言；无法识别的语言代码返回 false
    fn is_text_in_language(&self, text: &str, language_code: &str) -> bool;

    /// 猜测文本语言，无法判断时返回 `default_lang`
    fn detect_text_language(&self, text: &str, default_lang: &str) -> String;
}

const CJK_THRESHOLD: f64 = 0.5;
const KANA_MIX_THRESHOLD: f64 = 0.5;
const HANGUL_THRESHOLD: f64 = 0.5;
const CYRILLIC_THRESHOLD: f64 = 0.5;
const LATIN_THRESHOLD: f64 = 0.6;

const FRENCH_MARKS: &str = "àâæçèéêëîïôœùûÿ";
const GERMAN_MARKS: &str = "äöüß";
const SPANISH_MARKS: &str = "ñáíóú¿¡";

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

fn is_kana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}')
}

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}')
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic()
        || (matches!(c, '\u{00C0}'..='\u{024F}') && c != '×' && c != '÷')
}

/// 单次遍历得到的字符分布
#[derive(Debug, Default, Clone, Copy)]
struct ScriptProfile {
    letters: usize,
    cjk: usize,
    kana: usize,
    hangul: usize,
    cyrillic: usize,
    ascii_latin: usize,
    latin: usize,
    french: usize,
    german: usize,
    spanish: usize,
}

impl ScriptProfile {
    fn of(text: &str) -> Self {
        let mut profile = Self::default();

        for c in text.chars() {
            if !c.is_alphabetic() && !FRENCH_MARKS.contains(c) && !SPANISH_MARKS.contains(c) {
                continue;
            }
            // ¿ 和 ¡ 不是字母，只计入西语标记
            if c.is_alphabetic() {
                profile.letters += 1;
            }

            if is_cjk(c) {
                profile.cjk += 1;
            } else if is_kana(c) {
                profile.kana += 1;
            } else if is_hangul(c) {
                profile.hangul += 1;
            } else if is_cyrillic(c) {
                profile.cyrillic += 1;
            } else if is_latin(c) {
                profile.latin += 1;
                if c.is_ascii_alphabetic() {
                    profile.ascii_latin += 1;
                }
            }

            let lower = c.to_lowercase().next().unwrap_or(c);
            if FRENCH_MARKS.contains(lower) {
                profile.french += 1;
            }
            if GERMAN_MARKS.contains(lower) {
                profile.german += 1;
            }
            if SPANISH_MARKS.contains(lower) {
                profile.spanish += 1;
            }
        }

        profile
    }

    fn ratio(&self, count: usize) -> f64 {
        if self.letters == 0 {
            0.0
        } else {
            count as f64 / self.letters as f64
        }
    }

    fn has_east_asian(&self) -> bool {
        self.cjk > 0 || self.kana > 0 || self.hangul > 0
    }

    fn has_diacritics(&self) -> bool {
        self.latin > self.ascii_latin || self.french + self.german + self.spanish > 0
    }

    fn is_chinese(&self) -> bool {
        self.kana == 0 && self.ratio(self.cjk) >= CJK_THRESHOLD
    }

    fn is_japanese(&self) -> bool {
        self.kana > 0 || self.ratio(self.cjk + self.kana) >= KANA_MIX_THRESHOLD
    }

    fn is_korean(&self) -> bool {
        self.ratio(self.hangul) >= HANGUL_THRESHOLD
    }

    fn is_russian(&self) -> bool {
        self.ratio(self.cyrillic) >= CYRILLIC_THRESHOLD
    }

    fn is_english(&self) -> bool {
        !self.has_east_asian() && self.ratio(self.ascii_latin) >= LATIN_THRESHOLD
    }

    fn is_latin_script(&self) -> bool {
        !self.has_east_asian() && self.ratio(self.latin) >= LATIN_THRESHOLD
    }
}

/// 支持检测的语言规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LanguageRule {
    Chinese,
    Japanese,
    Korean,
    Russian,
    English,
    LatinScript,
}

fn rule_for(code: &str) -> Option<LanguageRule> {
    match code {
        "zh" | "zh-cn" | "zh-tw" | "zh-hk" | "zh-hans" | "zh-hant" => Some(LanguageRule::Chinese),
        "ja" => Some(LanguageRule::Japanese),
        "ko" => Some(LanguageRule::Korean),
        "ru" => Some(LanguageRule::Russian),
        "en" => Some(LanguageRule::English),
        "fr" | "de" | "es" | "it" | "pt" => Some(LanguageRule::LatinScript),
        _ => None,
    }
}

/// 基于字符区段比例的语言检测
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicLanguageDetector;

impl HeuristicLanguageDetector {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageDetector for HeuristicLanguageDetector {
    fn is_text_in_language(&self, text: &str, language_code: &str) -> bool {
        let code = language_code.trim().to_lowercase();
        let rule = match rule_for(&code) {
            Some(rule) => Some(rule),
            None => code.get(..2).and_then(rule_for),
        };
        let rule = match rule {
            Some(rule) => rule,
            None => return false,
        };

        let profile = ScriptProfile::of(text);
        if profile.letters == 0 {
            return false;
        }

        match rule {
            LanguageRule::Chinese => profile.is_chinese(),
            LanguageRule::Japanese => profile.is_japanese(),
            LanguageRule::Korean => profile.is_korean(),
            LanguageRule::Russian => profile.is_russian(),
            LanguageRule::English => profile.is_english(),
            LanguageRule::LatinScript => profile.is_latin_script(),
        }
    }

    fn detect_text_language(&self, text: &str, default_lang: &str) -> String {
        let profile = ScriptProfile::of(text);
        if profile.letters == 0 {
            return default_lang.to_string();
        }

        if profile.kana > 0 {
            return "ja".to_string();
        }
        if profile.hangul > 0 {
            return "ko".to_string();
        }
        if profile.is_chinese() {
            return "zh-CN".to_string();
        }
        if profile.is_english() && !profile.has_diacritics() {
            return "en".to_string();
        }
        if profile.is_russian() {
            return "ru".to_string();
        }

        // 变音符号计数最多者胜出，平局按 fr、de、es 顺序
        let candidates = [("fr", profile.french), ("de", profile.german), ("es", profile.spanish)];
        let mut best: Option<(&str, usize)> = None;
        for (lang, count) in candidates {
            if count > 0 && best.map_or(true, |(_, c)| count > c) {
                best = Some((lang, count));
            }
        }
        if let Some((lang, _)) = best {
            if profile.is_latin_script() {
                return lang.to_string();
            }
        }

        default_lang.to_string()
    }
}
