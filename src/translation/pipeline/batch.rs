//! 翻译批次模块
//!
//! 将待翻译文本按条数和估算 token 数分组，并根据后端响应情况动态调整批次大小。
//!
//! ## 算法
//!
//! 1. **token 估算**: 中日韩字符约 1.5 字符/token，其余字符约 4 字符/token，结果向上取整
//! 2. **贪心分组**: 按输入顺序装箱，条数或 token 超限时开启新批次；单条超限的文本独占一个批次
//! 3. **动态调整**: 响应快且成功时增大批次，响应慢或失败时减小，始终限定在 [min, max] 内

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::translation::config::{constants, QueueConfig};

fn is_cjk_like(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{3000}'..='\u{303F}'
        | '\u{FF00}'..='\u{FFEF}')
}

/// 估算文本的 token 数
pub fn estimate_tokens(text: &str) -> usize {
    let (cjk, other) = text.chars().fold((0usize, 0usize), |(cjk, other), c| {
        if is_cjk_like(c) {
            (cjk + 1, other)
        } else {
            (cjk, other + 1)
        }
    });

    let estimate =
        cjk as f64 / constants::CJK_CHARS_PER_TOKEN + other as f64 / constants::OTHER_CHARS_PER_TOKEN;
    estimate.ceil() as usize
}

/// 按条数上限和 token 上限对文本分组，保持输入顺序
pub fn create_smart_batches(texts: &[String], max_items: usize, max_tokens: usize) -> Vec<Vec<String>> {
    let max_items = max_items.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0usize;

    for text in texts {
        let tokens = estimate_tokens(text);

        let full = current.len() >= max_items || current_tokens + tokens > max_tokens;
        if !current.is_empty() && full {
            batches.push(std::mem::take(&mut current));
            current_tokens = 0;
        }

        current.push(text.clone());
        current_tokens += tokens;
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

/// 批次大小控制器
///
/// 简单的加减步长控制，不做平滑。
#[derive(Debug)]
pub struct BatchSizeController {
    current: AtomicUsize,
    min: usize,
    max: usize,
    step: usize,
    fast: Duration,
    slow: Duration,
}

impl BatchSizeController {
    pub fn new(initial: usize, min: usize, max: usize, step: usize, fast: Duration, slow: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            current: AtomicUsize::new(initial.clamp(min, max)),
            min,
            max,
            step,
            fast,
            slow,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(
            config.initial_batch_size,
            config.min_batch_size,
            config.max_batch_size,
            config.batch_size_step,
            config.fast_response(),
            config.slow_response(),
        )
    }

    /// 当前目标批次大小
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    /// 根据一次批次的耗时和结果调整目标大小，返回调整后的值
    pub fn record(&self, elapsed: Duration, success: bool) -> usize {
        let (min, max, step) = (self.min, self.max, self.step);
        let grow = success && elapsed < self.fast;
        let shrink = !success || elapsed > self.slow;

        let previous = self
            .current
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |size| {
                if grow {
                    Some((size + step).min(max))
                } else if shrink {
                    Some(size.saturating_sub(step).max(min))
                } else {
                    None
                }
            });

        match previous {
            Ok(old) => {
                let new = self.current();
                if old != new {
                    tracing::debug!("批次大小调整: {} -> {}", old, new);
                }
                new
            }
            Err(unchanged) => unchanged,
        }
    }
}

impl Default for BatchSizeController {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}
