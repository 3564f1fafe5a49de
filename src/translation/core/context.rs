//! 翻译会话上下文
//!
//! 一次会话中各组件共享的依赖集中在这里，由构造函数显式传入。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::translation::config::TranslationSettings;
use crate::translation::core::messenger::Messenger;
use crate::translation::pipeline::code::{CodeDetector, HeuristicCodeDetector};
use crate::translation::pipeline::language::{HeuristicLanguageDetector, LanguageDetector};
use crate::translation::storage::TranslationCache;

#[derive(Clone)]
pub struct TranslationContext {
    pub settings: Arc<TranslationSettings>,
    pub cache: Arc<TranslationCache>,
    pub messenger: Arc<dyn Messenger>,
    pub language_detector: Arc<dyn LanguageDetector>,
    pub code_detector: Arc<dyn CodeDetector>,
    /// 会话结束时取消，所有挂起的翻译随之以 `Cancelled` 结束
    pub cancel: CancellationToken,
}

impl TranslationContext {
    /// 使用默认的启发式检测器和按配置大小创建的缓存
    pub fn new(settings: TranslationSettings, messenger: Arc<dyn Messenger>) -> Self {
        let cache = Arc::new(TranslationCache::new(settings.cache_size));
        Self {
            settings: Arc::new(settings),
            cache,
            messenger,
            language_detector: Arc::new(HeuristicLanguageDetector::new()),
            code_detector: Arc::new(HeuristicCodeDetector::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<TranslationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_language_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.language_detector = detector;
        self
    }

    pub fn with_code_detector(mut self, detector: Arc<dyn CodeDetector>) -> Self {
        self.code_detector = detector;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
