// 集成测试公共模块
//
// 提供记录请求的模拟后端和 DOM 辅助函数
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use markup5ever_rcdom::RcDom;

use transor::parsers::{html_to_dom, serialize_document};
use transor::translation::core::{BatchRequest, BatchResponse, Messenger};
use transor::translation::{
    PageTranslator, TranslationContext, TranslationError, TranslationQueue, TranslationResult,
    TranslationSettings,
};

/// 模拟后端的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// 返回 `translate_text` 的结果
    Translate,
    /// 返回网络错误
    Fail,
    /// 返回数量不符的译文
    Malformed,
}

/// 记录所有请求的模拟后端
pub struct RecordingMessenger {
    behavior: Behavior,
    delay: Duration,
    requests: Mutex<Vec<BatchRequest>>,
}

impl RecordingMessenger {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn translating() -> Arc<Self> {
        Arc::new(Self::new(Behavior::Translate))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::new(Behavior::Fail))
    }

    pub fn malformed() -> Arc<Self> {
        Arc::new(Self::new(Behavior::Malformed))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<BatchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// 所有请求中发送过的原文，按发送顺序
    pub fn sent_texts(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .flat_map(|request| request.texts)
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_batch(&self, request: BatchRequest) -> TranslationResult<BatchResponse> {
        self.requests.lock().unwrap().push(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.behavior {
            Behavior::Translate => Ok(BatchResponse::ok(
                request.texts.iter().map(|t| translate_text(t)).collect(),
            )),
            Behavior::Fail => Err(TranslationError::NetworkError("connection refused".to_string())),
            Behavior::Malformed => Ok(BatchResponse::ok(vec!["only one".to_string()])),
        }
    }
}

/// 模拟后端的译文
pub fn translate_text(text: &str) -> String {
    format!("译文({})", text)
}

pub fn parse_html(html: &str) -> RcDom {
    html_to_dom(html.as_bytes(), "utf-8").unwrap()
}

pub fn to_html(dom: &RcDom) -> String {
    String::from_utf8(serialize_document(dom, "utf-8").unwrap()).unwrap()
}

pub fn context_with(settings: TranslationSettings, messenger: Arc<RecordingMessenger>) -> TranslationContext {
    TranslationContext::new(settings, messenger)
}

pub fn translator_with(settings: TranslationSettings, messenger: Arc<RecordingMessenger>) -> PageTranslator {
    PageTranslator::new(context_with(settings, messenger)).unwrap()
}

pub fn queue_with(settings: TranslationSettings, messenger: Arc<RecordingMessenger>) -> TranslationQueue {
    TranslationQueue::new(context_with(settings, messenger))
}
