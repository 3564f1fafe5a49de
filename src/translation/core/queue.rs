//! 翻译请求合并队列
//!
//! 收集待翻译文本并去重，按条数和 token 上限分批，以有限并发发送给后端，
//! 再把结果分发给等待同一文本的所有调用方。
//!
//! ## 调度
//!
//! - 待处理文本达到当前批次大小，或出现超长文本时立即处理
//! - 否则在最后一次添加后等待防抖间隔再处理；防抖总等待时间以最早一条
//!   待处理文本为起点，不超过 `max_wait`
//! - 处理过程中到达的新文本在本轮结束后重新调度
//!
//! ## 失败语义
//!
//! 后端失败、超时或返回格式不符时，该批次所有文本以原文作为结果，
//! 调用方不会收到错误。回退结果不写入缓存。只有会话关闭时调用方才会
//! 收到 [`TranslationError::Cancelled`]。

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::stream::{self, StreamExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::debug;

use crate::translation::core::context::TranslationContext;
use crate::translation::core::messenger::BatchRequest;
use crate::translation::error::{helpers::log_error, TranslationError, TranslationResult};
use crate::translation::pipeline::batch::{create_smart_batches, BatchSizeController};
use crate::translation::storage::cache_key;

/// 一次 `add` 的结果，可被 await
///
/// 缓存命中时立即就绪。
pub struct PendingTranslation {
    state: PendingState,
}

enum PendingState {
    Ready(Option<TranslationResult<String>>),
    Waiting(oneshot::Receiver<String>),
}

impl PendingTranslation {
    fn ready(result: TranslationResult<String>) -> Self {
        Self {
            state: PendingState::Ready(Some(result)),
        }
    }

    fn waiting(receiver: oneshot::Receiver<String>) -> Self {
        Self {
            state: PendingState::Waiting(receiver),
        }
    }

    /// 是否无需等待即可得到结果（缓存命中或会话已关闭）
    pub fn is_ready(&self) -> bool {
        matches!(self.state, PendingState::Ready(_))
    }
}

impl Future for PendingTranslation {
    type Output = TranslationResult<String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            PendingState::Ready(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(TranslationError::InternalError("翻译结果已被取走".to_string()))
            })),
            PendingState::Waiting(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|result| result.map_err(|_| TranslationError::Cancelled)),
        }
    }
}

/// 队列统计信息
#[derive(Debug, Default)]
pub struct QueueStats {
    pub requests: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub coalesced: AtomicUsize,
    pub batches_sent: AtomicUsize,
    pub batch_failures: AtomicUsize,
    pub skipped_code: AtomicUsize,
    pub skipped_language: AtomicUsize,
    pub translated: AtomicUsize,
}

/// 统计信息快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStatsSnapshot {
    pub requests: usize,
    pub cache_hits: usize,
    pub coalesced: usize,
    pub batches_sent: usize,
    pub batch_failures: usize,
    pub skipped_code: usize,
    pub skipped_language: usize,
    pub translated: usize,
}

impl QueueStats {
    fn inc(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batch_failures: self.batch_failures.load(Ordering::Relaxed),
            skipped_code: self.skipped_code.load(Ordering::Relaxed),
            skipped_language: self.skipped_language.load(Ordering::Relaxed),
            translated: self.translated.load(Ordering::Relaxed),
        }
    }
}

struct PendingText {
    text: String,
    waiters: Vec<oneshot::Sender<String>>,
}

#[derive(Default)]
struct QueueState {
    /// 尚未分派的文本，键为 `目标语言:引擎:原文`
    pending: HashMap<String, PendingText>,
    pending_order: Vec<String>,
    /// 已分派、等待后端返回的文本
    in_flight: HashMap<String, Vec<oneshot::Sender<String>>>,
    is_processing: bool,
    timer: Option<JoinHandle<()>>,
    oldest_pending: Option<Instant>,
}

struct QueueInner {
    ctx: TranslationContext,
    controller: BatchSizeController,
    stats: QueueStats,
    state: Mutex<QueueState>,
}

/// 翻译请求合并队列
///
/// `add` 会在后台启动定时任务，必须在 tokio 运行时中调用。
/// 队列持有会话取消令牌的子令牌：队列被丢弃或调用 `shutdown` 时只取消
/// 自己，取消会话令牌则会结束由它派生的所有队列。
pub struct TranslationQueue {
    inner: Arc<QueueInner>,
}

impl TranslationQueue {
    pub fn new(mut ctx: TranslationContext) -> Self {
        ctx.cancel = ctx.cancel.child_token();
        let controller = BatchSizeController::from_config(&ctx.settings.queue);
        Self {
            inner: Arc::new(QueueInner {
                ctx,
                controller,
                stats: QueueStats::default(),
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// 请求翻译一段文本
    ///
    /// 长度不超过 1 个字符的文本直接忽略并返回 `None`。
    pub fn add(&self, text: &str) -> Option<PendingTranslation> {
        if text.chars().count() <= 1 {
            return None;
        }

        let inner = &self.inner;
        QueueStats::inc(&inner.stats.requests);

        if inner.ctx.is_cancelled() {
            return Some(PendingTranslation::ready(Err(TranslationError::Cancelled)));
        }

        let settings = &inner.ctx.settings;
        let mut state = inner.lock();

        if let Some(hit) = inner.ctx.cache.get(text, &settings.target_lang, &settings.engine) {
            QueueStats::inc(&inner.stats.cache_hits);
            return Some(PendingTranslation::ready(Ok(hit)));
        }

        let key = cache_key(text, &settings.target_lang, &settings.engine);
        let (tx, rx) = oneshot::channel();

        if let Some(waiters) = state.in_flight.get_mut(&key) {
            waiters.push(tx);
            QueueStats::inc(&inner.stats.coalesced);
            return Some(PendingTranslation::waiting(rx));
        }

        if let Some(entry) = state.pending.get_mut(&key) {
            entry.waiters.push(tx);
            QueueStats::inc(&inner.stats.coalesced);
            return Some(PendingTranslation::waiting(rx));
        }

        state.pending.insert(
            key.clone(),
            PendingText {
                text: text.to_string(),
                waiters: vec![tx],
            },
        );
        state.pending_order.push(key);
        if state.oldest_pending.is_none() {
            state.oldest_pending = Some(Instant::now());
        }

        let immediate = state.pending_order.len() >= inner.controller.current()
            || text.chars().count() > settings.queue.long_text_threshold;
        inner.schedule(&mut state, immediate);

        Some(PendingTranslation::waiting(rx))
    }

    /// 回调形式的 `add`
    ///
    /// 缓存命中时回调同步执行；文本过短或会话关闭时回调不会执行。
    /// 返回文本是否被接受。
    pub fn add_with<F>(&self, text: &str, callback: F) -> bool
    where
        F: FnOnce(String) + Send + 'static,
    {
        match self.add(text) {
            None => false,
            Some(PendingTranslation {
                state: PendingState::Ready(Some(result)),
            }) => {
                if let Ok(value) = result {
                    callback(value);
                }
                true
            }
            Some(pending) => {
                tokio::spawn(async move {
                    if let Ok(value) = pending.await {
                        callback(value);
                    }
                });
                true
            }
        }
    }

    /// 跳过防抖，立即处理当前待处理文本
    pub fn flush(&self) {
        let mut state = self.inner.lock();
        if !state.pending_order.is_empty() {
            self.inner.schedule(&mut state, true);
        }
    }

    /// 关闭会话：取消进行中的批次，所有等待者收到 `Cancelled`
    pub fn shutdown(&self) {
        self.inner.ctx.cancel.cancel();

        let mut state = self.inner.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.pending.clear();
        state.pending_order.clear();
        state.in_flight.clear();
        state.oldest_pending = None;
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.ctx.is_cancelled()
    }

    /// 当前目标批次大小
    pub fn batch_size(&self) -> usize {
        self.inner.controller.current()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending_order.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn context(&self) -> &TranslationContext {
        &self.inner.ctx
    }
}

impl Drop for TranslationQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 重新设置处理定时器
    fn schedule(self: &Arc<Self>, state: &mut QueueState, immediate: bool) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let queue = &self.ctx.settings.queue;
        let delay = if immediate {
            Duration::ZERO
        } else {
            let waited = state
                .oldest_pending
                .map(|since| since.elapsed())
                .unwrap_or_default();
            queue.debounce().min(queue.max_wait().saturating_sub(waited))
        };

        let inner = Arc::clone(self);
        state.timer = Some(tokio::spawn(async move {
            let cancel = inner.ctx.cancel.clone();
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = time::sleep(delay) => {
                    // 处理放在独立任务中，重新调度时中止定时器不会打断处理
                    tokio::spawn(QueueInner::process(inner));
                }
            }
        }));
    }

    async fn process(self: Arc<Self>) {
        let drained = {
            let mut state = self.lock();
            if state.is_processing || self.ctx.is_cancelled() || state.pending_order.is_empty() {
                return;
            }

            state.is_processing = true;
            state.oldest_pending = None;

            let order = std::mem::take(&mut state.pending_order);
            let mut drained = Vec::with_capacity(order.len());
            for key in order {
                if let Some(entry) = state.pending.remove(&key) {
                    state.in_flight.insert(key.clone(), entry.waiters);
                    drained.push((key, entry.text));
                }
            }
            drained
        };

        let settings = Arc::clone(&self.ctx.settings);
        let mut translatable = Vec::with_capacity(drained.len());

        for (key, text) in drained {
            if self.ctx.code_detector.looks_like_code(&text) {
                QueueStats::inc(&self.stats.skipped_code);
                self.resolve(&key, &text, &text, false);
                continue;
            }

            if !settings.is_auto_source()
                && !self
                    .ctx
                    .language_detector
                    .is_text_in_language(&text, &settings.source_lang)
            {
                QueueStats::inc(&self.stats.skipped_language);
                self.resolve(&key, &text, &text, false);
                continue;
            }

            translatable.push(text);
        }

        if !translatable.is_empty() {
            let batches = create_smart_batches(
                &translatable,
                self.controller.current(),
                settings.queue.max_tokens_per_batch,
            );
            debug!("待翻译 {} 条文本，分为 {} 个批次", translatable.len(), batches.len());

            let run_all = stream::iter(batches)
                .map(|batch| Arc::clone(&self).run_batch(batch))
                .buffer_unordered(settings.queue.max_concurrent_batches.max(1))
                .for_each(|_| async {});

            tokio::select! {
                _ = self.ctx.cancel.cancelled() => {
                    debug!("翻译会话已关闭，放弃未完成的批次");
                }
                _ = run_all => {}
            }
        }

        self.finish_processing();
    }

    fn finish_processing(self: &Arc<Self>) {
        let mut state = self.lock();
        state.is_processing = false;

        if self.ctx.is_cancelled() {
            state.in_flight.clear();
            return;
        }

        if !state.pending_order.is_empty() {
            let immediate = state.pending_order.len() >= self.controller.current();
            self.schedule(&mut state, immediate);
        }
    }

    async fn run_batch(self: Arc<Self>, batch: Vec<String>) {
        let settings = &self.ctx.settings;
        let request = BatchRequest {
            texts: batch.clone(),
            source_lang: settings.source_lang.clone(),
            target_lang: settings.target_lang.clone(),
            engine: settings.engine.clone(),
        };

        QueueStats::inc(&self.stats.batches_sent);
        let started = Instant::now();

        let outcome = match time::timeout(
            settings.queue.request_timeout(),
            self.ctx.messenger.send_batch(request),
        )
        .await
        {
            Ok(Ok(response)) => response
                .validate_for(batch.len())
                .map(|_| response.translations),
            Ok(Err(e)) => Err(e),
            Err(elapsed) => Err(elapsed.into()),
        };

        self.controller.record(started.elapsed(), outcome.is_ok());

        match outcome {
            Ok(translations) => {
                for (text, translation) in batch.iter().zip(translations) {
                    let key = cache_key(text, &settings.target_lang, &settings.engine);
                    if translation.trim().is_empty() {
                        self.resolve(&key, text, text, false);
                    } else {
                        self.resolve(&key, text, &translation, true);
                    }
                }
            }
            Err(e) => {
                QueueStats::inc(&self.stats.batch_failures);
                log_error(&e.with_context(format!("{} 条文本回退为原文", batch.len())));
                for text in &batch {
                    let key = cache_key(text, &settings.target_lang, &settings.engine);
                    self.resolve(&key, text, text, false);
                }
            }
        }
    }

    /// 写入缓存（可选）并通知所有等待者
    fn resolve(&self, key: &str, text: &str, translation: &str, cache: bool) {
        if cache {
            let settings = &self.ctx.settings;
            self.ctx
                .cache
                .set(text, translation, &settings.target_lang, &settings.engine);
            QueueStats::inc(&self.stats.translated);
        }

        let waiters = self.lock().in_flight.remove(key).unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(translation.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use futures::future::join_all;

    use crate::translation::config::TranslationSettings;
    use crate::translation::core::messenger::{BatchResponse, Messenger};

    #[derive(Clone, Copy)]
    enum Mode {
        Prefix,
        Fail,
        Short,
        Hang,
        Slow(u64),
    }

    struct MockMessenger {
        mode: Mode,
        calls: std::sync::Mutex<Vec<(Instant, Vec<String>)>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl MockMessenger {
        fn new(mode: Mode) -> Self {
            Self {
                mode,
                calls: std::sync::Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> Vec<(Instant, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn translate_all(texts: &[String]) -> Vec<String> {
        texts.iter().map(|t| format!("译:{}", t)).collect()
    }

    #[async_trait]
    impl Messenger for MockMessenger {
        async fn send_batch(&self, request: BatchRequest) -> TranslationResult<BatchResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((Instant::now(), request.texts.clone()));
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            let result = match self.mode {
                Mode::Prefix => Ok(BatchResponse::ok(translate_all(&request.texts))),
                Mode::Fail => Err(TranslationError::NetworkError("backend down".to_string())),
                Mode::Short => Ok(BatchResponse::ok(Vec::new())),
                Mode::Hang => std::future::pending().await,
                Mode::Slow(ms) => {
                    time::sleep(Duration::from_millis(ms)).await;
                    Ok(BatchResponse::ok(translate_all(&request.texts)))
                }
            };

            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn queue_with<F>(mode: Mode, configure: F) -> (TranslationQueue, Arc<MockMessenger>)
    where
        F: FnOnce(&mut TranslationSettings),
    {
        let mut settings = TranslationSettings::default();
        configure(&mut settings);
        let messenger = Arc::new(MockMessenger::new(mode));
        let ctx = TranslationContext::new(settings, messenger.clone());
        (TranslationQueue::new(ctx), messenger)
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_char_text_is_ignored() {
        let (queue, messenger) = queue_with(Mode::Prefix, |_| {});

        assert!(queue.add("a").is_none());
        assert!(queue.add("").is_none());
        assert!(!queue.add_with("b", |_| panic!("callback must not fire")));

        time::sleep(Duration::from_secs(2)).await;
        assert!(messenger.calls().is_empty());
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_requests_share_one_network_entry() {
        let (queue, messenger) = queue_with(Mode::Prefix, |_| {});

        let pending: Vec<_> = (0..3).filter_map(|_| queue.add("Hello world")).collect();
        assert_eq!(pending.len(), 3);

        let results = join_all(pending).await;
        for result in results {
            assert_eq!(result.unwrap(), "译:Hello world");
        }

        let calls = messenger.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec!["Hello world".to_string()]);
        assert_eq!(queue.stats().coalesced, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_requests_join_existing_waiters() {
        let (queue, messenger) = queue_with(Mode::Slow(500), |_| {});

        let first = queue.add("Good morning").unwrap();
        // 等待批次发出但尚未返回
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(queue.in_flight_len(), 1);

        let second = queue.add("Good morning").unwrap();
        let (a, b) = futures::join!(first, second);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(messenger.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_is_served_from_cache() {
        let (queue, messenger) = queue_with(Mode::Prefix, |_| {});

        let first = queue.add("Welcome back").unwrap().await.unwrap();
        let second = queue.add("Welcome back").unwrap();
        assert!(second.is_ready());
        assert_eq!(second.await.unwrap(), first);

        assert_eq!(messenger.calls().len(), 1);
        assert_eq!(queue.stats().cache_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_falls_back_to_original_without_caching() {
        let (queue, messenger) = queue_with(Mode::Fail, |_| {});

        let result = queue.add("Sign in").unwrap().await.unwrap();
        assert_eq!(result, "Sign in");

        let again = queue.add("Sign in").unwrap();
        assert!(!again.is_ready());
        assert_eq!(again.await.unwrap(), "Sign in");

        assert_eq!(messenger.calls().len(), 2);
        assert_eq!(queue.stats().batch_failures, 2);
        assert_eq!(queue.context().cache.size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_length_mismatch_falls_back() {
        let (queue, _messenger) = queue_with(Mode::Short, |_| {});

        let results = join_all(vec![
            queue.add("First line").unwrap(),
            queue.add("Second line").unwrap(),
        ])
        .await;
        assert_eq!(results[0].as_deref(), Ok("First line"));
        assert_eq!(results[1].as_deref(), Ok("Second line"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_and_foreign_language_skip_network() {
        let (queue, messenger) = queue_with(Mode::Prefix, |s| s.source_lang = "en".to_string());

        let code = queue.add("function foo() { return 1; }").unwrap();
        let chinese = queue.add("你好世界，欢迎光临").unwrap();
        let english = queue.add("Hello there").unwrap();

        assert_eq!(code.await.unwrap(), "function foo() { return 1; }");
        assert_eq!(chinese.await.unwrap(), "你好世界，欢迎光临");
        assert_eq!(english.await.unwrap(), "译:Hello there");

        let calls = messenger.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec!["Hello there".to_string()]);

        let stats = queue.stats();
        assert_eq!(stats.skipped_code, 1);
        assert_eq!(stats.skipped_language, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_collects_texts_into_one_batch() {
        let (queue, messenger) = queue_with(Mode::Prefix, |_| {});
        let start = Instant::now();

        let a = queue.add("Home page").unwrap();
        let b = queue.add("About us").unwrap();
        let _ = join_all(vec![a, b]).await;

        let calls = messenger.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.len(), 2);
        assert!(calls[0].0 - start >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_batch_dispatches_without_debounce() {
        let (queue, messenger) = queue_with(Mode::Prefix, |_| {});
        let start = Instant::now();

        let pending: Vec<_> = (0..20)
            .filter_map(|i| queue.add(&format!("Menu item {}", i)))
            .collect();
        let _ = join_all(pending).await;

        let calls = messenger.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0 - start < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_text_dispatches_without_debounce() {
        let (queue, messenger) = queue_with(Mode::Prefix, |_| {});
        let start = Instant::now();

        let long_text = "Lorem ipsum dolor sit amet ".repeat(25);
        assert!(long_text.chars().count() > 500);
        queue.add(&long_text).unwrap().await.unwrap();

        assert!(messenger.calls()[0].0 - start < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_wait_bounds_debounce_under_continuous_input() {
        let (queue, messenger) = queue_with(Mode::Prefix, |_| {});
        let start = Instant::now();

        let mut pending = Vec::new();
        for i in 0..15 {
            pending.extend(queue.add(&format!("Streaming line {}", i)));
            time::sleep(Duration::from_millis(90)).await;
        }
        let _ = join_all(pending).await;

        let calls = messenger.calls();
        assert!(calls.len() >= 2);
        assert!(calls[0].0 - start <= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_concurrency_is_bounded() {
        let (queue, messenger) = queue_with(Mode::Slow(500), |s| {
            s.queue.max_tokens_per_batch = 10;
            s.queue.initial_batch_size = 50;
        });

        let pending: Vec<_> = (0..20)
            .filter_map(|i| queue.add(&format!("Label {}", i)))
            .collect();
        let _ = join_all(pending).await;

        assert!(messenger.calls().len() >= 4);
        let max_active = messenger.max_active.load(Ordering::SeqCst);
        assert!(max_active <= 3, "max in flight was {}", max_active);
        assert!(max_active >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_to_original() {
        let (queue, _messenger) = queue_with(Mode::Hang, |s| s.queue.request_timeout_secs = 30);

        let result = queue.add("Loading").unwrap().await.unwrap();
        assert_eq!(result, "Loading");
        assert_eq!(queue.stats().batch_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_waiters() {
        let (queue, _messenger) = queue_with(Mode::Hang, |_| {});

        let pending = queue.add("Never answered").unwrap();
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(queue.in_flight_len(), 1);

        queue.shutdown();
        assert_eq!(pending.await, Err(TranslationError::Cancelled));
        assert!(queue.is_shut_down());

        let late = queue.add("After shutdown").unwrap();
        assert_eq!(late.await, Err(TranslationError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_one_queue_leaves_sibling_running() {
        let messenger = Arc::new(MockMessenger::new(Mode::Prefix));
        let ctx = TranslationContext::new(TranslationSettings::default(), messenger.clone());

        let first = TranslationQueue::new(ctx.clone());
        let second = TranslationQueue::new(ctx.clone());
        drop(first);

        assert!(!ctx.is_cancelled());
        assert!(!second.is_shut_down());
        let result = second.add("Still translating").unwrap().await;
        assert_eq!(result, Ok("译:Still translating".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_cancel_reaches_every_queue() {
        let messenger = Arc::new(MockMessenger::new(Mode::Hang));
        let ctx = TranslationContext::new(TranslationSettings::default(), messenger);

        let first = TranslationQueue::new(ctx.clone());
        let second = TranslationQueue::new(ctx.clone());
        let pending = first.add("Waiting forever").unwrap();
        time::sleep(Duration::from_millis(200)).await;

        ctx.cancel.cancel();
        assert_eq!(pending.await, Err(TranslationError::Cancelled));
        assert!(second.is_shut_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_callback_fires_synchronously() {
        let (queue, _messenger) = queue_with(Mode::Prefix, |_| {});
        let settings = queue.context().settings.clone();
        queue
            .context()
            .cache
            .set("Cached text", "缓存译文", &settings.target_lang, &settings.engine);

        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        assert!(queue.add_with("Cached text", move |value| {
            assert_eq!(value, "缓存译文");
            flag.store(true, Ordering::SeqCst);
        }));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_responses_grow_batch_size() {
        let (queue, _messenger) = queue_with(Mode::Prefix, |_| {});
        assert_eq!(queue.batch_size(), 20);

        queue.add("Grow please").unwrap().await.unwrap();
        assert_eq!(queue.batch_size(), 25);
    }
}
