//! 页面翻译服务
//!
//! 串联分段、预过滤、请求合并队列和渲染，是翻译整页文档的主要入口。
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use transor::parsers::html_to_dom;
//! use transor::translation::{PageTranslator, TranslationSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let translator = PageTranslator::from_settings(TranslationSettings::with_target_lang("zh-CN"))?;
//! let dom = html_to_dom(b"<p>Hello world</p>", "utf-8")?;
//! let report = translator.translate_document(&dom).await?;
//! println!("写回了 {} 个文本组", report.applied);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use futures::future::join_all;
use markup5ever_rcdom::RcDom;
use tracing::{debug, info};

use crate::translation::config::TranslationSettings;
use crate::translation::core::context::TranslationContext;
use crate::translation::core::messenger::HttpMessenger;
use crate::translation::core::queue::{QueueStatsSnapshot, TranslationQueue};
use crate::translation::core::renderer::{apply_translation, ApplyOutcome};
use crate::translation::error::TranslationResult;
use crate::translation::pipeline::filters::TextFilter;
use crate::translation::pipeline::segmenter::{Segmenter, TextGroup};

/// 一次整页翻译的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageReport {
    /// 分段得到的文本组数
    pub groups_found: usize,
    /// 通过预过滤并进入队列的文本组数
    pub queued: usize,
    /// 成功写回页面的文本组数
    pub applied: usize,
    /// 被过滤、译文未变化或节点失效的文本组数
    pub skipped: usize,
    pub stats: QueueStatsSnapshot,
}

/// 页面翻译器
///
/// 一个实例对应一次翻译会话，会话内设置不变。丢弃实例会取消未完成的请求。
pub struct PageTranslator {
    queue: TranslationQueue,
    segmenter: Segmenter,
    filter: TextFilter,
}

impl PageTranslator {
    pub fn new(ctx: TranslationContext) -> TranslationResult<Self> {
        ctx.settings.validate()?;

        let segmenter = Segmenter::new(&ctx.settings, Arc::clone(&ctx.code_detector));
        Ok(Self {
            queue: TranslationQueue::new(ctx),
            segmenter,
            filter: TextFilter::new(),
        })
    }

    /// 使用 HTTP 后端创建翻译器
    pub fn from_settings(settings: TranslationSettings) -> TranslationResult<Self> {
        let messenger = HttpMessenger::new(&settings.api)?;
        Self::new(TranslationContext::new(settings, Arc::new(messenger)))
    }

    pub fn settings(&self) -> &TranslationSettings {
        &self.queue.context().settings
    }

    pub fn queue(&self) -> &TranslationQueue {
        &self.queue
    }

    /// 对文档分段，不发起任何请求
    pub fn collect_groups(&self, dom: &RcDom) -> Vec<TextGroup> {
        self.segmenter.segment_document(dom)
    }

    /// 翻译整个文档并原位写回
    ///
    /// 会话在翻译过程中被关闭时返回 `Cancelled`，已写回的内容保留。
    pub async fn translate_document(&self, dom: &RcDom) -> TranslationResult<PageReport> {
        let groups = self.collect_groups(dom);
        let mut report = PageReport {
            groups_found: groups.len(),
            ..PageReport::default()
        };
        info!("页面分段完成，共 {} 个文本组", groups.len());

        let mut queued = Vec::with_capacity(groups.len());
        let mut pending = Vec::with_capacity(groups.len());
        for group in groups {
            if let Some(reason) = self.filter.rejection_reason(&group.text) {
                debug!("跳过文本组 ({}): {}", reason, group.text);
                report.skipped += 1;
                continue;
            }

            match self.queue.add(&group.text) {
                Some(translation) => {
                    queued.push(group);
                    pending.push(translation);
                }
                None => report.skipped += 1,
            }
        }
        report.queued = queued.len();

        let results = join_all(pending).await;
        let style = self.settings().display_style;

        for (group, result) in queued.iter().zip(results) {
            let translation = result?;
            match apply_translation(dom, group, &translation, style) {
                ApplyOutcome::Applied(_) => report.applied += 1,
                ApplyOutcome::Unchanged | ApplyOutcome::Detached => report.skipped += 1,
            }
        }

        report.stats = self.queue.stats();
        info!(
            "页面翻译完成: 写回 {} 个，跳过 {} 个，发送 {} 个批次",
            report.applied, report.skipped, report.stats.batches_sent
        );

        Ok(report)
    }

    /// 翻译并返回文档
    pub async fn translate_dom(&self, dom: RcDom) -> TranslationResult<RcDom> {
        self.translate_document(&dom).await?;
        Ok(dom)
    }

    /// 结束会话
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }
}
