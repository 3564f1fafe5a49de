//! DOM 文本分段
//!
//! 把块级元素内连续的行内内容合并为一个文本组，文本组保留对原始文本节点
//! 的引用，翻译完成后在原位修改 DOM。
//!
//! 节点分类在每次遍历时只计算一次：
//!
//! - 文本节点进入当前缓冲区
//! - 行内元素透明地递归，继续使用同一缓冲区
//! - 块级元素和被排除的元素结束当前文本组，不在本轮递归
//! - 注释等其他节点直接忽略

use std::collections::HashSet;
use std::sync::Arc;

use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::parsers::html::{find_first_element, get_node_attr, get_node_classes, get_node_name, text_content};
use crate::translation::config::{constants, TranslationSettings};
use crate::translation::pipeline::code::CodeDetector;

/// 元素被排除的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusionReason {
    /// 标签在排除列表中
    Tag,
    /// 已经带有翻译标记 class
    Marker,
    /// 页面声明不翻译
    NoTranslate,
    /// 可编辑区域
    Editable,
    /// 已处理过
    Processed,
    /// 内容是代码
    Code,
}

/// 节点分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Inline,
    Block,
    Excluded(ExclusionReason),
    Other,
}

/// 一段连续行内内容
#[derive(Debug, Clone)]
pub struct TextGroup {
    /// 各文本节点内容压缩空白后以空格拼接
    pub text: String,
    /// 组成该文本组的文本节点，按文档顺序
    pub nodes: Vec<Handle>,
    /// 分段时所在的块级元素
    pub root: Handle,
}

impl TextGroup {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Default)]
struct GroupBuffer {
    pieces: Vec<String>,
    nodes: Vec<Handle>,
}

impl GroupBuffer {
    fn push(&mut self, piece: String, node: &Handle) {
        self.pieces.push(piece);
        self.nodes.push(node.clone());
    }

    fn flush(&mut self, root: &Handle, groups: &mut Vec<TextGroup>) {
        if self.pieces.is_empty() {
            return;
        }

        groups.push(TextGroup {
            text: self.pieces.join(" "),
            nodes: std::mem::take(&mut self.nodes),
            root: root.clone(),
        });
        self.pieces.clear();
    }
}

/// 代码块常见的 class
const CODE_CLASSES: &[&str] = &["code", "hljs", "highlight", "syntax", "sourceCode"];
const CODE_CLASS_PREFIXES: &[&str] = &["language-", "lang-"];

pub struct Segmenter {
    excluded_tags: HashSet<String>,
    excluded_classes: HashSet<String>,
    code_detector: Arc<dyn CodeDetector>,
}

impl Segmenter {
    pub fn new(settings: &TranslationSettings, code_detector: Arc<dyn CodeDetector>) -> Self {
        let excluded_tags = constants::EXCLUDED_TAGS
            .iter()
            .map(|tag| tag.to_string())
            .chain(settings.excluded_tags.iter().map(|tag| tag.to_lowercase()))
            .collect();

        let excluded_classes = constants::NO_TRANSLATE_CLASSES
            .iter()
            .map(|class| class.to_string())
            .chain(settings.excluded_classes.iter().cloned())
            .collect();

        Self {
            excluded_tags,
            excluded_classes,
            code_detector,
        }
    }

    /// 对节点分类
    pub fn classify(&self, node: &Handle) -> NodeKind {
        self.classify_with(node, true)
    }

    /// `inspect_content` 为 false 时不检查行内元素的内容是否像代码
    fn classify_with(&self, node: &Handle, inspect_content: bool) -> NodeKind {
        let tag = match &node.data {
            NodeData::Text { .. } => return NodeKind::Text,
            NodeData::Element { name, .. } => name.local.as_ref().to_ascii_lowercase(),
            _ => return NodeKind::Other,
        };

        if let Some(reason) = self.exclusion_reason(node, &tag) {
            return NodeKind::Excluded(reason);
        }

        if tag == "br" {
            return NodeKind::Block;
        }

        let inline = match display_of(node) {
            Some(display) => display.starts_with("inline"),
            None => constants::INLINE_TAGS.contains(&tag.as_str()),
        };

        if !inline {
            return NodeKind::Block;
        }

        // 行内元素很小，可以直接检查内容
        if inspect_content && self.code_detector.looks_like_code(&text_content(node)) {
            return NodeKind::Excluded(ExclusionReason::Code);
        }

        NodeKind::Inline
    }

    fn exclusion_reason(&self, node: &Handle, tag: &str) -> Option<ExclusionReason> {
        if self.excluded_tags.contains(tag) {
            return Some(ExclusionReason::Tag);
        }

        if get_node_attr(node, constants::PROCESSED_ATTR).is_some() {
            return Some(ExclusionReason::Processed);
        }

        let classes = get_node_classes(node);
        if classes
            .iter()
            .any(|class| constants::MARKER_CLASSES.contains(&class.as_str()))
        {
            return Some(ExclusionReason::Marker);
        }

        let no_translate_attr = get_node_attr(node, "translate")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("no"));
        if no_translate_attr || classes.iter().any(|class| self.excluded_classes.contains(class)) {
            return Some(ExclusionReason::NoTranslate);
        }

        if get_node_attr(node, "contenteditable")
            .is_some_and(|value| !value.trim().eq_ignore_ascii_case("false"))
        {
            return Some(ExclusionReason::Editable);
        }

        let code_class = classes.iter().any(|class| {
            CODE_CLASSES.contains(&class.as_str())
                || CODE_CLASS_PREFIXES.iter().any(|prefix| class.starts_with(prefix))
        });
        if code_class {
            return Some(ExclusionReason::Code);
        }

        None
    }

    /// 合并元素内连续的行内文本
    pub fn combine_text_nodes(&self, element: &Handle) -> Vec<TextGroup> {
        let mut groups = Vec::new();
        let mut buffer = GroupBuffer::default();

        for child in element.children.borrow().iter() {
            self.walk(child, element, &mut buffer, &mut groups);
        }
        buffer.flush(element, &mut groups);

        groups
    }

    fn walk(&self, node: &Handle, root: &Handle, buffer: &mut GroupBuffer, groups: &mut Vec<TextGroup>) {
        match self.classify(node) {
            NodeKind::Text => {
                if let NodeData::Text { contents } = &node.data {
                    let collapsed = collapse_whitespace(&contents.borrow());
                    if !collapsed.is_empty() {
                        buffer.push(collapsed, node);
                    }
                }
            }
            NodeKind::Inline => {
                for child in node.children.borrow().iter() {
                    self.walk(child, root, buffer, groups);
                }
            }
            NodeKind::Block | NodeKind::Excluded(_) => buffer.flush(root, groups),
            NodeKind::Other => {}
        }
    }

    /// 收集需要分段的块级元素
    ///
    /// 从 `<body>` 开始（没有 body 时从文档根开始），跳过被排除的子树。
    pub fn collect_roots(&self, dom: &RcDom) -> Vec<Handle> {
        let start = find_first_element(&dom.document, "body").unwrap_or_else(|| dom.document.clone());
        let mut roots = Vec::new();
        self.visit_roots(&start, &mut roots);
        roots
    }

    fn visit_roots(&self, node: &Handle, roots: &mut Vec<Handle>) {
        // 行内内容在 combine_text_nodes 中才检查
        match self.classify_with(node, false) {
            NodeKind::Excluded(_) | NodeKind::Text => return,
            NodeKind::Block => roots.push(node.clone()),
            NodeKind::Inline => {}
            NodeKind::Other => {
                // 文档根节点：没有 body 时，顶层的文本也需要一个分段根
                if matches!(node.data, NodeData::Document) {
                    roots.push(node.clone());
                }
            }
        }

        for child in node.children.borrow().iter() {
            if get_node_name(child).is_some() || matches!(child.data, NodeData::Document) {
                self.visit_roots(child, roots);
            }
        }
    }

    /// 对整个文档分段
    pub fn segment_document(&self, dom: &RcDom) -> Vec<TextGroup> {
        self.collect_roots(dom)
            .iter()
            .flat_map(|root| self.combine_text_nodes(root))
            .collect()
    }
}

/// 读取内联样式中的 display 值
fn display_of(node: &Handle) -> Option<String> {
    let style = get_node_attr(node, "style")?;
    style.split(';').find_map(|declaration| {
        let (property, value) = declaration.split_once(':')?;
        if property.trim().eq_ignore_ascii_case("display") {
            Some(value.trim().to_ascii_lowercase())
        } else {
            None
        }
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::parsers::html::{append_child, create_element, create_text_node, html_to_dom};
    use crate::translation::pipeline::code::HeuristicCodeDetector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn segmenter() -> Segmenter {
        Segmenter::new(&TranslationSettings::default(), Arc::new(HeuristicCodeDetector::new()))
    }

    fn parse(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8").unwrap()
    }

    #[test]
    fn test_inline_elements_merge_into_one_group() {
        let dom = parse("<html><body><p>Hello <em>world</em>!</p></body></html>");
        let p = find_first_element(&dom.document, "p").unwrap();

        let groups = segmenter().combine_text_nodes(&p);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].text, "Hello world !");
        assert_eq!(groups[0].nodes.len(), 3);
        assert!(Rc::ptr_eq(&groups[0].root, &p));
    }

    #[test]
    fn test_empty_inline_elements_continue_the_group() {
        let dom = parse("<p>Click <img src=\"x.png\"> to continue<wbr>reading</p>");
        let p = find_first_element(&dom.document, "p").unwrap();

        let groups = segmenter().combine_text_nodes(&p);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].text, "Click to continue reading");
        assert_eq!(groups[0].nodes.len(), 3);
    }

    #[test]
    fn test_legacy_inline_tags_stay_in_sentence() {
        let dom = parse("<p>Press <button>Save</button> or use <tt>big</tt> <nobr>old markup</nobr>.</p>");
        let p = find_first_element(&dom.document, "p").unwrap();

        let texts: Vec<_> = segmenter()
            .combine_text_nodes(&p)
            .into_iter()
            .map(|g| g.text)
            .collect();
        assert_eq!(texts, vec!["Press Save or use big old markup ."]);
    }

    #[derive(Default)]
    struct CountingDetector {
        calls: AtomicUsize,
    }

    impl CodeDetector for CountingDetector {
        fn looks_like_code(&self, _text: &str) -> bool {
            self.calls.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    #[test]
    fn test_collect_roots_does_not_inspect_inline_content() {
        let detector = Arc::new(CountingDetector::default());
        let segmenter = Segmenter::new(&TranslationSettings::default(), detector.clone());
        let dom = parse(
            "<body><p>One <span>two <em>three <b>four</b></em></span></p><div><a>five</a></div></body>",
        );

        let roots = segmenter.collect_roots(&dom);
        assert_eq!(roots.len(), 3);
        assert_eq!(detector.calls.load(Ordering::Relaxed), 0);

        // 分组时每个行内元素检查一次
        for root in &roots {
            segmenter.combine_text_nodes(root);
        }
        assert_eq!(detector.calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_pre_subtree_never_appears_in_groups() {
        // 解析器会在 <pre> 前关闭 <p>，这里手动构造嵌套结构
        let dom = RcDom::default();
        let p = create_element(&dom, "p", &[]);
        let pre = create_element(&dom, "pre", &[]);
        let code_text = create_text_node("let x = 1;");
        append_child(&pre, &code_text);

        append_child(&p, &create_text_node("Before the code"));
        append_child(&p, &pre);
        append_child(&p, &create_text_node("after the code"));

        let groups = segmenter().combine_text_nodes(&p);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].text, "Before the code");
        assert_eq!(groups[1].text, "after the code");
        for group in &groups {
            assert!(!group.nodes.iter().any(|n| Rc::ptr_eq(n, &code_text)));
        }
    }

    #[test]
    fn test_block_children_split_groups() {
        let dom = parse("<div>Intro text<div>Nested block</div>Outro text</div>");
        let div = find_first_element(&dom.document, "div").unwrap();

        let texts: Vec<_> = segmenter()
            .combine_text_nodes(&div)
            .into_iter()
            .map(|g| g.text)
            .collect();
        assert_eq!(texts, vec!["Intro text", "Outro text"]);
    }

    #[test]
    fn test_exclusion_markers() {
        let dom = parse(
            r#"<div>
                <span translate="no">A</span>
                <span class="notranslate">B</span>
                <span contenteditable="true">C</span>
                <span class="transor-translation">D</span>
                <font data-transor-processed="true">E</font>
                <span class="language-rust">F</span>
                <span contenteditable="false">G</span>
            </div>"#,
        );
        let div = find_first_element(&dom.document, "div").unwrap();
        let s = segmenter();

        let kinds: Vec<_> = div
            .children
            .borrow()
            .iter()
            .filter(|c| get_node_name(c).is_some())
            .map(|c| s.classify(c))
            .collect();

        assert_eq!(
            kinds,
            vec![
                NodeKind::Excluded(ExclusionReason::NoTranslate),
                NodeKind::Excluded(ExclusionReason::NoTranslate),
                NodeKind::Excluded(ExclusionReason::Editable),
                NodeKind::Excluded(ExclusionReason::Marker),
                NodeKind::Excluded(ExclusionReason::Processed),
                NodeKind::Excluded(ExclusionReason::Code),
                NodeKind::Inline,
            ]
        );
    }

    #[test]
    fn test_display_style_overrides_tag() {
        let dom = parse(
            r#"<div><div style="display: inline-block">Left</div><span style="display:block">Right</span></div>"#,
        );
        let outer = find_first_element(&dom.document, "div").unwrap();
        let s = segmenter();
        let children: Vec<_> = outer.children.borrow().iter().cloned().collect();

        assert_eq!(s.classify(&children[0]), NodeKind::Inline);
        assert_eq!(s.classify(&children[1]), NodeKind::Block);
    }

    #[test]
    fn test_segment_document_skips_head_and_excluded_subtrees() {
        let dom = parse(
            "<html><head><title>Page title</title></head><body>\
             <h1>Main heading</h1>\
             <div class=\"notranslate\"><p>Hidden paragraph</p></div>\
             <ul><li>First item</li><li>Second item</li></ul>\
             <script>var a = 1;</script>\
             </body></html>",
        );

        let texts: Vec<_> = segmenter()
            .segment_document(&dom)
            .into_iter()
            .map(|g| g.text)
            .collect();
        assert_eq!(texts, vec!["Main heading", "First item", "Second item"]);
    }

    #[test]
    fn test_custom_excluded_tags_and_classes() {
        let mut settings = TranslationSettings::default();
        settings.excluded_tags = vec!["ASIDE".to_string()];
        settings.excluded_classes = vec!["brand".to_string()];
        let s = Segmenter::new(&settings, Arc::new(HeuristicCodeDetector::new()));

        let dom = parse("<body><aside>Side note</aside><p>Keep <b class=\"brand\">Acme</b> this</p></body>");
        let texts: Vec<_> = s.segment_document(&dom).into_iter().map(|g| g.text).collect();
        assert_eq!(texts, vec!["Keep", "this"]);
    }
}
