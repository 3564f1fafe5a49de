//! 译文渲染
//!
//! 把译文按显示样式写回页面：原文包裹在 `font.transor-original` 中并打上
//! 已处理标记，译文以兄弟元素、提示属性或原位替换的方式呈现。

use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::parsers::html::{
    add_class, append_child, create_element, create_text_node, find_ancestor, get_node_attr,
    get_node_name, get_parent_node, insert_after, insert_before, is_attached_under, set_node_attr,
    set_text,
};
use crate::translation::config::{constants, DisplayStyle};
use crate::translation::pipeline::segmenter::TextGroup;

/// 一次写回的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// 已按给定样式写回
    Applied(DisplayStyle),
    /// 译文为空或与原文相同，页面未修改
    Unchanged,
    /// 分段后节点已被移出或已被处理，页面未修改
    Detached,
}

/// 估算词数：空白分隔的词计 1，中日韩字符每个计 1
pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .map(|word| {
            let cjk = word.chars().filter(|c| is_cjk(*c)).count();
            let has_other = word.chars().any(|c| c.is_alphanumeric() && !is_cjk(c));
            cjk + usize::from(has_other)
        })
        .sum()
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{AC00}'..='\u{D7AF}')
}

/// 解析 universal 样式：短文本或导航/页脚中的内容使用提示框，其余使用双语块
pub fn resolve_style(style: DisplayStyle, group: &TextGroup) -> DisplayStyle {
    if style != DisplayStyle::Universal {
        return style;
    }

    let compact = is_compact_container(&group.root)
        || find_ancestor(&group.root, is_compact_container).is_some();

    if compact || word_count(&group.text) <= constants::SHORT_TEXT_WORDS {
        DisplayStyle::Tip
    } else {
        DisplayStyle::Bilingual
    }
}

fn is_compact_container(node: &Handle) -> bool {
    get_node_name(node).is_some_and(|name| constants::COMPACT_CONTAINERS.contains(&name))
}

/// 将译文写回文本组所在位置
pub fn apply_translation(
    dom: &RcDom,
    group: &TextGroup,
    translation: &str,
    style: DisplayStyle,
) -> ApplyOutcome {
    let translation = translation.trim();
    if translation.is_empty() || translation == group.text {
        return ApplyOutcome::Unchanged;
    }

    if group.nodes.is_empty() || !is_still_valid(group) {
        tracing::debug!("文本组已失效，跳过: {}", group.text);
        return ApplyOutcome::Detached;
    }

    let style = resolve_style(style, group);
    let wrappers = wrap_original(dom, group);
    let anchor = match wrappers.last() {
        Some(anchor) => anchor.clone(),
        None => return ApplyOutcome::Detached,
    };

    match style {
        DisplayStyle::Replace => {
            for (index, node) in group.nodes.iter().enumerate() {
                set_text(node, if index == 0 { translation } else { "" });
            }
            add_class(&wrappers[0], "transor-replace");
            set_node_attr(&wrappers[0], constants::SOURCE_ATTR, Some(group.text.clone()));
        }
        DisplayStyle::Inline => {
            let element = translation_element(dom, style, &[]);
            append_child(&element, &create_text_node(&format!(" {}", translation)));
            insert_after(&anchor, &element);
        }
        DisplayStyle::Bilingual => {
            let element = translation_element(dom, style, &[("style", "display:block")]);
            append_child(&element, &create_text_node(translation));
            insert_after(&anchor, &element);
        }
        DisplayStyle::Tip | DisplayStyle::Universal => {
            for wrapper in &wrappers {
                add_class(wrapper, constants::TIP_CLASS);
                set_node_attr(wrapper, "title", Some(translation.to_string()));
                set_node_attr(wrapper, constants::TIP_ATTR, Some(translation.to_string()));
            }
        }
    }

    ApplyOutcome::Applied(style)
}

/// 分段之后页面可能已变化，写回前重新确认
fn is_still_valid(group: &TextGroup) -> bool {
    group.nodes.iter().all(|node| {
        is_attached_under(node, &group.root)
            && find_ancestor(node, |ancestor| {
                get_node_attr(ancestor, constants::PROCESSED_ATTR).is_some()
            })
            .is_none()
    })
}

fn translation_element(dom: &RcDom, style: DisplayStyle, extra: &[(&str, &str)]) -> Handle {
    let class = format!("{} transor-{}", constants::TRANSLATION_CLASS, style.as_str());
    let mut attrs = vec![("class", class.as_str())];
    attrs.extend_from_slice(extra);
    create_element(dom, constants::WRAPPER_TAG, &attrs)
}

fn original_wrapper(dom: &RcDom) -> Handle {
    create_element(
        dom,
        constants::WRAPPER_TAG,
        &[
            ("class", constants::ORIGINAL_CLASS),
            (constants::PROCESSED_ATTR, "true"),
        ],
    )
}

/// 用原文包裹元素替换文本组占据的位置，返回创建的包裹元素
///
/// 文本组覆盖的根级子节点区间不含其他文本时整体包裹；否则逐个包裹文本节点。
fn wrap_original(dom: &RcDom, group: &TextGroup) -> Vec<Handle> {
    let span = top_level_span(group);

    let exclusive = !span.is_empty()
        && span
            .iter()
            .all(|child| only_group_text(child, &group.nodes));

    if exclusive {
        let wrapper = original_wrapper(dom);
        if !insert_before(&span[0], &wrapper) {
            return Vec::new();
        }
        for child in &span {
            append_child(&wrapper, child);
        }
        return vec![wrapper];
    }

    group
        .nodes
        .iter()
        .filter_map(|node| {
            let wrapper = original_wrapper(dom);
            if insert_before(node, &wrapper) {
                append_child(&wrapper, node);
                Some(wrapper)
            } else {
                None
            }
        })
        .collect()
}

/// 文本组在根元素下覆盖的连续子节点
fn top_level_span(group: &TextGroup) -> Vec<Handle> {
    let children: Vec<Handle> = group.root.children.borrow().iter().cloned().collect();

    let positions: Vec<usize> = group
        .nodes
        .iter()
        .filter_map(|node| top_level_child(node, &group.root))
        .filter_map(|top| children.iter().position(|child| Rc::ptr_eq(child, &top)))
        .collect();

    match (positions.iter().min(), positions.iter().max()) {
        (Some(&first), Some(&last)) => children[first..=last].to_vec(),
        _ => Vec::new(),
    }
}

fn top_level_child(node: &Handle, root: &Handle) -> Option<Handle> {
    let mut current = node.clone();
    loop {
        let parent = get_parent_node(&current)?;
        if Rc::ptr_eq(&parent, root) {
            return Some(current);
        }
        current = parent;
    }
}

/// 子树内的非空白文本是否都属于文本组
fn only_group_text(node: &Handle, group_nodes: &[Handle]) -> bool {
    match &node.data {
        NodeData::Text { contents } => {
            contents.borrow().trim().is_empty()
                || group_nodes.iter().any(|member| Rc::ptr_eq(member, node))
        }
        _ => node
            .children
            .borrow()
            .iter()
            .all(|child| only_group_text(child, group_nodes)),
    }
}
