use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::tree_builder::create_element as create_sink_element;
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> io::Result<RcDom> {
    let s: String = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => {
            let (string, _, _) = encoding.decode(data);
            string.to_string()
        }
        None => String::from_utf8_lossy(data).to_string(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
}

/// 深度优先查找第一个指定名称的元素
pub fn find_first_element(node: &Handle, node_name: &str) -> Option<Handle> {
    if get_node_name(node) == Some(node_name) {
        return Some(node.clone());
    }

    for child in node.children.borrow().iter() {
        if let Some(found) = find_first_element(child, node_name) {
            return Some(found);
        }
    }

    None
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点
///
/// 父引用读取后会放回原处，节点本身不会被修改。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 设置节点属性，`None` 表示删除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();

        match attr_value {
            Some(value) => {
                if let Some(existing) = attrs_mut
                    .iter_mut()
                    .find(|attr| &*attr.name.local == attr_name)
                {
                    existing.value.clear();
                    existing.value.push_slice(value.as_str());
                } else {
                    attrs_mut.push(Attribute {
                        name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                        value: format_tendril!("{}", value),
                    });
                }
            }
            None => attrs_mut.retain(|attr| &*attr.name.local != attr_name),
        }
    }
}

/// 获取元素的 class 列表
pub fn get_node_classes(node: &Handle) -> Vec<String> {
    get_node_attr(node, "class")
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// 检查元素是否带有指定 class
pub fn has_class(node: &Handle, class_name: &str) -> bool {
    get_node_attr(node, "class")
        .map(|value| value.split_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

/// 追加 class（已存在时忽略）
pub fn add_class(node: &Handle, class_name: &str) {
    if has_class(node, class_name) {
        return;
    }

    let value = match get_node_attr(node, "class") {
        Some(existing) if !existing.trim().is_empty() => {
            format!("{} {}", existing.trim(), class_name)
        }
        _ => class_name.to_string(),
    };
    set_node_attr(node, "class", Some(value));
}

/// 创建新的 HTML 元素
pub fn create_element(dom: &RcDom, tag_name: &str, attrs: &[(&str, &str)]) -> Handle {
    let attributes = attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: format_tendril!("{}", value),
        })
        .collect();

    create_sink_element(
        dom,
        QualName::new(None, ns!(html), LocalName::from(tag_name)),
        attributes,
    )
}

/// 创建文本节点
pub fn create_text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    })
}

/// 覆盖文本节点内容
pub fn set_text(node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &node.data {
        let mut contents = contents.borrow_mut();
        contents.clear();
        contents.push_slice(text);
    }
}

/// 子树内所有文本节点拼接后的内容
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        _ => {
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
        }
    }
}

/// 将节点从父节点中摘除
pub fn detach_node(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

/// 追加子节点（会先从原父节点摘除）
pub fn append_child(parent: &Handle, child: &Handle) {
    detach_node(child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// 在参照节点之前插入节点，参照节点没有父节点时返回 false
pub fn insert_before(reference: &Handle, new_node: &Handle) -> bool {
    insert_relative(reference, new_node, 0)
}

/// 在参照节点之后插入节点，参照节点没有父节点时返回 false
pub fn insert_after(reference: &Handle, new_node: &Handle) -> bool {
    insert_relative(reference, new_node, 1)
}

fn insert_relative(reference: &Handle, new_node: &Handle, offset: usize) -> bool {
    let parent = match get_parent_node(reference) {
        Some(parent) => parent,
        None => return false,
    };

    detach_node(new_node);

    let mut children = parent.children.borrow_mut();
    match children.iter().position(|child| Rc::ptr_eq(child, reference)) {
        Some(index) => {
            new_node.parent.set(Some(Rc::downgrade(&parent)));
            children.insert(index + offset, new_node.clone());
            true
        }
        None => false,
    }
}

/// 检查节点是否仍挂在 `root` 之下（`root` 自身也算）
///
/// 每一级都会确认父节点的 children 中确实包含当前节点，
/// 以识别已被摘除但仍保留父引用的节点。
pub fn is_attached_under(node: &Handle, root: &Handle) -> bool {
    let mut current = node.clone();

    loop {
        if Rc::ptr_eq(&current, root) {
            return true;
        }

        let parent = match get_parent_node(&current) {
            Some(parent) => parent,
            None => return false,
        };

        let contains = parent
            .children
            .borrow()
            .iter()
            .any(|child| Rc::ptr_eq(child, &current));
        if !contains {
            return false;
        }

        current = parent;
    }
}

/// 查找满足条件的最近祖先元素（不含自身）
pub fn find_ancestor<F>(node: &Handle, predicate: F) -> Option<Handle>
where
    F: Fn(&Handle) -> bool,
{
    let mut current = get_parent_node(node);
    while let Some(candidate) = current {
        if predicate(&candidate) {
            return Some(candidate);
        }
        current = get_parent_node(&candidate);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8").unwrap()
    }

    #[test]
    fn test_parent_lookup_keeps_link() {
        let dom = parse("<html><body><p id=\"x\">hi</p></body></html>");
        let p = find_first_element(&dom.document, "p").unwrap();
        let text = p.children.borrow()[0].clone();

        let first = get_parent_node(&text).unwrap();
        let second = get_parent_node(&text).unwrap();
        assert!(Rc::ptr_eq(&first, &p));
        assert!(Rc::ptr_eq(&second, &p));
    }

    #[test]
    fn test_set_and_remove_attr() {
        let dom = parse("<p class=\"a\">hi</p>");
        let p = find_first_element(&dom.document, "p").unwrap();

        set_node_attr(&p, "title", Some("tip".to_string()));
        assert_eq!(get_node_attr(&p, "title"), Some("tip".to_string()));

        set_node_attr(&p, "title", Some("other".to_string()));
        assert_eq!(get_node_attr(&p, "title"), Some("other".to_string()));

        set_node_attr(&p, "title", None);
        assert_eq!(get_node_attr(&p, "title"), None);

        add_class(&p, "b");
        add_class(&p, "b");
        assert_eq!(get_node_classes(&p), vec!["a", "b"]);
        assert!(has_class(&p, "b"));
    }

    #[test]
    fn test_insert_and_attachment() {
        let dom = parse("<html><body><div><span>a</span></div></body></html>");
        let div = find_first_element(&dom.document, "div").unwrap();
        let span = find_first_element(&div, "span").unwrap();

        let before = create_element(&dom, "b", &[]);
        let after = create_element(&dom, "i", &[]);
        assert!(insert_before(&span, &before));
        assert!(insert_after(&span, &after));

        let names: Vec<_> = div
            .children
            .borrow()
            .iter()
            .filter_map(|c| get_node_name(c).map(str::to_string))
            .collect();
        assert_eq!(names, vec!["b", "span", "i"]);

        assert!(is_attached_under(&span, &div));
        detach_node(&span);
        assert!(!is_attached_under(&span, &div));
        assert_eq!(text_content(&div), "");
    }

    #[test]
    fn test_append_moves_node() {
        let dom = parse("<div id=\"a\"><em>x</em></div><div id=\"b\"></div>");
        let body = find_first_element(&dom.document, "body").unwrap();
        let divs: Vec<_> = body.children.borrow().iter().cloned().collect();
        let em = find_first_element(&divs[0], "em").unwrap();

        append_child(&divs[1], &em);
        assert!(divs[0].children.borrow().is_empty());
        assert_eq!(text_content(&divs[1]), "x");
        assert!(Rc::ptr_eq(&get_parent_node(&em).unwrap(), &divs[1]));
    }
}
