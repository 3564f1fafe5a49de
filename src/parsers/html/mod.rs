//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作（解析、属性、节点增删、挂载校验）
//! - `serializer`: 序列化功能

pub mod dom;
pub mod serializer;

pub use dom::{
    add_class, append_child, create_element, create_text_node, detach_node, find_ancestor,
    find_first_element, get_node_attr, get_node_classes, get_node_name,
    get_parent_node, has_class, html_to_dom, insert_after, insert_before,
    is_attached_under, set_node_attr, set_text, text_content,
};
pub use serializer::serialize_document;
