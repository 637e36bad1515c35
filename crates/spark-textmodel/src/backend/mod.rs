//! # 后端：把定稿的节点序列变成可调用的模型
//!
//! ## 结构（How）
//! - [`interpreter`]：逐节点求值的解释执行后端，是其他后端的语义基准；
//! - [`compiler`]：特化编译后端，在构建期把节点展开为一段直线程序，调用期不再遍历节点序列。
//!
//! ## 契约（What）
//! - 对同一节点序列与同一目标，所有后端的输出逐字节相同，`is_dynamic`/`min_length`/`max_length` 也一致；
//! - 后端选择由调用方决定，任何后端失败都不会自动回退到另一个后端。

use std::sync::Arc;

use crate::{
    error::Result,
    model::{SharedTextModel, StaticTextModel, empty},
    node::{Node, NodeSequence},
};

pub mod compiler;
pub mod interpreter;

pub use compiler::CompilingBackend;
pub use interpreter::InterpretingBackend;

/// 将节点序列装配为模型的策略。
///
/// - **契约 (What)**：`nodes` 已经规范化（见 [`NodeSequence`]）；返回的模型不可变，可被并发调用；
///   失败时返回的错误必须同步交还给触发 `build` 的调用方。
pub trait Backend<T: ?Sized + 'static>: Send + Sync {
    /// 装配模型，`nodes` 的所有权移交给后端。
    fn assemble(&self, nodes: NodeSequence<T>) -> Result<SharedTextModel<T>>;
}

/// 两个后端共享的平凡序列快速路径。
///
/// - 空序列（或仅含空静态文本）返回规范空模型 [`empty`]；
/// - 单个静态节点返回 [`StaticTextModel`]；
/// - 单个动态节点直接返回其子模型。
///
/// 其余情况返回 `None`，由具体后端处理。
pub(crate) fn trivial_model<T: ?Sized + 'static>(
    nodes: &NodeSequence<T>,
) -> Option<SharedTextModel<T>> {
    if nodes.is_empty() || (!nodes.is_dynamic() && nodes.static_length() == 0) {
        return Some(empty());
    }
    match nodes.as_slice() {
        [Node::Static(node)] => Some(Arc::new(StaticTextModel::of(node.text()))),
        [Node::Dynamic(node)] => Some(node.content().clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::dynamic;

    fn data_ptr<T: ?Sized>(model: &SharedTextModel<T>) -> *const () {
        Arc::as_ptr(model) as *const ()
    }

    #[test]
    fn trivial_sequences_skip_backends() {
        let nodes = NodeSequence::<str>::new();
        let model = trivial_model(&nodes).expect("empty sequence is trivial");
        assert_eq!(data_ptr(&model), data_ptr(&empty::<str>()));

        let mut nodes = NodeSequence::<str>::new();
        nodes.push_static("only");
        let model = trivial_model(&nodes).expect("single static node is trivial");
        assert_eq!(model.static_text(), Some("only"));

        let content = dynamic(|target: &str| target.to_uppercase());
        let mut nodes = NodeSequence::<str>::new();
        nodes.push_dynamic(content.clone());
        let model = trivial_model(&nodes).expect("single dynamic node is trivial");
        assert_eq!(data_ptr(&model), data_ptr(&content));

        nodes.push_static("!");
        assert!(trivial_model(&nodes).is_none());
    }
}
