//! # 解释执行后端
//!
//! 调用期按序遍历节点：静态节点原样拼接，动态节点拼接子模型对目标的求值结果。
//! 该后端对任意节点序列（包括空序列）都正确，是特化编译后端的对照基准。

use std::{borrow::Cow, fmt, sync::Arc};

use tracing::debug;

use crate::{
    backend::{Backend, trivial_model},
    error::Result,
    model::{SharedTextModel, TextModel},
    node::{LengthBound, Node, NodeSequence},
};

/// 解释执行后端，无状态。
#[derive(Clone, Copy, Debug, Default)]
pub struct InterpretingBackend;

impl InterpretingBackend {
    pub const fn new() -> Self {
        InterpretingBackend
    }
}

impl<T: ?Sized + 'static> Backend<T> for InterpretingBackend {
    fn assemble(&self, nodes: NodeSequence<T>) -> Result<SharedTextModel<T>> {
        if let Some(model) = trivial_model(&nodes) {
            return Ok(model);
        }
        debug!(
            nodes = nodes.len(),
            dynamic_nodes = nodes.dynamic_count(),
            "assembled interpreted text model"
        );
        Ok(Arc::new(InterpretedTextModel::new(nodes)))
    }
}

/// 逐节点求值的模型。
///
/// # 教案式说明
/// - **契约 (What)**：`is_dynamic` 当且仅当存在动态节点；长度界为各节点长度界之和；
///   非动态序列在构造时拼接为一段固定文本，之后每次调用都返回同一实例；
/// - **执行 (How)**：以长度下界（未知时取静态文本总长）预分配输出缓冲，随后顺序追加。
pub struct InterpretedTextModel<T: ?Sized> {
    nodes: Box<[Node<T>]>,
    fixed: Option<Box<str>>,
    bound: LengthBound,
    capacity: usize,
}

impl<T: ?Sized> InterpretedTextModel<T> {
    pub fn new(nodes: NodeSequence<T>) -> Self {
        let bound = nodes.bound();
        let capacity = bound.min().unwrap_or(nodes.static_length());
        let fixed = (!nodes.is_dynamic()).then(|| {
            nodes
                .iter()
                .filter_map(Node::as_static)
                .map(|node| node.text())
                .collect::<String>()
                .into_boxed_str()
        });
        Self {
            nodes: nodes.into_nodes().into_boxed_slice(),
            fixed,
            bound,
            capacity,
        }
    }
}

impl<T: ?Sized> TextModel<T> for InterpretedTextModel<T> {
    fn text(&self, target: &T) -> Cow<'_, str> {
        if let Some(fixed) = self.fixed.as_deref() {
            return Cow::Borrowed(fixed);
        }
        let mut out = String::with_capacity(self.capacity);
        for node in self.nodes.iter() {
            match node {
                Node::Static(node) => out.push_str(node.text()),
                Node::Dynamic(node) => out.push_str(&node.content().text(target)),
            }
        }
        Cow::Owned(out)
    }

    fn static_text(&self) -> Option<&str> {
        self.fixed.as_deref()
    }

    fn min_length(&self) -> Option<usize> {
        self.bound.min()
    }

    fn max_length(&self) -> Option<usize> {
        self.bound.max()
    }
}

impl<T: ?Sized> fmt::Debug for InterpretedTextModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpretedTextModel")
            .field("nodes", &self.nodes)
            .field("bound", &self.bound)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FnTextModel, dynamic};

    struct User {
        name: &'static str,
        age: u32,
    }

    #[test]
    fn interprets_nodes_in_order() {
        let mut nodes = NodeSequence::<User>::new();
        nodes.push_static("Mr. ");
        nodes.push_dynamic(dynamic(|user: &User| user.name.to_owned()));
        nodes.push_static(" is ");
        nodes.push_dynamic(dynamic(|user: &User| user.age.to_string()));
        nodes.push_static(" years old.");

        let model = InterpretingBackend.assemble(nodes).expect("interpreter never fails");
        assert!(model.is_dynamic());
        assert_eq!(model.min_length(), None);
        assert_eq!(
            model.text(&User {
                name: "Tester",
                age: 17
            }),
            "Mr. Tester is 17 years old."
        );
    }

    #[test]
    fn static_only_model_is_interned() {
        let mut nodes = NodeSequence::<User>::new();
        nodes.push_static("Hello");
        nodes.push_static(" World");
        let model = InterpretedTextModel::new(nodes);
        let user = User { name: "a", age: 1 };

        let first = model.text(&user);
        let second = model.text(&user);
        assert_eq!(first, "Hello World");
        assert_eq!(first.as_ptr(), second.as_ptr());
        assert!(!model.is_dynamic());
        assert_eq!(model.min_length(), Some(11));
        assert_eq!(model.max_length(), Some(11));
    }

    #[test]
    fn empty_sequence_renders_nothing() {
        let model = InterpretedTextModel::new(NodeSequence::<User>::new());
        assert_eq!(model.text(&User { name: "a", age: 1 }), "");
        assert!(!model.is_dynamic());
        assert_eq!(model.min_length(), Some(0));
    }

    #[test]
    fn bound_is_sum_of_hints() {
        let mut nodes = NodeSequence::<User>::new();
        nodes.push_static("#");
        nodes.push_dynamic(Arc::new(
            FnTextModel::new(|user: &User| user.age.to_string()).with_length_hint(Some(1), Some(10)),
        ));
        nodes.push_static("#");
        let model = InterpretingBackend.assemble(nodes).expect("interpreter never fails");
        assert_eq!(model.min_length(), Some(3));
        assert_eq!(model.max_length(), Some(12));
        assert_eq!(model.text(&User { name: "a", age: 42 }), "#42#");
    }
}
