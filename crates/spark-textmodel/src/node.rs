//! # 模板节点模型
//!
//! ## 核心意图（Why）
//! - 把模板拆解为两类节点：静态字面量 [`StaticNode`] 与持有子模型的 [`DynamicNode`]；
//! - [`NodeSequence`] 在追加时即完成规范化，并增量维护长度界 [`LengthBound`]，后端无需再做一遍扫描。
//!
//! ## 规范化约束（What）
//! - 零长度的静态文本不会入队；
//! - 相邻静态节点在追加时合并为一个，因此序列中不存在两个相邻的静态节点；
//! - 非动态子模型在追加时直接展开为静态文本，动态节点只持有真正动态的内容；
//! - 空序列表示“无输出”。

use std::{fmt, slice};

use crate::model::{SharedTextModel, TextModel};

/// 输出长度的上下界。
///
/// # 教案式说明
/// - **契约 (What)**：`min`/`max` 各自独立，`None` 表示未知；
/// - **执行 (How)**：[`combine`](Self::combine) 对两侧分别求和，任一侧未知或求和溢出即变为未知；
/// - **风险 (Trade-offs)**：界只作为预分配提示，永远不参与正确性判断。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct LengthBound {
    min: Option<usize>,
    max: Option<usize>,
}

impl LengthBound {
    /// 求和的单位元：长度恰为 0。
    pub const ZERO: LengthBound = LengthBound::exact(0);

    /// 以给定上下界构造。
    pub const fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self { min, max }
    }

    /// 长度恰为 `len`。
    pub const fn exact(len: usize) -> Self {
        Self {
            min: Some(len),
            max: Some(len),
        }
    }

    /// 上下界均未知。
    pub const fn unknown() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    /// 读取模型声明的长度界。
    pub fn of_model<T: ?Sized>(model: &dyn TextModel<T>) -> Self {
        Self::new(model.min_length(), model.max_length())
    }

    pub fn min(&self) -> Option<usize> {
        self.min
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// 两段输出拼接后的长度界。
    pub fn combine(self, other: LengthBound) -> LengthBound {
        let sum = |a: Option<usize>, b: Option<usize>| a?.checked_add(b?);
        LengthBound {
            min: sum(self.min, other.min),
            max: sum(self.max, other.max),
        }
    }
}

/// 静态字面量节点。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StaticNode {
    text: String,
}

impl StaticNode {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// 动态节点，持有一个子模型。
pub struct DynamicNode<T: ?Sized> {
    content: SharedTextModel<T>,
}

impl<T: ?Sized> DynamicNode<T> {
    pub fn content(&self) -> &SharedTextModel<T> {
        &self.content
    }

    pub fn into_content(self) -> SharedTextModel<T> {
        self.content
    }

    /// 子模型声明的长度界。
    pub fn bound(&self) -> LengthBound {
        LengthBound::of_model(self.content.as_ref())
    }
}

impl<T: ?Sized> Clone for DynamicNode<T> {
    fn clone(&self) -> Self {
        Self {
            content: self.content.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for DynamicNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicNode")
            .field("bound", &self.bound())
            .finish_non_exhaustive()
    }
}

/// 模板节点。
pub enum Node<T: ?Sized> {
    Static(StaticNode),
    Dynamic(DynamicNode<T>),
}

impl<T: ?Sized> Node<T> {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Node::Dynamic(_))
    }

    pub fn as_static(&self) -> Option<&StaticNode> {
        match self {
            Node::Static(node) => Some(node),
            Node::Dynamic(_) => None,
        }
    }

    pub fn as_dynamic(&self) -> Option<&DynamicNode<T>> {
        match self {
            Node::Static(_) => None,
            Node::Dynamic(node) => Some(node),
        }
    }

    /// 单个节点的长度界：静态节点为精确长度，动态节点取子模型声明。
    pub fn bound(&self) -> LengthBound {
        match self {
            Node::Static(node) => LengthBound::exact(node.len()),
            Node::Dynamic(node) => node.bound(),
        }
    }
}

impl<T: ?Sized> Clone for Node<T> {
    fn clone(&self) -> Self {
        match self {
            Node::Static(node) => Node::Static(node.clone()),
            Node::Dynamic(node) => Node::Dynamic(node.clone()),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Static(node) => f.debug_tuple("Static").field(&node.text).finish(),
            Node::Dynamic(node) => f.debug_tuple("Dynamic").field(node).finish(),
        }
    }
}

/// 规范化的节点序列。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - 追加操作不会失败；
///   - 任意时刻不存在相邻静态节点或空静态节点；
///   - `static_length` 为全部静态文本的字节数，`dynamic_count` 为动态节点数；
///   - [`bound`](Self::bound) 为所有节点长度界之和，只增不减（已知时）。
/// - **执行 (How)**：静态追加优先扩展末尾静态节点；动态追加前先检查子模型是否非动态，
///   若是则改走静态追加。
pub struct NodeSequence<T: ?Sized> {
    nodes: Vec<Node<T>>,
    static_length: usize,
    dynamic_count: usize,
    dynamic_bound: LengthBound,
}

impl<T: ?Sized> NodeSequence<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            static_length: 0,
            dynamic_count: 0,
            dynamic_bound: LengthBound::ZERO,
        }
    }

    /// 追加静态文本，空文本为无操作。
    pub fn push_static(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.static_length += text.len();
        if let Some(Node::Static(last)) = self.nodes.last_mut() {
            last.text.push_str(text);
        } else {
            self.nodes.push(Node::Static(StaticNode {
                text: text.to_owned(),
            }));
        }
    }

    /// 追加子模型；非动态子模型会被展开为静态文本。
    pub fn push_dynamic(&mut self, content: SharedTextModel<T>) {
        if let Some(text) = content.static_text() {
            self.push_static(text);
            return;
        }
        let node = DynamicNode { content };
        self.dynamic_bound = self.dynamic_bound.combine(node.bound());
        self.dynamic_count += 1;
        self.nodes.push(Node::Dynamic(node));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 序列是否不产生任何输出。
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Node<T>> {
        self.nodes.iter()
    }

    pub fn as_slice(&self) -> &[Node<T>] {
        &self.nodes
    }

    pub fn static_length(&self) -> usize {
        self.static_length
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamic_count
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic_count > 0
    }

    /// 序列整体输出的长度界。
    pub fn bound(&self) -> LengthBound {
        LengthBound::exact(self.static_length).combine(self.dynamic_bound)
    }

    /// 清空节点与长度界。
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.static_length = 0;
        self.dynamic_count = 0;
        self.dynamic_bound = LengthBound::ZERO;
    }

    pub fn into_nodes(self) -> Vec<Node<T>> {
        self.nodes
    }
}

impl<T: ?Sized> Default for NodeSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for NodeSequence<T> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            static_length: self.static_length,
            dynamic_count: self.dynamic_count,
            dynamic_bound: self.dynamic_bound,
        }
    }
}

impl<T: ?Sized> fmt::Debug for NodeSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSequence")
            .field("nodes", &self.nodes)
            .field("static_length", &self.static_length)
            .field("dynamic_count", &self.dynamic_count)
            .finish()
    }
}

impl<'a, T: ?Sized> IntoIterator for &'a NodeSequence<T> {
    type Item = &'a Node<T>;
    type IntoIter = slice::Iter<'a, Node<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
