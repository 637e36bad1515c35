//! # 文本模型契约
//!
//! ## 核心意图（Why）
//! - 定义所有后端共同产出的 [`TextModel`] 契约：给定目标对象，返回格式化后的文本，并附带
//!   “是否动态”与长度上下界三项元数据；
//! - 提供最基础的三类模型：空模型 [`EmptyTextModel`]、静态模型 [`StaticTextModel`] 与闭包驱动的
//!   动态模型 [`FnTextModel`]。
//!
//! ## 行为契约（What）
//! - 非动态模型对任意目标（包括缺省目标）都返回同一个文本实例，且 `min_length == max_length == 文本长度`；
//! - 长度统一以 UTF-8 字节数计，与 `String::with_capacity` 的单位一致；
//! - 子模型内部的 panic 原样向调用方展开，任何后端都不会捕获或包装。

use std::{
    borrow::Cow,
    fmt,
    sync::{Arc, OnceLock},
};

use crate::{
    error::{Result, TextModelError},
    node::LengthBound,
};

/// 按目标对象产出文本的模型。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - [`text`](Self::text)：对目标求值。非动态模型必须返回借用自身存储的 `Cow::Borrowed`，
///     保证多次调用得到同一文本实例；
///   - [`static_text`](Self::static_text)：当且仅当模型非动态时返回 `Some`；
///   - [`min_length`](Self::min_length) / [`max_length`](Self::max_length)：输出长度的可选界，
///     仅用于缓冲预分配，不影响正确性；
///   - [`render`](Self::render)：以可缺省目标求值，动态模型在缺省目标时返回
///     [`TextModelError::MissingTarget`]。
/// - **并发 (What)**：实现必须是 `Send + Sync`，同一实例可被多个线程无同步地并发调用。
pub trait TextModel<T: ?Sized>: Send + Sync {
    /// 针对目标对象求值。
    fn text(&self, target: &T) -> Cow<'_, str>;

    /// 非动态模型的固定文本。
    fn static_text(&self) -> Option<&str> {
        None
    }

    /// 模型是否可能针对不同目标产出不同文本。
    fn is_dynamic(&self) -> bool {
        self.static_text().is_none()
    }

    /// 输出长度下界，未知时为 `None`。
    fn min_length(&self) -> Option<usize> {
        None
    }

    /// 输出长度上界，未知时为 `None`。
    fn max_length(&self) -> Option<usize> {
        None
    }

    /// 以可缺省的目标求值。
    ///
    /// - 非动态模型忽略目标并返回固定文本；
    /// - 动态模型在 `target` 为 `None` 时返回 [`TextModelError::MissingTarget`]。
    fn render(&self, target: Option<&T>) -> Result<Cow<'_, str>> {
        if let Some(text) = self.static_text() {
            return Ok(Cow::Borrowed(text));
        }
        match target {
            Some(target) => Ok(self.text(target)),
            None => Err(TextModelError::MissingTarget),
        }
    }
}

/// 可跨线程共享的模型句柄，所有构建入口都以该形态返回模型。
pub type SharedTextModel<T> = Arc<dyn TextModel<T>>;

/// 空文本模型。
///
/// 零尺寸类型，对任何目标类型都实现 [`TextModel`]；[`empty`] 返回的是进程内唯一的一份实例。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct EmptyTextModel;

impl<T: ?Sized> TextModel<T> for EmptyTextModel {
    fn text(&self, _target: &T) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn static_text(&self) -> Option<&str> {
        Some("")
    }

    fn min_length(&self) -> Option<usize> {
        Some(0)
    }

    fn max_length(&self) -> Option<usize> {
        Some(0)
    }
}

impl fmt::Display for EmptyTextModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Empty TextModel")
    }
}

static EMPTY: OnceLock<Arc<EmptyTextModel>> = OnceLock::new();

/// 返回规范的空模型。
///
/// # 教案式说明
/// - **契约 (What)**：非动态、长度恒为 0；所有目标类型共享同一个 `Arc` 数据指针，
///   多次调用返回的文本都是同一个 `""` 实例；
/// - **执行 (How)**：首次调用时在 `OnceLock` 中创建实例，之后仅克隆 `Arc` 并按目标类型做 unsize 转换。
pub fn empty<T: ?Sized>() -> SharedTextModel<T> {
    EMPTY.get_or_init(|| Arc::new(EmptyTextModel)).clone()
}

/// 固定文本模型。
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct StaticTextModel {
    text: Box<str>,
}

impl StaticTextModel {
    /// 以给定文本创建模型，允许空文本。
    pub fn of(text: impl Into<String>) -> Self {
        Self {
            text: text.into().into_boxed_str(),
        }
    }

    /// 模型持有的文本。
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl<T: ?Sized> TextModel<T> for StaticTextModel {
    fn text(&self, _target: &T) -> Cow<'_, str> {
        Cow::Borrowed(&*self.text)
    }

    fn static_text(&self) -> Option<&str> {
        Some(&*self.text)
    }

    fn min_length(&self) -> Option<usize> {
        Some(self.text.len())
    }

    fn max_length(&self) -> Option<usize> {
        Some(self.text.len())
    }
}

impl fmt::Display for StaticTextModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// 创建固定文本模型；空文本直接返回 [`empty`]。
pub fn fixed<T: ?Sized>(text: impl Into<String>) -> SharedTextModel<T> {
    let text = text.into();
    if text.is_empty() {
        return empty();
    }
    Arc::new(StaticTextModel::of(text))
}

/// 由闭包驱动的动态模型。
///
/// # 教案式说明
/// - **契约 (What)**：闭包签名为 `Fn(&T) -> String`，必须满足 `Send + Sync`；
///   默认不声明长度界，可通过 [`with_length_hint`](Self::with_length_hint) 附加；
/// - **风险 (Trade-offs)**：长度提示由调用方担保，错误的提示只影响预分配大小，不影响输出。
#[derive(Clone)]
pub struct FnTextModel<F> {
    function: F,
    bound: LengthBound,
}

impl<F> FnTextModel<F> {
    /// 包装闭包，长度界未知。
    pub fn new(function: F) -> Self {
        Self {
            function,
            bound: LengthBound::unknown(),
        }
    }

    /// 附加输出长度提示。
    pub fn with_length_hint(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.bound = LengthBound::new(min, max);
        self
    }
}

impl<T, F> TextModel<T> for FnTextModel<F>
where
    T: ?Sized,
    F: Fn(&T) -> String + Send + Sync,
{
    fn text(&self, target: &T) -> Cow<'_, str> {
        Cow::Owned((self.function)(target))
    }

    fn min_length(&self) -> Option<usize> {
        self.bound.min()
    }

    fn max_length(&self) -> Option<usize> {
        self.bound.max()
    }
}

impl<F> fmt::Debug for FnTextModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTextModel")
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

/// 以闭包创建动态模型。
pub fn dynamic<T, F>(function: F) -> SharedTextModel<T>
where
    T: ?Sized,
    F: Fn(&T) -> String + Send + Sync + 'static,
{
    Arc::new(FnTextModel::new(function))
}
