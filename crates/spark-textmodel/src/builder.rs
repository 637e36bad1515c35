//! # TextModelBuilder：可复用的模板构建器
//!
//! ## 核心意图（Why）
//! - 以流式调用把静态文本与子模型依次拼接为节点序列，最终交给所选后端装配为模型；
//! - 构建器在 `build` 后可通过 `clear` 复用，而 `build_and_release` 则把节点所有权直接移交后端，
//!   省去一次复制。
//!
//! ## 状态机（What）
//! ```text
//! Building --append/append_model/clear--> Building
//! Building --build--> Built --clear--> Building
//! Building --build_and_release--> Released (终态)
//! Built    --clear--> Building
//! ```
//! - `Built` 状态下追加或再次构建返回 [`TextModelError::AlreadyBuilt`]；
//! - `Released` 状态下任何操作（包括 `clear`）返回 [`TextModelError::AlreadyReleased`]；
//! - 状态错误不会改变构建器内容。
//!
//! ## 并发（How）
//! - 构建器本身不做同步，需由单一所有者使用；产出的模型可被任意线程共享。

use std::fmt;

use tracing::debug;

use crate::{
    backend::Backend,
    error::{Result, TextModelError},
    model::{self, SharedTextModel},
    node::NodeSequence,
};

/// 构建器所处的生命周期阶段。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BuilderState {
    /// 可以继续追加内容。
    Building,
    /// 已经 `build`，需 `clear` 后才能继续追加。
    Built,
    /// 已经 `build_and_release`，不可再使用。
    Released,
}

impl BuilderState {
    /// 判断从当前状态迁移到 `target` 是否合法。
    pub fn can_transition_to(self, target: BuilderState) -> bool {
        matches!(
            (self, target),
            (BuilderState::Building, BuilderState::Building)
                | (BuilderState::Building, BuilderState::Built)
                | (BuilderState::Building, BuilderState::Released)
                | (BuilderState::Built, BuilderState::Building)
        )
    }

    /// 是否为终态。
    pub fn is_terminal(self) -> bool {
        matches!(self, BuilderState::Released)
    }
}

/// 模板构建器。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - 追加方法返回 `Result<&mut Self>`，可用 `?` 链式调用；
///   - [`build`](Self::build) 以节点序列的副本装配，构建器内容保持不变；
///   - [`build_and_release`](Self::build_and_release) 把节点序列移交后端，无论装配成败构建器都进入终态；
///   - 后端失败时错误原样返回，`build` 失败后构建器仍处于 `Building`。
/// - **执行 (How)**：节点在追加时即完成规范化（见 [`NodeSequence`]），构建阶段只做一次移交。
pub struct TextModelBuilder<T: ?Sized, B> {
    nodes: NodeSequence<T>,
    backend: B,
    state: BuilderState,
}

impl<T, B> TextModelBuilder<T, B>
where
    T: ?Sized + 'static,
    B: Backend<T>,
{
    /// 以给定后端创建空构建器。
    pub fn new(backend: B) -> Self {
        Self {
            nodes: NodeSequence::new(),
            backend,
            state: BuilderState::Building,
        }
    }

    /// 当前生命周期阶段。
    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// 已追加的规范化节点。
    pub fn nodes(&self) -> &NodeSequence<T> {
        &self.nodes
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 追加静态文本，空文本为无操作。
    pub fn append(&mut self, text: impl AsRef<str>) -> Result<&mut Self> {
        self.ensure_building()?;
        self.nodes.push_static(text.as_ref());
        Ok(self)
    }

    /// 追加子模型；非动态子模型按其固定文本追加。
    pub fn append_model(&mut self, model: SharedTextModel<T>) -> Result<&mut Self> {
        self.ensure_building()?;
        self.nodes.push_dynamic(model);
        Ok(self)
    }

    /// 以闭包追加动态内容。
    pub fn append_fn<F>(&mut self, function: F) -> Result<&mut Self>
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.append_model(model::dynamic(function))
    }

    /// 装配模型，构建器保留内容并进入 `Built`。
    pub fn build(&mut self) -> Result<SharedTextModel<T>> {
        self.check_transition(BuilderState::Built)?;
        self.trace_finalize(false);
        let model = self.backend.assemble(self.nodes.clone())?;
        self.transition(BuilderState::Built)?;
        Ok(model)
    }

    /// 装配模型并释放构建器，之后的任何调用都返回 [`TextModelError::AlreadyReleased`]。
    pub fn build_and_release(&mut self) -> Result<SharedTextModel<T>> {
        self.transition(BuilderState::Released)?;
        self.trace_finalize(true);
        let nodes = std::mem::take(&mut self.nodes);
        self.backend.assemble(nodes)
    }

    /// 清空内容并回到 `Building`。
    pub fn clear(&mut self) -> Result<&mut Self> {
        self.transition(BuilderState::Building)?;
        self.nodes.clear();
        Ok(self)
    }

    /// 追加只在 `Building` 下合法；`Built -> Building` 只能经由 `clear`。
    fn ensure_building(&self) -> Result<()> {
        match self.state {
            BuilderState::Building => Ok(()),
            _ => Err(self.state_error()),
        }
    }

    /// 校验迁移到 `next` 是否合法，不修改状态。
    fn check_transition(&self, next: BuilderState) -> Result<()> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(self.state_error())
        }
    }

    /// 状态机跃迁：先经 [`BuilderState::can_transition_to`] 校验，再更新状态。
    fn transition(&mut self, next: BuilderState) -> Result<()> {
        self.check_transition(next)?;
        self.state = next;
        Ok(())
    }

    fn state_error(&self) -> TextModelError {
        if self.state.is_terminal() {
            TextModelError::AlreadyReleased
        } else {
            TextModelError::AlreadyBuilt
        }
    }

    fn trace_finalize(&self, release: bool) {
        debug!(
            nodes = self.nodes.len(),
            dynamic_nodes = self.nodes.dynamic_count(),
            static_length = self.nodes.static_length(),
            release,
            "finalizing text model builder"
        );
    }
}

impl<T: ?Sized, B: fmt::Debug> fmt::Debug for TextModelBuilder<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextModelBuilder")
            .field("state", &self.state)
            .field("nodes", &self.nodes)
            .field("backend", &self.backend)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InterpretingBackend;

    fn builder() -> TextModelBuilder<str, InterpretingBackend> {
        TextModelBuilder::new(InterpretingBackend)
    }

    #[test]
    fn state_transitions_follow_the_machine() {
        use BuilderState::*;
        assert!(Building.can_transition_to(Built));
        assert!(Built.can_transition_to(Building));
        assert!(!Built.can_transition_to(Released));
        assert!(!Released.can_transition_to(Building));
        assert!(Released.is_terminal());
        assert!(!Built.is_terminal());
    }

    #[test]
    fn built_builder_rejects_appends_until_cleared() {
        let mut builder = builder();
        builder
            .append("Hi ")
            .expect("building")
            .append_fn(|name: &str| name.to_owned())
            .expect("building");
        let model = builder.build().expect("first build");
        assert_eq!(builder.state(), BuilderState::Built);
        assert_eq!(model.text("Ann"), "Hi Ann");

        assert_eq!(builder.append("x").err(), Some(TextModelError::AlreadyBuilt));
        assert_eq!(builder.build().err(), Some(TextModelError::AlreadyBuilt));
        assert_eq!(builder.nodes().len(), 2);

        builder.clear().expect("clear after build");
        assert_eq!(builder.state(), BuilderState::Building);
        assert!(builder.nodes().is_empty());
    }

    #[test]
    fn released_builder_rejects_everything() {
        let mut builder = builder();
        builder.append("done").expect("building");
        let model = builder.build_and_release().expect("release");
        assert_eq!(model.static_text(), Some("done"));
        assert_eq!(builder.state(), BuilderState::Released);

        assert_eq!(builder.append("x").err(), Some(TextModelError::AlreadyReleased));
        assert_eq!(builder.build().err(), Some(TextModelError::AlreadyReleased));
        assert_eq!(
            builder.build_and_release().err(),
            Some(TextModelError::AlreadyReleased)
        );
        assert_eq!(builder.clear().err(), Some(TextModelError::AlreadyReleased));
    }

    #[test]
    fn built_builder_cannot_be_released_without_clear() {
        let mut builder = builder();
        builder.append("once").expect("building");
        builder.build().expect("build");

        assert_eq!(
            builder.build_and_release().err(),
            Some(TextModelError::AlreadyBuilt)
        );
        assert_eq!(builder.state(), BuilderState::Built);
        assert_eq!(builder.nodes().len(), 1);

        builder.clear().expect("clear after build");
        assert_eq!(builder.clear().map(|b| b.state()), Ok(BuilderState::Building));
        builder.append("again").expect("building");
        let model = builder.build_and_release().expect("release");
        assert_eq!(model.static_text(), Some("again"));
        assert_eq!(builder.state(), BuilderState::Released);
    }
}
