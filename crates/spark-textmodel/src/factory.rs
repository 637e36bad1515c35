//! # 工厂入口
//!
//! 工厂绑定一个后端，负责发放构建器与规范空模型。后端选择只发生在这里：
//! 同一工厂发放的所有构建器都使用同一个后端，且后端之间不会自动回退。

use std::sync::Arc;

use crate::{
    backend::{
        Backend, InterpretingBackend,
        compiler::{CompilerServices, CompilingBackend},
    },
    builder::TextModelBuilder,
    model::{self, SharedTextModel},
};

/// 绑定后端的构建器工厂。
#[derive(Clone, Debug, Default)]
pub struct TextModelFactory<B> {
    backend: B,
}

impl<B> TextModelFactory<B> {
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 发放新的空构建器。
    pub fn new_builder<T>(&self) -> TextModelBuilder<T, B>
    where
        T: ?Sized + 'static,
        B: Backend<T> + Clone,
    {
        TextModelBuilder::new(self.backend.clone())
    }

    /// 规范空模型，与 [`model::empty`] 返回同一实例。
    pub fn empty<T: ?Sized>(&self) -> SharedTextModel<T> {
        model::empty()
    }
}

/// 解释执行工厂。
pub fn interpreting() -> TextModelFactory<InterpretingBackend> {
    TextModelFactory::new(InterpretingBackend::new())
}

/// 使用进程级共享编译服务的特化编译工厂。
pub fn compiling() -> TextModelFactory<CompilingBackend> {
    TextModelFactory::new(CompilingBackend::new())
}

/// 使用给定编译服务的特化编译工厂。
pub fn compiling_with(services: Arc<CompilerServices>) -> TextModelFactory<CompilingBackend> {
    TextModelFactory::new(CompilingBackend::with_services(services))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_empty_is_canonical() {
        let interpreted: SharedTextModel<str> = interpreting().empty();
        let compiled: SharedTextModel<str> = compiling().empty();
        assert!(std::ptr::eq(
            Arc::as_ptr(&interpreted) as *const (),
            Arc::as_ptr(&compiled) as *const ()
        ));
    }

    #[test]
    fn builders_share_the_factory_backend() {
        let factory = compiling();
        let builder = factory.new_builder::<str>();
        assert!(Arc::ptr_eq(builder.backend().services(), factory.backend().services()));
    }
}
