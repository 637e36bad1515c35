//! # spark-textmodel
//!
//! ## 定位与职责（Why）
//! - 提供把目标对象格式化为文本的模板模型：调用方以构建器拼接静态文本与子模型，
//!   得到一个不可变、可跨线程共享的 [`TextModel`]；
//! - 同一模板可选择两种后端装配：逐节点求值的解释执行后端，以及在构建期把模板展开为
//!   直线程序的特化编译后端，两者输出逐字节一致。
//!
//! ## 架构嵌入（Where）
//! - `model`：模型契约与空模型、静态模型、闭包模型三类基础实现；
//! - `node`：节点序列的规范化（静态文本合并、非动态子模型展开）与长度界推导；
//! - `builder`：带状态机的可复用构建器；
//! - `backend`：后端契约及解释执行、特化编译两种实现；
//! - `factory`：绑定后端的构建器工厂；
//! - `config` / `error`：编译配置与统一错误域。
//!
//! ## 使用示例（How）
//! ```
//! use spark_textmodel::{TextModel, factory};
//!
//! struct User {
//!     name: String,
//!     age: u32,
//! }
//!
//! # fn main() -> spark_textmodel::Result<()> {
//! let mut builder = factory::compiling().new_builder::<User>();
//! builder
//!     .append("Mr. ")?
//!     .append_fn(|user: &User| user.name.clone())?
//!     .append(" is ")?
//!     .append_fn(|user: &User| user.age.to_string())?
//!     .append(" years old.")?;
//! let model = builder.build_and_release()?;
//!
//! let user = User { name: "X".into(), age: 18 };
//! assert_eq!(model.text(&user), "Mr. X is 18 years old.");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature 策略（Trade-offs）
//! - 默认开启 `toml-config`，允许从 TOML 文本加载 [`CompilerConfig`]；关闭后不再依赖 `toml`。
//! - 本 crate 只通过 `tracing` 发出事件，从不安装订阅者。

/// 后端契约与两种后端实现。
pub mod backend;

/// 可复用构建器与其状态机。
pub mod builder;

/// 特化编译配置。
pub mod config;

/// 错误类型与稳定错误码。
///
/// - **契约定位 (What)**：使用 `thiserror::Error` 派生，按“误用 / 合成失败 / 内部一致性”三类归档；
/// - **风险提示 (Trade-offs)**：所有错误都由触发调用同步返回，不会被自动重试或降级处理。
pub mod error;

/// 构建器工厂与后端选择入口。
pub mod factory;

/// 模型契约与基础模型。
pub mod model;

/// 节点序列与长度界。
pub mod node;

pub use backend::{
    Backend, CompilingBackend, InterpretingBackend,
    compiler::{CompilerServices, ThunkLoader, UnitLoader, UnitSource},
};
pub use builder::{BuilderState, TextModelBuilder};
pub use config::CompilerConfig;
pub use error::{Result, TextModelError};
pub use factory::{TextModelFactory, compiling, compiling_with, interpreting};
pub use model::{
    EmptyTextModel, FnTextModel, SharedTextModel, StaticTextModel, TextModel, dynamic, empty, fixed,
};
pub use node::LengthBound;
