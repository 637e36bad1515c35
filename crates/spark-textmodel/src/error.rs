//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中声明构建器、两类后端与编译服务可能暴露的全部错误；
//! - 按“调用方误用 / 合成失败 / 内部一致性破坏”三类归档，便于上层区分处置方式。
//!
//! ## 设计要求（What）
//! - 错误枚举派生 `thiserror::Error`，可直接交给 `anyhow` 等上层框架；
//! - 每个变体都映射到 [`codes`] 中的稳定错误码，日志与告警按错误码聚合；
//! - 本模块的所有错误都不会被自动重试，由触发调用同步返回。

use thiserror::Error;

/// crate 统一的 `Result` 别名。
pub type Result<T, E = TextModelError> = core::result::Result<T, E>;

/// 稳定错误码。
///
/// 码值遵循 `<域>.<语义>` 约定，一旦发布不得修改。
pub mod codes {
    /// 构建器已通过 `build_and_release` 释放。
    pub const BUILDER_RELEASED: &str = "textmodel.builder.released";
    /// 构建器已完成 `build`，需先 `clear`。
    pub const BUILDER_BUILT: &str = "textmodel.builder.built";
    /// 动态模型在缺少目标对象的情况下被求值。
    pub const RENDER_MISSING_TARGET: &str = "textmodel.render.missing_target";
    /// 合成单元的源码无法被加载器接受。
    pub const SYNTHESIS_FAILED: &str = "textmodel.synthesis.failed";
    /// 合成单元名称与存活单元冲突。
    pub const SYNTHESIS_DUPLICATE_UNIT: &str = "textmodel.synthesis.duplicate_unit";
    /// 关联表中不存在请求的键。
    pub const CORRELATION_UNKNOWN_KEY: &str = "textmodel.correlation.unknown_key";
    /// 编译配置非法。
    pub const CONFIG_INVALID: &str = "textmodel.config.invalid";
}

/// 文本模型子系统的错误域。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `AlreadyReleased` / `AlreadyBuilt` / `MissingTarget` 属于调用方误用，参见 [`is_usage_error`](Self::is_usage_error)；
///   - `Synthesis` / `UnitAlreadyDefined` 表示特化编译后端在该次 `build` 中失败；
///   - `UnknownCorrelationKey` 表示关联键的分配或生命周期存在缺陷，参见 [`is_internal`](Self::is_internal)；
///   - `Config` 仅在构造 [`CompilerConfig`](crate::config::CompilerConfig) 时出现。
/// - **执行 (How)**：所有变体均实现 `Send + Sync + 'static`，可以跨线程传播。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum TextModelError {
    /// 构建器已经被 `build_and_release` 消费，不能再调用任何操作。
    #[error("text model builder has already been released")]
    AlreadyReleased,

    /// 构建器已经完成 `build`，追加或再次构建前必须先 `clear`。
    #[error("text model builder has already been built; call `clear` before reusing it")]
    AlreadyBuilt,

    /// 动态模型需要目标对象，但调用方没有提供。
    #[error("dynamic text model cannot be rendered without a target")]
    MissingTarget,

    /// 合成单元被加载器拒绝。
    ///
    /// - `unit`：合成单元名称；
    /// - `detail`：出错位置与原因，通常包含源码行号。
    #[error("failed to synthesize text model unit `{unit}`: {detail}")]
    Synthesis { unit: String, detail: String },

    /// 同名单元仍然存活，拒绝重复定义。
    #[error("text model unit `{unit}` is already defined")]
    UnitAlreadyDefined { unit: String },

    /// 合成单元初始化时引用了未知（或已被领取、或属于其他关联表）的键。
    #[error("correlation key `{key}` is not present in the table")]
    UnknownCorrelationKey { key: String },

    /// 编译配置未通过校验。
    #[error("invalid text model compiler configuration: {detail}")]
    Config { detail: String },
}

impl TextModelError {
    /// 构造合成失败错误的便捷方法。
    pub fn synthesis(unit: &str, detail: impl Into<String>) -> Self {
        TextModelError::Synthesis {
            unit: unit.to_owned(),
            detail: detail.into(),
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            TextModelError::AlreadyReleased => codes::BUILDER_RELEASED,
            TextModelError::AlreadyBuilt => codes::BUILDER_BUILT,
            TextModelError::MissingTarget => codes::RENDER_MISSING_TARGET,
            TextModelError::Synthesis { .. } => codes::SYNTHESIS_FAILED,
            TextModelError::UnitAlreadyDefined { .. } => codes::SYNTHESIS_DUPLICATE_UNIT,
            TextModelError::UnknownCorrelationKey { .. } => codes::CORRELATION_UNKNOWN_KEY,
            TextModelError::Config { .. } => codes::CONFIG_INVALID,
        }
    }

    /// 是否属于调用方误用（契约违例），此类错误不应重试。
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            TextModelError::AlreadyReleased
                | TextModelError::AlreadyBuilt
                | TextModelError::MissingTarget
        )
    }

    /// 是否属于内部一致性破坏。
    ///
    /// 出现该类错误意味着关联键分配或生命周期管理存在缺陷，而非调用方输入问题。
    pub fn is_internal(&self) -> bool {
        matches!(self, TextModelError::UnknownCorrelationKey { .. })
    }
}
