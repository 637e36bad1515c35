//! # 特化编译配置
//!
//! ## 核心意图（Why）
//! - 把单元命名、缓冲预分配与登记表清扫阈值集中为一个可声明的配置结构，
//!   既可在代码中构造，也可从 TOML 文本加载。
//!
//! ## 行为契约（What）
//! - 所有字段都有默认值，TOML 中缺省的字段取默认值，未知字段视为错误；
//! - 配置只在构造 [`CompilerServices`](crate::backend::compiler::CompilerServices) 时读取一次，
//!   之后不可变更。

use serde::Deserialize;

use crate::error::{Result, TextModelError};

/// 默认单元名称前缀。
pub const DEFAULT_UNIT_NAME_PREFIX: &str = "spark.textmodel.Generated$";
/// 默认名称页长：2^32。
pub const DEFAULT_NAME_PAGE_SIZE: u64 = u32::MAX as u64 + 1;
/// 长度下界未知时的默认预分配容量（字节）。
pub const DEFAULT_CAPACITY: usize = 64;
/// 默认登记表清扫阈值。
pub const DEFAULT_REGISTRY_PURGE_THRESHOLD: usize = 1024;

/// 特化编译后端的配置。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `unit_name_prefix`：单元名称前缀，不能为空，不能包含控制字符；
///   - `name_page_size`：名称分页长度，必须大于 0；
///   - `default_capacity`：长度下界未知时的预分配容量；
///   - `registry_purge_threshold`：初始清扫水位，登记条目达到水位时触发清扫，必须大于 0。
/// - **执行 (How)**：[`validate`](Self::validate) 逐项检查并返回第一处违例。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub unit_name_prefix: String,
    pub name_page_size: u64,
    pub default_capacity: usize,
    pub registry_purge_threshold: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            unit_name_prefix: DEFAULT_UNIT_NAME_PREFIX.to_owned(),
            name_page_size: DEFAULT_NAME_PAGE_SIZE,
            default_capacity: DEFAULT_CAPACITY,
            registry_purge_threshold: DEFAULT_REGISTRY_PURGE_THRESHOLD,
        }
    }
}

impl CompilerConfig {
    /// 校验配置。
    pub fn validate(&self) -> Result<()> {
        let invalid = |detail: &str| {
            Err(TextModelError::Config {
                detail: detail.to_owned(),
            })
        };
        if self.unit_name_prefix.is_empty() {
            return invalid("`unit_name_prefix` must not be empty");
        }
        if self.unit_name_prefix.chars().any(char::is_control) {
            return invalid("`unit_name_prefix` must not contain control characters");
        }
        if self.name_page_size == 0 {
            return invalid("`name_page_size` must be greater than zero");
        }
        if self.registry_purge_threshold == 0 {
            return invalid("`registry_purge_threshold` must be greater than zero");
        }
        Ok(())
    }

    /// 从 TOML 文本解析并校验配置。
    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: CompilerConfig = toml::from_str(text).map_err(|error| TextModelError::Config {
            detail: error.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}
