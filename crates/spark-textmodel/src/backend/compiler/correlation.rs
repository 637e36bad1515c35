//! # CorrelationTable：合成单元的一次性对象交接表
//!
//! ## 核心意图（Why）
//! - 合成单元只能通过自身源码中的字面量参数化，无法直接引用编译期的对象；编译器把动态子模型
//!   存入本表并只把键写进源码，加载器在单元构造期间凭键领取对象。
//!
//! ## 行为契约（What）
//! - `store`：总是成功，返回新键；
//! - `retrieve`：取出并移除条目，每个键只能领取一次；键不存在（陈旧键、外表键）或类型不符时返回
//!   [`TextModelError::UnknownCorrelationKey`]，属于内部一致性错误；
//! - `discard`：编译失败时由编译器回收尚未被领取的条目。
//!
//! ## 并发（How）
//! - 基于 `DashMap` 分片存储，不同键的存取落在不同分片上，彼此不争用；
//! - 键由“表编号 + 表内序号”组成，不同表实例的键互不相交。

use std::{
    any::Any,
    borrow::Borrow,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use tracing::trace;

use crate::error::{Result, TextModelError};

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(0);

/// 关联表中的不透明键。
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CorrelationKey(Arc<str>);

impl CorrelationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CorrelationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type ErasedValue = Box<dyn Any + Send + Sync>;

/// 键到任意值的一次性交接表。
///
/// # 教案式说明
/// - **契约 (What)**：值被类型擦除后存储，领取时按调用方给出的类型还原；
/// - **风险 (Trade-offs)**：条目预期在单元构造期间即被领取，未领取的条目只会在 `discard` 时释放。
pub struct CorrelationTable {
    id: u64,
    next_key: AtomicU64,
    entries: DashMap<CorrelationKey, ErasedValue>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            next_key: AtomicU64::new(0),
            entries: DashMap::new(),
        }
    }

    /// 存入值并返回新分配的键。
    pub fn store<V: Any + Send + Sync>(&self, value: V) -> CorrelationKey {
        let sequence = self.next_key.fetch_add(1, Ordering::Relaxed);
        let key = CorrelationKey(Arc::from(format!("t{:x}-k{:x}", self.id, sequence)));
        self.entries.insert(key.clone(), Box::new(value));
        trace!(key = %key, "stored correlation entry");
        key
    }

    /// 取出并移除键对应的值。
    pub fn retrieve<V: Any + Send + Sync>(&self, key: &str) -> Result<V> {
        let unknown = || TextModelError::UnknownCorrelationKey {
            key: key.to_owned(),
        };
        let (_, value) = self.entries.remove(key).ok_or_else(unknown)?;
        trace!(key, "retrieved correlation entry");
        value.downcast::<V>().map(|value| *value).map_err(|_| unknown())
    }

    /// 丢弃尚未被领取的条目，返回条目是否存在。
    pub fn discard(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// 尚未被领取的条目数量。
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CorrelationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationTable")
            .field("id", &self.id)
            .field("pending", &self.entries.len())
            .finish()
    }
}
