//! # UnitRegistry：已加载单元的名称登记表
//!
//! ## 核心意图（Why）
//! - 保证同一时刻不会有两个同名单元存活；名称冲突以
//!   [`TextModelError::UnitAlreadyDefined`] 报告给触发构建的调用方。
//!
//! ## 行为契约（What）
//! - 登记表只持有单元的弱引用，单元的生命周期完全由调用方持有的模型句柄决定；
//! - 名称对应的单元被释放后，该名称可以再次登记；
//! - 登记数达到清扫水位时，在下一次登记前清理所有失效条目；清扫后水位调整为
//!   `max(阈值, 2 × 剩余条目数)`，存活单元再多，每次登记的均摊清扫开销仍为常数。
//!
//! ## 并发（How）
//! - 与会话管理器相同，基于 `DashMap` 的 `entry` API 完成“检查并插入”，单个名称上的登记是原子的。

use std::{
    any::Any,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::trace;

use crate::error::{Result, TextModelError};

/// 类型擦除后的单元句柄。
pub type ErasedUnit = Arc<dyn Any + Send + Sync>;

/// 单元名称到弱引用的登记表。
pub struct UnitRegistry {
    units: DashMap<Arc<str>, Weak<dyn Any + Send + Sync>>,
    purge_threshold: usize,
    next_purge: AtomicUsize,
    purges: AtomicU64,
}

impl UnitRegistry {
    /// `purge_threshold` 为 0 时按 1 处理。
    pub fn new(purge_threshold: usize) -> Self {
        let purge_threshold = purge_threshold.max(1);
        Self {
            units: DashMap::new(),
            purge_threshold,
            next_purge: AtomicUsize::new(purge_threshold),
            purges: AtomicU64::new(0),
        }
    }

    /// 以 `name` 登记单元；同名单元仍然存活时返回 [`TextModelError::UnitAlreadyDefined`]。
    pub fn define(&self, name: &str, unit: &ErasedUnit) -> Result<()> {
        let mark = self.next_purge.load(Ordering::Acquire);
        // 只有抢到水位的线程执行清扫，其余线程直接登记。
        if self.units.len() >= mark
            && self
                .next_purge
                .compare_exchange(mark, usize::MAX, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.purge();
        }
        match self.units.entry(Arc::from(name)) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().strong_count() > 0 {
                    return Err(TextModelError::UnitAlreadyDefined {
                        unit: name.to_owned(),
                    });
                }
                occupied.insert(Arc::downgrade(unit));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::downgrade(unit));
            }
        }
        Ok(())
    }

    /// 名称是否对应一个仍然存活的单元。
    pub fn is_defined(&self, name: &str) -> bool {
        self.units
            .get(name)
            .is_some_and(|unit| unit.strong_count() > 0)
    }

    /// 清理失效条目并重设清扫水位，返回清理数量。
    pub fn purge(&self) -> usize {
        let before = self.units.len();
        self.units.retain(|_, unit| unit.strong_count() > 0);
        let remaining = self.units.len();
        let purged = before.saturating_sub(remaining);
        let mark = self.purge_threshold.max(remaining.saturating_mul(2));
        self.next_purge.store(mark, Ordering::Release);
        self.purges.fetch_add(1, Ordering::Relaxed);
        trace!(purged, remaining, next_purge = mark, "purged unit registry");
        purged
    }

    /// 累计清扫次数（含手动调用 [`purge`](Self::purge)）。
    pub fn purges(&self) -> u64 {
        self.purges.load(Ordering::Relaxed)
    }

    /// 当前登记条目数（包括尚未清理的失效条目）。
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// 仍然存活的单元数量。
    pub fn live(&self) -> usize {
        self.units
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }
}

impl fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitRegistry")
            .field("entries", &self.units.len())
            .field("purge_threshold", &self.purge_threshold)
            .field("next_purge", &self.next_purge.load(Ordering::Relaxed))
            .field("purges", &self.purges())
            .finish()
    }
}
