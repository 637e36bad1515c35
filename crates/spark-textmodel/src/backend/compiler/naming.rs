//! 合成单元名称分配器。
//!
//! 名称形如 `<前缀><页号>$<页内序号>`：全局计数器按页长切分，页内序号在一页用尽后回到 0、
//! 页号加一。在同一个 [`UnitNameAllocator`] 上，任意两次分配得到的名称都不同。

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// 线程安全的单元名称分配器。
pub struct UnitNameAllocator {
    prefix: Arc<str>,
    page_size: u64,
    allocated: AtomicU64,
}

impl UnitNameAllocator {
    /// `page_size` 为 0 时按 1 处理。
    pub fn new(prefix: impl Into<Arc<str>>, page_size: u64) -> Self {
        Self {
            prefix: prefix.into(),
            page_size: page_size.max(1),
            allocated: AtomicU64::new(0),
        }
    }

    /// 分配下一个名称。
    pub fn next_name(&self) -> String {
        let sequence = self.allocated.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}{}${}",
            self.prefix,
            sequence / self.page_size,
            sequence % self.page_size
        )
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// 迄今已分配的名称数量。
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for UnitNameAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitNameAllocator")
            .field("prefix", &self.prefix)
            .field("page_size", &self.page_size)
            .field("allocated", &self.allocated())
            .finish()
    }
}
