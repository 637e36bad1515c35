//! # 特化编译后端
//!
//! ## 核心意图（Why）
//! - 对高频调用的模板，在构建期一次性把节点序列展开为一段直线程序，调用期直接顺序执行，
//!   省去解释执行后端每次调用时的节点遍历与分支判断。
//!
//! ## 架构位置（Where）
//! - [`source`]：单元源码格式与字面量转义；
//! - [`loader`]：可替换的加载器接缝 [`UnitLoader`] 及默认实现 [`ThunkLoader`]；
//! - [`correlation`] / [`naming`] / [`registry`]：由 [`CompilerServices`] 聚合的三项共享服务。
//!
//! ## 合成步骤（How）
//! 1. 从名称分配器领取单元名称；
//! 2. 每个动态节点的子模型存入关联表，源码中声明对应槽位；
//! 3. 写出长度界与缓冲初始化方式：首节点为动态节点且序列不含静态文本时直接接管其输出，
//!    否则以长度下界（未知时取配置的默认容量与静态文本长度的较大者）预分配；
//! 4. 按节点顺序写出 `push` 指令，单字符静态文本使用字符指令；
//! 5. 交给加载器编译加载；
//! 6. 失败时回收本次存入关联表的全部条目，并把错误原样交还调用方，不回退到解释执行。
//!
//! ## 风险提示（Trade-offs）
//! - 每次构建都会产生一个新单元并占用一个名称；单元随模型句柄释放，登记表按阈值惰性清扫。

use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use tracing::{debug, warn};

use crate::{
    backend::{Backend, trivial_model},
    config::CompilerConfig,
    error::Result,
    model::SharedTextModel,
    node::{Node, NodeSequence},
};

pub mod correlation;
pub mod loader;
pub mod naming;
pub mod registry;
pub mod source;

pub use correlation::{CorrelationKey, CorrelationTable};
pub use loader::{CompiledTextModel, ThunkLoader, UnitLoader};
pub use naming::UnitNameAllocator;
pub use registry::UnitRegistry;
pub use source::UnitSource;

use source::SourceWriter;

/// 特化编译所需的共享服务。
///
/// # 教案式说明
/// - **意图 (Why)**：名称分配器、关联表与登记表必须在使用同一加载器的所有编译之间共享，
///   否则名称唯一性与关联键的可达性无从保证；
/// - **契约 (What)**：
///   - [`shared`](Self::shared) 返回进程级单例，使用默认配置；
///   - [`new`](Self::new) 构造相互隔离的实例，配置先经 [`CompilerConfig::validate`] 校验；
/// - **并发 (How)**：三项服务内部均为无锁或分片锁结构，实例可被任意多个线程同时使用。
pub struct CompilerServices {
    config: CompilerConfig,
    names: UnitNameAllocator,
    correlation: CorrelationTable,
    registry: UnitRegistry,
}

static SHARED: OnceLock<Arc<CompilerServices>> = OnceLock::new();

impl CompilerServices {
    /// 以给定配置构造隔离的服务实例。
    pub fn new(config: CompilerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    /// 进程级共享实例。
    pub fn shared() -> Arc<CompilerServices> {
        SHARED
            .get_or_init(|| Arc::new(Self::with_valid_config(CompilerConfig::default())))
            .clone()
    }

    fn with_valid_config(config: CompilerConfig) -> Self {
        Self {
            names: UnitNameAllocator::new(config.unit_name_prefix.as_str(), config.name_page_size),
            correlation: CorrelationTable::new(),
            registry: UnitRegistry::new(config.registry_purge_threshold),
            config,
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn names(&self) -> &UnitNameAllocator {
        &self.names
    }

    pub fn correlation(&self) -> &CorrelationTable {
        &self.correlation
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }
}

impl fmt::Debug for CompilerServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerServices")
            .field("config", &self.config)
            .field("names", &self.names)
            .field("correlation", &self.correlation)
            .field("registry", &self.registry)
            .finish()
    }
}

/// 合成结果：单元源码与本次存入关联表的键。
#[derive(Debug)]
pub(crate) struct SynthesizedUnit {
    pub(crate) source: UnitSource,
    pub(crate) keys: Vec<CorrelationKey>,
}

/// 特化编译后端。
#[derive(Clone, Debug)]
pub struct CompilingBackend<L = ThunkLoader> {
    services: Arc<CompilerServices>,
    loader: L,
}

impl CompilingBackend {
    /// 使用进程级共享服务与默认加载器。
    pub fn new() -> Self {
        Self::with_services(CompilerServices::shared())
    }

    /// 使用给定服务与默认加载器。
    pub fn with_services(services: Arc<CompilerServices>) -> Self {
        Self::with_loader(services, ThunkLoader)
    }
}

impl Default for CompilingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> CompilingBackend<L> {
    /// 使用给定服务与自定义加载器。
    pub fn with_loader(services: Arc<CompilerServices>, loader: L) -> Self {
        Self { services, loader }
    }

    pub fn services(&self) -> &Arc<CompilerServices> {
        &self.services
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// 把非平凡的动态序列写成单元源码，子模型存入关联表。
    pub(crate) fn synthesize<T: ?Sized + 'static>(&self, nodes: &NodeSequence<T>) -> SynthesizedUnit {
        let services = &self.services;
        let mut writer = SourceWriter::new(services.names().next_name());

        let mut keys = Vec::with_capacity(nodes.dynamic_count());
        for node in nodes.iter().filter_map(Node::as_dynamic) {
            let key = services.correlation().store(node.content().clone());
            writer.slot(keys.len(), key.as_str());
            keys.push(key);
        }

        let bound = nodes.bound();
        writer.bound(bound);

        let mut slot = 0;
        let mut capacity = None;
        if nodes.static_length() == 0 {
            writer.begin_from(slot);
            slot += 1;
            for _ in 1..keys.len() {
                writer.push_slot(slot);
                slot += 1;
            }
        } else {
            let reserved = bound.min().unwrap_or_else(|| {
                services
                    .config()
                    .default_capacity
                    .max(nodes.static_length())
            });
            writer.begin_capacity(reserved);
            capacity = Some(reserved);
            for node in nodes {
                match node {
                    Node::Static(node) => writer.push_text(node.text()),
                    Node::Dynamic(_) => {
                        writer.push_slot(slot);
                        slot += 1;
                    }
                }
            }
        }

        let source = writer.finish();
        debug!(
            unit = source.name(),
            slots = keys.len(),
            capacity = ?capacity,
            "synthesized text model unit"
        );
        SynthesizedUnit { source, keys }
    }

    /// 回收尚未被加载器领取的关联条目。
    fn discard(&self, unit: &SynthesizedUnit) -> usize {
        unit.keys
            .iter()
            .filter(|key| self.services.correlation().discard(key.as_str()))
            .count()
    }
}

impl<T, L> Backend<T> for CompilingBackend<L>
where
    T: ?Sized + 'static,
    L: UnitLoader,
{
    fn assemble(&self, nodes: NodeSequence<T>) -> Result<SharedTextModel<T>> {
        if let Some(model) = trivial_model(&nodes) {
            return Ok(model);
        }
        let unit = self.synthesize(&nodes);
        match self.loader.compile_and_load::<T>(&self.services, &unit.source) {
            Ok(model) => {
                debug!(unit = unit.source.name(), "loaded text model unit");
                Ok(model)
            }
            Err(error) => {
                let discarded = self.discard(&unit);
                warn!(
                    unit = unit.source.name(),
                    code = error.code(),
                    discarded,
                    %error,
                    "failed to load text model unit"
                );
                Err(error)
            }
        }
    }
}
