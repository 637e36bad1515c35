//! # 单元加载器
//!
//! ## 核心意图（Why）
//! - [`UnitLoader`] 是特化编译后端的可替换接缝：它接收合成的 [`UnitSource`]，校验并“编译”为
//!   可直接调用的模型，同时在单元构造期间从关联表领取动态子模型；
//! - 默认实现 [`ThunkLoader`] 把每条 `push` 指令预先解析为一个闭包，调用期只需顺序执行闭包数组，
//!   不再有节点匹配或槽位查找。
//!
//! ## 行为契约（What）
//! - 源码不合法时返回 [`TextModelError::Synthesis`]，名称冲突时返回
//!   [`TextModelError::UnitAlreadyDefined`]，关联键缺失时返回
//!   [`TextModelError::UnknownCorrelationKey`]；
//! - 加载成功的单元登记到 [`UnitRegistry`](super::registry::UnitRegistry)，
//!   其生命周期由返回的模型句柄决定。
//!
//! ## 执行步骤（How）
//! 1. 逐行解析源码为 [`Program`]，此阶段无副作用；
//! 2. 按槽位顺序从关联表领取子模型；
//! 3. 把指令转换为闭包数组，构造 [`CompiledTextModel`]；
//! 4. 以单元名称登记。

use std::{borrow::Cow, fmt, str::FromStr, sync::Arc};

use tracing::{trace, warn};

use crate::{
    error::{Result, TextModelError},
    model::{SharedTextModel, TextModel},
    node::LengthBound,
};

use super::{
    CompilerServices,
    registry::ErasedUnit,
    source::{UnitSource, parse_literal},
};

/// 把单元源码编译并加载为模型。
pub trait UnitLoader: Send + Sync {
    fn compile_and_load<T: ?Sized + 'static>(
        &self,
        services: &CompilerServices,
        source: &UnitSource,
    ) -> Result<SharedTextModel<T>>;
}

/// 默认加载器：把指令预解析为闭包数组。
#[derive(Clone, Copy, Debug, Default)]
pub struct ThunkLoader;

impl UnitLoader for ThunkLoader {
    fn compile_and_load<T: ?Sized + 'static>(
        &self,
        services: &CompilerServices,
        source: &UnitSource,
    ) -> Result<SharedTextModel<T>> {
        let program = Program::parse(source)?;
        let slots = program
            .slots
            .iter()
            .map(|key| {
                services
                    .correlation()
                    .retrieve::<SharedTextModel<T>>(key)
            })
            .collect::<Result<Vec<_>>>()?;

        let unit = Arc::new(CompiledTextModel::link(program, &slots));
        let erased: ErasedUnit = unit.clone();
        if let Err(error) = services.registry().define(unit.name(), &erased) {
            warn!(
                unit = unit.name(),
                slots = slots.len(),
                code = error.code(),
                "dropping linked unit rejected by registry"
            );
            return Err(error);
        }
        trace!(unit = unit.name(), thunks = unit.thunks.len(), "linked text model unit");
        Ok(unit)
    }
}

/// 单个 `push` 指令。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Instruction {
    Text(String),
    Char(char),
    Slot(usize),
}

/// 输出缓冲的初始化方式。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Begin {
    Capacity(usize),
    From(usize),
}

/// 解析后的单元程序。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Program {
    pub name: String,
    pub slots: Vec<String>,
    pub bound: LengthBound,
    pub begin: Begin,
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// 解析并校验单元源码。
    pub fn parse(source: &UnitSource) -> Result<Program> {
        let unit = source.name();
        let fail = |line: usize, detail: &str| {
            TextModelError::synthesis(unit, format!("line {line}: {detail}"))
        };
        let eof = source.body().lines().count().max(1);
        let mut lines = source
            .body()
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line))
            .filter(|(_, line)| !line.trim().is_empty());

        let (line, header) = lines.next().ok_or_else(|| fail(1, "empty unit source"))?;
        match header.strip_prefix("unit ") {
            Some(name) if name == unit => {}
            Some(name) => return Err(fail(line, &format!("header names `{name}`"))),
            None => return Err(fail(line, "expected `unit <name>`")),
        }

        let mut slots = Vec::new();
        let mut next = lines.next();
        while let Some((line, text)) = next {
            let Some(rest) = text.strip_prefix("slot ") else {
                break;
            };
            let (slot, rest) = rest
                .split_once(" <- ")
                .ok_or_else(|| fail(line, "expected `slot D<i> <- \"<key>\"`"))?;
            let index = parse_slot(slot).map_err(|detail| fail(line, &detail))?;
            if index != slots.len() {
                return Err(fail(line, &format!("slot D{index} declared out of order")));
            }
            let (key, tail) = parse_literal(rest, '"').map_err(|detail| fail(line, &detail))?;
            if !tail.is_empty() {
                return Err(fail(line, "trailing input after slot key"));
            }
            slots.push(key);
            next = lines.next();
        }
        if slots.is_empty() {
            return Err(fail(next.map_or(1, |(line, _)| line), "unit declares no slots"));
        }

        let (line, text) = next.ok_or_else(|| fail(eof, "missing `bound`"))?;
        let bound = text
            .strip_prefix("bound ")
            .and_then(|rest| rest.split_once(' '))
            .and_then(|(min, max)| Some(LengthBound::new(parse_limit(min)?, parse_limit(max)?)))
            .ok_or_else(|| fail(line, "expected `bound <min|?> <max|?>`"))?;

        let (line, text) = lines.next().ok_or_else(|| fail(eof, "missing `begin`"))?;
        let begin = if let Some(capacity) = text.strip_prefix("begin capacity ") {
            usize::from_str(capacity)
                .map(Begin::Capacity)
                .map_err(|_| fail(line, "invalid capacity"))?
        } else if let Some(slot) = text.strip_prefix("begin from ") {
            Begin::From(parse_slot_ref(slot, slots.len()).map_err(|detail| fail(line, &detail))?)
        } else {
            return Err(fail(line, "expected `begin capacity <n>` or `begin from D<i>`"));
        };

        let mut instructions = Vec::new();
        loop {
            let (line, text) = lines.next().ok_or_else(|| fail(eof, "missing `end`"))?;
            if text == "end" {
                break;
            }
            let operand = text
                .strip_prefix("push ")
                .ok_or_else(|| fail(line, &format!("unknown instruction `{text}`")))?;
            let instruction = parse_push(operand, slots.len()).map_err(|detail| fail(line, &detail))?;
            instructions.push(instruction);
        }
        if let Some((line, _)) = lines.next() {
            return Err(fail(line, "input after `end`"));
        }

        Ok(Program {
            name: unit.to_owned(),
            slots,
            bound,
            begin,
            instructions,
        })
    }
}

fn parse_slot(text: &str) -> std::result::Result<usize, String> {
    text.strip_prefix('D')
        .and_then(|index| usize::from_str(index).ok())
        .ok_or_else(|| format!("malformed slot reference `{text}`"))
}

fn parse_slot_ref(text: &str, slots: usize) -> std::result::Result<usize, String> {
    let index = parse_slot(text)?;
    if index >= slots {
        return Err(format!("slot D{index} is not declared"));
    }
    Ok(index)
}

fn parse_limit(text: &str) -> Option<Option<usize>> {
    match text {
        "?" => Some(None),
        text => usize::from_str(text).ok().map(Some),
    }
}

fn parse_push(operand: &str, slots: usize) -> std::result::Result<Instruction, String> {
    if operand.starts_with('"') {
        let (text, tail) = parse_literal(operand, '"')?;
        if !tail.is_empty() {
            return Err("trailing input after string literal".to_owned());
        }
        return Ok(Instruction::Text(text));
    }
    if operand.starts_with('\'') {
        let (text, tail) = parse_literal(operand, '\'')?;
        let mut chars = text.chars();
        return match (chars.next(), chars.next(), tail.is_empty()) {
            (Some(c), None, true) => Ok(Instruction::Char(c)),
            _ => Err("char literal must hold exactly one character".to_owned()),
        };
    }
    if let Some(code) = operand.strip_prefix('#') {
        return u32::from_str(code)
            .ok()
            .filter(|code| *code < 0x20)
            .and_then(char::from_u32)
            .map(Instruction::Char)
            .ok_or_else(|| format!("invalid control code `#{code}`"));
    }
    parse_slot_ref(operand, slots).map(Instruction::Slot)
}

type Thunk<T> = Box<dyn Fn(&T, &mut String) + Send + Sync>;

enum Start<T: ?Sized> {
    Capacity(usize),
    From(SharedTextModel<T>),
}

/// 由 [`ThunkLoader`] 加载的特化模型。
///
/// # 教案式说明
/// - **契约 (What)**：总是动态模型；长度界取自源码 `bound` 行，与解释执行后端对同一序列的结果一致；
/// - **执行 (How)**：按 `begin` 初始化缓冲（预分配或直接接管首个子模型的输出），随后顺序执行闭包数组；
/// - **风险 (Trade-offs)**：子模型在构造时被闭包捕获，模型存活期间这些子模型也一直存活。
pub struct CompiledTextModel<T: ?Sized> {
    name: Arc<str>,
    start: Start<T>,
    thunks: Box<[Thunk<T>]>,
    bound: LengthBound,
}

impl<T: ?Sized + 'static> CompiledTextModel<T> {
    fn link(program: Program, slots: &[SharedTextModel<T>]) -> Self {
        let start = match program.begin {
            Begin::Capacity(capacity) => Start::Capacity(capacity),
            Begin::From(index) => Start::From(slots[index].clone()),
        };
        let thunks = program
            .instructions
            .into_iter()
            .map(|instruction| -> Thunk<T> {
                match instruction {
                    Instruction::Text(text) => {
                        Box::new(move |_: &T, out: &mut String| out.push_str(&text))
                    }
                    Instruction::Char(c) => Box::new(move |_: &T, out: &mut String| out.push(c)),
                    Instruction::Slot(index) => {
                        let model = slots[index].clone();
                        Box::new(move |target: &T, out: &mut String| {
                            out.push_str(&model.text(target))
                        })
                    }
                }
            })
            .collect();
        Self {
            name: Arc::from(program.name),
            start,
            thunks,
            bound: program.bound,
        }
    }
}

impl<T: ?Sized> CompiledTextModel<T> {
    /// 单元名称。
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T: ?Sized> TextModel<T> for CompiledTextModel<T> {
    fn text(&self, target: &T) -> Cow<'_, str> {
        let mut out = match &self.start {
            Start::Capacity(capacity) => String::with_capacity(*capacity),
            Start::From(first) => first.text(target).into_owned(),
        };
        for thunk in self.thunks.iter() {
            thunk(target, &mut out);
        }
        Cow::Owned(out)
    }

    fn min_length(&self) -> Option<usize> {
        self.bound.min()
    }

    fn max_length(&self) -> Option<usize> {
        self.bound.max()
    }
}

impl<T: ?Sized> fmt::Debug for CompiledTextModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTextModel")
            .field("name", &self.name)
            .field("instructions", &self.thunks.len())
            .field("bound", &self.bound)
            .finish()
    }
}
