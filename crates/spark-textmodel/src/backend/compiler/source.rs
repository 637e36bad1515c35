//! # 合成单元源码
//!
//! ## 核心意图（Why）
//! - 特化编译后端把节点序列展开为一段面向行的直线程序文本 [`UnitSource`]，再交给
//!   [`UnitLoader`](super::loader::UnitLoader) 编译加载；源码是编译器与加载器之间唯一的契约。
//!
//! ## 源码格式（What）
//! ```text
//! unit <名称>
//! slot D<i> <- "<关联键>"         (每个动态节点一行，i 从 0 连续编号)
//! bound <下界|?> <上界|?>
//! begin capacity <n>              (或 begin from D0：首节点为动态节点且无静态文本)
//! push "<字符串字面量>"
//! push '<字符字面量>'
//! push #<码点>                    (码点小于 U+0020 的单字符)
//! push D<i>
//! end
//! ```
//!
//! ## 字面量转义（How）
//! - 字符串字面量：`\\`、`\"`、`\n`、`\r`、`\t`、`\0`，其余控制字符写作 `\u{十六进制}`；
//! - 字符字面量：`\\`、`\'`，U+007F 及以上的控制字符写作 `\u{十六进制}`；
//! - 任何字面量中都不会出现原始控制字符，因此一条指令总是恰好占一行。

use std::{
    borrow::Cow,
    fmt::{self, Write as _},
};

use crate::node::LengthBound;

/// 可被加载器编译的单元源码。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnitSource {
    name: String,
    body: String,
}

impl UnitSource {
    /// 以名称与完整源码文本构造。
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for UnitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

/// 逐条指令写出源码。
pub(crate) struct SourceWriter {
    name: String,
    body: String,
}

impl SourceWriter {
    pub(crate) fn new(name: String) -> Self {
        let mut body = String::with_capacity(128);
        // 写入 String 不会失败。
        let _ = writeln!(body, "unit {name}");
        Self { name, body }
    }

    pub(crate) fn slot(&mut self, index: usize, key: &str) {
        let _ = writeln!(
            self.body,
            "slot D{index} <- \"{}\"",
            escape_string_literal(key)
        );
    }

    pub(crate) fn bound(&mut self, bound: LengthBound) {
        let part = |value: Option<usize>| value.map_or_else(|| "?".to_owned(), |v| v.to_string());
        let _ = writeln!(self.body, "bound {} {}", part(bound.min()), part(bound.max()));
    }

    pub(crate) fn begin_capacity(&mut self, capacity: usize) {
        let _ = writeln!(self.body, "begin capacity {capacity}");
    }

    pub(crate) fn begin_from(&mut self, index: usize) {
        let _ = writeln!(self.body, "begin from D{index}");
    }

    /// 追加静态文本；单字符文本按字符指令写出。
    pub(crate) fn push_text(&mut self, text: &str) {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (None, _) => {}
            (Some(c), None) => self.push_char(c),
            _ => {
                let _ = writeln!(self.body, "push \"{}\"", escape_string_literal(text));
            }
        }
    }

    pub(crate) fn push_char(&mut self, c: char) {
        if c < ' ' {
            let _ = writeln!(self.body, "push #{}", u32::from(c));
        } else {
            let _ = writeln!(self.body, "push '{}'", escape_char_literal(c));
        }
    }

    pub(crate) fn push_slot(&mut self, index: usize) {
        let _ = writeln!(self.body, "push D{index}");
    }

    pub(crate) fn finish(mut self) -> UnitSource {
        self.body.push_str("end\n");
        UnitSource {
            name: self.name,
            body: self.body,
        }
    }
}

/// 按字符串字面量规则转义；无需转义时借用原文。
pub fn escape_string_literal(text: &str) -> Cow<'_, str> {
    if !text
        .chars()
        .any(|c| c == '\\' || c == '"' || c.is_control())
    {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// 按字符字面量规则转义；调用方保证 `c >= ' '`。
pub fn escape_char_literal(c: char) -> String {
    match c {
        '\\' => "\\\\".to_owned(),
        '\'' => "\\'".to_owned(),
        c if c.is_control() => format!("\\u{{{:x}}}", u32::from(c)),
        c => c.to_string(),
    }
}

/// 解析以 `quote` 开头的字面量，返回解码后的内容与剩余输入。
pub(crate) fn parse_literal(input: &str, quote: char) -> Result<(String, &str), String> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if c == quote => {}
        _ => return Err(format!("expected `{quote}`")),
    }
    let mut out = String::new();
    while let Some((index, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((out, &input[index + c.len_utf8()..])),
            '\\' => {
                let escaped = match chars.next() {
                    Some((_, escaped)) => escaped,
                    None => break,
                };
                match escaped {
                    '\\' | '"' | '\'' => out.push(escaped),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    '0' => out.push('\0'),
                    'u' => out.push(parse_unicode_escape(&mut chars)?),
                    other => return Err(format!("unknown escape `\\{other}`")),
                }
            }
            c if c.is_control() => {
                return Err(format!("raw control character U+{:04X} in literal", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    Err("unterminated literal".to_owned())
}

fn parse_unicode_escape(chars: &mut std::str::CharIndices<'_>) -> Result<char, String> {
    if !matches!(chars.next(), Some((_, '{'))) {
        return Err("expected `{` after `\\u`".to_owned());
    }
    let mut digits = String::new();
    loop {
        match chars.next() {
            Some((_, '}')) => break,
            Some((_, digit)) if digit.is_ascii_hexdigit() && digits.len() < 6 => digits.push(digit),
            _ => return Err("malformed `\\u{..}` escape".to_owned()),
        }
    }
    u32::from_str_radix(&digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| format!("invalid code point `{digits}`"))
}
