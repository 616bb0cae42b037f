//! `.properties` 格式解析器
//!
//! 语法：
//! - 行结束符为 `\r\n`、`\n` 或单独的 `\r`
//! - 空行以及以 `#`、`!` 开头的行被忽略
//! - 以奇数个 `\` 结尾的行与下一行相连
//! - 键在第一个未转义的 `=`、`:` 或空白处结束
//! - 转义：`\t \n \r \f \uXXXX`，其他 `\x` 得到 `x`

use crate::error::{MultiEnvError, Result};
use std::io::Read;

const WHITESPACE: [char; 3] = [' ', '\t', '\u{c}'];

/// `.properties` 解析器
pub struct PropertiesParser;

impl PropertiesParser {
    /// 将 properties 文本解析为 `(key, value)` 列表
    ///
    /// 重复的键保留最后一次出现的值，位置取第一次出现处。
    ///
    /// # 错误
    ///
    /// `\u` 转义格式错误时返回 [`MultiEnvError::Parse`]。
    pub fn parse(content: &str) -> Result<Vec<(String, String)>> {
        let mut entries: Vec<(String, String)> = Vec::new();
        let mut lines = physical_lines(content);

        while let Some(line) = lines.next() {
            let trimmed = line.trim_start_matches(WHITESPACE);

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }

            let mut logical = trimmed.to_string();
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some(next) => logical.push_str(next.trim_start_matches(WHITESPACE)),
                    None => break,
                }
            }

            let (raw_key, raw_value) = split_key_value(&logical);
            let key = unescape(raw_key)?;
            let value = unescape(raw_value)?;

            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
        }

        Ok(entries)
    }

    /// 读取整个流并解析
    ///
    /// `origin` 用于错误信息中标识该流。
    ///
    /// # 错误
    ///
    /// 任何 I/O 错误（包括非法 UTF-8）都包装为 [`MultiEnvError::PropertiesRead`]。
    pub fn read<R: Read>(mut reader: R, origin: &str) -> Result<Vec<(String, String)>> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|e| MultiEnvError::properties_read(origin, e))?;

        Self::parse(&content)
    }

    /// 序列化为 `.properties` 文本
    #[must_use]
    pub fn serialize(entries: &[(String, String)]) -> String {
        entries
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k, true), escape(v, false)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 按 `\r\n`、`\n`、`\r` 切分物理行
fn physical_lines(content: &str) -> impl Iterator<Item = &str> {
    let mut rest = content;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find(['\r', '\n']) {
            Some(i) => {
                let line = &rest[..i];
                let terminator = if rest[i..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[i + terminator..];
                Some(line)
            }
            None => {
                let line = rest;
                rest = "";
                Some(line)
            }
        }
    })
}

fn ends_with_continuation(line: &str) -> bool {
    let backslashes = line.chars().rev().take_while(|c| *c == '\\').count();
    backslashes % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches(WHITESPACE);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(WHITESPACE);
    }

    (key, rest)
}

fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    // \u 转义是 UTF-16 码元，代理对由两个转义组成
    let mut units: Vec<u16> = Vec::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            flush_units(&mut units, &mut out, raw)?;
            out.push(c);
            continue;
        }

        let decoded = match chars.next() {
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 || !hex.chars().all(|h| h.is_ascii_hexdigit()) {
                    return Err(MultiEnvError::Parse(format!(
                        "malformed \\uXXXX escape in '{raw}'"
                    )));
                }
                let unit = u16::from_str_radix(&hex, 16)
                    .map_err(|e| MultiEnvError::Parse(format!("bad escape in '{raw}': {e}")))?;
                units.push(unit);
                continue;
            }
            Some('t') => '\t',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('f') => '\u{c}',
            Some(other) => other,
            // 末尾单独的反斜杠丢弃
            None => break,
        };

        flush_units(&mut units, &mut out, raw)?;
        out.push(decoded);
    }

    flush_units(&mut units, &mut out, raw)?;
    Ok(out)
}

fn flush_units(units: &mut Vec<u16>, out: &mut String, raw: &str) -> Result<()> {
    if units.is_empty() {
        return Ok(());
    }
    for decoded in char::decode_utf16(units.drain(..)) {
        let ch = decoded.map_err(|_| {
            MultiEnvError::Parse(format!("unpaired surrogate in \\u escape in '{raw}'"))
        })?;
        out.push(ch);
    }
    Ok(())
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}
