//! Reader and writer for the classic `.properties` text format.
//!
//! Files are ISO-8859-1: every byte is one character and anything outside
//! printable ASCII is written back as a `\uXXXX` escape. Keys keep their file
//! order; new keys are appended and deleted keys leave the rest in place.

use std::io::{self, Write};

use indexmap::IndexMap;
use thiserror::Error;

/// Ordered key/value content of one property file.
pub type PropertyMap = IndexMap<String, String>;

#[derive(Debug, Error)]
pub enum PropertiesError {
    #[error("malformed \\uXXXX escape on line {0}")]
    MalformedEscape(usize),
}

/// Parses property text. Later duplicates of a key overwrite the earlier
/// value but keep the first position.
pub fn parse(bytes: &[u8]) -> Result<PropertyMap, PropertiesError> {
    let text: Vec<char> = bytes.iter().map(|&b| char::from(b)).collect();
    let mut map = PropertyMap::new();
    for (line_no, line) in logical_lines(&text) {
        let (key, value) = split_pair(&line);
        let key = unescape(key).ok_or(PropertiesError::MalformedEscape(line_no))?;
        let value = unescape(value).ok_or(PropertiesError::MalformedEscape(line_no))?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Writes `map` with an optional comment block followed by a `#timestamp`
/// line. The output never leaves the single-byte range.
pub fn write<W: Write>(
    out: &mut W,
    map: &PropertyMap,
    comment: Option<&str>,
    timestamp: &str,
) -> io::Result<()> {
    let mut text = String::new();
    if let Some(comment) = comment {
        push_comment(&mut text, comment);
    }
    text.push('#');
    text.push_str(timestamp);
    text.push('\n');

    for (key, value) in map {
        push_escaped(&mut text, key, true);
        text.push('=');
        push_escaped(&mut text, value, false);
        text.push('\n');
    }

    let bytes: Vec<u8> = text.chars().map(|c| c as u8).collect();
    out.write_all(&bytes)
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{c}')
}

/// Joins continuation lines and drops blanks and comments. Each item carries
/// the 1-based number of the line it started on.
fn logical_lines(text: &[char]) -> Vec<(usize, Vec<char>)> {
    let mut lines = Vec::new();
    let mut current: Vec<char> = Vec::new();
    let mut start_line = 1;
    let mut line_no = 1;
    let mut continuing = false;
    let mut pos = 0;

    while pos < text.len() {
        let end = text[pos..]
            .iter()
            .position(|&c| c == '\n' || c == '\r')
            .map_or(text.len(), |offset| pos + offset);
        let natural = &text[pos..end];
        pos = match text.get(end) {
            Some('\r') if text.get(end + 1) == Some(&'\n') => end + 2,
            Some(_) => end + 1,
            None => end,
        };

        let trimmed: &[char] = {
            let skip = natural.iter().take_while(|&&c| is_blank(c)).count();
            &natural[skip..]
        };

        if !continuing {
            start_line = line_no;
            if trimmed.is_empty() || trimmed[0] == '#' || trimmed[0] == '!' {
                line_no += 1;
                continue;
            }
        }
        line_no += 1;

        let trailing = trimmed.iter().rev().take_while(|&&c| c == '\\').count();
        if trailing % 2 == 1 {
            current.extend_from_slice(&trimmed[..trimmed.len() - 1]);
            continuing = true;
        } else {
            current.extend_from_slice(trimmed);
            lines.push((start_line, std::mem::take(&mut current)));
            continuing = false;
        }
    }
    if continuing && !current.is_empty() {
        lines.push((start_line, current));
    }
    lines
}

/// Splits a logical line at the first unescaped `=`, `:` or blank.
fn split_pair(line: &[char]) -> (&[char], &[char]) {
    let mut key_len = 0;
    let mut value_start = line.len();
    let mut has_separator = false;
    let mut escaped = false;

    while key_len < line.len() {
        let c = line[key_len];
        if !escaped && (c == '=' || c == ':') {
            value_start = key_len + 1;
            has_separator = true;
            break;
        }
        if !escaped && is_blank(c) {
            value_start = key_len + 1;
            break;
        }
        escaped = c == '\\' && !escaped;
        key_len += 1;
    }

    while value_start < line.len() {
        let c = line[value_start];
        if is_blank(c) {
            value_start += 1;
        } else if !has_separator && (c == '=' || c == ':') {
            has_separator = true;
            value_start += 1;
        } else {
            break;
        }
    }

    (&line[..key_len], &line[value_start.min(line.len())..])
}

/// Resolves backslash escapes. Works on UTF-16 units so surrogate pairs
/// written as two `\uXXXX` escapes come back as one character.
fn unescape(raw: &[char]) -> Option<String> {
    let mut units: Vec<u16> = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied();
    while let Some(c) = iter.next() {
        if c != '\\' {
            units.push(c as u16);
            continue;
        }
        match iter.next() {
            Some('u') => {
                let mut unit = 0u16;
                for _ in 0..4 {
                    let digit = iter.next()?.to_digit(16)?;
                    unit = (unit << 4) | digit as u16;
                }
                units.push(unit);
            }
            Some('t') => units.push('\t' as u16),
            Some('r') => units.push('\r' as u16),
            Some('n') => units.push('\n' as u16),
            Some('f') => units.push(0x0c),
            Some(other) => units.push(other as u16),
            None => {}
        }
    }
    Some(String::from_utf16_lossy(&units))
}

fn push_unicode_escape(out: &mut String, unit: u16) {
    out.push_str(&format!("\\u{unit:04X}"));
}

fn push_escaped(out: &mut String, text: &str, is_key: bool) {
    for (index, unit) in text.encode_utf16().enumerate() {
        match unit {
            0x5c => out.push_str("\\\\"),
            0x20 if index == 0 || is_key => out.push_str("\\ "),
            0x09 => out.push_str("\\t"),
            0x0a => out.push_str("\\n"),
            0x0d => out.push_str("\\r"),
            0x0c => out.push_str("\\f"),
            0x3d | 0x3a | 0x23 | 0x21 => {
                out.push('\\');
                out.push(char::from(unit as u8));
            }
            0x20..=0x7e => out.push(char::from(unit as u8)),
            _ => push_unicode_escape(out, unit),
        }
    }
}

/// Comment lines start with `#`. Embedded line breaks start a new comment
/// line unless the text already continues with `#` or `!`.
fn push_comment(out: &mut String, comment: &str) {
    let units: Vec<u16> = comment.encode_utf16().collect();
    out.push('#');
    let mut index = 0;
    while index < units.len() {
        let unit = units[index];
        match unit {
            0x0a | 0x0d => {
                out.push('\n');
                if unit == 0x0d && units.get(index + 1) == Some(&0x0a) {
                    index += 1;
                }
                match units.get(index + 1) {
                    Some(&0x23) | Some(&0x21) => {}
                    _ => out.push('#'),
                }
            }
            0x00..=0xff => out.push(char::from(unit as u8)),
            _ => push_unicode_escape(out, unit),
        }
        index += 1;
    }
    out.push('\n');
}
