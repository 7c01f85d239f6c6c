//! Decimal patterns for integer entries (`0000`, `#,##0`, `'v'0` ...).
//! Supports digit placeholders, grouping, a fixed fraction width, and quoted
//! or plain literal prefix/suffix text.

/// Grouped, no minimum fraction; the pattern used when none is configured.
pub const DEFAULT_NUMBER_PATTERN: &str = "#,##0.###";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumberPattern {
    prefix: String,
    suffix: String,
    min_int_digits: usize,
    min_frac_digits: usize,
    grouping: usize,
}

impl Default for NumberPattern {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            min_int_digits: 1,
            min_frac_digits: 0,
            grouping: 3,
        }
    }
}

impl NumberPattern {
    /// Compiles a pattern; the negative subpattern after `;` is ignored.
    pub fn compile(pattern: &str) -> Result<Self, String> {
        let positive = pattern.split(';').next().unwrap_or_default();
        let mut prefix = String::new();
        let mut body = String::new();
        let mut suffix = String::new();
        let mut in_quote = false;
        let mut chars = positive.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    push_literal(&body, &mut prefix, &mut suffix, '\'');
                } else {
                    in_quote = !in_quote;
                }
                continue;
            }
            if in_quote {
                push_literal(&body, &mut prefix, &mut suffix, c);
                continue;
            }
            match c {
                '#' | '0' | ',' | '.' => {
                    if !suffix.is_empty() {
                        return Err(format!("digits after suffix in '{pattern}'"));
                    }
                    body.push(c);
                }
                '%' | '\u{2030}' | 'E' | '\u{a4}' | '@' => {
                    return Err(format!("unsupported symbol '{c}' in '{pattern}'"))
                }
                other => push_literal(&body, &mut prefix, &mut suffix, other),
            }
        }
        if in_quote {
            return Err(format!("unterminated quote in '{pattern}'"));
        }

        let (int_part, frac_part) = match body.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (body.as_str(), ""),
        };
        if frac_part.contains(['.', ',']) {
            return Err(format!("malformed fraction in '{pattern}'"));
        }
        if !int_part.contains(['#', '0']) && !frac_part.contains(['#', '0']) {
            return Err(format!("no digit placeholder in '{pattern}'"));
        }

        let grouping = int_part
            .rfind(',')
            .map_or(0, |idx| int_part.len() - idx - 1);

        Ok(Self {
            prefix,
            suffix,
            min_int_digits: int_part.chars().filter(|&c| c == '0').count(),
            min_frac_digits: frac_part.chars().filter(|&c| c == '0').count(),
            grouping,
        })
    }

    pub fn format(&self, value: i64) -> String {
        let mut digits = value.unsigned_abs().to_string();
        if value == 0 && self.min_int_digits == 0 && self.min_frac_digits > 0 {
            digits.clear();
        }
        while digits.len() < self.min_int_digits {
            digits.insert(0, '0');
        }

        let mut out = String::new();
        if value < 0 {
            out.push('-');
        }
        out.push_str(&self.prefix);
        let count = digits.len();
        for (index, digit) in digits.chars().enumerate() {
            out.push(digit);
            let remaining = count - index - 1;
            if self.grouping > 0 && remaining > 0 && remaining % self.grouping == 0 {
                out.push(',');
            }
        }
        if self.min_frac_digits > 0 {
            out.push('.');
            out.push_str(&"0".repeat(self.min_frac_digits));
        }
        out.push_str(&self.suffix);
        out
    }

    /// Lenient parse: reads the longest numeric prefix after the pattern's
    /// prefix and truncates any fraction. `None` when no digit is found or
    /// the value does not fit.
    pub fn parse(&self, text: &str) -> Option<i64> {
        let (negative, rest) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let rest = rest.strip_prefix(self.prefix.as_str())?;

        let mut magnitude: i128 = 0;
        let mut seen_digit = false;
        let mut in_fraction = false;
        for c in rest.chars() {
            match c {
                '0'..='9' => {
                    seen_digit = true;
                    if !in_fraction {
                        magnitude = magnitude * 10 + i128::from(c as u8 - b'0');
                        if magnitude > i128::from(u64::MAX) {
                            return None;
                        }
                    }
                }
                ',' if self.grouping > 0 && !in_fraction => {}
                '.' if !in_fraction => in_fraction = true,
                _ => break,
            }
        }
        if !seen_digit {
            return None;
        }
        let signed = if negative { -magnitude } else { magnitude };
        i64::try_from(signed).ok()
    }
}

fn push_literal(body: &str, prefix: &mut String, suffix: &mut String, c: char) {
    if body.is_empty() {
        prefix.push(c);
    } else {
        suffix.push(c);
    }
}
