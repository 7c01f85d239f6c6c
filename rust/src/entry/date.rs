//! Date patterns in the letter syntax build files already use
//! (`yyyy/MM/dd HH:mm`, `yyyyMMdd`), compiled to chrono format strings.
//!
//! Parsing is lenient about missing fields: whatever the pattern does not
//! mention is taken from 1970-01-01 00:00:00.000, so `yyyyMM` or `MM/dd`
//! values still parse to a full instant.

use chrono::format::{self, Item, ParseResult, Parsed, StrftimeItems};
use chrono::{Local, NaiveDateTime, TimeZone};

pub const DEFAULT_DATE_PATTERN: &str = "yyyy/MM/dd HH:mm";

/// Calendar fields a pattern sets when parsing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Fields {
    year: bool,
    month: bool,
    day: bool,
    day_of_year: bool,
    hour: bool,
    hour12: bool,
    am_pm: bool,
    minute: bool,
    second: bool,
    millis: bool,
    zone: bool,
}

impl Fields {
    fn note(&mut self, letter: char) {
        match letter {
            'y' => self.year = true,
            'M' | 'L' => self.month = true,
            'd' => self.day = true,
            'D' => self.day_of_year = true,
            'H' => self.hour = true,
            'h' => self.hour12 = true,
            'a' => self.am_pm = true,
            'm' => self.minute = true,
            's' => self.second = true,
            'S' => self.millis = true,
            'z' | 'Z' => self.zone = true,
            _ => {}
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatePattern {
    source: String,
    strftime: String,
    fields: Fields,
}

impl DatePattern {
    pub fn compile(pattern: &str) -> Result<Self, String> {
        let mut strftime = String::new();
        let mut fields = Fields::default();
        let chars: Vec<char> = pattern.chars().collect();
        let mut index = 0;

        while index < chars.len() {
            let c = chars[index];
            if c == '\'' {
                if chars.get(index + 1) == Some(&'\'') {
                    strftime.push('\'');
                    index += 2;
                    continue;
                }
                let close = chars[index + 1..]
                    .iter()
                    .position(|&q| q == '\'')
                    .ok_or_else(|| format!("unterminated quote in '{pattern}'"))?;
                for &literal in &chars[index + 1..index + 1 + close] {
                    push_literal(&mut strftime, literal);
                }
                index += close + 2;
                continue;
            }
            if !c.is_ascii_alphabetic() {
                push_literal(&mut strftime, c);
                index += 1;
                continue;
            }

            let run = chars[index..].iter().take_while(|&&x| x == c).count();
            let spec = field_spec(c, run)
                .ok_or_else(|| format!("unsupported pattern letter '{c}' in '{pattern}'"))?;
            strftime.push_str(spec);
            fields.note(c);
            index += run;
        }

        if StrftimeItems::new(&strftime).any(|item| matches!(item, Item::Error)) {
            return Err(format!("cannot translate date pattern '{pattern}'"));
        }
        Ok(Self {
            source: pattern.to_string(),
            strftime,
            fields,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders `instant`. Zone letters render the local offset in effect at
    /// that instant.
    pub fn format(&self, instant: &NaiveDateTime) -> String {
        if self.fields.zone {
            let local = Local
                .from_local_datetime(instant)
                .earliest()
                .unwrap_or_else(|| Local.from_utc_datetime(instant));
            return local.format(&self.strftime).to_string();
        }
        instant.format(&self.strftime).to_string()
    }

    /// Parses `text`, filling absent fields from the epoch. A parsed `Z`
    /// offset is converted to local time. `None` when the text does not match.
    pub fn parse(&self, text: &str) -> Option<NaiveDateTime> {
        let mut parsed = Parsed::new();
        format::parse(&mut parsed, text.trim(), StrftimeItems::new(&self.strftime)).ok()?;
        self.fill_defaults(&mut parsed).ok()?;

        if self.fields.zone {
            if let Ok(instant) = parsed.to_datetime() {
                return Some(instant.with_timezone(&Local).naive_local());
            }
        }
        let date = parsed.to_naive_date().ok()?;
        let time = parsed.to_naive_time().ok()?;
        Some(date.and_time(time))
    }

    fn fill_defaults(&self, parsed: &mut Parsed) -> ParseResult<()> {
        let fields = self.fields;
        if !fields.year {
            parsed.set_year(1970)?;
        }
        if !fields.day_of_year {
            if !fields.month {
                parsed.set_month(1)?;
            }
            if !fields.day {
                parsed.set_day(1)?;
            }
        }
        match (fields.hour, fields.hour12, fields.am_pm) {
            (false, false, false) => parsed.set_hour(0)?,
            // a lone AM/PM marker means 00:00 or 12:00
            (false, false, true) => parsed.set_hour12(12)?,
            (false, true, false) => parsed.set_ampm(false)?,
            _ => {}
        }
        if !fields.minute {
            parsed.set_minute(0)?;
        }
        if !fields.second {
            parsed.set_second(0)?;
        }
        if !fields.millis {
            parsed.set_nanosecond(0)?;
        }
        Ok(())
    }
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

fn field_spec(letter: char, run: usize) -> Option<&'static str> {
    let spec = match (letter, run) {
        ('G', _) => "AD",
        ('y', 2) => "%y",
        ('y', _) => "%Y",
        ('M' | 'L', 1) => "%-m",
        ('M' | 'L', 2) => "%m",
        ('M' | 'L', 3) => "%b",
        ('M' | 'L', _) => "%B",
        ('d', 1) => "%-d",
        ('d', _) => "%d",
        ('H', 1) => "%-H",
        ('H', _) => "%H",
        ('h', 1) => "%-I",
        ('h', _) => "%I",
        ('m', 1) => "%-M",
        ('m', _) => "%M",
        ('s', 1) => "%-S",
        ('s', _) => "%S",
        ('S', _) => "%3f",
        ('a', _) => "%p",
        ('E', 1..=3) => "%a",
        ('E', _) => "%A",
        ('u', _) => "%u",
        ('D', 1 | 2) => "%-j",
        ('D', _) => "%j",
        ('z', _) => "%Z",
        ('Z', _) => "%z",
        _ => return None,
    };
    Some(spec)
}
