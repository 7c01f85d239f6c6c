//! String, integer, and date mutations.
//!
//! Existing values that do not parse are not errors: integers fall back to
//! zero and dates to the current instant, so hand-edited files keep working.
//! Only a date offset that is not an integer is fatal.

use chrono::NaiveDateTime;
use tracing::warn;

use super::date::DatePattern;
use super::number::NumberPattern;
use super::{Entry, Operation, ValueFormat};
use crate::error::{EditError, EditResult};

/// Keyword for the current instant in date values.
pub const NOW: &str = "now";

/// Produces the new textual value of `entry` from the resolved `current`
/// value. `now` stands in for the clock.
pub fn transform(entry: &Entry, current: Option<&str>, now: NaiveDateTime) -> EditResult<String> {
    match entry.format() {
        ValueFormat::Text => Ok(transform_text(entry, current)),
        ValueFormat::Number(pattern) => Ok(transform_integer(entry, pattern, current)),
        ValueFormat::Date(pattern) => transform_date(entry, pattern, current, now),
    }
}

fn transform_text(entry: &Entry, current: Option<&str>) -> String {
    let current = current.unwrap_or_default();
    match entry.operation() {
        Operation::Increment => format!("{current}{}", entry.value().unwrap_or_default()),
        _ => current.to_string(),
    }
}

fn transform_integer(entry: &Entry, pattern: &NumberPattern, current: Option<&str>) -> String {
    let base = match current {
        Some(text) => pattern.parse(text).unwrap_or_else(|| {
            warn!(key = entry.key(), "value is not a number, starting from 0");
            0
        }),
        None => 0,
    };
    let operand = entry.value().and_then(|raw| pattern.parse(raw)).unwrap_or(1);

    let result = match entry.operation() {
        Operation::Increment => base.wrapping_add(operand),
        Operation::Decrement => base.wrapping_sub(operand),
        Operation::Assign | Operation::Delete => base,
    };
    pattern.format(result)
}

fn transform_date(
    entry: &Entry,
    pattern: &DatePattern,
    current: Option<&str>,
    now: NaiveDateTime,
) -> EditResult<String> {
    let text = current.unwrap_or(NOW);
    let base = if text == NOW {
        now
    } else {
        pattern.parse(text).unwrap_or_else(|| {
            warn!(
                key = entry.key(),
                pattern = pattern.source(),
                "value does not match the date pattern, using the current time"
            );
            now
        })
    };

    let result = match entry.operation() {
        Operation::Assign | Operation::Delete => base,
        operation @ (Operation::Increment | Operation::Decrement) => {
            let offset = date_offset(entry)?;
            let offset = if operation == Operation::Decrement {
                offset.checked_neg().ok_or_else(|| out_of_range(entry))?
            } else {
                offset
            };
            entry
                .unit()
                .shift(base, offset)
                .ok_or_else(|| out_of_range(entry))?
        }
    };
    Ok(pattern.format(&result))
}

fn date_offset(entry: &Entry) -> EditResult<i64> {
    let raw = entry.value().ok_or_else(|| EditError::InvalidOperand {
        key: entry.key().to_string(),
        reason: "no offset configured".to_string(),
    })?;
    raw.parse().map_err(|_| EditError::InvalidOperand {
        key: entry.key().to_string(),
        reason: format!("'{raw}' is not an integer"),
    })
}

fn out_of_range(entry: &Entry) -> EditError {
    EditError::InvalidOperand {
        key: entry.key().to_string(),
        reason: format!("shifting by {} leaves the supported date range", entry.unit()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntrySpec, EntryType, Unit};
    use chrono::NaiveDate;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .unwrap()
    }

    fn run(spec: EntrySpec, current: Option<&str>) -> EditResult<String> {
        let entry = spec.validate().expect("valid entry");
        transform(&entry, current, fixed_now())
    }

    #[test]
    fn string_assign_and_append() {
        assert_eq!(run(EntrySpec::new("K").value("v"), Some("v")).unwrap(), "v");
        assert_eq!(run(EntrySpec::new("K").default_value("d"), None).unwrap(), "");
        let append = EntrySpec::new("K").value("-suffix").operation(Operation::Increment);
        assert_eq!(run(append.clone(), Some("base")).unwrap(), "base-suffix");
        assert_eq!(run(append, None).unwrap(), "-suffix");
    }

    #[test]
    fn integer_arithmetic() {
        let inc = EntrySpec::new("N").value("1").kind(EntryType::Integer).operation(Operation::Increment);
        assert_eq!(run(inc.clone(), Some("3")).unwrap(), "4");
        assert_eq!(run(inc, None).unwrap(), "1");

        let dec = EntrySpec::new("N").value("5").kind(EntryType::Integer).operation(Operation::Decrement);
        assert_eq!(run(dec, Some("3")).unwrap(), "-2");

        let assign = EntrySpec::new("N").value("1234").kind(EntryType::Integer);
        assert_eq!(run(assign, Some("1234")).unwrap(), "1,234");
    }

    #[test]
    fn integer_defaults_are_tolerant() {
        let inc = EntrySpec::new("N")
            .default_value("0")
            .kind(EntryType::Integer)
            .operation(Operation::Increment);
        // operand missing -> 1, unparsable base -> 0
        assert_eq!(run(inc.clone(), Some("garbage")).unwrap(), "1");
        let inc = inc.value("lots");
        assert_eq!(run(inc, Some("41")).unwrap(), "42");
    }

    #[test]
    fn integer_pattern_formats_result() {
        let inc = EntrySpec::new("BUILD")
            .value("1")
            .kind(EntryType::Integer)
            .operation(Operation::Increment)
            .pattern("0000");
        assert_eq!(run(inc, Some("0099")).unwrap(), "0100");
    }

    #[test]
    fn date_assign_reformats_or_uses_now() {
        let assign = EntrySpec::new("D").value("now").kind(EntryType::Date);
        assert_eq!(run(assign.clone(), Some("now")).unwrap(), "2024/01/15 08:30");
        assert_eq!(run(assign.clone(), Some("2023/12/24 18:00")).unwrap(), "2023/12/24 18:00");
        // unparsable text falls back to the current time
        assert_eq!(run(assign.clone(), Some("soon")).unwrap(), "2024/01/15 08:30");
        assert_eq!(run(assign, None).unwrap(), "2024/01/15 08:30");
    }

    #[test]
    fn date_offsets_by_unit() {
        let plus_months = EntrySpec::new("EXPIRES_ON")
            .value("12")
            .kind(EntryType::Date)
            .operation(Operation::Increment)
            .unit(Unit::Month)
            .pattern("yyyyMMdd");
        assert_eq!(run(plus_months, Some("20240115")).unwrap(), "20250115");

        let minus_days = EntrySpec::new("D")
            .value("20")
            .kind(EntryType::Date)
            .operation(Operation::Decrement);
        assert_eq!(run(minus_days, Some("now")).unwrap(), "2023/12/26 08:30");

        let plus_hours = EntrySpec::new("D")
            .value("-2")
            .kind(EntryType::Date)
            .operation(Operation::Increment)
            .unit(Unit::Hour);
        assert_eq!(run(plus_hours, None).unwrap(), "2024/01/15 06:30");
    }

    #[test]
    fn date_offsets_keep_fields_of_partial_patterns() {
        let next_month = EntrySpec::new("PERIOD")
            .value("1")
            .kind(EntryType::Date)
            .operation(Operation::Increment)
            .unit(Unit::Month)
            .pattern("yyyyMM");
        assert_eq!(run(next_month, Some("202401")).unwrap(), "202402");

        let next_hour = EntrySpec::new("SLOT")
            .value("1")
            .kind(EntryType::Date)
            .operation(Operation::Increment)
            .unit(Unit::Hour)
            .pattern("yyyy-MM-dd HH");
        assert_eq!(run(next_hour, Some("2024-01-15 10")).unwrap(), "2024-01-15 11");
    }

    #[test]
    fn date_operand_must_be_integer() {
        let spec = EntrySpec::new("D")
            .value("1.5")
            .kind(EntryType::Date)
            .operation(Operation::Increment);
        assert!(matches!(
            run(spec, None),
            Err(EditError::InvalidOperand { key, .. }) if key == "D"
        ));

        let no_operand = EntrySpec::new("D")
            .default_value("now")
            .kind(EntryType::Date)
            .operation(Operation::Increment);
        assert!(matches!(run(no_operand, None), Err(EditError::InvalidOperand { .. })));
    }

    #[test]
    fn date_overflow_is_reported() {
        let spec = EntrySpec::new("D")
            .value(i64::MAX.to_string())
            .kind(EntryType::Date)
            .operation(Operation::Increment)
            .unit(Unit::Year);
        assert!(matches!(run(spec, None), Err(EditError::InvalidOperand { .. })));
    }
}
