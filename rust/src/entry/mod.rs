//! Configured key mutations.
//!
//! An [`EntrySpec`] is the raw, possibly inconsistent configuration of one
//! entry as it arrives from a job file or the command line. [`EntrySpec::validate`]
//! checks it once and produces an immutable [`Entry`] whose pattern is already
//! compiled, so nothing downstream has to re-check attribute combinations.

pub mod date;
pub mod number;
pub mod resolve;
pub mod transform;

use chrono::{Months, NaiveDateTime, TimeDelta};
use serde::Deserialize;

use crate::error::{EditError, EditResult};
use crate::keyword::keyword_enum;

use self::date::{DatePattern, DEFAULT_DATE_PATTERN};
use self::number::{NumberPattern, DEFAULT_NUMBER_PATTERN};

keyword_enum! {
    /// What an entry does to its key.
    pub enum Operation: "operation", default = Assign {
        Increment => "+",
        Decrement => "-",
        Assign => "=",
        Delete => "del",
    }
}

keyword_enum! {
    /// How an entry's value is interpreted.
    pub enum EntryType: "type", default = String {
        Integer => "int",
        Date => "date",
        String => "string",
    }
}

keyword_enum! {
    /// Calendar field shifted by date `+`/`-` operations.
    pub enum Unit: "unit", default = Day {
        Millisecond => "millisecond",
        Second => "second",
        Minute => "minute",
        Hour => "hour",
        Day => "day",
        Week => "week",
        Month => "month",
        Year => "year",
    }
}

impl Unit {
    /// Moves `instant` by `amount` units. Month and year steps clamp to the
    /// last day of a shorter month. `None` if the result is out of range.
    pub fn shift(self, instant: NaiveDateTime, amount: i64) -> Option<NaiveDateTime> {
        let delta = match self {
            Unit::Millisecond => TimeDelta::try_milliseconds(amount)?,
            Unit::Second => TimeDelta::try_seconds(amount)?,
            Unit::Minute => TimeDelta::try_minutes(amount)?,
            Unit::Hour => TimeDelta::try_hours(amount)?,
            Unit::Day => TimeDelta::try_days(amount)?,
            Unit::Week => TimeDelta::try_weeks(amount)?,
            Unit::Month => return shift_months(instant, amount),
            Unit::Year => return shift_months(instant, amount.checked_mul(12)?),
        };
        instant.checked_add_signed(delta)
    }
}

fn shift_months(instant: NaiveDateTime, amount: i64) -> Option<NaiveDateTime> {
    let months = Months::new(u32::try_from(amount.unsigned_abs()).ok()?);
    if amount < 0 {
        instant.checked_sub_months(months)
    } else {
        instant.checked_add_months(months)
    }
}

/// Unvalidated configuration of one entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntrySpec {
    pub key: Option<String>,
    pub value: Option<String>,
    pub default: Option<String>,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub operation: Operation,
    pub pattern: Option<String>,
    pub unit: Unit,
}

impl EntrySpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn kind(mut self, kind: EntryType) -> Self {
        self.kind = kind;
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// Checks the attribute combination and compiles the pattern.
    pub fn validate(&self) -> EditResult<Entry> {
        let key = match self.key.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Err(EditError::Validation("key is mandatory".to_string())),
        };

        if self.kind == EntryType::String && self.operation == Operation::Decrement {
            return Err(EditError::Validation(format!(
                "- is not supported for string properties (key: {key})"
            )));
        }
        if self.value.is_none() && self.default.is_none() && self.operation != Operation::Delete {
            return Err(EditError::Validation(format!(
                "\"value\" and/or \"default\" must be specified (key: {key})"
            )));
        }

        let format = match self.kind {
            EntryType::String => {
                if self.pattern.is_some() {
                    return Err(EditError::Validation(format!(
                        "pattern is not supported for string properties (key: {key})"
                    )));
                }
                ValueFormat::Text
            }
            EntryType::Integer => {
                let source = self.pattern.as_deref().unwrap_or(DEFAULT_NUMBER_PATTERN);
                let pattern = NumberPattern::compile(source)
                    .map_err(|reason| EditError::Validation(format!("{reason} (key: {key})")))?;
                ValueFormat::Number(pattern)
            }
            EntryType::Date => {
                let source = self.pattern.as_deref().unwrap_or(DEFAULT_DATE_PATTERN);
                let pattern = DatePattern::compile(source)
                    .map_err(|reason| EditError::Validation(format!("{reason} (key: {key})")))?;
                ValueFormat::Date(pattern)
            }
        };

        Ok(Entry {
            key,
            value: self.value.clone(),
            default: self.default.clone(),
            operation: self.operation,
            unit: self.unit,
            format,
        })
    }
}

/// How values of a validated entry are parsed and rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueFormat {
    Text,
    Number(NumberPattern),
    Date(DatePattern),
}

/// A validated entry. Immutable; the computed value is returned by the
/// editor rather than stored here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    key: String,
    value: Option<String>,
    default: Option<String>,
    operation: Operation,
    unit: Unit,
    format: ValueFormat,
}

impl Entry {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The configured value: the assignment for `=`, the operand otherwise.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn format(&self) -> &ValueFormat {
        &self.format
    }

    pub fn kind(&self) -> EntryType {
        match self.format {
            ValueFormat::Text => EntryType::String,
            ValueFormat::Number(_) => EntryType::Integer,
            ValueFormat::Date(_) => EntryType::Date,
        }
    }
}
