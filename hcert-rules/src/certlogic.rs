// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! CertLogic: the JsonLogic subset EU business rules are written in.
//!
//! Rule logic is parsed once into an [`Expr`] tree and evaluated by a pure
//! recursive walk over a [`Value`] input. Nothing in the input is mutated.
//!
//! Truthiness: `false`, `null`, `0`, `""`, `[]` and `{}` are falsy, everything
//! else (including date-times) is truthy.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike as _, Duration, Months, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value as Json;

use crate::error::RuleError;

/// Evaluation value. JSON plus a date-time variant produced by `plusTime` and
/// `dccDateOfBirth`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    DateTime(DateTime<Utc>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::DateTime(_) => true,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(a) => Json::Array(a.iter().map(Value::to_json).collect()),
            Value::Object(o) => Json::Object(o.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
            Value::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::DateTime(_) => "date-time",
        }
    }

    /// Dotted path lookup; numeric segments index arrays.
    fn lookup(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(self, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&Json> for Value {
    fn from(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s.clone()),
            Json::Array(a) => Value::Array(a.iter().map(Value::from).collect()),
            Json::Object(o) => Value::Object(o.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    StrictEq,
    StrictNe,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCompareOp {
    Before,
    After,
    NotBefore,
    NotAfter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Year,
    Month,
    Day,
    Hour,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    Var {
        path: String,
        default: Option<Box<Expr>>,
    },
    If {
        guard: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    NotNot(Box<Expr>),
    Compare {
        op: CompareOp,
        operands: Vec<Expr>,
    },
    DateCompare {
        op: DateCompareOp,
        operands: Vec<Expr>,
    },
    In {
        needle: Box<Expr>,
        haystack: Box<Expr>,
    },
    Plus(Vec<Expr>),
    PlusTime {
        operand: Box<Expr>,
        amount: i64,
        unit: TimeUnit,
    },
    Reduce {
        operand: Box<Expr>,
        lambda: Box<Expr>,
        initial: Box<Expr>,
    },
    ExtractFromUvci {
        operand: Box<Expr>,
        index: i64,
    },
    DccDateOfBirth(Box<Expr>),
}

impl Expr {
    pub fn parse(json: &Json) -> Result<Expr, RuleError> {
        match json {
            Json::Array(items) => Ok(Expr::Array(items.iter().map(Expr::parse).collect::<Result<_, _>>()?)),
            Json::Object(map) => {
                let mut entries = map.iter();
                let (Some((op, args)), None) = (entries.next(), entries.next()) else {
                    return Err(RuleError::logic(format!(
                        "operation object must have exactly one key, found {}",
                        map.len()
                    )));
                };
                parse_operation(op, args)
            }
            scalar => Ok(Expr::Literal(Value::from(scalar))),
        }
    }

    pub fn evaluate(&self, data: &Value) -> Result<Value, RuleError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Array(items) => Ok(Value::Array(
                items.iter().map(|e| e.evaluate(data)).collect::<Result<_, _>>()?,
            )),
            Expr::Var { path, default } => {
                let found = if path.is_empty() { Some(data) } else { data.lookup(path) };
                match (found, default) {
                    (Some(v), _) if *v != Value::Null => Ok(v.clone()),
                    (_, Some(default)) => default.evaluate(data),
                    _ => Ok(Value::Null),
                }
            }
            Expr::If { guard, then, otherwise } => {
                if guard.evaluate(data)?.is_truthy() {
                    then.evaluate(data)
                } else {
                    otherwise.evaluate(data)
                }
            }
            Expr::And(operands) => short_circuit(operands, data, false),
            Expr::Or(operands) => short_circuit(operands, data, true),
            Expr::Not(operand) => Ok(Value::Bool(!operand.evaluate(data)?.is_truthy())),
            Expr::NotNot(operand) => Ok(Value::Bool(operand.evaluate(data)?.is_truthy())),
            Expr::Compare { op, operands } => evaluate_compare(*op, operands, data),
            Expr::DateCompare { op, operands } => {
                let dates = operands
                    .iter()
                    .map(|e| e.evaluate(data).and_then(|v| to_date_time(&v)))
                    .collect::<Result<Vec<_>, _>>()?;
                if !(2..=3).contains(&dates.len()) {
                    return Err(RuleError::eval(format!("{op:?} needs 2 or 3 operands, got {}", dates.len())));
                }
                let holds = |a: &DateTime<Utc>, b: &DateTime<Utc>| match op {
                    DateCompareOp::Before => a < b,
                    DateCompareOp::After => a > b,
                    DateCompareOp::NotBefore => a >= b,
                    DateCompareOp::NotAfter => a <= b,
                };
                Ok(Value::Bool(dates.windows(2).all(|w| holds(&w[0], &w[1]))))
            }
            Expr::In { needle, haystack } => {
                let needle = needle.evaluate(data)?;
                match haystack.evaluate(data)? {
                    Value::Array(items) => Ok(Value::Bool(items.iter().any(|item| strict_equals(item, &needle)))),
                    Value::String(s) => match &needle {
                        Value::String(n) => Ok(Value::Bool(s.contains(n.as_str()))),
                        other => Err(RuleError::eval(format!("'in' on a string needs a string, got {}", other.type_name()))),
                    },
                    Value::Null => Ok(Value::Bool(false)),
                    other => Err(RuleError::eval(format!("'in' needs an array, got {}", other.type_name()))),
                }
            }
            Expr::Plus(operands) => {
                let values = operands.iter().map(|e| e.evaluate(data)).collect::<Result<Vec<_>, _>>()?;
                if let Some(bad) = values.iter().find(|v| v.as_f64().is_none()) {
                    return Err(RuleError::eval(format!("'+' needs numbers, got {}", bad.type_name())));
                }
                if values.iter().all(|v| matches!(v, Value::Int(_))) {
                    values
                        .iter()
                        .try_fold(0i64, |acc, v| match v {
                            Value::Int(i) => acc.checked_add(*i),
                            _ => None,
                        })
                        .map(Value::Int)
                        .ok_or_else(|| RuleError::eval("integer overflow in '+'"))
                } else {
                    Ok(Value::Float(values.iter().filter_map(Value::as_f64).sum()))
                }
            }
            Expr::PlusTime { operand, amount, unit } => {
                let base = to_date_time(&operand.evaluate(data)?)?;
                plus_time(base, *amount, *unit).map(Value::DateTime)
            }
            Expr::Reduce {
                operand,
                lambda,
                initial,
            } => {
                let mut accumulator = initial.evaluate(data)?;
                let items = match operand.evaluate(data)? {
                    Value::Null => return Ok(accumulator),
                    Value::Array(items) => items,
                    other => return Err(RuleError::eval(format!("'reduce' needs an array, got {}", other.type_name()))),
                };
                for current in items {
                    let scope = Value::Object(BTreeMap::from([
                        ("accumulator".to_string(), accumulator),
                        ("current".to_string(), current),
                        ("data".to_string(), data.clone()),
                    ]));
                    accumulator = lambda.evaluate(&scope)?;
                }
                Ok(accumulator)
            }
            Expr::ExtractFromUvci { operand, index } => match operand.evaluate(data)? {
                Value::Null => Ok(Value::Null),
                Value::String(uvci) => Ok(extract_from_uvci(&uvci, *index).map_or(Value::Null, |s| Value::String(s.to_string()))),
                other => Err(RuleError::eval(format!(
                    "'extractFromUVCI' needs a string, got {}",
                    other.type_name()
                ))),
            },
            Expr::DccDateOfBirth(operand) => match operand.evaluate(data)? {
                Value::String(dob) => dcc_date_of_birth(&dob).map(Value::DateTime),
                other => Err(RuleError::eval(format!(
                    "'dccDateOfBirth' needs a string, got {}",
                    other.type_name()
                ))),
            },
        }
    }
}

fn parse_operation(op: &str, args: &Json) -> Result<Expr, RuleError> {
    let args: Vec<&Json> = match args {
        Json::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    let parse_all = || args.iter().map(|a| Expr::parse(a)).collect::<Result<Vec<_>, _>>();
    let arity = |allowed: std::ops::RangeInclusive<usize>| {
        if allowed.contains(&args.len()) {
            Ok(())
        } else {
            Err(RuleError::logic(format!("'{op}' takes {allowed:?} operands, got {}", args.len())))
        }
    };

    match op {
        "var" => {
            arity(0..=2)?;
            let path = match args.first() {
                None | Some(Json::Null) => String::new(),
                Some(Json::String(s)) => s.clone(),
                Some(Json::Number(n)) => n.to_string(),
                Some(other) => return Err(RuleError::logic(format!("'var' path must be a string, got {other}"))),
            };
            let default = args.get(1).map(|d| Expr::parse(d)).transpose()?.map(Box::new);
            Ok(Expr::Var { path, default })
        }
        "if" => {
            arity(3..=3)?;
            let mut ops = parse_all()?.into_iter();
            match (ops.next(), ops.next(), ops.next()) {
                (Some(guard), Some(then), Some(otherwise)) => Ok(Expr::If {
                    guard: Box::new(guard),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                }),
                _ => Err(RuleError::logic("'if' takes 3 operands")),
            }
        }
        "and" | "or" => {
            arity(1..=usize::MAX)?;
            let ops = parse_all()?;
            Ok(if op == "and" { Expr::And(ops) } else { Expr::Or(ops) })
        }
        "!" | "!!" => {
            arity(1..=1)?;
            let operand = Box::new(Expr::parse(args[0])?);
            Ok(if op == "!" { Expr::Not(operand) } else { Expr::NotNot(operand) })
        }
        "===" | "!==" => {
            arity(2..=2)?;
            let op = if op == "===" { CompareOp::StrictEq } else { CompareOp::StrictNe };
            Ok(Expr::Compare { op, operands: parse_all()? })
        }
        "<" | ">" | "<=" | ">=" => {
            arity(2..=3)?;
            let op = match op {
                "<" => CompareOp::Lt,
                ">" => CompareOp::Gt,
                "<=" => CompareOp::Le,
                _ => CompareOp::Ge,
            };
            Ok(Expr::Compare { op, operands: parse_all()? })
        }
        "before" | "after" | "not-before" | "not-after" => {
            arity(2..=3)?;
            let op = match op {
                "before" => DateCompareOp::Before,
                "after" => DateCompareOp::After,
                "not-before" => DateCompareOp::NotBefore,
                _ => DateCompareOp::NotAfter,
            };
            Ok(Expr::DateCompare { op, operands: parse_all()? })
        }
        "in" => {
            arity(2..=2)?;
            Ok(Expr::In {
                needle: Box::new(Expr::parse(args[0])?),
                haystack: Box::new(Expr::parse(args[1])?),
            })
        }
        "+" => {
            arity(1..=usize::MAX)?;
            Ok(Expr::Plus(parse_all()?))
        }
        "plusTime" => {
            arity(3..=3)?;
            let amount = args[1]
                .as_i64()
                .ok_or_else(|| RuleError::logic("'plusTime' amount must be an integer literal"))?;
            let unit = match args[2].as_str() {
                Some("year") => TimeUnit::Year,
                Some("month") => TimeUnit::Month,
                Some("day") => TimeUnit::Day,
                Some("hour") => TimeUnit::Hour,
                _ => return Err(RuleError::logic(format!("'plusTime' has unknown unit {}", args[2]))),
            };
            Ok(Expr::PlusTime {
                operand: Box::new(Expr::parse(args[0])?),
                amount,
                unit,
            })
        }
        "reduce" => {
            arity(3..=3)?;
            Ok(Expr::Reduce {
                operand: Box::new(Expr::parse(args[0])?),
                lambda: Box::new(Expr::parse(args[1])?),
                initial: Box::new(Expr::parse(args[2])?),
            })
        }
        "extractFromUVCI" => {
            arity(2..=2)?;
            let index = args[1]
                .as_i64()
                .ok_or_else(|| RuleError::logic("'extractFromUVCI' index must be an integer literal"))?;
            Ok(Expr::ExtractFromUvci {
                operand: Box::new(Expr::parse(args[0])?),
                index,
            })
        }
        "dccDateOfBirth" => {
            arity(1..=1)?;
            Ok(Expr::DccDateOfBirth(Box::new(Expr::parse(args[0])?)))
        }
        unknown => Err(RuleError::logic(format!("unknown operation '{unknown}'"))),
    }
}

/// JsonLogic `and`/`or`: the first operand whose truthiness equals `stop_on`,
/// else the last operand.
fn short_circuit(operands: &[Expr], data: &Value, stop_on: bool) -> Result<Value, RuleError> {
    let mut last = Value::Null;
    for operand in operands {
        last = operand.evaluate(data)?;
        if last.is_truthy() == stop_on {
            break;
        }
    }
    Ok(last)
}

fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn evaluate_compare(op: CompareOp, operands: &[Expr], data: &Value) -> Result<Value, RuleError> {
    let values = operands.iter().map(|e| e.evaluate(data)).collect::<Result<Vec<_>, _>>()?;
    match (op, values.as_slice()) {
        (CompareOp::StrictEq, [a, b]) => return Ok(Value::Bool(strict_equals(a, b))),
        (CompareOp::StrictNe, [a, b]) => return Ok(Value::Bool(!strict_equals(a, b))),
        (CompareOp::StrictEq | CompareOp::StrictNe, _) => {
            return Err(RuleError::eval(format!("{op:?} needs 2 operands, got {}", values.len())))
        }
        (_, [_, _] | [_, _, _]) => {}
        _ => return Err(RuleError::eval(format!("{op:?} needs 2 or 3 operands, got {}", values.len()))),
    }

    let holds = |ord: std::cmp::Ordering| match op {
        CompareOp::Lt => ord.is_lt(),
        CompareOp::Gt => ord.is_gt(),
        CompareOp::Le => ord.is_le(),
        _ => ord.is_ge(),
    };
    let mut result = true;
    for pair in values.windows(2) {
        let ord = match (&pair[0], &pair[1]) {
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x
                    .partial_cmp(&y)
                    .ok_or_else(|| RuleError::eval("cannot compare NaN"))?,
                _ => {
                    return Err(RuleError::eval(format!(
                        "cannot compare {} with {}",
                        a.type_name(),
                        b.type_name()
                    )))
                }
            },
        };
        result &= holds(ord);
    }
    Ok(Value::Bool(result))
}

/// Date-time operands: values from `plusTime`/`dccDateOfBirth`, or strings in
/// RFC 3339, offset-less ISO 8601 (taken as UTC) or plain `YYYY-MM-DD` form.
fn to_date_time(value: &Value) -> Result<DateTime<Utc>, RuleError> {
    match value {
        Value::DateTime(dt) => Ok(*dt),
        Value::String(s) => parse_date_time(s).ok_or_else(|| RuleError::eval(format!("invalid date-time '{s}'"))),
        other => Err(RuleError::eval(format!("expected a date-time, got {}", other.type_name()))),
    }
}

pub(crate) fn parse_date_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn plus_time(base: DateTime<Utc>, amount: i64, unit: TimeUnit) -> Result<DateTime<Utc>, RuleError> {
    let out_of_range = || RuleError::eval(format!("plusTime {amount} {unit:?} out of range"));
    let shift_months = |months: i64| {
        let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
        if months >= 0 {
            base.checked_add_months(Months::new(magnitude))
        } else {
            base.checked_sub_months(Months::new(magnitude))
        }
    };
    match unit {
        TimeUnit::Year => amount.checked_mul(12).and_then(shift_months),
        TimeUnit::Month => shift_months(amount),
        TimeUnit::Day => Duration::try_days(amount).and_then(|d| base.checked_add_signed(d)),
        TimeUnit::Hour => Duration::try_hours(amount).and_then(|d| base.checked_add_signed(d)),
    }
    .ok_or_else(out_of_range)
}

/// Fragment `index` of a UVCI split on `/`, `#` and `:`, after the optional
/// `URN:UVCI:` prefix.
fn extract_from_uvci(uvci: &str, index: i64) -> Option<&str> {
    let body = uvci.strip_prefix("URN:UVCI:").unwrap_or(uvci);
    let index = usize::try_from(index).ok()?;
    body.split(['/', '#', ':']).nth(index)
}

/// Partial DCC birth dates resolve to the latest day they could denote:
/// `YYYY` to Dec 31st, `YYYY-MM` to the last day of that month.
fn dcc_date_of_birth(dob: &str) -> Result<DateTime<Utc>, RuleError> {
    let invalid = || RuleError::eval(format!("invalid date of birth '{dob}'"));
    let date_part = dob.trim().split('T').next().unwrap_or_default();
    let mut parts = date_part.split('-');
    let year: i32 = parts.next().and_then(|y| y.parse().ok()).ok_or_else(invalid)?;
    let month: Option<u32> = parts.next().and_then(|m| m.parse().ok());
    let day: Option<u32> = month.and(parts.next().and_then(|d| d.parse().ok()));

    let date = match (month, day) {
        (Some(m), Some(d)) => NaiveDate::from_ymd_opt(year, m, d),
        (Some(m), None) => last_day_of_month(year, m),
        _ => NaiveDate::from_ymd_opt(year, 12, 31),
    }
    .ok_or_else(invalid)?;
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()).ok_or_else(invalid)
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month.checked_add(1)?, 1)
    }?;
    first_of_next.pred_opt().filter(|d| d.month() == month)
}
