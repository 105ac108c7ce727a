//! Behaviour of the predefined members declared in `dynq_core::builtins`.

use std::cmp::Ordering;

use dynq_core::builtins::Builtin;
use dynq_core::types::Method;
use dynq_core::{Type, Value};
use rust_decimal::{Decimal, RoundingStrategy};
use time::{Date, Duration, Month, PrimitiveDateTime, Time};

use crate::compare::compare_values;
use crate::error::EvalError;
use crate::numeric;

fn expect_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, EvalError> {
    value
        .as_str()
        .ok_or_else(|| EvalError::type_error(format!("{} expects a String", what)))
}

fn expect_i32(value: &Value, what: &str) -> Result<i32, EvalError> {
    match value {
        Value::Int32(v) => Ok(*v),
        _ => Err(EvalError::type_error(format!("{} expects an Int32", what))),
    }
}

fn expect_arg<'a>(args: &'a [Value], index: usize) -> Result<&'a Value, EvalError> {
    args.get(index).ok_or(EvalError::Arity {
        expected: index + 1,
        actual: args.len(),
    })
}

fn date_time(value: &Value) -> Result<PrimitiveDateTime, EvalError> {
    match value {
        Value::DateTime(dt) => Ok(*dt),
        _ => Err(EvalError::type_error("expected a DateTime")),
    }
}

fn time_span(value: &Value) -> Result<Duration, EvalError> {
    match value {
        Value::TimeSpan(d) => Ok(*d),
        _ => Err(EvalError::type_error("expected a TimeSpan")),
    }
}

fn char_len(s: &str) -> i32 {
    i32::try_from(s.chars().count()).unwrap_or(i32::MAX)
}

fn as_index(i: i32, len: usize) -> Result<usize, EvalError> {
    usize::try_from(i)
        .ok()
        .filter(|i| *i <= len)
        .ok_or(EvalError::IndexOutOfRange {
            index: i64::from(i),
            len,
        })
}

// ──────────────────────────────────────────────
// Properties
// ──────────────────────────────────────────────

/// Reads a builtin property of `this`.
pub fn get_property(builtin: Builtin, this: &Value) -> Result<Value, EvalError> {
    use Builtin::*;
    let value = match builtin {
        StringLength => Value::Int32(char_len(expect_str(this, "Length")?)),
        DateTimeYear => Value::Int32(date_time(this)?.year()),
        DateTimeMonth => Value::Int32(i32::from(u8::from(date_time(this)?.month()))),
        DateTimeDay => Value::Int32(i32::from(date_time(this)?.day())),
        DateTimeHour => Value::Int32(i32::from(date_time(this)?.hour())),
        DateTimeMinute => Value::Int32(i32::from(date_time(this)?.minute())),
        DateTimeSecond => Value::Int32(i32::from(date_time(this)?.second())),
        DateTimeDate => Value::DateTime(date_time(this)?.date().midnight()),
        TimeSpanDays => Value::Int32(time_span(this)?.whole_days() as i32),
        TimeSpanHours => Value::Int32((time_span(this)?.whole_hours() % 24) as i32),
        TimeSpanMinutes => Value::Int32((time_span(this)?.whole_minutes() % 60) as i32),
        TimeSpanSeconds => Value::Int32((time_span(this)?.whole_seconds() % 60) as i32),
        TimeSpanTotalDays => Value::Double(time_span(this)?.as_seconds_f64() / 86_400.0),
        TimeSpanTotalHours => Value::Double(time_span(this)?.as_seconds_f64() / 3_600.0),
        TimeSpanTotalMinutes => Value::Double(time_span(this)?.as_seconds_f64() / 60.0),
        TimeSpanTotalSeconds => Value::Double(time_span(this)?.as_seconds_f64()),
        NullableHasValue => Value::Boolean(!this.is_null()),
        NullableValue => {
            if this.is_null() {
                return Err(EvalError::NullableNoValue);
            }
            this.clone()
        }
        ListCount => {
            let items = this
                .items()
                .ok_or_else(|| EvalError::type_error("Count expects a sequence"))?;
            Value::Int32(i32::try_from(items.len()).map_err(|_| EvalError::overflow("Count"))?)
        }
        GroupingKey => match this {
            Value::Group(g) => g.key.clone(),
            _ => return Err(EvalError::type_error("Key expects a grouping")),
        },
        other => {
            return Err(EvalError::type_error(format!(
                "{:?} is not a property",
                other
            )))
        }
    };
    Ok(value)
}

// ──────────────────────────────────────────────
// Methods
// ──────────────────────────────────────────────

/// Invokes a builtin method. `this` is `None` for static methods.
pub fn call(
    builtin: Builtin,
    method: &Method,
    this: Option<&Value>,
    args: &[Value],
) -> Result<Value, EvalError> {
    let receiver = || {
        this.ok_or_else(|| EvalError::type_error(format!("'{}' needs an instance", method.name)))
    };
    let value = match builtin {
        Builtin::ToString => Value::String(receiver()?.to_string()),
        Builtin::StringChars => {
            let s = expect_str(receiver()?, "indexer")?;
            let i = expect_i32(expect_arg(args, 0)?, "indexer")?;
            let len = s.chars().count();
            usize::try_from(i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(Value::Char)
                .ok_or(EvalError::IndexOutOfRange {
                    index: i64::from(i),
                    len,
                })?
        }
        Builtin::StringContains | Builtin::StringStartsWith | Builtin::StringEndsWith => {
            let s = expect_str(receiver()?, &method.name)?;
            let arg = expect_arg(args, 0)?;
            if arg.is_null() {
                return Err(EvalError::invalid_argument(format!(
                    "{} argument is null",
                    method.name
                )));
            }
            let needle = expect_str(arg, &method.name)?;
            Value::Boolean(match builtin {
                Builtin::StringContains => s.contains(needle),
                Builtin::StringStartsWith => s.starts_with(needle),
                _ => s.ends_with(needle),
            })
        }
        Builtin::StringIndexOf => {
            let s = expect_str(receiver()?, "IndexOf")?;
            let needle = expect_str(expect_arg(args, 0)?, "IndexOf")?;
            let index = s.find(needle).map(|b| char_len(&s[..b])).unwrap_or(-1);
            Value::Int32(index)
        }
        Builtin::StringToUpper => {
            Value::String(expect_str(receiver()?, "ToUpper")?.to_uppercase())
        }
        Builtin::StringToLower => {
            Value::String(expect_str(receiver()?, "ToLower")?.to_lowercase())
        }
        Builtin::StringTrim => {
            Value::String(expect_str(receiver()?, "Trim")?.trim().to_owned())
        }
        Builtin::StringSubstring => {
            let s = expect_str(receiver()?, "Substring")?;
            let chars: Vec<char> = s.chars().collect();
            let start = as_index(expect_i32(expect_arg(args, 0)?, "Substring")?, chars.len())?;
            let end = match args.get(1) {
                Some(len) => {
                    let len = expect_i32(len, "Substring")?;
                    as_index(len, chars.len() - start).map(|len| start + len)?
                }
                None => chars.len(),
            };
            Value::String(chars[start..end].iter().collect())
        }
        Builtin::StringReplace => {
            let s = expect_str(receiver()?, "Replace")?;
            let from = expect_str(expect_arg(args, 0)?, "Replace")?;
            if from.is_empty() {
                return Err(EvalError::invalid_argument("Replace: old value is empty"));
            }
            let to = expect_arg(args, 1)?.as_str().unwrap_or_default();
            Value::String(s.replace(from, to))
        }
        Builtin::StringConcat => Value::String(args.iter().map(|a| a.to_string()).collect()),
        Builtin::StringCompare => {
            let (l, r) = (expect_arg(args, 0)?, expect_arg(args, 1)?);
            Value::Int32(match compare_values(l, r)? {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            })
        }
        Builtin::StringIsNullOrEmpty => {
            let arg = expect_arg(args, 0)?;
            Value::Boolean(arg.as_str().map_or(true, str::is_empty))
        }
        Builtin::MathAbs => math_abs(expect_arg(args, 0)?)?,
        Builtin::MathMin | Builtin::MathMax => {
            let (l, r) = (expect_arg(args, 0)?, expect_arg(args, 1)?);
            let ordering = compare_values(l, r)?;
            let pick_left = match builtin {
                Builtin::MathMin => ordering != Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            if pick_left {
                l.clone()
            } else {
                r.clone()
            }
        }
        Builtin::MathRound => {
            let digits = match args.get(1) {
                Some(d) => expect_i32(d, "Round")?,
                None => 0,
            };
            math_round(expect_arg(args, 0)?, digits)?
        }
        Builtin::MathFloor | Builtin::MathCeiling => {
            let up = builtin == Builtin::MathCeiling;
            match expect_arg(args, 0)? {
                Value::Double(v) => Value::Double(if up { v.ceil() } else { v.floor() }),
                Value::Decimal(d) => Value::Decimal(if up { d.ceil() } else { d.floor() }),
                other => {
                    return Err(EvalError::type_error(format!(
                        "{} is not defined for {}",
                        method.name,
                        other.type_name()
                    )))
                }
            }
        }
        Builtin::MathPow => match (expect_arg(args, 0)?, expect_arg(args, 1)?) {
            (Value::Double(x), Value::Double(y)) => Value::Double(x.powf(*y)),
            _ => return Err(EvalError::type_error("Pow expects Double arguments")),
        },
        Builtin::MathSqrt => match expect_arg(args, 0)? {
            Value::Double(x) => Value::Double(x.sqrt()),
            _ => return Err(EvalError::type_error("Sqrt expects a Double")),
        },
        Builtin::ConvertTo => {
            let from = method.params.first().cloned().unwrap_or(Type::Object);
            convert_to(expect_arg(args, 0)?, &from, &method.ret)?
        }
        other => {
            return Err(EvalError::type_error(format!(
                "{:?} is not a method",
                other
            )))
        }
    };
    Ok(value)
}

fn math_abs(value: &Value) -> Result<Value, EvalError> {
    let v = match value {
        Value::Int32(v) => Value::Int32(
            v.checked_abs()
                .ok_or_else(|| EvalError::overflow("Abs of Int32.MinValue"))?,
        ),
        Value::Int64(v) => Value::Int64(
            v.checked_abs()
                .ok_or_else(|| EvalError::overflow("Abs of Int64.MinValue"))?,
        ),
        Value::Single(v) => Value::Single(v.abs()),
        Value::Double(v) => Value::Double(v.abs()),
        Value::Decimal(d) => Value::Decimal(d.abs()),
        other => {
            return Err(EvalError::type_error(format!(
                "Abs is not defined for {}",
                other.type_name()
            )))
        }
    };
    Ok(v)
}

/// Rounds half to even, like banker's rounding.
fn math_round(value: &Value, digits: i32) -> Result<Value, EvalError> {
    match value {
        Value::Double(v) => {
            if !(0..=15).contains(&digits) {
                return Err(EvalError::invalid_argument("Round digits must be 0 to 15"));
            }
            let scale = 10f64.powi(digits);
            Ok(Value::Double((v * scale).round_ties_even() / scale))
        }
        Value::Decimal(d) => {
            let digits = u32::try_from(digits)
                .ok()
                .filter(|d| *d <= 28)
                .ok_or_else(|| EvalError::invalid_argument("Round digits must be 0 to 28"))?;
            Ok(Value::Decimal(d.round_dp_with_strategy(
                digits,
                RoundingStrategy::MidpointNearestEven,
            )))
        }
        other => Err(EvalError::type_error(format!(
            "Round is not defined for {}",
            other.type_name()
        ))),
    }
}

/// `Convert.ToXxx`: parses strings, rounds reals to even before
/// narrowing to integers, and always checks the range.
fn convert_to(value: &Value, from: &Type, to: &Type) -> Result<Value, EvalError> {
    if *to == Type::String {
        return Ok(Value::String(value.to_string()));
    }
    if value.is_null() {
        return Ok(numeric::zero(to));
    }
    let format_error = || EvalError::invalid_argument(format!("'{}' is not a valid {}", value, to));
    let value = match value {
        Value::String(s) => {
            let s = s.trim();
            match to {
                Type::Int32 => Value::Int32(s.parse().map_err(|_| format_error())?),
                Type::Int64 => Value::Int64(s.parse().map_err(|_| format_error())?),
                Type::Double => Value::Double(s.parse().map_err(|_| format_error())?),
                Type::Decimal => Value::Decimal(
                    s.parse::<Decimal>()
                        .or_else(|_| Decimal::from_scientific(s))
                        .map_err(|_| format_error())?,
                ),
                _ => return Err(format_error()),
            }
        }
        Value::Boolean(b) => {
            numeric::convert(&Value::Int32(i32::from(*b)), &Type::Int32, to, true)?
        }
        Value::Single(v) if to.is_integral() => {
            let rounded = Value::Double(f64::from(*v).round_ties_even());
            numeric::convert(&rounded, &Type::Double, to, true)?
        }
        Value::Double(v) if to.is_integral() => {
            numeric::convert(&Value::Double(v.round_ties_even()), &Type::Double, to, true)?
        }
        Value::Decimal(d) if to.is_integral() => numeric::convert(
            &Value::Decimal(d.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)),
            &Type::Decimal,
            to,
            true,
        )?,
        other => numeric::convert(other, from, to, true)?,
    };
    Ok(value)
}

// ──────────────────────────────────────────────
// Constructors
// ──────────────────────────────────────────────

/// Runs a builtin constructor producing a value of `ty`.
pub fn construct(builtin: Builtin, ty: &Type, args: &[Value]) -> Result<Value, EvalError> {
    let ints = args
        .iter()
        .map(|a| expect_i32(a, "constructor"))
        .collect::<Result<Vec<i32>, _>>();
    let value = match builtin {
        Builtin::DateTimeNew => {
            let (y, mo, d, h, mi, s) = match ints?.as_slice() {
                &[y, mo, d] => (y, mo, d, 0, 0, 0),
                &[y, mo, d, h, mi, s] => (y, mo, d, h, mi, s),
                other => {
                    return Err(EvalError::Arity {
                        expected: 6,
                        actual: other.len(),
                    })
                }
            };
            let invalid = || EvalError::invalid_argument("DateTime components are out of range");
            let month = u8::try_from(mo)
                .ok()
                .and_then(|m| Month::try_from(m).ok())
                .ok_or_else(invalid)?;
            let small = |v: i32| u8::try_from(v).map_err(|_| invalid());
            let date = Date::from_calendar_date(y, month, small(d)?).map_err(|_| invalid())?;
            let time = Time::from_hms(small(h)?, small(mi)?, small(s)?).map_err(|_| invalid())?;
            Value::DateTime(PrimitiveDateTime::new(date, time))
        }
        Builtin::TimeSpanNew => {
            let &[h, m, s] = ints?.as_slice() else {
                return Err(EvalError::Arity {
                    expected: 3,
                    actual: args.len(),
                });
            };
            let seconds = i64::from(h) * 3_600 + i64::from(m) * 60 + i64::from(s);
            Value::TimeSpan(Duration::seconds(seconds))
        }
        Builtin::DecimalNew => {
            let arg = expect_arg(args, 0)?;
            numeric::convert(arg, &arg.natural_type(), &Type::Decimal, true)?
        }
        Builtin::ObjectNew => match ty {
            Type::Class(class) => class.instantiate(args.to_vec()),
            other => {
                return Err(EvalError::type_error(format!(
                    "cannot construct {}",
                    other
                )))
            }
        },
        other => {
            return Err(EvalError::type_error(format!(
                "{:?} is not a constructor",
                other
            )))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynq_core::builtins::{find_property, MATH};
    use time::macros::datetime;

    fn math(name: &str, params: Vec<Type>) -> Method {
        let members = MATH.members();
        members
            .methods
            .iter()
            .find(|m| m.name == name && m.params == params)
            .map(|m| (**m).clone())
            .unwrap()
    }

    #[test]
    fn substring_counts_chars() {
        let method = Method {
            name: "Substring".into(),
            params: vec![Type::Int32, Type::Int32],
            ret: Type::String,
            is_static: false,
            body: dynq_core::types::Callable::Builtin(Builtin::StringSubstring),
        };
        let s = Value::from("héllo");
        let v = call(
            Builtin::StringSubstring,
            &method,
            Some(&s),
            &[Value::Int32(1), Value::Int32(3)],
        )
        .unwrap();
        assert_eq!(v, Value::from("éll"));

        let err = call(
            Builtin::StringSubstring,
            &method,
            Some(&s),
            &[Value::Int32(4), Value::Int32(3)],
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::IndexOutOfRange { .. }));
    }

    #[test]
    fn round_is_bankers() {
        let method = math("Round", vec![Type::Double]);
        let v = call(Builtin::MathRound, &method, None, &[Value::Double(2.5)]).unwrap();
        assert_eq!(v, Value::Double(2.0));
        let method = math("Round", vec![Type::Decimal, Type::Int32]);
        let v = call(
            Builtin::MathRound,
            &method,
            None,
            &[Value::Decimal(Decimal::new(1235, 3)), Value::Int32(2)],
        )
        .unwrap();
        assert_eq!(v, Value::Decimal(Decimal::new(124, 2)));
    }

    #[test]
    fn abs_of_min_value_overflows() {
        let method = math("Abs", vec![Type::Int32]);
        let err = call(Builtin::MathAbs, &method, None, &[Value::Int32(i32::MIN)]).unwrap_err();
        assert!(matches!(err, EvalError::Overflow { .. }));
    }

    #[test]
    fn date_parts() {
        let dt = Value::DateTime(datetime!(2024-02-29 13:45:10));
        assert_eq!(
            get_property(Builtin::DateTimeMonth, &dt).unwrap(),
            Value::Int32(2)
        );
        assert_eq!(
            get_property(Builtin::DateTimeDate, &dt).unwrap(),
            Value::DateTime(datetime!(2024-02-29 0:00))
        );
    }

    #[test]
    fn invalid_date_is_rejected() {
        let args = [Value::Int32(2023), Value::Int32(2), Value::Int32(29)];
        let err = construct(Builtin::DateTimeNew, &Type::DateTime, &args).unwrap_err();
        assert!(matches!(err, EvalError::InvalidArgument { .. }));
    }

    #[test]
    fn time_span_components() {
        let args = [Value::Int32(26), Value::Int32(30), Value::Int32(15)];
        let span = construct(Builtin::TimeSpanNew, &Type::TimeSpan, &args).unwrap();
        assert_eq!(get_property(Builtin::TimeSpanDays, &span).unwrap(), Value::Int32(1));
        assert_eq!(get_property(Builtin::TimeSpanHours, &span).unwrap(), Value::Int32(2));
        assert_eq!(
            get_property(Builtin::TimeSpanTotalMinutes, &span).unwrap(),
            Value::Double(1590.25)
        );
    }

    #[test]
    fn nullable_value_of_null_fails() {
        let prop = find_property(&Type::nullable(Type::Int32), "Value", false).unwrap();
        assert!(matches!(
            prop.getter,
            dynq_core::types::Getter::Builtin(Builtin::NullableValue)
        ));
        assert_eq!(
            get_property(Builtin::NullableValue, &Value::Null),
            Err(EvalError::NullableNoValue)
        );
    }

    #[test]
    fn convert_parses_strings() {
        assert_eq!(
            convert_to(&Value::from(" 42 "), &Type::String, &Type::Int32).unwrap(),
            Value::Int32(42)
        );
        assert!(convert_to(&Value::from("x"), &Type::String, &Type::Int32).is_err());
        assert_eq!(
            convert_to(&Value::Double(2.5), &Type::Double, &Type::Int32).unwrap(),
            Value::Int32(2)
        );
    }
}
