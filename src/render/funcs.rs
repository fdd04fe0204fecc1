//! Template function library.
//!
//! # Responsibilities
//! - Static name → function table consulted by the parser
//! - String helpers (substr, split, replace, regexReplace, replaceMaps)
//! - Encoding, environment lookup, date formatting and clock access
//! - Scratch dictionaries (`newDict`, `dictPut`, `dictGet`, ...)
//! - Comparison and logic builtins (`eq`, `lt`, `and`, `index`, ...)
//!
//! # Design Decisions
//! - Every function has the same signature; arguments arrive already
//!   evaluated, with a piped value appended last
//! - Type errors surface as `RenderError::TypeMismatch`, never panics

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Write};

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::render::value::{Scratch, Value};
use crate::render::RenderError;

pub type FuncImpl = fn(&mut Scratch, Vec<Value>) -> Result<Value, RenderError>;

pub struct Builtin {
    pub name: &'static str,
    pub call: FuncImpl,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish()
    }
}

static BUILTINS: &[Builtin] = &[
    Builtin { name: "json", call: json },
    Builtin { name: "getenv", call: getenv },
    Builtin { name: "substr", call: substr },
    Builtin { name: "split", call: split },
    Builtin { name: "replace", call: replace },
    Builtin { name: "regexReplace", call: regex_replace },
    Builtin { name: "replaceMaps", call: replace_maps },
    Builtin { name: "in", call: contains },
    Builtin { name: "toStr", call: to_str },
    Builtin { name: "dateFormat", call: date_format },
    Builtin { name: "now", call: now },
    Builtin { name: "localtime", call: now },
    Builtin { name: "newDict", call: new_dict },
    Builtin { name: "dictPut", call: dict_put },
    Builtin { name: "dictGet", call: dict_get },
    Builtin { name: "dictExist", call: dict_exist },
    Builtin { name: "dictDel", call: dict_del },
    Builtin { name: "eq", call: eq },
    Builtin { name: "ne", call: ne },
    Builtin { name: "lt", call: lt },
    Builtin { name: "le", call: le },
    Builtin { name: "gt", call: gt },
    Builtin { name: "ge", call: ge },
    Builtin { name: "and", call: and },
    Builtin { name: "or", call: or },
    Builtin { name: "not", call: not },
    Builtin { name: "len", call: len },
    Builtin { name: "index", call: index },
    Builtin { name: "print", call: print },
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// Input layouts tried by `dateFormat`, first match wins.
enum Layout {
    Rfc3339,
    Rfc2822,
    Zoned(&'static str),
    Naive(&'static str),
    Date(&'static str),
}

const INPUT_LAYOUTS: &[Layout] = &[
    Layout::Rfc3339,
    Layout::Naive("%Y-%m-%dT%H:%M:%S"),
    Layout::Rfc2822,
    Layout::Zoned("%Y-%m-%d %H:%M:%S%:z"),
    Layout::Naive("%Y-%m-%d %H:%M:%S"),
    Layout::Naive("%a %b %e %H:%M:%S %Y"),
    Layout::Date("%d %b %Y"),
    Layout::Date("%Y-%m-%d"),
];

fn exact<const N: usize>(func: &'static str, args: Vec<Value>) -> Result<[Value; N], RenderError> {
    args.try_into().map_err(|args: Vec<Value>| RenderError::Arity {
        func,
        expected: N.to_string(),
        found: args.len(),
    })
}

fn at_least(func: &'static str, args: &[Value], min: usize) -> Result<(), RenderError> {
    if args.len() < min {
        return Err(RenderError::Arity {
            func,
            expected: format!("at least {}", min),
            found: args.len(),
        });
    }
    Ok(())
}

fn failed(func: &'static str, message: impl fmt::Display) -> RenderError {
    RenderError::Function {
        func,
        message: message.to_string(),
    }
}

fn json(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [value] = exact::<1>("json", args)?;
    let encoded = serde_json::to_string(&value.to_json(scratch)?).map_err(|e| failed("json", e))?;
    Ok(Value::String(encoded))
}

fn getenv(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [name] = exact::<1>("getenv", args)?;
    Ok(Value::String(
        std::env::var(name.as_str("getenv")?).unwrap_or_default(),
    ))
}

/// `substr s start [length]`, counted in characters. A negative start counts
/// from the end; a negative length stops that many characters before the end.
fn substr(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    if !(2..=3).contains(&args.len()) {
        return Err(RenderError::Arity {
            func: "substr",
            expected: "2 or 3".to_string(),
            found: args.len(),
        });
    }

    let chars: Vec<char> = args[0].as_str("substr")?.chars().collect();
    let total = chars.len() as i64;
    let mut start = args[1].as_int("substr")?;
    let length = match args.get(2) {
        Some(v) => v.as_int("substr")?,
        None => total,
    };

    if start < -total {
        start = 0;
    }
    if start > total {
        return Err(failed(
            "substr",
            format!("start position out of bounds for {}-character string", total),
        ));
    }

    let (from, to) = match (start >= 0, length >= 0) {
        (true, true) => (start, start.saturating_add(length)),
        (false, true) => ((total + start + 1).saturating_sub(length), total + start + 1),
        (true, false) => (start, total.saturating_add(length)),
        (false, false) => (total + start, total.saturating_add(length)),
    };
    let from = from.max(0);
    if from > to {
        return Err(failed(
            "substr",
            format!("calculated start position greater than end position: {} > {}", from, to),
        ));
    }
    let to = to.min(total);

    Ok(Value::String(chars[from as usize..to as usize].iter().collect()))
}

fn split(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [s, sep] = exact::<2>("split", args)?;
    let s = s.as_str("split")?;
    let sep = sep.as_str("split")?;

    let parts: Vec<Value> = if sep.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(sep).map(Value::from).collect()
    };
    Ok(Value::List(parts))
}

fn replace(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [s, old, new] = exact::<3>("replace", args)?;
    Ok(Value::String(s.as_str("replace")?.replace(
        old.as_str("replace")?,
        new.as_str("replace")?,
    )))
}

fn compile(func: &'static str, expr: &Value) -> Result<Regex, RenderError> {
    Regex::new(expr.as_str(func)?).map_err(|e| failed(func, e))
}

/// `regexReplace v expr repl` over a string or a list of strings.
fn regex_replace(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [value, expr, repl] = exact::<3>("regexReplace", args)?;
    let re = compile("regexReplace", &expr)?;
    let repl = repl.as_str("regexReplace")?;

    match &value {
        Value::String(s) => Ok(Value::String(re.replace_all(s, repl).into_owned())),
        Value::List(items) => items
            .iter()
            .map(|item| -> Result<Value, RenderError> {
                let s = item.as_str("regexReplace")?;
                Ok(Value::String(re.replace_all(s, repl).into_owned()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other => Err(RenderError::TypeMismatch {
            func: "regexReplace".to_string(),
            expected: "string or list",
            found: other.type_name(),
        }),
    }
}

/// `replaceMaps v key expr repl`: regex-replace the string at `key` in a map
/// or in every map of a list. Maps without the key are left unchanged.
fn replace_maps(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [value, key, expr, repl] = exact::<4>("replaceMaps", args)?;
    let key = key.as_str("replaceMaps")?;
    let re = compile("replaceMaps", &expr)?;
    let repl = repl.as_str("replaceMaps")?;

    let replace_one = |map: &BTreeMap<String, Value>| -> Result<Value, RenderError> {
        let mut out = map.clone();
        if let Some(current) = map.get(key) {
            let s = current.as_str("replaceMaps")?;
            out.insert(key.to_string(), Value::String(re.replace_all(s, repl).into_owned()));
        }
        Ok(Value::Map(out))
    };

    match &value {
        Value::Map(map) => replace_one(map),
        Value::List(items) => items
            .iter()
            .map(|item| replace_one(item.as_map("replaceMaps")?))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other => Err(RenderError::TypeMismatch {
            func: "replaceMaps".to_string(),
            expected: "map or list",
            found: other.type_name(),
        }),
    }
}

/// `in l v`: list membership, or substring test when `l` is a string.
fn contains(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [haystack, needle] = exact::<2>("in", args)?;
    let found = match (&haystack, &needle) {
        (Value::List(items), _) => items.iter().any(|item| loose_eq(item, &needle)),
        (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
        _ => false,
    };
    Ok(Value::Bool(found))
}

fn to_str(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [value] = exact::<1>("toStr", args)?;
    Ok(Value::String(value.display(scratch)?))
}

fn parse_time(s: &str) -> Option<DateTime<FixedOffset>> {
    INPUT_LAYOUTS.iter().find_map(|layout| match layout {
        Layout::Rfc3339 => DateTime::parse_from_rfc3339(s).ok(),
        Layout::Rfc2822 => DateTime::parse_from_rfc2822(s).ok(),
        Layout::Zoned(fmt) => DateTime::parse_from_str(s, fmt).ok(),
        Layout::Naive(fmt) => NaiveDateTime::parse_from_str(s, fmt)
            .ok()
            .map(|t| t.and_utc().fixed_offset()),
        Layout::Date(fmt) => NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc().fixed_offset()),
    })
}

/// `dateFormat layout v` with a strftime layout.
fn date_format(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [layout, value] = exact::<2>("dateFormat", args)?;
    let layout = layout.as_str("dateFormat")?;
    let time = match &value {
        Value::Time(t) => *t,
        Value::String(s) => parse_time(s)
            .ok_or_else(|| failed("dateFormat", format!("unable to parse date: {}", s)))?,
        other => {
            return Err(RenderError::TypeMismatch {
                func: "dateFormat".to_string(),
                expected: "time or string",
                found: other.type_name(),
            })
        }
    };

    let mut out = String::new();
    write!(out, "{}", time.format(layout))
        .map_err(|_| failed("dateFormat", format!("invalid layout '{}'", layout)))?;
    Ok(Value::String(out))
}

fn now(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [] = exact::<0>("now", args)?;
    Ok(Value::Time(Local::now().fixed_offset()))
}

fn new_dict(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [] = exact::<0>("newDict", args)?;
    Ok(scratch.new_dict())
}

fn dict_put(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [dict, key, value] = exact::<3>("dictPut", args)?;
    let id = dict.as_dict("dictPut")?;
    scratch
        .dict_mut(id)
        .insert(key.as_str("dictPut")?.to_string(), value);
    Ok(Value::Bool(true))
}

fn dict_get(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [dict, key] = exact::<2>("dictGet", args)?;
    let id = dict.as_dict("dictGet")?;
    Ok(scratch
        .dict(id)
        .get(key.as_str("dictGet")?)
        .cloned()
        .unwrap_or(Value::Null))
}

fn dict_exist(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [dict, key] = exact::<2>("dictExist", args)?;
    let id = dict.as_dict("dictExist")?;
    Ok(Value::Bool(scratch.dict(id).contains_key(key.as_str("dictExist")?)))
}

fn dict_del(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [dict, key] = exact::<2>("dictDel", args)?;
    let id = dict.as_dict("dictDel")?;
    Ok(Value::Bool(
        scratch.dict_mut(id).remove(key.as_str("dictDel")?).is_some(),
    ))
}

/// Equality with numbers compared by value (`1 == 1.0`).
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// `eq a b c...` is true if `a` equals any of the others.
fn eq(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    at_least("eq", &args, 2)?;
    Ok(Value::Bool(args[1..].iter().any(|b| loose_eq(&args[0], b))))
}

fn ne(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [a, b] = exact::<2>("ne", args)?;
    Ok(Value::Bool(!loose_eq(&a, &b)))
}

fn compare(func: &'static str, args: Vec<Value>) -> Result<Ordering, RenderError> {
    let [a, b] = exact::<2>(func, args)?;
    let ordering = match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => Some(i.cmp(&j)),
            _ => a.as_f64(func)?.partial_cmp(&b.as_f64(func)?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        _ => None,
    };
    ordering.ok_or_else(|| RenderError::TypeMismatch {
        func: func.to_string(),
        expected: "two numbers, strings or times",
        found: b.type_name(),
    })
}

fn lt(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    Ok(Value::Bool(compare("lt", args)? == Ordering::Less))
}

fn le(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    Ok(Value::Bool(compare("le", args)? != Ordering::Greater))
}

fn gt(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    Ok(Value::Bool(compare("gt", args)? == Ordering::Greater))
}

fn ge(_: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    Ok(Value::Bool(compare("ge", args)? != Ordering::Less))
}

/// First falsy argument, or the last one.
fn and(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    at_least("and", &args, 1)?;
    let mut last = Value::Null;
    for arg in args {
        if !arg.truthy(scratch) {
            return Ok(arg);
        }
        last = arg;
    }
    Ok(last)
}

/// First truthy argument, or the last one.
fn or(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    at_least("or", &args, 1)?;
    let mut last = Value::Null;
    for arg in args {
        if arg.truthy(scratch) {
            return Ok(arg);
        }
        last = arg;
    }
    Ok(last)
}

fn not(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [value] = exact::<1>("not", args)?;
    Ok(Value::Bool(!value.truthy(scratch)))
}

fn len(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let [value] = exact::<1>("len", args)?;
    let n = match &value {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        Value::Dict(id) => scratch.dict(*id).len(),
        other => {
            return Err(RenderError::TypeMismatch {
                func: "len".to_string(),
                expected: "string, list or map",
                found: other.type_name(),
            })
        }
    };
    Ok(Value::int(n as i64))
}

/// `index v k1 k2...` walks lists by position and maps by key.
fn index(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    at_least("index", &args, 1)?;
    let mut args = args.into_iter();
    let mut current = args.next().unwrap_or(Value::Null);

    for key in args {
        current = match current {
            Value::List(mut items) => {
                let i = key.as_int("index")?;
                if i < 0 || i as usize >= items.len() {
                    return Err(failed("index", format!("index out of range: {}", i)));
                }
                items.swap_remove(i as usize)
            }
            Value::Map(mut map) => map.remove(key.as_str("index")?).unwrap_or(Value::Null),
            Value::Dict(id) => scratch
                .dict(id)
                .get(key.as_str("index")?)
                .cloned()
                .unwrap_or(Value::Null),
            other => {
                return Err(RenderError::TypeMismatch {
                    func: "index".to_string(),
                    expected: "list or map",
                    found: other.type_name(),
                })
            }
        };
    }

    Ok(current)
}

/// Concatenate operands, adding spaces between operands when neither is a
/// string.
fn print(scratch: &mut Scratch, args: Vec<Value>) -> Result<Value, RenderError> {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        let is_string = matches!(arg, Value::String(_));
        if i > 0 && !is_string && !matches!(args[i - 1], Value::String(_)) {
            out.push(' ');
        }
        out.push_str(&arg.display(scratch)?);
    }
    Ok(Value::String(out))
}
