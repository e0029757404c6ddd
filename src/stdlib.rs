use std::{cmp::Ordering, io::Write};

use indexmap::IndexMap;
use rand::Rng;

use crate::{
    diagnostics::{error, DiagnosticKind, FemboyError, Result, SourceSpan},
    runtime::Interpreter,
    value::{NativeCallback, Value, ValueKind, VARIADIC},
};

/// The namespaces `adopt` resolves without a loader: `io`, `math`, `str`
/// and `arr`.
pub fn builtin_modules() -> IndexMap<String, Value> {
    let mut io = IndexMap::new();
    io.insert("print".into(), native("print", VARIADIC, io_print));

    let mut math = IndexMap::new();
    math.insert("floor".into(), native("floor", 1, math_floor));
    math.insert("ceil".into(), native("ceil", 1, math_ceil));
    math.insert("round".into(), native("round", 1, math_round));
    math.insert("abs".into(), native("abs", 1, math_abs));
    math.insert("sqrt".into(), native("sqrt", 1, math_sqrt));
    math.insert("pow".into(), native("pow", 2, math_pow));
    math.insert("min".into(), native("min", VARIADIC, math_min));
    math.insert("max".into(), native("max", VARIADIC, math_max));
    math.insert("random".into(), native("random", 0, math_random));
    math.insert("PI".into(), Value::float(std::f64::consts::PI));
    math.insert("E".into(), Value::float(std::f64::consts::E));

    let mut string = IndexMap::new();
    string.insert("len".into(), native("len", 1, str_len));
    string.insert("upper".into(), native("upper", 1, str_upper));
    string.insert("lower".into(), native("lower", 1, str_lower));
    string.insert("trim".into(), native("trim", 1, str_trim));
    string.insert("split".into(), native("split", 2, str_split));
    string.insert("join".into(), native("join", 2, str_join));
    string.insert("includes".into(), native("includes", 2, str_includes));
    string.insert("replace".into(), native("replace", 3, str_replace));
    string.insert("slice".into(), native("slice", VARIADIC, str_slice));

    let mut list = IndexMap::new();
    list.insert("len".into(), native("len", 1, arr_len));
    list.insert("push".into(), native("push", 2, arr_push));
    list.insert("pop".into(), native("pop", 1, arr_pop));
    list.insert("shift".into(), native("shift", 1, arr_shift));
    list.insert("slice".into(), native("slice", VARIADIC, arr_slice));
    list.insert("map".into(), native("map", 2, arr_map));
    list.insert("filter".into(), native("filter", 2, arr_filter));
    list.insert("reduce".into(), native("reduce", VARIADIC, arr_reduce));
    list.insert("find".into(), native("find", 2, arr_find));
    list.insert("sort".into(), native("sort", VARIADIC, arr_sort));
    list.insert("reverse".into(), native("reverse", 1, arr_reverse));
    list.insert("includes".into(), native("includes", 2, arr_includes));

    let mut modules = IndexMap::new();
    modules.insert("io".into(), Value::module("io", io));
    modules.insert("math".into(), Value::module("math", math));
    modules.insert("str".into(), Value::module("str", string));
    modules.insert("arr".into(), Value::module("arr", list));
    modules
}

fn native(name: &'static str, arity: usize, callback: NativeCallback) -> Value {
    Value::native(name, arity, callback)
}

fn ensure_between(args: &[Value], min: usize, max: usize, name: &str, span: SourceSpan) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == VARIADIC {
            format!("at least {min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(error(
            DiagnosticKind::Arity,
            format!(
                "`{name}` expected {expected} arguments but received {}",
                args.len()
            ),
            span,
        ));
    }
    Ok(())
}

fn type_error(name: &str, expected: &str, value: &Value, span: SourceSpan) -> FemboyError {
    error(
        DiagnosticKind::Type,
        format!("`{name}` expected {expected} but found {}", value.type_name()),
        span,
    )
}

fn expect_string<'a>(value: &'a Value, name: &str, span: SourceSpan) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| type_error(name, "String", value, span))
}

fn expect_number(value: &Value, name: &str, span: SourceSpan) -> Result<f64> {
    value
        .as_number()
        .ok_or_else(|| type_error(name, "Number", value, span))
}

fn expect_integer(value: &Value, name: &str, span: SourceSpan) -> Result<i64> {
    value
        .as_integer()
        .ok_or_else(|| type_error(name, "integral Number", value, span))
}

/// Snapshot of a list's elements; callbacks may mutate the original.
fn expect_list(value: &Value, name: &str, span: SourceSpan) -> Result<Vec<Value>> {
    match &*value.0 {
        ValueKind::List(values) => Ok(values.borrow().clone()),
        ValueKind::Range(range) => range.to_values().ok_or_else(|| {
            error(
                DiagnosticKind::Type,
                format!("`{name}` cannot expand range {value} into a List"),
                span,
            )
        }),
        _ => Err(type_error(name, "List", value, span)),
    }
}

/// Integral results stay integers.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
        Value::int(n as i64)
    } else {
        Value::float(n)
    }
}

/// Resolves slice bounds: negative offsets count from the end and both ends
/// are clamped to `len`.
fn slice_bounds(len: usize, start: i64, end: Option<i64>) -> (usize, usize) {
    let resolve = |offset: i64| {
        if offset < 0 {
            (len as i64 + offset).max(0) as usize
        } else {
            (offset as usize).min(len)
        }
    };
    let from = resolve(start);
    let to = end.map(resolve).unwrap_or(len);
    (from, to.max(from))
}

fn slice_args(args: &[Value], name: &str, span: SourceSpan) -> Result<(i64, Option<i64>)> {
    ensure_between(args, 2, 3, name, span)?;
    let start = expect_integer(&args[1], name, span)?;
    let end = match args.get(2) {
        Some(value) => Some(expect_integer(value, name, span)?),
        None => None,
    };
    Ok((start, end))
}

fn io_print(interpreter: &mut Interpreter, args: &[Value], _span: SourceSpan) -> Result<Value> {
    let line = args
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(interpreter.output(), "{line}")?;
    Ok(Value::unit())
}

fn math_floor(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(number(expect_number(&args[0], "math.floor", span)?.floor()))
}

fn math_ceil(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(number(expect_number(&args[0], "math.ceil", span)?.ceil()))
}

fn math_round(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(number(expect_number(&args[0], "math.round", span)?.round()))
}

fn math_abs(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Int(n) => Ok(n
            .checked_abs()
            .map(Value::int)
            .unwrap_or_else(|| Value::float((*n as f64).abs()))),
        _ => Ok(Value::float(expect_number(&args[0], "math.abs", span)?.abs())),
    }
}

fn math_sqrt(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(Value::float(expect_number(&args[0], "math.sqrt", span)?.sqrt()))
}

fn math_pow(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    if let (ValueKind::Int(base), ValueKind::Int(exp)) = (&*args[0].0, &*args[1].0) {
        if let Some(result) = u32::try_from(*exp).ok().and_then(|exp| base.checked_pow(exp)) {
            return Ok(Value::int(result));
        }
    }
    let base = expect_number(&args[0], "math.pow", span)?;
    let exp = expect_number(&args[1], "math.pow", span)?;
    Ok(Value::float(base.powf(exp)))
}

fn extreme(args: &[Value], name: &str, span: SourceSpan, wanted: Ordering) -> Result<Value> {
    ensure_between(args, 1, VARIADIC, name, span)?;
    let mut best = &args[0];
    expect_number(best, name, span)?;
    for arg in &args[1..] {
        expect_number(arg, name, span)?;
        if natural_order(arg, best, span)? == wanted {
            best = arg;
        }
    }
    Ok(best.clone())
}

fn math_min(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    extreme(args, "math.min", span, Ordering::Less)
}

fn math_max(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    extreme(args, "math.max", span, Ordering::Greater)
}

/// Uniform in `[0, 1)`.
fn math_random(_: &mut Interpreter, _: &[Value], _: SourceSpan) -> Result<Value> {
    Ok(Value::float(rand::thread_rng().gen::<f64>()))
}

fn str_len(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let text = expect_string(&args[0], "str.len", span)?;
    Ok(Value::int(text.chars().count() as i64))
}

fn str_upper(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(Value::string(expect_string(&args[0], "str.upper", span)?.to_uppercase()))
}

fn str_lower(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(Value::string(expect_string(&args[0], "str.lower", span)?.to_lowercase()))
}

fn str_trim(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(Value::string(expect_string(&args[0], "str.trim", span)?.trim()))
}

fn str_split(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let text = expect_string(&args[0], "str.split", span)?;
    let separator = expect_string(&args[1], "str.split", span)?;
    let parts = if separator.is_empty() {
        text.chars().map(|ch| Value::string(ch.to_string())).collect()
    } else {
        text.split(separator).map(Value::string).collect()
    };
    Ok(Value::list(parts))
}

fn str_join(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let items = expect_list(&args[0], "str.join", span)?;
    let separator = expect_string(&args[1], "str.join", span)?;
    let pieces: Vec<String> = items.iter().map(|item| item.to_string()).collect();
    Ok(Value::string(pieces.join(separator)))
}

fn str_includes(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let text = expect_string(&args[0], "str.includes", span)?;
    let needle = expect_string(&args[1], "str.includes", span)?;
    Ok(Value::bool(text.contains(needle)))
}

/// Replaces the first occurrence only.
fn str_replace(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let text = expect_string(&args[0], "str.replace", span)?;
    let from = expect_string(&args[1], "str.replace", span)?;
    let to = expect_string(&args[2], "str.replace", span)?;
    Ok(Value::string(text.replacen(from, to, 1)))
}

fn str_slice(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let (start, end) = slice_args(args, "str.slice", span)?;
    let text = expect_string(&args[0], "str.slice", span)?;
    let chars: Vec<char> = text.chars().collect();
    let (from, to) = slice_bounds(chars.len(), start, end);
    Ok(Value::string(chars[from..to].iter().collect::<String>()))
}

fn arr_len(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    if let ValueKind::Range(range) = &*args[0].0 {
        let len = range.len();
        return Ok(i64::try_from(len).map(Value::int).unwrap_or_else(|_| Value::float(len as f64)));
    }
    let items = expect_list(&args[0], "arr.len", span)?;
    Ok(Value::int(items.len() as i64))
}

/// Appends in place and returns the same list.
fn arr_push(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::List(values) => {
            values.borrow_mut().push(args[1].clone());
            Ok(args[0].clone())
        }
        _ => Err(type_error("arr.push", "List", &args[0], span)),
    }
}

fn arr_pop(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::List(values) => Ok(values.borrow_mut().pop().unwrap_or_else(Value::unit)),
        _ => Err(type_error("arr.pop", "List", &args[0], span)),
    }
}

fn arr_shift(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::List(values) => {
            let mut values = values.borrow_mut();
            if values.is_empty() {
                Ok(Value::unit())
            } else {
                Ok(values.remove(0))
            }
        }
        _ => Err(type_error("arr.shift", "List", &args[0], span)),
    }
}

fn arr_slice(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let (start, end) = slice_args(args, "arr.slice", span)?;
    let items = expect_list(&args[0], "arr.slice", span)?;
    let (from, to) = slice_bounds(items.len(), start, end);
    Ok(Value::list(items[from..to].to_vec()))
}

fn arr_map(interpreter: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let items = expect_list(&args[0], "arr.map", span)?;
    let mut mapped = Vec::with_capacity(items.len());
    for item in items {
        mapped.push(interpreter.call(&args[1], vec![item], span)?);
    }
    Ok(Value::list(mapped))
}

fn arr_filter(interpreter: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let items = expect_list(&args[0], "arr.filter", span)?;
    let mut kept = Vec::new();
    for item in items {
        if interpreter
            .call(&args[1], vec![item.clone()], span)?
            .expect_bool(span)?
        {
            kept.push(item);
        }
    }
    Ok(Value::list(kept))
}

fn arr_reduce(interpreter: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    ensure_between(args, 2, 3, "arr.reduce", span)?;
    let mut items = expect_list(&args[0], "arr.reduce", span)?.into_iter();
    let mut acc = match args.get(2) {
        Some(init) => init.clone(),
        None => items.next().ok_or_else(|| {
            error(
                DiagnosticKind::Type,
                "`arr.reduce` of an empty List needs an initial value",
                span,
            )
        })?,
    };
    for item in items {
        acc = interpreter.call(&args[1], vec![acc, item], span)?;
    }
    Ok(acc)
}

fn arr_find(interpreter: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let items = expect_list(&args[0], "arr.find", span)?;
    for item in items {
        if interpreter
            .call(&args[1], vec![item.clone()], span)?
            .expect_bool(span)?
        {
            return Ok(item);
        }
    }
    Ok(Value::unit())
}

/// Returns a sorted copy. Without a comparator, Numbers sort numerically
/// and Strings lexicographically.
fn arr_sort(interpreter: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    ensure_between(args, 1, 2, "arr.sort", span)?;
    let mut items = expect_list(&args[0], "arr.sort", span)?;
    let mut failure = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        let ordering = match args.get(1) {
            Some(compare) => interpreter
                .call(compare, vec![a.clone(), b.clone()], span)
                .and_then(|result| expect_number(&result, "arr.sort", span))
                .map(|n| n.partial_cmp(&0.0).unwrap_or(Ordering::Equal)),
            None => natural_order(a, b, span),
        };
        ordering.unwrap_or_else(|err| {
            failure = Some(err);
            Ordering::Equal
        })
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(Value::list(items)),
    }
}

fn natural_order(a: &Value, b: &Value, span: SourceSpan) -> Result<Ordering> {
    match (&*a.0, &*b.0) {
        (ValueKind::String(x), ValueKind::String(y)) => Ok(x.cmp(y)),
        (ValueKind::Int(x), ValueKind::Int(y)) => Ok(x.cmp(y)),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
            _ => Err(error(
                DiagnosticKind::Type,
                format!(
                    "`arr.sort` cannot compare {} with {} without a comparator",
                    a.type_name(),
                    b.type_name()
                ),
                span,
            )),
        },
    }
}

fn arr_reverse(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let mut items = expect_list(&args[0], "arr.reverse", span)?;
    items.reverse();
    Ok(Value::list(items))
}

fn arr_includes(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    if let ValueKind::Range(range) = &*args[0].0 {
        return Ok(Value::bool(args[1].as_integer().is_some_and(|n| range.contains(n))));
    }
    let items = expect_list(&args[0], "arr.includes", span)?;
    Ok(Value::bool(items.iter().any(|item| item.equals(&args[1]))))
}
