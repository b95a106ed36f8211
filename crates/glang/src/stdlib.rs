//! Built-in functions bridging G to the world: arithmetic, comparisons,
//! strings, lists, and the handful of calls that touch the cache or the
//! session (`get_attr`, `set_attr`, `get_object`, `send`, `load`).

use gaia_domain::{GValue, ObjectId};
use rand::Rng;

use crate::error::GError;
use crate::host::Host;
use crate::interpreter::{EvalContext, EvalResult, Signal};
use crate::lexer::Span;

const BUILTINS: &[&str] = &[
    "log", "+", "-", "*", "/", "mod", "equals", "not", "<", ">", "<=", ">=", "concat", "strlen",
    "substr", "list", "listlength", "nth", "append", "get_attr", "set_attr", "get_object", "send",
    "load", "random", "max", "min", "upper", "lower", "join", "type_of", "caller", "has_role",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

pub async fn call(
    name: &str,
    args: Vec<GValue>,
    ctx: &mut EvalContext,
    host: &dyn Host,
    span: Span,
) -> EvalResult {
    match name {
        "log" => {
            let line = args.iter().map(GValue::to_gstring).collect::<Vec<_>>().join(" ");
            host.log(&line);
            Ok(GValue::Null)
        }
        "+" => numeric_fold(&args, span, 0.0, |a, b| a + b),
        "-" => numeric_minus(&args, span),
        "*" => numeric_fold(&args, span, 1.0, |a, b| a * b),
        "/" => numeric_divide(&args, span),
        "mod" => numeric_mod(&args, span),
        "equals" => Ok(GValue::Boolean(args.first() == args.get(1))),
        "not" => Ok(GValue::Boolean(!arg(&args, 0).map(GValue::is_truthy).unwrap_or(false))),
        "<" => compare(&args, span, |a, b| a < b),
        ">" => compare(&args, span, |a, b| a > b),
        "<=" => compare(&args, span, |a, b| a <= b),
        ">=" => compare(&args, span, |a, b| a >= b),
        "concat" => Ok(GValue::string(args.iter().map(GValue::to_gstring).collect::<String>())),
        "strlen" => Ok(GValue::Number(arg_string(&args, 0).chars().count() as f64)),
        "substr" => substr(&args, span),
        "list" => Ok(GValue::Sequence(args)),
        "listlength" => Ok(GValue::Number(list_length(&args, span)? as f64)),
        "nth" => nth(&args, span),
        "append" => append(args),
        "get_attr" => get_attr(&args, ctx, host, span).await,
        "set_attr" => set_attr(&args, ctx, host, span).await,
        "get_object" => get_object(&args, ctx, host, span).await,
        "send" => send(&args, ctx, host, span).await,
        "load" => load(&args, ctx, host, span).await,
        "random" => random(&args, span),
        "max" => fold_numeric_cmp(&args, span, f64::max),
        "min" => fold_numeric_cmp(&args, span, f64::min),
        "upper" => Ok(GValue::string(arg_string(&args, 0).to_uppercase())),
        "lower" => Ok(GValue::string(arg_string(&args, 0).to_lowercase())),
        "join" => Ok(GValue::string(
            args.iter().map(GValue::to_gstring).collect::<Vec<_>>().join(" "),
        )),
        "type_of" => Ok(GValue::string(type_name(arg(&args, 0)))),
        "caller" => Ok(GValue::ObjectRef(ctx.actor.clone())),
        "has_role" => has_role(&args, ctx, host, span).await,
        other => Err(GError::unresolved_callee(other, span).into()),
    }
}

fn arg(args: &[GValue], index: usize) -> Option<&GValue> {
    args.get(index)
}

fn arg_string(args: &[GValue], index: usize) -> String {
    args.get(index).map(GValue::to_gstring).unwrap_or_default()
}

fn as_number(value: Option<&GValue>, span: Span) -> Result<f64, Signal> {
    let _ = span;
    Ok(value.and_then(GValue::as_number).unwrap_or(0.0))
}

fn numeric_fold(args: &[GValue], span: Span, init: f64, op: impl Fn(f64, f64) -> f64) -> EvalResult {
    let mut acc = init;
    for value in args {
        acc = op(acc, coerce_number(value, span));
    }
    Ok(GValue::Number(acc))
}

/// Numeric built-ins coerce non-numeric values by parsing a decimal, or 0
/// if that fails.
fn coerce_number(value: &GValue, _span: Span) -> f64 {
    value.as_number().unwrap_or(0.0)
}

fn numeric_minus(args: &[GValue], span: Span) -> EvalResult {
    match args.len() {
        0 => Ok(GValue::Number(0.0)),
        1 => Ok(GValue::Number(-coerce_number(&args[0], span))),
        _ => {
            let mut iter = args.iter();
            let first = coerce_number(iter.next().unwrap(), span);
            let rest = iter.fold(first, |acc, v| acc - coerce_number(v, span));
            Ok(GValue::Number(rest))
        }
    }
}

fn numeric_divide(args: &[GValue], span: Span) -> EvalResult {
    if args.len() < 2 {
        return Err(GError::type_coercion("/ requires at least two arguments", span).into());
    }
    let mut iter = args.iter();
    let mut acc = coerce_number(iter.next().unwrap(), span);
    for value in iter {
        let divisor = coerce_number(value, span);
        if divisor == 0.0 {
            return Err(GError::type_coercion("division by zero", span).into());
        }
        acc /= divisor;
    }
    Ok(GValue::Number(acc))
}

fn numeric_mod(args: &[GValue], span: Span) -> EvalResult {
    let a = coerce_number(args.first().unwrap_or(&GValue::Number(0.0)), span);
    let b = coerce_number(args.get(1).unwrap_or(&GValue::Number(0.0)), span);
    if b == 0.0 {
        return Err(GError::type_coercion("division by zero", span).into());
    }
    Ok(GValue::Number(a % b))
}

fn compare(args: &[GValue], span: Span, op: impl Fn(f64, f64) -> bool) -> EvalResult {
    let a = coerce_number(args.first().unwrap_or(&GValue::Number(0.0)), span);
    let b = coerce_number(args.get(1).unwrap_or(&GValue::Number(0.0)), span);
    Ok(GValue::Boolean(op(a, b)))
}

fn fold_numeric_cmp(args: &[GValue], span: Span, op: impl Fn(f64, f64) -> f64) -> EvalResult {
    if args.is_empty() {
        return Err(GError::type_coercion("requires at least one argument", span).into());
    }
    let mut iter = args.iter();
    let mut acc = coerce_number(iter.next().unwrap(), span);
    for value in iter {
        acc = op(acc, coerce_number(value, span));
    }
    Ok(GValue::Number(acc))
}

fn substr(args: &[GValue], span: Span) -> EvalResult {
    let s = arg_string(args, 0);
    let chars: Vec<char> = s.chars().collect();
    let start = as_number(args.get(1), span)? as i64;
    let start = start.clamp(0, chars.len() as i64) as usize;
    let len = args
        .get(2)
        .map(|v| coerce_number(v, span) as i64)
        .unwrap_or((chars.len() - start) as i64)
        .max(0) as usize;
    let end = (start + len).min(chars.len());
    Ok(GValue::string(chars[start..end].iter().collect::<String>()))
}

/// Implements the list-as-string law: a literal list value has its length
/// taken directly, but a plain string is first re-parsed as G source and
/// only then measured — so `"[1 2 3]"` has length 3 while `["[1 2 3]"]` (a
/// one-element list whose element is that string) has length 1.
fn list_length(args: &[GValue], span: Span) -> Result<usize, Signal> {
    match args.first() {
        Some(GValue::Sequence(items)) => Ok(items.len()),
        Some(GValue::String(s)) => match crate::parser::parse(s) {
            Ok(crate::parser::Node::List(items, _)) => Ok(items.len()),
            _ => Ok(1),
        },
        Some(_) => Ok(1),
        None => Err(GError::type_coercion("listlength requires an argument", span).into()),
    }
}

fn nth(args: &[GValue], span: Span) -> EvalResult {
    let Some(GValue::Sequence(items)) = args.first() else {
        return Err(GError::type_coercion("nth requires a list", span).into());
    };
    let index = as_number(args.get(1), span)? as i64;
    if index < 0 {
        return Ok(GValue::Null);
    }
    Ok(items.get(index as usize).cloned().unwrap_or(GValue::Null))
}

fn append(mut args: Vec<GValue>) -> EvalResult {
    if args.is_empty() {
        return Ok(GValue::Sequence(Vec::new()));
    }
    let tail = args.split_off(1);
    let GValue::Sequence(mut items) = args.into_iter().next().unwrap() else {
        return Err(GError::type_coercion("append requires a list as its first argument", Span::new(0, 0)).into());
    };
    items.extend(tail);
    Ok(GValue::Sequence(items))
}

async fn get_attr(args: &[GValue], ctx: &mut EvalContext, host: &dyn Host, span: Span) -> EvalResult {
    let object = resolve_object_arg(args, 0, ctx, host, span).await?;
    let name = arg_string(args, 1);
    Ok(host.get_attr(&object, &name).await?.unwrap_or(GValue::Null))
}

async fn set_attr(args: &[GValue], ctx: &mut EvalContext, host: &dyn Host, span: Span) -> EvalResult {
    let object = resolve_object_arg(args, 0, ctx, host, span).await?;
    let name = arg_string(args, 1);
    let value = args.get(2).cloned().unwrap_or(GValue::Null);
    host.set_attr(&object, &name, value.clone()).await?;
    Ok(value)
}

async fn get_object(args: &[GValue], ctx: &mut EvalContext, host: &dyn Host, span: Span) -> EvalResult {
    let object = resolve_object_arg(args, 0, ctx, host, span).await?;
    Ok(GValue::ObjectRef(object))
}

async fn send(args: &[GValue], ctx: &mut EvalContext, host: &dyn Host, span: Span) -> EvalResult {
    let object = resolve_object_arg(args, 0, ctx, host, span).await?;
    let payload = args.get(1).cloned().unwrap_or(GValue::Null);
    host.send(&object, payload.clone()).await?;
    Ok(payload)
}

async fn load(args: &[GValue], ctx: &mut EvalContext, host: &dyn Host, span: Span) -> EvalResult {
    let path = arg_string(args, 0);
    let object = resolve_object_arg(args, 1, ctx, host, span).await?;
    let attr_name = arg_string(args, 2);
    host.load(&path, &object, &attr_name, ctx).await?;
    Ok(GValue::Null)
}

async fn has_role(args: &[GValue], ctx: &mut EvalContext, host: &dyn Host, _span: Span) -> EvalResult {
    let role = arg_string(args, 0);
    Ok(GValue::Boolean(host.actor_has_role(&ctx.actor, &role).await?))
}

async fn resolve_object_arg(
    args: &[GValue],
    index: usize,
    ctx: &mut EvalContext,
    host: &dyn Host,
    span: Span,
) -> Result<ObjectId, Signal> {
    match args.get(index) {
        Some(GValue::ObjectRef(id)) => Ok(id.clone()),
        Some(GValue::String(s)) => Ok(host.get_object(s, ctx).await?),
        _ => Err(GError::type_coercion("expected an object reference", span).into()),
    }
}

fn random(args: &[GValue], span: Span) -> EvalResult {
    let upper = as_number(args.first(), span)? as i64;
    if upper <= 0 {
        return Ok(GValue::Number(0.0));
    }
    let n = rand::thread_rng().gen_range(0..upper);
    Ok(GValue::Number(n as f64))
}

fn type_name(value: Option<&GValue>) -> &'static str {
    match value {
        Some(GValue::Null) | None => "null",
        Some(GValue::Boolean(_)) => "boolean",
        Some(GValue::Number(_)) => "number",
        Some(GValue::String(_)) => "string",
        Some(GValue::Sequence(_)) => "list",
        Some(GValue::Map(_)) => "map",
        Some(GValue::ObjectRef(_)) => "object",
        Some(GValue::Source(_)) => "source",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listlength_distinguishes_string_from_constructed_list() {
        let span = Span::new(0, 0);
        let constructed = GValue::Sequence(vec![GValue::string("a"), GValue::string("b"), GValue::string("c")]);
        assert_eq!(list_length(&[constructed], span).unwrap(), 3);

        let stringy = GValue::string("[a b c]");
        assert_eq!(list_length(&[stringy], span).unwrap(), 3);

        let wrapped = GValue::Sequence(vec![GValue::string("[a b c]")]);
        assert_eq!(list_length(&[wrapped], span).unwrap(), 1);
    }

    #[test]
    fn nth_out_of_range_returns_null() {
        let items = GValue::Sequence(vec![GValue::Number(1.0)]);
        let result = nth(&[items, GValue::Number(5.0)], Span::new(0, 0)).unwrap();
        assert_eq!(result, GValue::Null);
    }

    #[test]
    fn plus_is_commutative() {
        let span = Span::new(0, 0);
        let a = numeric_fold(&[GValue::Number(2.0), GValue::Number(3.0)], span, 0.0, |a, b| a + b).unwrap();
        let b = numeric_fold(&[GValue::Number(3.0), GValue::Number(2.0)], span, 0.0, |a, b| a + b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn division_by_zero_fails() {
        let result = numeric_divide(&[GValue::Number(1.0), GValue::Number(0.0)], Span::new(0, 0));
        assert!(matches!(result, Err(Signal::Error(GError::TypeCoercion { .. }))));
    }
}
