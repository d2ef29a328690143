//! Template evaluation against a read-only `Claims` context.
//!
//! Error messages name fields, keys and types from the template only; they
//! never include claim values.
//!
//! Unlike Go's `text/template`, which prints `<no value>` for a missing map
//! key, a `.Extra` key absent from the token is an execution error. Either
//! way the attempt is denied; here it surfaces as an invalid template rather
//! than an identity mismatch.
//!
//! `.AuthTime` renders as Unix seconds, `0` when the token carries none.

use super::parser::{Command, Function, Node, Operand, Pipeline};
use super::TemplateError;
use crate::claims::{ClaimValue, Claims, Scalar};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A value produced while evaluating a pipeline. Borrows from the claims
/// and from the template wherever possible.
#[derive(Debug, Clone)]
enum Value<'a> {
    Root(&'a Claims),
    Extra(&'a BTreeMap<String, ClaimValue>),
    Claim(&'a ClaimValue),
    Strings(&'a [String]),
    Text(Cow<'a, str>),
    Int(i64),
    Bool(bool),
}

impl Value<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Value::Root(_) => "claims",
            Value::Extra(_) => "map",
            Value::Claim(ClaimValue::Scalar(Scalar::String(_))) | Value::Text(_) => "string",
            Value::Claim(ClaimValue::Scalar(Scalar::Number(_))) | Value::Int(_) => "number",
            Value::Claim(ClaimValue::Scalar(Scalar::Bool(_))) | Value::Bool(_) => "bool",
            Value::Claim(ClaimValue::Scalar(Scalar::Null)) => "null",
            Value::Claim(ClaimValue::Sequence(_)) | Value::Strings(_) => "list",
            Value::Claim(ClaimValue::Unrecognized) => "object",
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text.as_ref()),
            Value::Claim(ClaimValue::Scalar(scalar)) => scalar.as_str(),
            _ => None,
        }
    }
}

pub(crate) fn execute(nodes: &[Node], claims: &Claims) -> Result<String, TemplateError> {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Action(pipeline) => {
                let value = eval_pipeline(pipeline, claims)?;
                write_value(&mut out, &value)?;
            }
        }
    }
    Ok(out)
}

fn eval_pipeline<'a>(pipeline: &'a Pipeline, claims: &'a Claims) -> Result<Value<'a>, TemplateError> {
    let mut previous = None;
    for command in &pipeline.commands {
        previous = Some(eval_command(command, claims, previous)?);
    }
    previous.ok_or_else(|| TemplateError::Exec("empty pipeline".to_string()))
}

fn eval_command<'a>(
    command: &'a Command,
    claims: &'a Claims,
    piped: Option<Value<'a>>,
) -> Result<Value<'a>, TemplateError> {
    match command {
        Command::Call(function, operands) => {
            let mut args = operands
                .iter()
                .map(|operand| eval_operand(operand, claims))
                .collect::<Result<Vec<_>, _>>()?;
            args.extend(piped);
            call(*function, args)
        }
        Command::Value(operand) => {
            if piped.is_some() {
                return Err(TemplateError::Exec(
                    "can't pipe into a non-function".to_string(),
                ));
            }
            eval_operand(operand, claims)
        }
    }
}

fn eval_operand<'a>(operand: &'a Operand, claims: &'a Claims) -> Result<Value<'a>, TemplateError> {
    match operand {
        Operand::Dot => Ok(Value::Root(claims)),
        Operand::Field(chain) => chain
            .iter()
            .try_fold(Value::Root(claims), |value, name| field(value, name)),
        Operand::Str(text) => Ok(Value::Text(Cow::Borrowed(text.as_str()))),
        Operand::Int(n) => Ok(Value::Int(*n)),
        Operand::Bool(b) => Ok(Value::Bool(*b)),
        Operand::Pipeline(pipeline) => eval_pipeline(pipeline, claims),
    }
}

fn field<'a>(value: Value<'a>, name: &str) -> Result<Value<'a>, TemplateError> {
    match value {
        Value::Root(claims) => match name {
            "Subject" => Ok(Value::Text(Cow::Borrowed(claims.subject.as_str()))),
            "Issuer" => Ok(Value::Text(Cow::Borrowed(claims.issuer.as_str()))),
            "ACR" => Ok(Value::Text(Cow::Borrowed(claims.acr.as_str()))),
            "Audience" => Ok(Value::Strings(&claims.audience)),
            "AMR" => Ok(Value::Strings(&claims.amr)),
            "AZP" => Ok(Value::Text(Cow::Borrowed(claims.authorized_party.as_str()))),
            "Nonce" => Ok(Value::Text(Cow::Borrowed(claims.nonce.as_str()))),
            "AuthTime" => Ok(Value::Int(claims.auth_time.unwrap_or_default())),
            "Extra" => Ok(Value::Extra(&claims.extra)),
            _ => Err(TemplateError::Exec(format!(
                "can't evaluate field {name} in claims"
            ))),
        },
        Value::Extra(extra) => lookup(extra, name),
        other => Err(TemplateError::Exec(format!(
            "can't evaluate field {name} in type {}",
            other.kind()
        ))),
    }
}

fn lookup<'a>(
    extra: &'a BTreeMap<String, ClaimValue>,
    key: &str,
) -> Result<Value<'a>, TemplateError> {
    extra
        .get(key)
        .map(Value::Claim)
        .ok_or_else(|| TemplateError::Exec(format!("map has no entry for key {key:?}")))
}

fn call(function: Function, args: Vec<Value<'_>>) -> Result<Value<'_>, TemplateError> {
    match function {
        Function::TrimPrefix => trim(function, &args, |s, affix| s.strip_prefix(affix)),
        Function::TrimSuffix => trim(function, &args, |s, affix| s.strip_suffix(affix)),
        Function::Index => index(args),
    }
}

/// `trimPrefix affix s` / `trimSuffix affix s`: literal removal, no-op when
/// `s` does not carry the affix.
fn trim<'a>(
    function: Function,
    args: &[Value<'_>],
    strip: impl for<'s> Fn(&'s str, &str) -> Option<&'s str>,
) -> Result<Value<'a>, TemplateError> {
    let [affix, subject] = args else {
        return Err(TemplateError::Exec(format!(
            "wrong number of args for {}: want 2 got {}",
            function.name(),
            args.len()
        )));
    };

    let (Some(affix), Some(subject)) = (affix.as_str(), subject.as_str()) else {
        return Err(TemplateError::Exec(format!(
            "wrong argument types for {}: want (string, string) got ({}, {})",
            function.name(),
            affix.kind(),
            subject.kind()
        )));
    };

    let trimmed = strip(subject, affix).unwrap_or(subject);
    Ok(Value::Text(Cow::Owned(trimmed.to_string())))
}

/// `index collection key...`: each key steps one level into the collection.
fn index(args: Vec<Value<'_>>) -> Result<Value<'_>, TemplateError> {
    let mut args = args.into_iter();
    let Some(collection) = args.next() else {
        return Err(TemplateError::Exec(
            "wrong number of args for index: want at least 1 got 0".to_string(),
        ));
    };

    args.try_fold(collection, |current, key| match (current, key) {
        (Value::Strings(items), Value::Int(i)) => position(i, items.len())
            .and_then(|i| items.get(i))
            .map(|item| Value::Text(Cow::Borrowed(item.as_str())))
            .ok_or_else(|| out_of_range(i)),
        (Value::Claim(ClaimValue::Sequence(items)), Value::Int(i)) => position(i, items.len())
            .and_then(|i| items.get(i))
            .map(Value::Claim)
            .ok_or_else(|| out_of_range(i)),
        (Value::Extra(extra), key) => match key.as_str() {
            Some(name) => lookup(extra, name),
            None => Err(TemplateError::Exec(format!(
                "can't index map with key of type {}",
                key.kind()
            ))),
        },
        (current, key) => Err(TemplateError::Exec(format!(
            "can't index item of type {} with {}",
            current.kind(),
            key.kind()
        ))),
    })
}

fn position(i: i64, len: usize) -> Option<usize> {
    usize::try_from(i).ok().filter(|i| *i < len)
}

fn out_of_range(i: i64) -> TemplateError {
    TemplateError::Exec(format!("error calling index: index out of range: {i}"))
}

fn write_value(out: &mut String, value: &Value<'_>) -> Result<(), TemplateError> {
    match value {
        Value::Text(text) => out.push_str(text),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Strings(items) => {
            out.push('[');
            out.push_str(&items.join(" "));
            out.push(']');
        }
        Value::Claim(claim) => write_claim(out, claim)?,
        Value::Root(_) | Value::Extra(_) => {
            return Err(TemplateError::Exec(format!(
                "can't render value of type {}",
                value.kind()
            )))
        }
    }
    Ok(())
}

fn write_claim(out: &mut String, claim: &ClaimValue) -> Result<(), TemplateError> {
    match claim {
        ClaimValue::Scalar(Scalar::String(s)) => out.push_str(s),
        ClaimValue::Scalar(Scalar::Number(n)) => out.push_str(&n.to_string()),
        ClaimValue::Scalar(Scalar::Bool(b)) => out.push_str(if *b { "true" } else { "false" }),
        ClaimValue::Scalar(Scalar::Null) => {
            return Err(TemplateError::Exec(
                "can't render value of type null".to_string(),
            ))
        }
        ClaimValue::Sequence(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_claim(out, item)?;
            }
            out.push(']');
        }
        ClaimValue::Unrecognized => {
            return Err(TemplateError::Exec(
                "can't render value of type object".to_string(),
            ))
        }
    }
    Ok(())
}
