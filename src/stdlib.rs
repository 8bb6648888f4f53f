use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;

use crate::{
    diagnostics::{NuwaError, Result},
    output::OutputSink,
    value::Value,
};

/// A fixed built-in function.
#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub callback: fn(&[Value], &dyn OutputSink) -> Result<Value>,
}

impl NativeFunction {
    pub fn call(&self, args: &[Value], output: &dyn OutputSink) -> Result<Value> {
        if args.len() != self.arity {
            return Err(NuwaError::runtime(
                format!(
                    "function '{}' expected {} argument{} but received {}",
                    self.name,
                    self.arity,
                    if self.arity == 1 { "" } else { "s" },
                    args.len()
                ),
                None,
            ));
        }
        (self.callback)(args, output)
    }
}

static BUILTINS: &[NativeFunction] = &[
    NativeFunction {
        name: "NOW",
        arity: 0,
        callback: time_now,
    },
    NativeFunction {
        name: "FORMAT",
        arity: 2,
        callback: string_format,
    },
    NativeFunction {
        name: "PRINT",
        arity: 1,
        callback: io_print,
    },
];

pub fn lookup(name: &str) -> Option<&'static NativeFunction> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

fn time_now(_args: &[Value], _output: &dyn OutputSink) -> Result<Value> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| NuwaError::runtime("system clock is set before the Unix epoch", None))?;
    Ok(Value::Number(elapsed.as_millis() as f64))
}

fn io_print(args: &[Value], output: &dyn OutputSink) -> Result<Value> {
    let text = args[0].to_string();
    tracing::trace!(%text, "PRINT");
    output.write(&text);
    Ok(Value::Null)
}

fn string_format(args: &[Value], _output: &dyn OutputSink) -> Result<Value> {
    let template = args[0].as_str().ok_or_else(|| NuwaError::Type {
        message: format!(
            "FORMAT expects a string template, found {}",
            args[0].type_name()
        ),
        position: None,
    })?;
    let values = args[1].as_object().ok_or_else(|| NuwaError::Type {
        message: format!(
            "FORMAT expects an object of values, found {}",
            args[1].type_name()
        ),
        position: None,
    })?;
    format_template(template, values).map(Value::String)
}

/// Substitutes `{key}` placeholders; `{{` and `}}` produce literal braces.
pub fn format_template(template: &str, values: &IndexMap<String, Value>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    key.push(next);
                }
                if !closed {
                    return Err(NuwaError::runtime(
                        format!("FORMAT template has an unclosed placeholder '{{{key}'"),
                        None,
                    ));
                }
                let key = key.trim();
                if key.is_empty() {
                    return Err(NuwaError::runtime(
                        "FORMAT template has an empty placeholder '{}'",
                        None,
                    ));
                }
                let value = values.get(key).ok_or_else(|| {
                    NuwaError::runtime(
                        format!("FORMAT placeholder '{key}' has no matching value"),
                        None,
                    )
                })?;
                out.push_str(&value.to_string());
            }
            other => out.push(other),
        }
    }
    Ok(out)
}
