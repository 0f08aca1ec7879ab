//! Value formatting for interpolated text holes.
//!
//! Supported format strings: `D[n]` (zero-padded decimal), `X[n]` / `x[n]`
//! (hex), `F[n]` (fixed point, default 2), `N[n]` (grouped, default 2),
//! `G` (general). Positive alignment right-aligns, negative left-aligns.

use dynemit_core::{RuntimeError, Value};

pub fn format_value(value: &Value, alignment: Option<i32>, format: Option<&str>) -> Result<String, RuntimeError> {
    let text = match format.filter(|f| !f.is_empty()) {
        None => display(value),
        Some(spec) => apply_format(value, spec)?,
    };
    Ok(align(text, alignment.unwrap_or(0)))
}

fn display(value: &Value) -> String {
    match value {
        Value::Void | Value::Null => String::new(),
        Value::Bool(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::UInt32(v) => v.to_string(),
        Value::UInt64(v) => v.to_string(),
        Value::Float32(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        Value::String(v) => v.clone(),
        other => other.kind_name().to_string(),
    }
}

enum Number {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

fn number(value: &Value) -> Option<Number> {
    Some(match value {
        Value::Int32(v) => Number::Signed(i64::from(*v)),
        Value::Int64(v) => Number::Signed(*v),
        Value::UInt32(v) => Number::Unsigned(u64::from(*v)),
        Value::UInt64(v) => Number::Unsigned(*v),
        Value::Float32(v) => Number::Float(f64::from(*v)),
        Value::Float64(v) => Number::Float(*v),
        _ => return None,
    })
}

fn apply_format(value: &Value, spec: &str) -> Result<String, RuntimeError> {
    let invalid = || RuntimeError::InvalidFormat { format: spec.to_string() };
    let mut chars = spec.chars();
    let kind = chars.next().ok_or_else(invalid)?;
    let rest = chars.as_str();
    let precision = if rest.is_empty() {
        None
    } else {
        Some(rest.parse::<usize>().map_err(|_| invalid())?)
    };
    if matches!(kind, 'G' | 'g') {
        return Ok(display(value));
    }
    let num = number(value).ok_or_else(invalid)?;

    match (kind, num) {
        ('D' | 'd', Number::Signed(v)) => {
            let width = precision.unwrap_or(0);
            let digits = format!("{:0width$}", v.unsigned_abs());
            Ok(if v < 0 { format!("-{digits}") } else { digits })
        }
        ('D' | 'd', Number::Unsigned(v)) => Ok(format!("{:0width$}", v, width = precision.unwrap_or(0))),
        ('X', n) => hex(value, n, precision, true).ok_or_else(invalid),
        ('x', n) => hex(value, n, precision, false).ok_or_else(invalid),
        ('F' | 'f', n) => Ok(format!("{:.prec$}", as_f64(&n), prec = precision.unwrap_or(2))),
        ('N' | 'n', n) => Ok(grouped(as_f64(&n), precision.unwrap_or(2))),
        _ => Err(invalid()),
    }
}

fn as_f64(n: &Number) -> f64 {
    match n {
        Number::Signed(v) => *v as f64,
        Number::Unsigned(v) => *v as f64,
        Number::Float(v) => *v,
    }
}

fn hex(value: &Value, n: Number, precision: Option<usize>, upper: bool) -> Option<String> {
    // Negative values print their two's complement at the value's own width.
    let bits = match (value, n) {
        (Value::Int32(v), _) => u64::from(*v as u32),
        (_, Number::Signed(v)) => v as u64,
        (_, Number::Unsigned(v)) => v,
        (_, Number::Float(_)) => return None,
    };
    let width = precision.unwrap_or(0);
    Some(if upper {
        format!("{bits:0width$X}")
    } else {
        format!("{bits:0width$x}")
    })
}

fn grouped(value: f64, precision: usize) -> String {
    let fixed = format!("{:.precision$}", value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (fixed.clone(), None),
    };
    let mut out = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    if value < 0.0 { format!("-{out}") } else { out }
}

fn align(text: String, alignment: i32) -> String {
    let width = alignment.unsigned_abs() as usize;
    let len = text.chars().count();
    if len >= width {
        return text;
    }
    let pad = " ".repeat(width - len);
    if alignment > 0 { pad + &text } else { text + &pad }
}
