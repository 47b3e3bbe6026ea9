//! parse::expr
//!
//! Variables, built-in functions and the RPN calculator used by lte `%`
//! statements and quoted lte values.
//!
//! Variable names are case-insensitive and stored uppercased.

use std::collections::HashMap;
use std::f64::consts::{E, PI};

/// Named numeric variables visible to expressions.
#[derive(Debug, Clone, Default)]
pub(crate) struct Variables {
    values: HashMap<String, f64>,
}

impl Variables {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_uppercase(), value);
    }

    /// A user variable, falling back to a built-in constant.
    pub(crate) fn get(&self, name: &str) -> Option<f64> {
        let key = name.to_uppercase();
        self.values.get(&key).copied().or_else(|| constant(&key))
    }
}

/// Built-in constants, by uppercased name.
pub(crate) fn constant(name: &str) -> Option<f64> {
    match name {
        "PI" => Some(PI),
        "TWOPI" => Some(2.0 * PI),
        "E" => Some(E),
        "DEGRAD" => Some(180.0 / PI),
        "RADDEG" => Some(PI / 180.0),
        _ => None,
    }
}

/// Built-in one-argument functions, by uppercased name.
pub(crate) fn function(name: &str) -> Option<fn(f64) -> f64> {
    let f: fn(f64) -> f64 = match name {
        "SQRT" => f64::sqrt,
        "SIN" => f64::sin,
        "COS" => f64::cos,
        "TAN" => f64::tan,
        "ASIN" => f64::asin,
        "ACOS" => f64::acos,
        "ATAN" => f64::atan,
        "EXP" => f64::exp,
        "LOG" | "LN" => f64::ln,
        "LOG10" => f64::log10,
        "ABS" => f64::abs,
        _ => return None,
    };
    Some(f)
}

/// Stack calculator for elegant-style RPN.
///
/// Words are whitespace separated. `sto NAME` stores the top of the stack
/// into a variable without popping it.
pub(crate) struct Rpn<'a> {
    vars: &'a mut Variables,
    stack: Vec<f64>,
}

impl<'a> Rpn<'a> {
    pub(crate) fn new(vars: &'a mut Variables) -> Self {
        Self {
            vars,
            stack: Vec::new(),
        }
    }

    /// Run every word in `text`, returning the top of the stack if any.
    pub(crate) fn run(mut self, text: &str) -> Result<Option<f64>, String> {
        let mut words = text.split_whitespace();
        while let Some(word) = words.next() {
            if word.eq_ignore_ascii_case("sto") {
                let name = words
                    .next()
                    .ok_or_else(|| "'sto' needs a variable name".to_string())?;
                let value = self.top("sto")?;
                self.vars.set(name, value);
            } else {
                self.word(word)?;
            }
        }
        Ok(self.stack.last().copied())
    }

    fn top(&self, word: &str) -> Result<f64, String> {
        self.stack
            .last()
            .copied()
            .ok_or_else(|| format!("stack empty at '{}'", word))
    }

    fn pop(&mut self, word: &str) -> Result<f64, String> {
        self.stack
            .pop()
            .ok_or_else(|| format!("stack empty at '{}'", word))
    }

    fn word(&mut self, word: &str) -> Result<(), String> {
        if let Ok(value) = word.parse::<f64>() {
            self.stack.push(value);
            return Ok(());
        }

        let upper = word.to_uppercase();
        match upper.as_str() {
            "+" | "-" | "*" | "/" | "POW" => {
                let b = self.pop(word)?;
                let a = self.pop(word)?;
                let value = match upper.as_str() {
                    "+" => a + b,
                    "-" => a - b,
                    "*" => a * b,
                    "/" if b == 0.0 => return Err("division by zero".to_string()),
                    "/" => a / b,
                    _ => a.powf(b),
                };
                self.stack.push(value);
            }
            "CHS" => {
                let a = self.pop(word)?;
                self.stack.push(-a);
            }
            "DUP" => {
                let a = self.top(word)?;
                self.stack.push(a);
            }
            "POP" => {
                self.pop(word)?;
            }
            "EXCH" | "SWAP" => {
                let b = self.pop(word)?;
                let a = self.pop(word)?;
                self.stack.push(b);
                self.stack.push(a);
            }
            _ => {
                if let Some(f) = function(&upper) {
                    let a = self.pop(word)?;
                    self.stack.push(f(a));
                } else if let Some(value) = self.vars.get(&upper) {
                    self.stack.push(value);
                } else {
                    return Err(format!("unknown word '{}'", word));
                }
            }
        }
        Ok(())
    }
}

/// Evaluate a quoted lte value as RPN without side effects.
///
/// Returns `None` unless the whole text is a valid expression, so ordinary
/// strings such as file name templates stay text.
pub(crate) fn eval_quoted(text: &str, vars: &Variables) -> Option<f64> {
    if text.trim().is_empty() {
        return None;
    }
    let mut scratch = vars.clone();
    Rpn::new(&mut scratch).run(text).ok().flatten()
}
