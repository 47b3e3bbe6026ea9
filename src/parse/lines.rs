//! parse::lines
//!
//! Beam line expansion.
//!
//! A line is a list of items; each item is an element or line name, or a
//! parenthesized group, optionally repeated (`3*X`) and/or reflected (`-X`).
//! Expansion inlines nested lines recursively into a flat sequence of
//! element names. Names that are not lines are emitted as-is.

use indexmap::IndexMap;

/// One item in a `LINE=(...)` body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LineItem {
    Ref {
        name: String,
        repeat: usize,
        reversed: bool,
    },
    Group {
        items: Vec<LineItem>,
        repeat: usize,
        reversed: bool,
    },
}

/// A named line and where it was defined.
#[derive(Debug, Clone)]
pub(crate) struct LineDef {
    pub items: Vec<LineItem>,
    pub line: usize,
    pub column: usize,
}

/// Largest repetition count accepted in front of a line item.
pub(crate) const MAX_REPEAT: usize = 100_000;

/// Upper bound on expansion steps, so nested repetition cannot run away.
pub(crate) const MAX_EXPANSION: usize = 1_000_000;

/// Expand `root` into a flat list of element names.
///
/// Errors name the offending line when the definitions are recursive or
/// the expansion exceeds [`MAX_EXPANSION`] steps.
pub(crate) fn expand(root: &str, lines: &IndexMap<String, LineDef>) -> Result<Vec<String>, String> {
    let mut expander = Expander {
        root,
        lines,
        stack: Vec::new(),
        out: Vec::new(),
        steps: 0,
    };
    expander.line(root, false)?;
    Ok(expander.out)
}

struct Expander<'a> {
    root: &'a str,
    lines: &'a IndexMap<String, LineDef>,
    stack: Vec<String>,
    out: Vec<String>,
    steps: usize,
}

impl Expander<'_> {
    fn step(&mut self) -> Result<(), String> {
        self.steps += 1;
        if self.steps > MAX_EXPANSION {
            return Err(format!(
                "line '{}' expands to more than {} items",
                self.root, MAX_EXPANSION
            ));
        }
        Ok(())
    }

    fn line(&mut self, name: &str, reversed: bool) -> Result<(), String> {
        self.step()?;
        let lines = self.lines;
        let Some(def) = lines.get(name) else {
            self.out.push(name.to_string());
            return Ok(());
        };
        if self.stack.iter().any(|s| s == name) {
            return Err(format!("line '{}' contains itself", name));
        }

        self.stack.push(name.to_string());
        let result = self.items(&def.items, reversed);
        self.stack.pop();
        result
    }

    fn items(&mut self, items: &[LineItem], reversed: bool) -> Result<(), String> {
        self.step()?;
        let ordered: Box<dyn Iterator<Item = &LineItem>> = if reversed {
            Box::new(items.iter().rev())
        } else {
            Box::new(items.iter())
        };

        for item in ordered {
            match item {
                LineItem::Ref {
                    name,
                    repeat,
                    reversed: flip,
                } => {
                    for _ in 0..*repeat {
                        self.line(name, reversed != *flip)?;
                    }
                }
                LineItem::Group {
                    items,
                    repeat,
                    reversed: flip,
                } => {
                    for _ in 0..*repeat {
                        self.items(items, reversed != *flip)?;
                    }
                }
            }
        }
        Ok(())
    }
}
