//! parse::parser
//!
//! Recursive descent over the token stream.
//!
//! # Grammar
//!
//! ```text
//! statement  := label ':' 'LINE' '=' items
//!             | label ':' 'SEQUENCE' attrs END entry* 'ENDSEQUENCE'     (madx)
//!             | label ':' TYPE attrs
//!             | NAME ('=' | ':=') expr
//!             | NAME '->' KEY ('=' | ':=') value                        (madx)
//!             | 'USE' [','] (NAME | ('SEQUENCE' | 'PERIOD') '=' NAME)
//!             | '%' rpn                                                (lte)
//!             | 'RETURN'
//!             | COMMAND ...
//! attrs      := (',' KEY [('=' | ':=') value])*
//! items      := '(' item (',' item)* ')'
//! item       := [INT '*'] ['-'] (NAME | items)
//! expr       := term (('+' | '-') term)*
//! term       := unary (('*' | '/') unary)*
//! unary      := ('-' | '+') unary | power
//! power      := primary ['^' unary]
//! primary    := NUMBER | NAME | NAME '(' expr ')' | NAME '->' KEY | '(' expr ')'
//! ```
//!
//! Statements end at a newline in lte and at `;` in madx. Names, types and
//! attribute keys are uppercased.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use super::expr::{self, Rpn, Variables};
use super::lexer::{tokenize, Tok, Token};
use super::lines::{self, LineDef, LineItem};
use super::{ParseError, ParsedLattice};
use crate::core::definitions::ElementDefinition;
use crate::core::families::FamilyTable;
use crate::core::positions::Positions;
use crate::core::types::{AttrValue, Dialect};

/// Leading words of a madx variable declaration.
const DECLARATION_PREFIXES: [&str; 4] = ["CONST", "REAL", "INT", "SHARED"];

/// Parse one source text.
pub(crate) fn parse(source: &str, dialect: Dialect) -> Result<ParsedLattice, ParseError> {
    let tokens = tokenize(source, dialect)?;
    let mut parser = Parser::new(tokens, dialect);
    parser.statements()?;
    parser.finish()
}

#[derive(Debug, Default)]
struct Sequence {
    refs: Vec<String>,
    positions: Positions,
}

/// Where a sequence entry sits, before the reference frame is applied.
#[derive(Debug, Default)]
struct Placement {
    at: Option<f64>,
    from: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refer {
    Entry,
    Centre,
    Exit,
}

impl Refer {
    fn parse(value: Option<&AttrValue>) -> Option<Self> {
        match value {
            None => Some(Refer::Centre),
            Some(v) => match v.as_str()?.to_uppercase().as_str() {
                "ENTRY" => Some(Refer::Entry),
                "CENTRE" | "CENTER" => Some(Refer::Centre),
                "EXIT" => Some(Refer::Exit),
                _ => None,
            },
        }
    }

    /// Offset from the reference point to the element centre.
    fn centre_offset(self, length: f64) -> f64 {
        match self {
            Refer::Entry => length / 2.0,
            Refer::Centre => 0.0,
            Refer::Exit => -length / 2.0,
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    dialect: Dialect,
    families: FamilyTable,
    vars: Variables,
    definitions: IndexMap<String, ElementDefinition>,
    lines: IndexMap<String, LineDef>,
    sequences: IndexMap<String, Sequence>,
    used: Option<(String, usize, usize)>,
    /// Bare madx identifiers that were not variables when read.
    unresolved: BTreeSet<String>,
}

impl Parser {
    fn new(tokens: Vec<Token>, dialect: Dialect) -> Self {
        let families = match dialect {
            Dialect::Lte => FamilyTable::elegant(),
            Dialect::Madx => FamilyTable::empty(),
        };
        Self {
            tokens,
            pos: 0,
            dialect,
            families,
            vars: Variables::new(),
            definitions: IndexMap::new(),
            lines: IndexMap::new(),
            sequences: IndexMap::new(),
            used: None,
            unresolved: BTreeSet::new(),
        }
    }

    // ===== Token helpers =====

    fn token(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek(&self) -> &Tok {
        &self.token().tok
    }

    fn peek_nth(&self, n: usize) -> &Tok {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)].tok
    }

    fn advance(&mut self) -> Token {
        let token = self.token().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_at(token: &Token, message: impl Into<String>) -> ParseError {
        ParseError::new(token.line, token.column, message)
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        Self::error_at(self.token(), message)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        self.error_here(format!(
            "expected {}, found {}",
            expected,
            self.peek().describe()
        ))
    }

    fn expect(&mut self, tok: Tok) -> Result<Token, ParseError> {
        if *self.peek() == tok {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&tok.describe()))
        }
    }

    fn is_terminator(&self, tok: &Tok) -> bool {
        match self.dialect {
            Dialect::Lte => matches!(tok, Tok::Newline | Tok::Eof),
            Dialect::Madx => matches!(tok, Tok::Semi | Tok::Eof),
        }
    }

    fn at_terminator(&self) -> bool {
        self.is_terminator(self.peek())
    }

    fn end_statement(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Tok::Eof => Ok(()),
            tok if self.is_terminator(tok) => {
                self.advance();
                Ok(())
            }
            _ => Err(self.unexpected("end of statement")),
        }
    }

    fn skip_statement(&mut self) -> Result<(), ParseError> {
        while !self.at_terminator() {
            self.advance();
        }
        self.end_statement()
    }

    /// An element or line name: an identifier or a quoted string.
    fn name(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Tok::Ident(s) | Tok::Str(s) => {
                let name = s.to_uppercase();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    // ===== Statements =====

    fn statements(&mut self) -> Result<(), ParseError> {
        loop {
            while matches!(self.peek(), Tok::Newline | Tok::Semi) {
                self.advance();
            }

            let next = self.peek_nth(1).clone();
            match self.peek().clone() {
                Tok::Eof => return Ok(()),
                Tok::Rpn(text) => self.rpn(&text)?,
                Tok::Ident(word) => {
                    let upper = word.to_uppercase();
                    match next {
                        _ if upper == "RETURN" => {
                            tracing::debug!("RETURN reached, ignoring remaining input");
                            return Ok(());
                        }
                        Tok::Colon => self.labeled()?,
                        Tok::Eq | Tok::ColonEq => self.assignment()?,
                        Tok::Arrow => self.attribute_update()?,
                        _ if upper == "USE" => self.use_statement()?,
                        Tok::Ident(_) if DECLARATION_PREFIXES.contains(&upper.as_str()) => {
                            self.advance();
                        }
                        _ => {
                            tracing::debug!(command = %upper, "ignoring command");
                            self.skip_statement()?;
                        }
                    }
                }
                Tok::Str(_) if next == Tok::Colon => self.labeled()?,
                _ => return Err(self.unexpected("a statement")),
            }
        }
    }

    fn rpn(&mut self, text: &str) -> Result<(), ParseError> {
        let token = self.advance();
        Rpn::new(&mut self.vars)
            .run(text)
            .map_err(|message| Self::error_at(&token, message))?;
        self.end_statement()
    }

    fn assignment(&mut self) -> Result<(), ParseError> {
        let name = self.name()?;
        self.advance();
        let value = self.expr()?;
        tracing::trace!(variable = %name, value, "assigned");
        self.vars.set(&name, value);
        self.end_statement()
    }

    fn attribute_update(&mut self) -> Result<(), ParseError> {
        let target = self.token().clone();
        let name = self.name()?;
        self.expect(Tok::Arrow)?;
        let key = self.name()?;
        match self.peek() {
            Tok::Eq | Tok::ColonEq => {
                self.advance();
            }
            _ => return Err(self.unexpected("'=' or ':='")),
        }
        let value = self.value()?;
        let def = self
            .definitions
            .get_mut(&name)
            .ok_or_else(|| Self::error_at(&target, format!("undefined element '{}'", name)))?;
        def.set_attr(&key, value);
        self.end_statement()
    }

    fn use_statement(&mut self) -> Result<(), ParseError> {
        self.advance();
        if *self.peek() == Tok::Comma {
            self.advance();
        }
        if matches!(self.peek(), Tok::Ident(_)) && *self.peek_nth(1) == Tok::Eq {
            let key = self.name()?;
            if key != "SEQUENCE" && key != "PERIOD" {
                return Err(self.unexpected("SEQUENCE= or PERIOD="));
            }
            self.advance();
        }

        let target = self.token().clone();
        let name = self.name()?;
        self.used = Some((name, target.line, target.column));
        self.skip_statement()
    }

    fn labeled(&mut self) -> Result<(), ParseError> {
        let label = self.token().clone();
        let name = self.name()?;
        self.expect(Tok::Colon)?;

        let kind = match self.peek() {
            Tok::Ident(kind) => kind.to_uppercase(),
            _ => return Err(self.unexpected("an element type")),
        };

        match kind.as_str() {
            "LINE" => {
                self.advance();
                self.line_definition(name, &label)
            }
            "SEQUENCE" if self.dialect == Dialect::Madx => {
                self.advance();
                self.sequence(name, &label)
            }
            _ => {
                self.advance();
                let (def, _) = self.element_definition(&kind)?;
                self.definitions.insert(name, def);
                self.end_statement()
            }
        }
    }

    /// The body of `NAME: TYPE, attrs`, after the type.
    ///
    /// A type that names an existing element inherits its family and
    /// attributes. `AT` and `FROM` are split off as the placement.
    fn element_definition(
        &mut self,
        kind: &str,
    ) -> Result<(ElementDefinition, Placement), ParseError> {
        let mut def = match self.definitions.get(kind) {
            Some(parent) => parent.clone(),
            None => ElementDefinition::new(self.families.normalize(kind)),
        };

        let mut placement = Placement::default();
        for (key, value) in self.attributes()? {
            match key.as_str() {
                "AT" => placement.at = value.as_f64(),
                "FROM" => placement.from = value.as_str().map(str::to_uppercase),
                _ => def.set_attr(&key, value),
            }
        }
        Ok((def, placement))
    }

    fn attributes(&mut self) -> Result<Vec<(String, AttrValue)>, ParseError> {
        let mut attrs = Vec::new();
        while *self.peek() == Tok::Comma {
            self.advance();
            let key = self.name()?;
            let value = match self.peek() {
                Tok::Eq | Tok::ColonEq => {
                    self.advance();
                    self.value()?
                }
                tok if self.dialect == Dialect::Madx
                    && (*tok == Tok::Comma || self.is_terminator(tok)) =>
                {
                    AttrValue::Bool(true)
                }
                _ => return Err(self.unexpected("'='")),
            };
            attrs.push((key, value));
        }
        Ok(attrs)
    }

    fn value(&mut self) -> Result<AttrValue, ParseError> {
        let next = self.peek_nth(1).clone();
        let whole = next == Tok::Comma || self.is_terminator(&next);

        match self.peek().clone() {
            Tok::Str(text) => {
                self.advance();
                let number = match self.dialect {
                    Dialect::Lte => expr::eval_quoted(&text, &self.vars),
                    Dialect::Madx => None,
                };
                Ok(number.map_or(AttrValue::Text(text), AttrValue::Number))
            }
            Tok::Ident(word) if whole => {
                self.advance();
                let value = match word.to_uppercase().as_str() {
                    "TRUE" => AttrValue::Bool(true),
                    "FALSE" => AttrValue::Bool(false),
                    upper => match self.vars.get(upper) {
                        Some(number) => AttrValue::Number(number),
                        None => {
                            if self.dialect == Dialect::Madx {
                                self.unresolved.insert(upper.to_string());
                            }
                            AttrValue::Text(word)
                        }
                    },
                };
                Ok(value)
            }
            Tok::LBrace => self.array(),
            _ => Ok(AttrValue::Number(self.expr()?)),
        }
    }

    /// A braced array such as `{0, 0.1}`, kept as its source text.
    fn array(&mut self) -> Result<AttrValue, ParseError> {
        let open = self.advance();
        let mut text = open.tok.spelling();
        let mut depth = 1;
        while depth > 0 {
            let tok = self.peek().clone();
            if self.is_terminator(&tok) {
                return Err(Self::error_at(&open, "unterminated array value"));
            }
            match tok {
                Tok::LBrace => depth += 1,
                Tok::RBrace => depth -= 1,
                _ => {}
            }
            text.push_str(&tok.spelling());
            self.advance();
        }
        tracing::debug!(value = %text, "keeping array value as text");
        Ok(AttrValue::Text(text))
    }

    // ===== Lines =====

    fn line_definition(&mut self, name: String, label: &Token) -> Result<(), ParseError> {
        self.expect(Tok::Eq)?;
        let items = self.line_items()?;
        self.end_statement()?;

        // Redefinition moves the line to the end, so "last line" stays accurate.
        self.lines.shift_remove(&name);
        self.lines.insert(
            name,
            LineDef {
                items,
                line: label.line,
                column: label.column,
            },
        );
        Ok(())
    }

    fn line_items(&mut self) -> Result<Vec<LineItem>, ParseError> {
        self.expect(Tok::LParen)?;
        let mut items = Vec::new();
        if *self.peek() == Tok::RParen {
            self.advance();
            return Ok(items);
        }

        loop {
            items.push(self.line_item()?);
            match self.peek() {
                Tok::Comma => {
                    self.advance();
                }
                Tok::RParen => {
                    self.advance();
                    return Ok(items);
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
    }

    fn line_item(&mut self) -> Result<LineItem, ParseError> {
        let mut repeat = 1;
        if let Tok::Number(n) = *self.peek() {
            if n < 0.0 || n.fract() != 0.0 || n > lines::MAX_REPEAT as f64 {
                return Err(self.error_here(format!("invalid repetition count {}", n)));
            }
            self.advance();
            self.expect(Tok::Star)?;
            repeat = n as usize;
        }

        let reversed = *self.peek() == Tok::Minus;
        if reversed {
            self.advance();
        }

        match self.peek() {
            Tok::LParen => Ok(LineItem::Group {
                items: self.line_items()?,
                repeat,
                reversed,
            }),
            Tok::Ident(_) | Tok::Str(_) => Ok(LineItem::Ref {
                name: self.name()?,
                repeat,
                reversed,
            }),
            _ => Err(self.unexpected("a line item")),
        }
    }

    // ===== Sequences =====

    fn sequence(&mut self, name: String, label: &Token) -> Result<(), ParseError> {
        let header = self.attributes()?;
        self.end_statement()?;

        let refer_value = header
            .iter()
            .find(|(key, _)| key == "REFER")
            .map(|(_, value)| value);
        let refer = Refer::parse(refer_value)
            .ok_or_else(|| Self::error_at(label, "REFER must be ENTRY, CENTRE or EXIT"))?;

        let mut sequence = Sequence::default();
        loop {
            while *self.peek() == Tok::Semi {
                self.advance();
            }

            let entry = self.token().clone();
            match &entry.tok {
                Tok::Eof => {
                    return Err(Self::error_at(
                        label,
                        format!("sequence '{}' has no ENDSEQUENCE", name),
                    ));
                }
                Tok::Ident(word) if word.eq_ignore_ascii_case("ENDSEQUENCE") => {
                    self.advance();
                    self.end_statement()?;
                    break;
                }
                _ => {}
            }

            let slot = self.name()?;
            let placement = if *self.peek() == Tok::Colon {
                self.advance();
                let kind = self.name()?;
                let (def, placement) = self.element_definition(&kind)?;
                self.definitions.insert(slot.clone(), def);
                placement
            } else {
                let mut placement = Placement::default();
                for (key, value) in self.attributes()? {
                    match key.as_str() {
                        "AT" => placement.at = value.as_f64(),
                        "FROM" => placement.from = value.as_str().map(str::to_uppercase),
                        _ => tracing::debug!(element = %slot, key = %key, "ignoring attribute on sequence entry"),
                    }
                }
                placement
            };
            self.end_statement()?;

            let at = placement.at.ok_or_else(|| {
                Self::error_at(&entry, format!("sequence entry '{}' has no AT", slot))
            })?;
            let base = match &placement.from {
                Some(reference) => sequence.positions.last_at(reference).ok_or_else(|| {
                    Self::error_at(&entry, format!("FROM refers to unplaced element '{}'", reference))
                })?,
                None => 0.0,
            };
            let length = self
                .definitions
                .get(&slot)
                .and_then(ElementDefinition::length)
                .unwrap_or(0.0);

            sequence.positions.push(slot.clone(), base + at + refer.centre_offset(length));
            sequence.refs.push(slot);
        }

        self.sequences.shift_remove(&name);
        self.sequences.insert(name, sequence);
        Ok(())
    }

    // ===== Expressions =====

    fn expr(&mut self) -> Result<f64, ParseError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Tok::Plus => {
                    self.advance();
                    value += self.term()?;
                }
                Tok::Minus => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, ParseError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Tok::Star => {
                    self.advance();
                    value *= self.unary()?;
                }
                Tok::Slash => {
                    let op = self.advance();
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(Self::error_at(&op, "division by zero"));
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, ParseError> {
        match self.peek() {
            Tok::Minus => {
                self.advance();
                Ok(-self.unary()?)
            }
            Tok::Plus => {
                self.advance();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, ParseError> {
        let base = self.primary()?;
        if *self.peek() == Tok::Caret {
            self.advance();
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, ParseError> {
        let token = self.advance();
        match &token.tok {
            Tok::Number(n) => Ok(*n),
            Tok::LParen => {
                let value = self.expr()?;
                self.expect(Tok::RParen)?;
                Ok(value)
            }
            Tok::Ident(word) => {
                let upper = word.to_uppercase();
                match self.peek() {
                    Tok::LParen => {
                        let f = expr::function(&upper).ok_or_else(|| {
                            Self::error_at(&token, format!("unknown function '{}'", word))
                        })?;
                        self.advance();
                        let arg = self.expr()?;
                        self.expect(Tok::RParen)?;
                        Ok(f(arg))
                    }
                    Tok::Arrow => {
                        self.advance();
                        let key = self.name()?;
                        self.definitions
                            .get(&upper)
                            .and_then(|def| def.attr(&key))
                            .and_then(AttrValue::as_f64)
                            .ok_or_else(|| {
                                Self::error_at(
                                    &token,
                                    format!("'{}->{}' is not a numeric attribute", word, key),
                                )
                            })
                    }
                    _ => self.vars.get(&upper).ok_or_else(|| {
                        Self::error_at(&token, format!("undefined variable '{}'", word))
                    }),
                }
            }
            other => Err(Self::error_at(
                &token,
                format!("expected a value, found {}", other.describe()),
            )),
        }
    }

    // ===== Result =====

    /// Give deferred madx values (`K1:=kf` before `kf = ...`) the final
    /// value of their variable.
    fn resolve_deferred(&mut self) {
        if self.unresolved.is_empty() {
            return;
        }
        for (name, def) in self.definitions.iter_mut() {
            let resolved: Vec<(String, Option<f64>)> = def
                .attributes()
                .iter()
                .filter_map(|(key, value)| {
                    let word = value.as_str()?.to_uppercase();
                    self.unresolved
                        .contains(&word)
                        .then(|| (key.clone(), self.vars.get(&word)))
                })
                .collect();
            for (key, number) in resolved {
                match number {
                    Some(number) => {
                        tracing::debug!(element = %name, key = %key, number, "resolved deferred value");
                        def.set_attr(&key, number);
                    }
                    None => {
                        tracing::debug!(element = %name, key = %key, "no variable by that name, keeping text");
                    }
                }
            }
        }
    }

    fn finish(mut self) -> Result<ParsedLattice, ParseError> {
        self.resolve_deferred();
        let (lattice, positions, name) = match &self.used {
            Some((used, line, column)) => {
                if let Some(sequence) = self.sequences.get(used) {
                    (
                        sequence.refs.clone(),
                        Some(sequence.positions.clone()),
                        Some(used.clone()),
                    )
                } else if self.lines.contains_key(used) {
                    (self.expand(used)?, None, Some(used.clone()))
                } else if self.definitions.contains_key(used) {
                    (vec![used.clone()], None, Some(used.clone()))
                } else {
                    return Err(ParseError::new(
                        *line,
                        *column,
                        format!("USE refers to unknown line '{}'", used),
                    ));
                }
            }
            None => match (self.dialect, self.sequences.last(), self.lines.last()) {
                (Dialect::Madx, Some((name, sequence)), _) => (
                    sequence.refs.clone(),
                    Some(sequence.positions.clone()),
                    Some(name.clone()),
                ),
                (_, _, Some((name, _))) => (self.expand(name)?, None, None),
                _ => (Vec::new(), None, None),
            },
        };

        tracing::debug!(
            dialect = %self.dialect,
            definitions = self.definitions.len(),
            lines = self.lines.len(),
            sequences = self.sequences.len(),
            slots = lattice.len(),
            "parsed source"
        );

        Ok(ParsedLattice {
            name,
            positions,
            definitions: self.definitions,
            lattice,
        })
    }

    fn expand(&self, root: &str) -> Result<Vec<String>, ParseError> {
        lines::expand(root, &self.lines).map_err(|message| {
            let (line, column) = self
                .lines
                .get(root)
                .map_or((1, 1), |def| (def.line, def.column));
            ParseError::new(line, column, message)
        })
    }
}
