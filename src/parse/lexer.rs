//! parse::lexer
//!
//! Tokenizer shared by both dialects.
//!
//! # Dialect differences
//!
//! | | lte | madx |
//! |---|---|---|
//! | comments | `!` | `!`, `//`, `/* */` |
//! | statement end | newline | `;` |
//! | continuation | trailing `&` | n/a |
//! | `%` | RPN assignment, rest of line | error |
//!
//! In lte, newlines inside parentheses are not significant, so a `LINE`
//! may span several lines without `&`.

use super::ParseError;
use crate::core::types::Dialect;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Ident(String),
    Number(f64),
    Str(String),
    /// Raw text of an lte `%` statement.
    Rpn(String),
    Colon,
    ColonEq,
    Comma,
    Eq,
    Semi,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Arrow,
    Newline,
    Eof,
}

impl Tok {
    /// Short description for error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Tok::Ident(s) => format!("identifier '{}'", s),
            Tok::Number(n) => format!("number {}", n),
            Tok::Str(s) => format!("string \"{}\"", s),
            Tok::Rpn(_) => "'%' statement".to_string(),
            Tok::Colon => "':'".to_string(),
            Tok::ColonEq => "':='".to_string(),
            Tok::Comma => "','".to_string(),
            Tok::Eq => "'='".to_string(),
            Tok::Semi => "';'".to_string(),
            Tok::LParen => "'('".to_string(),
            Tok::RParen => "')'".to_string(),
            Tok::LBrace => "'{'".to_string(),
            Tok::RBrace => "'}'".to_string(),
            Tok::Plus => "'+'".to_string(),
            Tok::Minus => "'-'".to_string(),
            Tok::Star => "'*'".to_string(),
            Tok::Slash => "'/'".to_string(),
            Tok::Caret => "'^'".to_string(),
            Tok::Arrow => "'->'".to_string(),
            Tok::Newline => "end of line".to_string(),
            Tok::Eof => "end of input".to_string(),
        }
    }
}

impl Tok {
    /// The token written back as source text.
    pub(crate) fn spelling(&self) -> String {
        match self {
            Tok::Ident(s) | Tok::Rpn(s) => s.clone(),
            Tok::Number(n) => n.to_string(),
            Tok::Str(s) => format!("\"{}\"", s),
            Tok::Colon => ":".to_string(),
            Tok::ColonEq => ":=".to_string(),
            Tok::Comma => ", ".to_string(),
            Tok::Eq => "=".to_string(),
            Tok::Semi => ";".to_string(),
            Tok::LParen => "(".to_string(),
            Tok::RParen => ")".to_string(),
            Tok::LBrace => "{".to_string(),
            Tok::RBrace => "}".to_string(),
            Tok::Plus => "+".to_string(),
            Tok::Minus => "-".to_string(),
            Tok::Star => "*".to_string(),
            Tok::Slash => "/".to_string(),
            Tok::Caret => "^".to_string(),
            Tok::Arrow => "->".to_string(),
            Tok::Newline => "\n".to_string(),
            Tok::Eof => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: usize,
    pub column: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    depth: usize,
    dialect: Dialect,
    tokens: Vec<Token>,
}

/// Split `source` into tokens. The last token is always `Tok::Eof`.
pub(crate) fn tokenize(source: &str, dialect: Dialect) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        depth: 0,
        dialect,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, tok: Tok, line: usize, column: usize) {
        self.tokens.push(Token { tok, line, column });
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(line, column, message)
    }

    fn skip_to_eol(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.peek() {
            let (line, column) = (self.line, self.column);
            match c {
                '\n' => {
                    self.bump();
                    if self.dialect == Dialect::Lte
                        && self.depth == 0
                        && !matches!(self.tokens.last(), None | Some(Token { tok: Tok::Newline, .. }))
                    {
                        self.push(Tok::Newline, line, column);
                    }
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '!' => self.skip_to_eol(),
                '/' if self.dialect == Dialect::Madx && self.peek_at(1) == Some('/') => {
                    self.skip_to_eol()
                }
                '/' if self.dialect == Dialect::Madx && self.peek_at(1) == Some('*') => {
                    self.block_comment(line, column)?
                }
                '&' if self.dialect == Dialect::Lte => {
                    // Continuation: the rest of the line and the newline are dropped.
                    self.skip_to_eol();
                    self.bump();
                }
                '%' if self.dialect == Dialect::Lte => {
                    self.bump();
                    let start = self.pos;
                    self.skip_to_eol();
                    let text: String = self.chars[start..self.pos].iter().collect();
                    self.push(Tok::Rpn(text.trim().to_string()), line, column);
                }
                '"' | '\'' => self.string(c, line, column)?,
                c if c.is_ascii_digit() => self.number(line, column)?,
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => {
                    self.number(line, column)?
                }
                c if c.is_alphabetic() || c == '_' => self.ident(line, column),
                _ => self.punct(c, line, column)?,
            }
        }

        let (line, column) = (self.line, self.column);
        if self.dialect == Dialect::Lte
            && !matches!(self.tokens.last(), None | Some(Token { tok: Tok::Newline, .. }))
        {
            self.push(Tok::Newline, line, column);
        }
        self.push(Tok::Eof, line, column);
        Ok(())
    }

    fn block_comment(&mut self, line: usize, column: usize) -> Result<(), ParseError> {
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
                None => return Err(self.error(line, column, "unterminated comment")),
            }
        }
    }

    fn string(&mut self, quote: char, line: usize, column: usize) -> Result<(), ParseError> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => break,
                Some('\n') | None => return Err(self.error(line, column, "unterminated string")),
                Some(c) => text.push(c),
            }
        }
        self.push(Tok::Str(text), line, column);
        Ok(())
    }

    fn number(&mut self, line: usize, column: usize) -> Result<(), ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let signed = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        let value = text
            .parse::<f64>()
            .map_err(|_| self.error(line, column, format!("invalid number '{}'", text)))?;
        self.push(Tok::Number(value), line, column);
        Ok(())
    }

    fn ident(&mut self, line: usize, column: usize) {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '$'))
        {
            self.bump();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.push(Tok::Ident(text), line, column);
    }

    fn punct(&mut self, c: char, line: usize, column: usize) -> Result<(), ParseError> {
        let tok = match c {
            ':' if self.peek_at(1) == Some('=') => {
                self.bump();
                Tok::ColonEq
            }
            '-' if self.peek_at(1) == Some('>') => {
                self.bump();
                Tok::Arrow
            }
            ':' => Tok::Colon,
            ',' => Tok::Comma,
            '=' => Tok::Eq,
            ';' => Tok::Semi,
            '(' => {
                self.depth += 1;
                Tok::LParen
            }
            ')' => {
                self.depth = self.depth.saturating_sub(1);
                Tok::RParen
            }
            '{' => Tok::LBrace,
            '}' => Tok::RBrace,
            '+' => Tok::Plus,
            '-' => Tok::Minus,
            '*' => Tok::Star,
            '/' => Tok::Slash,
            '^' => Tok::Caret,
            other => {
                return Err(self.error(line, column, format!("unexpected character '{}'", other)));
            }
        };
        self.bump();
        self.push(tok, line, column);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(source: &str, dialect: Dialect) -> Vec<Tok> {
        tokenize(source, dialect)
            .unwrap()
            .into_iter()
            .map(|t| t.tok)
            .collect()
    }

    fn ident(s: &str) -> Tok {
        Tok::Ident(s.to_string())
    }

    #[test]
    fn lte_definition() {
        assert_eq!(
            toks("QF: KQUAD, L=0.342, K1=.49 ! focusing\n", Dialect::Lte),
            vec![
                ident("QF"),
                Tok::Colon,
                ident("KQUAD"),
                Tok::Comma,
                ident("L"),
                Tok::Eq,
                Tok::Number(0.342),
                Tok::Comma,
                ident("K1"),
                Tok::Eq,
                Tok::Number(0.49),
                Tok::Newline,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn lte_continuation_joins_lines() {
        assert_eq!(
            toks("D: DRIF, &\n  L=1e-3", Dialect::Lte),
            vec![
                ident("D"),
                Tok::Colon,
                ident("DRIF"),
                Tok::Comma,
                ident("L"),
                Tok::Eq,
                Tok::Number(1e-3),
                Tok::Newline,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn lte_newlines_inside_parentheses_are_dropped() {
        let tokens = toks("C: LINE=(A,\nB)\n\n\n", Dialect::Lte);
        let newlines = tokens.iter().filter(|t| **t == Tok::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn lte_rpn_statement() {
        assert_eq!(
            toks("% 0.5 2 * sto kf\n", Dialect::Lte),
            vec![Tok::Rpn("0.5 2 * sto kf".into()), Tok::Newline, Tok::Eof]
        );
    }

    #[test]
    fn madx_comments_and_operators() {
        assert_eq!(
            toks("// header\nk := 2^2; /* block\n comment */ QF->K1 = k;", Dialect::Madx),
            vec![
                ident("k"),
                Tok::ColonEq,
                Tok::Number(2.0),
                Tok::Caret,
                Tok::Number(2.0),
                Tok::Semi,
                ident("QF"),
                Tok::Arrow,
                ident("K1"),
                Tok::Eq,
                ident("k"),
                Tok::Semi,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn dotted_identifiers() {
        assert_eq!(
            toks("MB.A8R3.B1", Dialect::Madx),
            vec![ident("MB.A8R3.B1"), Tok::Eof]
        );
    }

    #[test]
    fn strings_keep_contents() {
        assert_eq!(
            toks("F=\"%s-%03ld.w1\"", Dialect::Madx)[2],
            Tok::Str("%s-%03ld.w1".into())
        );
    }

    #[test]
    fn unterminated_string_reports_position() {
        let err = tokenize("A: X, F=\"abc\n", Dialect::Lte).unwrap_err();
        assert_eq!((err.line, err.column), (1, 9));
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn unexpected_character() {
        let err = tokenize("A: X;\nB @ C", Dialect::Madx).unwrap_err();
        assert_eq!((err.line, err.column), (2, 3));
    }

    #[test]
    fn percent_is_an_error_in_madx() {
        assert!(tokenize("% 1 sto a", Dialect::Madx).is_err());
    }
}
