// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Tokenizer for transformation scripts.
//!
//! Produces a flat token stream with explicit `Newline`, `Indent` and
//! `Dedent` tokens so the parser can treat indentation like braces.
//! Newlines and indentation inside brackets are ignored.

use crate::script::error::ScriptSyntaxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Elif,
    Else,
    For,
    In,
    While,
    Break,
    Continue,
    Pass,
    And,
    Or,
    Not,
    Is,
    True,
    False,
    None,
    Assert,
    Raise,
    // Recognised only so the validator can name them; the parser rejects them.
    Import,
    From,
    Def,
    Class,
    Lambda,
    With,
    Try,
    Except,
    Finally,
    Global,
    Nonlocal,
    Del,
    Return,
    Yield,
    Async,
    Await,
    As,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Keyword> {
        let kw = match word {
            "if" => Keyword::If,
            "elif" => Keyword::Elif,
            "else" => Keyword::Else,
            "for" => Keyword::For,
            "in" => Keyword::In,
            "while" => Keyword::While,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "pass" => Keyword::Pass,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "is" => Keyword::Is,
            "True" => Keyword::True,
            "False" => Keyword::False,
            "None" => Keyword::None,
            "assert" => Keyword::Assert,
            "raise" => Keyword::Raise,
            "import" => Keyword::Import,
            "from" => Keyword::From,
            "def" => Keyword::Def,
            "class" => Keyword::Class,
            "lambda" => Keyword::Lambda,
            "with" => Keyword::With,
            "try" => Keyword::Try,
            "except" => Keyword::Except,
            "finally" => Keyword::Finally,
            "global" => Keyword::Global,
            "nonlocal" => Keyword::Nonlocal,
            "del" => Keyword::Del,
            "return" => Keyword::Return,
            "yield" => Keyword::Yield,
            "async" => Keyword::Async,
            "await" => Keyword::Await,
            "as" => Keyword::As,
            _ => return None,
        };
        Some(kw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::For => "for",
            Keyword::In => "in",
            Keyword::While => "while",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Pass => "pass",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::Is => "is",
            Keyword::True => "True",
            Keyword::False => "False",
            Keyword::None => "None",
            Keyword::Assert => "assert",
            Keyword::Raise => "raise",
            Keyword::Import => "import",
            Keyword::From => "from",
            Keyword::Def => "def",
            Keyword::Class => "class",
            Keyword::Lambda => "lambda",
            Keyword::With => "with",
            Keyword::Try => "try",
            Keyword::Except => "except",
            Keyword::Finally => "finally",
            Keyword::Global => "global",
            Keyword::Nonlocal => "nonlocal",
            Keyword::Del => "del",
            Keyword::Return => "return",
            Keyword::Yield => "yield",
            Keyword::Async => "async",
            Keyword::Await => "await",
            Keyword::As => "as",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(Keyword),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

// Two-character operators precede their one-character prefixes.
const OPERATORS: [&str; 27] = [
    "//", "**", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "+", "-", "*", "/", "%", "<", ">",
    "=", "(", ")", "[", "]", "{", "}", ",", ":", ".",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptSyntaxError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    indents: Vec<usize>,
    depth: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            indents: vec![0],
            depth: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ScriptSyntaxError> {
        let mut at_line_start = true;

        while self.pos < self.chars.len() {
            if at_line_start && self.depth == 0 {
                at_line_start = self.handle_indentation()?;
                if at_line_start {
                    continue;
                }
            }

            let c = self.chars[self.pos];
            match c {
                '\n' => {
                    if self.depth == 0 {
                        self.push_newline();
                        at_line_start = true;
                    }
                    self.advance();
                }
                ' ' | '\r' | '\t' => self.advance(),
                '#' => self.skip_comment(),
                '\\' => {
                    return Err(self.error("line continuation with '\\' is not supported"));
                }
                '"' | '\'' => self.lex_string(c)?,
                c if c.is_ascii_digit() => self.lex_number()?,
                '.' if self.peek(1).is_some_and(|n| n.is_ascii_digit()) => self.lex_number()?,
                c if c.is_alphabetic() || c == '_' => self.lex_word(),
                _ => self.lex_operator()?,
            }
        }

        self.push_newline();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent);
        }
        self.push(TokenKind::Eof);
        Ok(self.tokens)
    }

    /// Measure leading spaces of a logical line and emit Indent/Dedent.
    /// Returns true when the line was blank or comment-only and was consumed.
    fn handle_indentation(&mut self) -> Result<bool, ScriptSyntaxError> {
        let mut width = 0;
        while let Some(c) = self.peek(0) {
            match c {
                ' ' => width += 1,
                '\t' => return Err(self.error("tabs are not allowed in indentation")),
                _ => break,
            }
            self.advance();
        }

        match self.peek(0) {
            None => return Ok(true),
            Some('\n') => {
                self.advance();
                return Ok(true);
            }
            Some('\r') => {
                self.advance();
                if self.peek(0) == Some('\n') {
                    self.advance();
                }
                return Ok(true);
            }
            Some('#') => {
                self.skip_comment();
                if self.peek(0) == Some('\n') {
                    self.advance();
                }
                return Ok(true);
            }
            _ => {}
        }

        let current = *self.indents.last().unwrap_or(&0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent);
        } else if width < current {
            while width < *self.indents.last().unwrap_or(&0) {
                self.indents.pop();
                self.push(TokenKind::Dedent);
            }
            if width != *self.indents.last().unwrap_or(&0) {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(false)
    }

    fn lex_string(&mut self, quote: char) -> Result<(), ScriptSyntaxError> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut value = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(ScriptSyntaxError::new(line, column, "unterminated string literal"));
            };
            self.advance();
            match c {
                '\n' => {
                    return Err(ScriptSyntaxError::new(line, column, "unterminated string literal"))
                }
                '\\' => {
                    let escaped = self.peek(0).ok_or_else(|| {
                        ScriptSyntaxError::new(line, column, "unterminated string literal")
                    })?;
                    self.advance();
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        '\\' => '\\',
                        '\'' => '\'',
                        '"' => '"',
                        other => {
                            return Err(self.error(format!("unsupported escape sequence '\\{other}'")))
                        }
                    });
                }
                c if c == quote => break,
                c => value.push(c),
            }
        }
        self.tokens.push(Token {
            kind: TokenKind::Str(value),
            line,
            column,
        });
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), ScriptSyntaxError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        let mut is_float = false;

        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek(0) == Some('.') {
            is_float = true;
            self.advance();
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(0), Some('e' | 'E')) {
            let sign_offset = usize::from(matches!(self.peek(1), Some('+' | '-')));
            if self.peek(1 + sign_offset).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                for _ in 0..=sign_offset {
                    self.advance();
                }
                while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if self.peek(0).is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return Err(ScriptSyntaxError::new(line, column, format!("invalid number literal '{text}'")));
        }
        let kind = if is_float {
            TokenKind::Float(text.parse().map_err(|_| {
                ScriptSyntaxError::new(line, column, format!("invalid float literal '{text}'"))
            })?)
        } else {
            TokenKind::Int(text.parse().map_err(|_| {
                ScriptSyntaxError::new(line, column, format!("integer literal '{text}' is too large"))
            })?)
        };
        self.tokens.push(Token { kind, line, column });
        Ok(())
    }

    fn lex_word(&mut self) {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        while self.peek(0).is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let kind = match Keyword::lookup(&word) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Name(word),
        };
        self.tokens.push(Token { kind, line, column });
    }

    fn lex_operator(&mut self) -> Result<(), ScriptSyntaxError> {
        let (line, column) = (self.line, self.column);
        for op in OPERATORS {
            let matches = op
                .chars()
                .enumerate()
                .all(|(i, expected)| self.peek(i) == Some(expected));
            if matches {
                for _ in 0..op.len() {
                    self.advance();
                }
                match op {
                    "(" | "[" | "{" => self.depth += 1,
                    ")" | "]" | "}" => {
                        if self.depth == 0 {
                            return Err(ScriptSyntaxError::new(line, column, format!("unmatched '{op}'")));
                        }
                        self.depth -= 1;
                    }
                    _ => {}
                }
                self.tokens.push(Token {
                    kind: TokenKind::Op(op),
                    line,
                    column,
                });
                return Ok(());
            }
        }
        let c = self.chars[self.pos];
        Err(self.error(format!("unexpected character '{c}'")))
    }

    fn skip_comment(&mut self) {
        while self.peek(0).is_some_and(|c| c != '\n') {
            self.advance();
        }
    }

    fn push_newline(&mut self) {
        let needs_newline = !matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Newline) | Some(TokenKind::Indent) | Some(TokenKind::Dedent)
        );
        if needs_newline {
            self.push(TokenKind::Newline);
        }
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
            column: self.column,
        });
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.chars.get(self.pos) {
            if *c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptSyntaxError {
        ScriptSyntaxError::new(self.line, self.column, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_single_line_if() {
        let tokens = kinds("if ratio > 3.0: confidence += 0.05\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Keyword(Keyword::If),
                TokenKind::Name("ratio".into()),
                TokenKind::Op(">"),
                TokenKind::Float(3.0),
                TokenKind::Op(":"),
                TokenKind::Name("confidence".into()),
                TokenKind::Op("+="),
                TokenKind::Float(0.05),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn emits_indent_and_dedent() {
        let tokens = kinds("if x:\n    y = 1\nz = 2\n");
        assert!(tokens.contains(&TokenKind::Indent));
        assert!(tokens.contains(&TokenKind::Dedent));
        let indent_at = tokens.iter().position(|t| *t == TokenKind::Indent).unwrap();
        let dedent_at = tokens.iter().position(|t| *t == TokenKind::Dedent).unwrap();
        assert!(indent_at < dedent_at);
    }

    #[test]
    fn ignores_newlines_inside_brackets_and_blank_lines() {
        let tokens = kinds("x = [1,\n      2]\n\n   # comment only\ny = 3");
        assert!(!tokens.contains(&TokenKind::Indent));
        assert_eq!(tokens.iter().filter(|t| **t == TokenKind::Newline).count(), 2);
    }

    #[test]
    fn rejects_tab_indentation_and_bad_dedent() {
        assert!(tokenize("if x:\n\ty = 1\n").is_err());
        let err = tokenize("if x:\n    y = 1\n  z = 2\n").unwrap_err();
        assert!(err.message.contains("unindent"));
    }

    #[test]
    fn reads_string_escapes_and_keywords() {
        let tokens = kinds("s = 'a\\'b'\nimport os");
        assert!(tokens.contains(&TokenKind::Str("a'b".into())));
        assert!(tokens.contains(&TokenKind::Keyword(Keyword::Import)));
    }

    #[test]
    fn reports_unterminated_string_position() {
        let err = tokenize("x = 1\ny = \"abc").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 5);
    }
}
