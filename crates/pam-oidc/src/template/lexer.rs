//! Tokenizer for user templates.
//!
//! Splits a template into literal text and the tokens of each `{{ ... }}`
//! action. Whitespace trim markers (`{{- ` and ` -}}`) are applied here so
//! the parser only ever sees final text.

use super::TemplateError;

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const LEFT_COMMENT: &str = "/*";
const RIGHT_COMMENT: &str = "*/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// Literal text outside of actions.
    Text(String),
    /// Start of an action.
    Open,
    /// End of an action.
    Close,
    /// Field chain such as `.Extra.groups`.
    Field(Vec<String>),
    /// The bare cursor `.`.
    Dot,
    /// Function name or keyword.
    Ident(String),
    /// String literal, already unescaped.
    Str(String),
    Int(i64),
    Pipe,
    LeftParen,
    RightParen,
}

/// A token together with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn lex(source: &str) -> Result<Vec<Spanned>, TemplateError> {
    let mut lexer = Lexer {
        src: source,
        pos: 0,
        trim_next_text: false,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    trim_next_text: bool,
    tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        self.src.get(self.pos..).unwrap_or_default()
    }

    fn push(&mut self, token: Token, offset: usize) {
        self.tokens.push(Spanned { token, offset });
    }

    fn run(&mut self) -> Result<(), TemplateError> {
        loop {
            let rest = self.rest();
            let Some(open_at) = rest.find(LEFT_DELIM) else {
                self.push_text(rest, false);
                return Ok(());
            };

            let text = rest.get(..open_at).unwrap_or_default();
            let after_delim = rest.get(open_at + LEFT_DELIM.len()..).unwrap_or_default();
            let trim_left = has_trim_marker(after_delim);
            self.push_text(text, trim_left);

            let action_start = self.pos + open_at;
            self.pos = action_start + LEFT_DELIM.len() + usize::from(trim_left);
            self.lex_action(action_start)?;
        }
    }

    fn push_text(&mut self, text: &str, trim_trailing: bool) {
        let mut text = text;
        if std::mem::take(&mut self.trim_next_text) {
            text = text.trim_start();
        }
        if trim_trailing {
            text = text.trim_end();
        }
        if !text.is_empty() {
            self.push(Token::Text(text.to_string()), self.pos);
        }
    }

    /// Skips whitespace and reports whether any was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        let skipped = rest.len() - trimmed.len();
        self.pos += skipped;
        skipped > 0
    }

    /// Consumes a closing delimiter if one is next. Returns `true` if the
    /// action ended.
    fn try_close(&mut self, after_whitespace: bool) -> bool {
        let rest = self.rest();
        if after_whitespace && rest.starts_with("-}}") {
            self.push(Token::Close, self.pos);
            self.pos += 3;
            self.trim_next_text = true;
            return true;
        }
        if rest.starts_with(RIGHT_DELIM) {
            self.push(Token::Close, self.pos);
            self.pos += RIGHT_DELIM.len();
            return true;
        }
        false
    }

    fn lex_action(&mut self, action_start: usize) -> Result<(), TemplateError> {
        let skipped = self.skip_whitespace();
        if self.rest().starts_with(LEFT_COMMENT) {
            return self.lex_comment(action_start);
        }

        self.push(Token::Open, action_start);
        let mut after_whitespace = skipped;

        loop {
            if self.try_close(after_whitespace) {
                return Ok(());
            }

            let offset = self.pos;
            let rest = self.rest();
            let Some(c) = rest.chars().next() else {
                return Err(TemplateError::Parse(format!(
                    "unclosed action starting at offset {action_start}"
                )));
            };

            match c {
                '|' => {
                    self.push(Token::Pipe, offset);
                    self.pos += 1;
                }
                '(' => {
                    self.push(Token::LeftParen, offset);
                    self.pos += 1;
                }
                ')' => {
                    self.push(Token::RightParen, offset);
                    self.pos += 1;
                }
                '"' => self.lex_quoted(offset)?,
                '`' => self.lex_raw(offset)?,
                '.' => self.lex_field(offset)?,
                '$' => {
                    return Err(TemplateError::Parse(format!(
                        "variables are not supported (offset {offset})"
                    )))
                }
                c if c.is_ascii_digit() || (c == '-' && starts_with_digit(rest.get(1..))) => {
                    self.lex_number(offset)?;
                }
                c if is_ident_start(c) => {
                    let ident = take_while(rest, is_ident_char);
                    self.pos += ident.len();
                    self.push(Token::Ident(ident.to_string()), offset);
                }
                other => {
                    return Err(TemplateError::Parse(format!(
                        "unexpected {other:?} in action at offset {offset}"
                    )))
                }
            }

            after_whitespace = self.skip_whitespace();
        }
    }

    fn lex_comment(&mut self, action_start: usize) -> Result<(), TemplateError> {
        let body = self.rest().get(LEFT_COMMENT.len()..).unwrap_or_default();
        let Some(end) = body.find(RIGHT_COMMENT) else {
            return Err(TemplateError::Parse(format!(
                "unclosed comment starting at offset {action_start}"
            )));
        };
        self.pos += LEFT_COMMENT.len() + end + RIGHT_COMMENT.len();

        let skipped = self.skip_whitespace();
        let rest = self.rest();
        if skipped && rest.starts_with("-}}") {
            self.pos += 3;
            self.trim_next_text = true;
            Ok(())
        } else if rest.starts_with(RIGHT_DELIM) {
            self.pos += RIGHT_DELIM.len();
            Ok(())
        } else {
            Err(TemplateError::Parse(format!(
                "comment ends before closing delimiter at offset {}",
                self.pos
            )))
        }
    }

    fn lex_quoted(&mut self, offset: usize) -> Result<(), TemplateError> {
        let mut value = String::new();
        let mut chars = self.rest().char_indices().skip(1);

        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    self.push(Token::Str(value), offset);
                    return Ok(());
                }
                '\\' => {
                    let escaped = match chars.next().map(|(_, e)| e) {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        other => {
                            return Err(TemplateError::Parse(format!(
                                "invalid escape {other:?} in string at offset {offset}"
                            )))
                        }
                    };
                    value.push(escaped);
                }
                '\n' => break,
                c => value.push(c),
            }
        }

        Err(TemplateError::Parse(format!(
            "unterminated string at offset {offset}"
        )))
    }

    fn lex_raw(&mut self, offset: usize) -> Result<(), TemplateError> {
        let body = self.rest().get(1..).unwrap_or_default();
        let Some(end) = body.find('`') else {
            return Err(TemplateError::Parse(format!(
                "unterminated raw string at offset {offset}"
            )));
        };
        let value = body.get(..end).unwrap_or_default().to_string();
        self.pos += end + 2;
        self.push(Token::Str(value), offset);
        Ok(())
    }

    fn lex_field(&mut self, offset: usize) -> Result<(), TemplateError> {
        let mut chain = Vec::new();
        loop {
            let rest = self.rest();
            let Some(after_dot) = rest.strip_prefix('.') else {
                break;
            };
            let name = take_while(after_dot, is_ident_char);
            if name.is_empty() {
                break;
            }
            if !name.chars().next().is_some_and(is_ident_start) {
                return Err(TemplateError::Parse(format!(
                    "bad field name at offset {}",
                    self.pos
                )));
            }
            self.pos += 1 + name.len();
            chain.push(name.to_string());
        }

        if chain.is_empty() {
            // A lone "." is the cursor.
            self.pos += 1;
            self.push(Token::Dot, offset);
        } else {
            self.push(Token::Field(chain), offset);
        }
        Ok(())
    }

    fn lex_number(&mut self, offset: usize) -> Result<(), TemplateError> {
        let rest = self.rest();
        let sign_len = usize::from(rest.starts_with('-'));
        let digits = take_while(rest.get(sign_len..).unwrap_or_default(), |c| {
            c.is_ascii_alphanumeric() || c == '_' || c == '.'
        });
        let literal = rest.get(..sign_len + digits.len()).unwrap_or_default();
        let value: i64 = literal.parse().map_err(|_| {
            TemplateError::Parse(format!("bad number syntax {literal:?} at offset {offset}"))
        })?;
        self.pos += literal.len();
        self.push(Token::Int(value), offset);
        Ok(())
    }
}

fn has_trim_marker(after_delim: &str) -> bool {
    after_delim
        .strip_prefix('-')
        .and_then(|s| s.chars().next())
        .is_some_and(char::is_whitespace)
}

fn starts_with_digit(s: Option<&str>) -> bool {
    s.and_then(|s| s.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn take_while(s: &str, pred: impl Fn(char) -> bool) -> &str {
    let end = s.find(|c: char| !pred(c)).unwrap_or(s.len());
    s.get(..end).unwrap_or_default()
}
