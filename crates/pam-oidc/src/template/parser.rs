//! Parser producing the template AST.
//!
//! Everything that can be rejected without looking at claims is rejected
//! here: unknown functions, unsupported keywords, empty actions, arguments
//! passed to non-functions, and non-functions in later pipeline stages.

use super::lexer::{Spanned, Token};
use super::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action(Pipeline),
}

/// Commands joined by `|`; each stage after the first receives the previous
/// result as its final argument.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub commands: Vec<Command>,
}

/// A single pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Call(Function, Vec<Operand>),
    Value(Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    /// The claims root (`.`).
    Dot,
    /// Field chain from the claims root.
    Field(Vec<String>),
    Str(String),
    Int(i64),
    Bool(bool),
    Pipeline(Pipeline),
}

/// The functions callable from a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    TrimPrefix,
    TrimSuffix,
    Index,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "trimPrefix" => Some(Function::TrimPrefix),
            "trimSuffix" => Some(Function::TrimSuffix),
            "index" => Some(Function::Index),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Function::TrimPrefix => "trimPrefix",
            Function::TrimSuffix => "trimSuffix",
            Function::Index => "index",
        }
    }
}

/// Keywords of the full template language that are deliberately absent.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "if", "else", "end", "range", "with", "define", "template", "block", "break", "continue",
    "nil",
];

/// One word of a command before validation.
enum Word {
    Function(Function, usize),
    Operand(Operand, usize),
}

/// What ends the pipeline currently being parsed.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Close,
    RightParen,
}

pub(crate) fn parse(tokens: Vec<Spanned>) -> Result<Vec<Node>, TemplateError> {
    let mut tokens = tokens.into_iter();
    let mut nodes = Vec::new();

    while let Some(spanned) = tokens.next() {
        match spanned.token {
            Token::Text(text) => nodes.push(Node::Text(text)),
            Token::Open => {
                let pipeline = parse_pipeline(&mut tokens, Terminator::Close, spanned.offset)?;
                nodes.push(Node::Action(pipeline));
            }
            other => {
                return Err(TemplateError::Parse(format!(
                    "unexpected {other:?} at offset {}",
                    spanned.offset
                )))
            }
        }
    }

    Ok(nodes)
}

fn parse_pipeline(
    tokens: &mut impl Iterator<Item = Spanned>,
    terminator: Terminator,
    start: usize,
) -> Result<Pipeline, TemplateError> {
    let mut commands = Vec::new();
    let mut words = Vec::new();

    loop {
        let Some(Spanned { token, offset }) = tokens.next() else {
            return Err(TemplateError::Parse(format!(
                "unclosed action starting at offset {start}"
            )));
        };

        match token {
            Token::Close | Token::RightParen => {
                let expected = match terminator {
                    Terminator::Close => Token::Close,
                    Terminator::RightParen => Token::RightParen,
                };
                if token != expected {
                    return Err(TemplateError::Parse(format!(
                        "unbalanced parentheses in action starting at offset {start}"
                    )));
                }
                let stage = commands.len();
                commands.push(build_command(std::mem::take(&mut words), stage, start)?);
                return Ok(Pipeline { commands });
            }
            Token::Pipe => {
                let stage = commands.len();
                commands.push(build_command(std::mem::take(&mut words), stage, start)?);
            }
            Token::LeftParen => {
                let inner = parse_pipeline(tokens, Terminator::RightParen, offset)?;
                words.push(Word::Operand(Operand::Pipeline(inner), offset));
            }
            Token::Dot => words.push(Word::Operand(Operand::Dot, offset)),
            Token::Field(chain) => words.push(Word::Operand(Operand::Field(chain), offset)),
            Token::Str(value) => words.push(Word::Operand(Operand::Str(value), offset)),
            Token::Int(value) => words.push(Word::Operand(Operand::Int(value), offset)),
            Token::Ident(name) => words.push(resolve_ident(&name, offset)?),
            Token::Open | Token::Text(_) => {
                return Err(TemplateError::Parse(format!(
                    "unexpected token at offset {offset}"
                )))
            }
        }
    }
}

fn resolve_ident(name: &str, offset: usize) -> Result<Word, TemplateError> {
    match name {
        "true" => Ok(Word::Operand(Operand::Bool(true), offset)),
        "false" => Ok(Word::Operand(Operand::Bool(false), offset)),
        keyword if UNSUPPORTED_KEYWORDS.contains(&keyword) => Err(TemplateError::Parse(format!(
            "{keyword:?} is not supported (offset {offset})"
        ))),
        _ => Function::lookup(name)
            .map(|function| Word::Function(function, offset))
            .ok_or_else(|| TemplateError::Parse(format!("function {name:?} not defined"))),
    }
}

fn build_command(words: Vec<Word>, stage: usize, start: usize) -> Result<Command, TemplateError> {
    let mut words = words.into_iter();

    let Some(first) = words.next() else {
        return Err(TemplateError::Parse(if stage == 0 {
            format!("missing value for command in action starting at offset {start}")
        } else {
            format!("missing command in pipeline stage {} at offset {start}", stage + 1)
        }));
    };

    match first {
        Word::Function(function, _) => {
            let args = words
                .map(|word| match word {
                    Word::Operand(operand, _) => Ok(operand),
                    Word::Function(inner, offset) => Err(TemplateError::Parse(format!(
                        "function {:?} used as an argument at offset {offset}",
                        inner.name()
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Command::Call(function, args))
        }
        Word::Operand(operand, offset) => {
            if stage > 0 {
                return Err(TemplateError::Parse(format!(
                    "non executable command in pipeline stage {} at offset {offset}",
                    stage + 1
                )));
            }
            if words.next().is_some() {
                return Err(TemplateError::Parse(format!(
                    "can't give argument to non-function at offset {offset}"
                )));
            }
            Ok(Command::Value(operand))
        }
    }
}
