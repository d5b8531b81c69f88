pub mod ast;

use crate::config::Limits;
use crate::lexer::{Lexer, LexerError, Token};
use ast::*;
use std::collections::TryReserveError;

/// Pipe separator between commands
pub const PIPE_CHAR: char = '|';

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("warning: no commands provided")]
    NoCommands,

    #[error("error: piping limited to {max} commands")]
    TooManyCommands { max: usize },

    #[error("error: command or arguments too big")]
    CommandTooBig,

    #[error("error: memory allocation failed")]
    Memory,

    #[error("error: missing file name after '{0}'")]
    MissingRedirectTarget(&'static str),

    #[error("error: missing command name")]
    MissingCommand,

    #[error("error: {0}")]
    Lex(#[from] LexerError),
}

impl ParseError {
    /// Empty input is reported but is not an error.
    pub fn is_warning(&self) -> bool {
        matches!(self, ParseError::NoCommands)
    }
}

impl From<TryReserveError> for ParseError {
    fn from(_: TryReserveError) -> Self {
        ParseError::Memory
    }
}

/// Turns raw command lines into pipelines.
pub struct Parser {
    limits: Limits,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl Parser {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn parse(&self, line: &str) -> Result<Pipeline, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::NoCommands);
        }

        let segments: Vec<&str> = line
            .split(PIPE_CHAR)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect();

        if segments.is_empty() {
            return Err(ParseError::NoCommands);
        }
        if segments.len() > self.limits.max_commands {
            return Err(ParseError::TooManyCommands {
                max: self.limits.max_commands,
            });
        }

        let mut commands = Vec::new();
        commands.try_reserve_exact(segments.len())?;
        for segment in segments {
            let tokens = Lexer::tokenize(segment)?;
            commands.push(SegmentParser::new(tokens, &self.limits).parse_command()?);
        }

        Ok(Pipeline { commands })
    }
}

/// Parses the tokens of one pipe segment into a [`Command`].
struct SegmentParser<'a, 'l> {
    tokens: Vec<Token<'a>>,
    position: usize,
    limits: &'l Limits,
}

impl<'a, 'l> SegmentParser<'a, 'l> {
    fn new(tokens: Vec<Token<'a>>, limits: &'l Limits) -> Self {
        Self {
            tokens,
            position: 0,
            limits,
        }
    }

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        let mut name: Option<String> = None;
        let mut args: Vec<String> = Vec::new();
        let mut input = None;
        let mut output = None;

        while let Some(token) = self.advance() {
            match token {
                Token::RedirectIn => {
                    input = Some(self.parse_redirect_target("<")?);
                }
                Token::RedirectOut => {
                    output = Some(OutputRedirect {
                        path: self.parse_redirect_target(">")?,
                        mode: RedirectMode::Truncate,
                    });
                }
                Token::AppendRedirect => {
                    output = Some(OutputRedirect {
                        path: self.parse_redirect_target(">>")?,
                        mode: RedirectMode::Append,
                    });
                }
                Token::Quoted(text) | Token::Word(text) => {
                    if name.is_none() {
                        if text.is_empty() {
                            continue;
                        }
                        if text.len() > self.limits.max_program_len {
                            return Err(ParseError::CommandTooBig);
                        }
                        name = Some(copy_text(text)?);
                    } else {
                        // Empty quoted arguments are dropped so argv never
                        // carries empty entries.
                        if text.is_empty() {
                            continue;
                        }
                        if text.len() > self.limits.max_arg_len
                            || args.len() >= self.limits.max_args
                        {
                            return Err(ParseError::CommandTooBig);
                        }
                        args.try_reserve(1)?;
                        args.push(copy_text(text)?);
                    }
                }
            }
        }

        let name = name.ok_or(ParseError::MissingCommand)?;
        Ok(Command {
            name,
            args,
            input,
            output,
        })
    }

    fn parse_redirect_target(&mut self, operator: &'static str) -> Result<String, ParseError> {
        match self.advance().and_then(|token| token.text()) {
            Some(path) if !path.is_empty() => {
                if path.len() > self.limits.max_arg_len {
                    return Err(ParseError::CommandTooBig);
                }
                copy_text(path)
            }
            _ => Err(ParseError::MissingRedirectTarget(operator)),
        }
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.position).copied();
        if token.is_some() {
            self.position += 1;
        }
        token
    }
}

/// Copies a token into an owned buffer, surfacing allocation failure as
/// [`ParseError::Memory`] instead of aborting.
fn copy_text(text: &str) -> Result<String, ParseError> {
    let mut owned = String::new();
    owned.try_reserve_exact(text.len())?;
    owned.push_str(text);
    Ok(owned)
}
