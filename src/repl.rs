use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{FemboyError, Result},
    lexer::{self, TokenKind},
    runtime::{ExecutionContext, Interpreter},
};

const PROMPT: &str = "fl> ";
const CONTINUATION: &str = "... ";

pub struct Repl {
    interpreter: Interpreter,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self::with_context(ExecutionContext::default())
    }

    pub fn with_context(context: ExecutionContext) -> Self {
        Self {
            interpreter: Interpreter::with_context(context),
        }
    }

    /// Reads entries until `:quit`, `:exit`, Ctrl-C or end of input. An
    /// entry spans several lines while a block or bracket is left open.
    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        let mut pending = String::new();
        loop {
            let prompt = if pending.is_empty() { PROMPT } else { CONTINUATION };
            let line = match editor.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                    pending.clear();
                    continue;
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(readline_error(err)),
            };
            if pending.is_empty() {
                match line.trim() {
                    ":quit" | ":exit" => break,
                    "" => continue,
                    _ => {}
                }
            }
            pending.push_str(&line);
            pending.push('\n');
            if is_incomplete(&pending) {
                continue;
            }
            let entry = std::mem::take(&mut pending);
            editor.add_history_entry(entry.trim_end()).ok();
            match self.interpreter.eval_source(&entry) {
                Ok(value) if value.is_unit() => {}
                Ok(value) => println!("{value}"),
                Err(err) => eprintln!("{err}"),
            }
        }
        Ok(())
    }
}

/// Whether `source` ends inside an open `(`, `[`, `{` or native block, so an
/// interactive session should keep reading lines.
pub fn is_incomplete(source: &str) -> bool {
    match lexer::tokenize(source) {
        Ok(tokens) => {
            let depth = tokens.iter().fold(0i64, |depth, token| match token.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth + 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => depth - 1,
                _ => depth,
            });
            depth > 0
        }
        Err(diag) => diag.message == "unterminated native block",
    }
}

fn readline_error(err: ReadlineError) -> FemboyError {
    FemboyError::from(std::io::Error::new(std::io::ErrorKind::Other, err))
}
