use std::fmt;

use thiserror::Error;

/// Represents a byte span within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: SourceSpan) -> Self {
        Self {
            start: self.start,
            end: other.end.max(self.end),
        }
    }
}

/// 1-based line and column of a span start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn of(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let mut line = 1;
        let mut column = 1;
        for (idx, ch) in source.char_indices() {
            if idx >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self { line, column }
    }
}

/// Classification of a diagnostic event.
///
/// `Lex` and `Parse` are raised before evaluation starts; every other kind
/// aborts a running program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lex,
    Parse,
    UndefinedName,
    Arity,
    Type,
    DivisionByZero,
    Index,
    UnresolvedParent,
    NoParent,
    NoSuchMember,
    ImportCycle,
    ModuleNotFound,
    NativeExecution,
}

impl DiagnosticKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::Lex => "LexError",
            DiagnosticKind::Parse => "ParseError",
            DiagnosticKind::UndefinedName => "UndefinedNameError",
            DiagnosticKind::Arity => "ArityError",
            DiagnosticKind::Type => "TypeError",
            DiagnosticKind::DivisionByZero => "DivisionByZeroError",
            DiagnosticKind::Index => "IndexError",
            DiagnosticKind::UnresolvedParent => "UnresolvedParentError",
            DiagnosticKind::NoParent => "NoParentError",
            DiagnosticKind::NoSuchMember => "NoSuchMemberError",
            DiagnosticKind::ImportCycle => "ImportCycleError",
            DiagnosticKind::ModuleNotFound => "ModuleNotFoundError",
            DiagnosticKind::NativeExecution => "NativeExecutionError",
        }
    }

    pub fn is_compile_time(&self) -> bool {
        matches!(self, DiagnosticKind::Lex | DiagnosticKind::Parse)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub location: Option<Location>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            location: None,
            notes: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Resolves the span against the source it was produced from. The first
    /// resolution wins, so errors bubbling out of an imported module keep
    /// the position inside that module.
    pub fn locate(mut self, source: &str) -> Self {
        if self.location.is_none() {
            if let Some(span) = self.span {
                self.location = Some(Location::of(source, span.start));
            }
        }
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(location) = self.location {
            write!(f, " (at {}:{})", location.line, location.column)?;
        } else if let Some(span) = self.span {
            write!(f, " ({}..{})", span.start, span.end)?;
        }
        if !self.notes.is_empty() {
            writeln!(f)?;
            for note in &self.notes {
                writeln!(f, "  note: {note}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the interpreter and its tooling.
#[derive(Debug, Error)]
pub enum FemboyError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FemboyError {
    pub fn kind(&self) -> Option<&DiagnosticKind> {
        match self {
            FemboyError::Diagnostic(diag) => Some(&diag.kind),
            FemboyError::Io(_) => None,
        }
    }

    pub(crate) fn locate(self, source: &str) -> Self {
        match self {
            FemboyError::Diagnostic(diag) => FemboyError::Diagnostic(diag.locate(source)),
            other => other,
        }
    }

    pub(crate) fn with_note(self, note: impl Into<String>) -> Self {
        match self {
            FemboyError::Diagnostic(diag) => FemboyError::Diagnostic(diag.with_note(note)),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, FemboyError>;

pub(crate) fn error(kind: DiagnosticKind, message: impl Into<String>, span: SourceSpan) -> FemboyError {
    FemboyError::from(Diagnostic::new(kind, message).with_span(span))
}
