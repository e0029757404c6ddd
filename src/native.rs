use indexmap::IndexMap;
use tracing::debug;

use crate::{
    ast::NativeBlock,
    diagnostics::{error, DiagnosticKind, Result, SourceSpan},
    environment::Environment,
    runtime::Interpreter,
    value::Value,
};

/// What a `native => { ... }` block hands to the host.
#[derive(Debug, Clone)]
pub struct NativeRequest {
    /// Raw block body, never parsed by the interpreter.
    pub code: String,
    /// Visible bindings the body mentions by name.
    pub bindings: IndexMap<String, Value>,
    /// Binding the block initializes or is assigned to, if any.
    pub target: Option<String>,
}

/// Executes foreign code on behalf of the interpreter.
pub trait NativeHost {
    fn execute(&mut self, request: &NativeRequest) -> std::result::Result<Value, String>;
}

impl<F> NativeHost for F
where
    F: FnMut(&NativeRequest) -> std::result::Result<Value, String>,
{
    fn execute(&mut self, request: &NativeRequest) -> std::result::Result<Value, String> {
        self(request)
    }
}

/// Host used when none is configured; every block fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHost;

impl NativeHost for NoHost {
    fn execute(&mut self, _request: &NativeRequest) -> std::result::Result<Value, String> {
        Err("no native host is configured".to_string())
    }
}

impl Interpreter {
    pub(crate) fn execute_native(&mut self, block: &NativeBlock, span: SourceSpan) -> Result<Value> {
        let mut bindings = IndexMap::new();
        let mut native_slots = Vec::new();
        for name in referenced_names(&block.code) {
            let Some(binding) = Environment::find(self.env(), &name) else {
                continue;
            };
            if binding.native && block.target.as_deref() != Some(name.as_str()) {
                native_slots.push(name.clone());
            }
            if let Some(value) = binding.read() {
                bindings.insert(name, value);
            }
        }
        let request = NativeRequest {
            code: block.code.clone(),
            bindings,
            target: block.target.clone(),
        };
        debug!(
            bindings = ?request.bindings.keys().collect::<Vec<_>>(),
            code_len = request.code.len(),
            target = ?request.target,
            "dispatching native block"
        );

        let value = self.host.execute(&request).map_err(|message| {
            error(
                DiagnosticKind::NativeExecution,
                format!("native block failed: {message}"),
                span,
            )
        })?;

        let targets = request.target.iter().chain(native_slots.iter());
        for name in targets {
            if Environment::find(self.env(), name).is_some() {
                Environment::assign(self.env(), name, value.clone(), span)?;
            }
        }
        Ok(value)
    }
}

/// Identifier-shaped words in `code`, in first-appearance order.
fn referenced_names(code: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut chars = code.char_indices().peekable();
    while let Some((start, ch)) = chars.next() {
        if !(ch.is_ascii_alphabetic() || ch == '_') {
            continue;
        }
        let mut end = start + ch.len_utf8();
        while let Some(&(idx, next)) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                end = idx + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let word = &code[start..end];
        if !names.iter().any(|name| name == word) {
            names.push(word.to_string());
        }
    }
    names
}

