use std::{
    collections::HashMap,
    fs, io,
    path::PathBuf,
    rc::Rc,
};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{
    diagnostics::{error, DiagnosticKind, FemboyError, Result, SourceSpan},
    environment::Environment,
    parser,
    runtime::{Interpreter, SourceFile},
    stdlib,
    value::Value,
};

/// Supplies module source text for a dotted import path.
pub trait ModuleLoader {
    /// Returns `Ok(None)` when no module exists at `path`.
    fn load(&self, path: &str) -> Result<Option<String>>;
}

/// Maps `a.b` to `<root>/a/b.fl`, trying each root in order.
#[derive(Debug, Clone, Default)]
pub struct FileSystemLoader {
    roots: Vec<PathBuf>,
}

impl FileSystemLoader {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl ModuleLoader for FileSystemLoader {
    fn load(&self, path: &str) -> Result<Option<String>> {
        for root in &self.roots {
            let mut candidate = root.clone();
            candidate.extend(path.split('.'));
            candidate.set_extension("fl");
            trace!(candidate = %candidate.display(), "probing module path");
            match fs::read_to_string(&candidate) {
                Ok(source) => return Ok(Some(source)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(FemboyError::Io(err)),
            }
        }
        Ok(None)
    }
}

/// In-memory module table, handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    modules: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.modules.insert(path.into(), source.into());
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(&self, path: &str) -> Result<Option<String>> {
        Ok(self.modules.get(path).cloned())
    }
}

/// Per-run module state: built-in namespaces, the resolution cache and the
/// stack of modules whose top level is still executing.
pub struct ModuleRegistry {
    loader: Box<dyn ModuleLoader>,
    builtins: IndexMap<String, Value>,
    cache: HashMap<String, Value>,
    loading: Vec<String>,
}

impl ModuleRegistry {
    pub fn new(loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            builtins: stdlib::builtin_modules(),
            cache: HashMap::new(),
            loading: Vec::new(),
        }
    }

    pub fn set_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.loader = loader;
    }

    pub fn insert_builtin(&mut self, name: String, module: Value) {
        self.builtins.insert(name, module);
    }

    pub(crate) fn enter(&mut self, name: String) {
        self.loading.push(name);
    }

    pub(crate) fn leave(&mut self) {
        self.loading.pop();
    }

    fn cycle(&self, key: &str) -> Option<String> {
        let start = self.loading.iter().position(|name| name == key)?;
        let mut chain: Vec<&str> = self.loading[start..].iter().map(String::as_str).collect();
        chain.push(key);
        Some(chain.join(" -> "))
    }
}

impl Interpreter {
    /// Resolves `adopt a.b` to a module namespace, loading and evaluating
    /// the module on first use.
    pub(crate) fn resolve_module(&mut self, path: &[String], span: SourceSpan) -> Result<Value> {
        let key = path.join(".");
        if let Some(module) = self.modules.builtins.get(&key) {
            trace!(module = %key, "resolved built-in module");
            return Ok(module.clone());
        }
        if let Some(module) = self.modules.cache.get(&key) {
            trace!(module = %key, "module cache hit");
            return Ok(module.clone());
        }
        if let Some(chain) = self.modules.cycle(&key) {
            return Err(error(
                DiagnosticKind::ImportCycle,
                format!("import cycle detected: {chain}"),
                span,
            ));
        }
        let source = self.modules.loader.load(&key)?.ok_or_else(|| {
            error(
                DiagnosticKind::ModuleNotFound,
                format!("module `{key}` not found"),
                span,
            )
        })?;
        debug!(module = %key, bytes = source.len(), "loading module");

        let note = format!("in module `{key}`");
        let program = parser::parse_program(&source)
            .map_err(|diag| FemboyError::from(diag.locate(&source)).with_note(note.clone()))?;
        let file = Rc::new(SourceFile {
            name: key.clone(),
            text: source,
        });
        let env = Environment::new();
        self.modules.enter(key.clone());
        let result = self.with_source(Some(Rc::clone(&file)), |this| {
            this.with_env(Rc::clone(&env), |this| this.execute_sequence(&program.items))
        });
        self.modules.leave();
        result.map_err(|err| err.locate(&file.text).with_note(note))?;

        let exports = env.borrow().exports();
        debug!(module = %key, exports = exports.len(), "module evaluated");
        let module = Value::module(key.clone(), exports);
        self.modules.cache.insert(key, module.clone());
        Ok(module)
    }
}
