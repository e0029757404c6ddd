use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    diagnostics::{error, DiagnosticKind, Result, SourceSpan},
    value::Value,
};

pub type EnvironmentRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Binding>,
}

impl Environment {
    pub fn new() -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: None,
            bindings: IndexMap::new(),
        }))
    }

    pub fn with_parent(parent: EnvironmentRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    /// Declares an initialized, private binding in this scope.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.declare(name, Binding::initialized(value));
    }

    /// Declares a binding in this scope, shadowing any outer one.
    pub fn declare(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    /// Writes into the nearest scope that declares `name`.
    pub fn assign(env: &EnvironmentRef, name: &str, value: Value, span: SourceSpan) -> Result<()> {
        if let Some(binding) = env.borrow_mut().bindings.get_mut(name) {
            binding.value = Some(value);
            return Ok(());
        }
        let parent = env.borrow().parent.clone();
        match parent {
            Some(parent) => Environment::assign(&parent, name, value, span),
            None => Err(error(
                DiagnosticKind::UndefinedName,
                format!("cannot assign to undeclared name `{name}`"),
                span,
            )),
        }
    }

    pub fn get(env: &EnvironmentRef, name: &str, span: SourceSpan) -> Result<Value> {
        match Environment::find(env, name) {
            Some(binding) => binding.read().ok_or_else(|| {
                error(
                    DiagnosticKind::UndefinedName,
                    format!("`{name}` is declared but has not been initialized"),
                    span,
                )
            }),
            None => Err(error(
                DiagnosticKind::UndefinedName,
                format!("undefined name `{name}`"),
                span,
            )),
        }
    }

    /// Reads `name` without failing, used to snapshot bindings for the
    /// native bridge.
    pub fn lookup(env: &EnvironmentRef, name: &str) -> Option<Value> {
        Environment::find(env, name).and_then(|binding| binding.read())
    }

    pub fn find(env: &EnvironmentRef, name: &str) -> Option<Binding> {
        if let Some(binding) = env.borrow().bindings.get(name) {
            return Some(binding.clone());
        }
        let parent = env.borrow().parent.clone();
        parent.and_then(|parent| Environment::find(&parent, name))
    }

    /// Bindings declared with `share`, in declaration order.
    pub fn exports(&self) -> IndexMap<String, Value> {
        self.bindings
            .iter()
            .filter(|(_, binding)| binding.shared)
            .filter_map(|(name, binding)| binding.read().map(|value| (name.clone(), value)))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Option<Value>,
    /// Populated by the host; reads as Unit until then.
    pub native: bool,
    pub shared: bool,
}

impl Binding {
    pub fn initialized(value: Value) -> Self {
        Self {
            value: Some(value),
            native: false,
            shared: false,
        }
    }

    pub fn read(&self) -> Option<Value> {
        match &self.value {
            Some(value) => Some(value.clone()),
            None if self.native => Some(Value::unit()),
            None => None,
        }
    }
}
