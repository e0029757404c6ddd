use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::FunctionDecl,
    diagnostics::{error, DiagnosticKind, Result, SourceSpan},
    environment::EnvironmentRef,
    object::ClassRef,
    runtime::{Interpreter, SourceFile},
};

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn unit() -> Self {
        Self::new(ValueKind::Unit)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ValueKind::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn list(values: Vec<Value>) -> Self {
        Self::new(ValueKind::List(RefCell::new(values)))
    }

    pub fn range(start: i64, end: i64) -> Self {
        Self::new(ValueKind::Range(IntRange { start, end }))
    }

    pub fn module(name: impl Into<String>, exports: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Module(ModuleValue {
            name: name.into(),
            exports,
        }))
    }

    pub fn native(name: &'static str, arity: usize, callback: NativeCallback) -> Self {
        Self::new(ValueKind::NativeFunction(NativeFunction {
            name,
            arity,
            callback,
        }))
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Unit => "Nothing",
            ValueKind::Bool(_) => "Boolean",
            ValueKind::Int(_) | ValueKind::Float(_) => "Number",
            ValueKind::String(_) => "String",
            ValueKind::List(_) => "List",
            ValueKind::Range(_) => "Range",
            ValueKind::Function(_)
            | ValueKind::NativeFunction(_)
            | ValueKind::BoundMethod { .. } => "Function",
            ValueKind::Class(_) => "Class",
            ValueKind::Instance(_) => "Instance",
            ValueKind::Parent { .. } => "Parent",
            ValueKind::Module(_) => "Module",
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(&*self.0, ValueKind::Unit)
    }

    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Int(n) => Some(*n as f64),
            ValueKind::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Integral numbers, including floats without a fractional part that
    /// fit in an `i64`.
    pub fn as_integer(&self) -> Option<i64> {
        match &*self.0 {
            ValueKind::Int(n) => Some(*n),
            ValueKind::Float(n) if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 => {
                Some(*n as i64)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn expect_bool(&self, span: SourceSpan) -> Result<bool> {
        match &*self.0 {
            ValueKind::Bool(b) => Ok(*b),
            _ => Err(error(
                DiagnosticKind::Type,
                format!("expected Boolean, found {}", self.type_name()),
                span,
            )),
        }
    }

    /// Structural equality for scalars, identity for everything else.
    pub fn equals(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Unit, ValueKind::Unit) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Range(a), ValueKind::Range(b)) => a == b || (a.is_empty() && b.is_empty()),
            (ValueKind::Int(_) | ValueKind::Float(_), ValueKind::Int(_) | ValueKind::Float(_)) => {
                self.as_number() == other.as_number()
            }
            (ValueKind::BoundMethod(a), ValueKind::BoundMethod(b)) => {
                a.receiver.equals(&b.receiver) && a.function.equals(&b.function)
            }
            _ => Rc::ptr_eq(&self.0, &other.0),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::String(s) => write!(f, "{s:?}"),
            ValueKind::List(values) => f.debug_list().entries(values.borrow().iter()).finish(),
            ValueKind::Instance(instance) => f
                .debug_struct(&instance.class.name)
                .field("fields", &*instance.fields.borrow())
                .finish(),
            ValueKind::Module(module) => f
                .debug_struct("Module")
                .field("name", &module.name)
                .field("exports", &module.exports)
                .finish(),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Unit => write!(f, "nothing"),
            ValueKind::Bool(true) => write!(f, "YES"),
            ValueKind::Bool(false) => write!(f, "NO"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) => write!(f, "{n}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::List(values) => {
                write!(f, "[")?;
                for (idx, value) in values.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            ValueKind::Range(range) => write!(f, "{} to {}", range.start, range.end),
            ValueKind::Function(fun) => match &fun.name {
                Some(name) => write!(f, "<fn {name}>"),
                None => write!(f, "<fn>"),
            },
            ValueKind::NativeFunction(fun) => write!(f, "<native fn {}>", fun.name),
            ValueKind::BoundMethod(method) => write!(f, "<method {}.{}>", method.owner.name, method.name),
            ValueKind::Class(class) => write!(f, "<boy {}>", class.name),
            ValueKind::Instance(instance) => write!(f, "<{} instance>", instance.class.name),
            ValueKind::Parent { owner, .. } => write!(f, "<daddy of {}>", owner.name),
            ValueKind::Module(module) => write!(f, "<module {}>", module.name),
        }
    }
}

pub enum ValueKind {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(RefCell<Vec<Value>>),
    Range(IntRange),
    Function(UserFunction),
    NativeFunction(NativeFunction),
    BoundMethod(BoundMethod),
    Class(ClassRef),
    Instance(Instance),
    /// `daddy` inside a method defined by `owner`.
    Parent { receiver: Value, owner: ClassRef },
    Module(ModuleValue),
}

/// The half-open interval `start to end`. `go` steps through it without
/// building a list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntRange {
    pub start: i64,
    pub end: i64,
}

impl IntRange {
    pub fn len(&self) -> u64 {
        if self.end > self.start {
            (i128::from(self.end) - i128::from(self.start)) as u64
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn get(&self, idx: i64) -> Option<i64> {
        u64::try_from(idx)
            .ok()
            .filter(|idx| *idx < self.len())
            .map(|_| self.start + idx)
    }

    pub fn contains(&self, n: i64) -> bool {
        self.start <= n && n < self.end
    }

    pub fn iter(&self) -> std::ops::Range<i64> {
        self.start..self.end
    }

    /// The elements as values, or `None` when they do not fit in memory.
    pub fn to_values(&self) -> Option<Vec<Value>> {
        let len = usize::try_from(self.len()).ok()?;
        let mut values = Vec::new();
        values.try_reserve_exact(len).ok()?;
        values.extend(self.iter().map(Value::int));
        Some(values)
    }
}

#[derive(Clone)]
pub struct ModuleValue {
    pub name: String,
    pub exports: IndexMap<String, Value>,
}

#[derive(Clone)]
pub struct UserFunction {
    pub name: Option<String>,
    pub decl: Rc<FunctionDecl>,
    pub env: EnvironmentRef,
    pub source: Option<Rc<SourceFile>>,
}

/// A method read off an instance, remembering the class that defined it so
/// `daddy` can start its search one level up.
#[derive(Clone)]
pub struct BoundMethod {
    pub name: String,
    pub receiver: Value,
    pub function: Value,
    pub owner: ClassRef,
}

pub struct Instance {
    pub class: ClassRef,
    pub fields: RefCell<IndexMap<String, Value>>,
}

pub type NativeCallback = fn(&mut Interpreter, &[Value], SourceSpan) -> Result<Value>;

/// Marks a built-in that accepts any number of arguments.
pub const VARIADIC: usize = usize::MAX;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub callback: NativeCallback,
}

impl NativeFunction {
    pub fn call(&self, interpreter: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
        if self.arity != VARIADIC && args.len() != self.arity {
            return Err(error(
                DiagnosticKind::Arity,
                format!(
                    "function `{}` expected {} arguments but received {}",
                    self.name,
                    self.arity,
                    args.len()
                ),
                span,
            ));
        }
        (self.callback)(interpreter, args, span)
    }
}
