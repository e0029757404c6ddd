use std::{
    cell::RefCell,
    cmp::Ordering,
    io::{self, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use tracing::{debug, trace};

use crate::{
    ast::{Annotation, BinaryOp, Expr, ExprKind, FunctionDecl, Literal, Program, Stmt, StmtKind, UnaryOp},
    diagnostics::{error, DiagnosticKind, FemboyError, Result, SourceSpan},
    environment::{Binding, Environment, EnvironmentRef},
    module::{FileSystemLoader, ModuleLoader, ModuleRegistry},
    native::{NativeHost, NoHost},
    object::ClassRef,
    parser,
    value::{UserFunction, Value, ValueKind},
};

/// Settings for one interpreter instance.
#[derive(Debug, Default, Clone)]
pub struct ExecutionContext {
    /// Name of the program being run; seeds import cycle detection.
    pub entry_module: Option<String>,
    /// Directories searched, in order, by the default module loader.
    pub search_paths: Vec<PathBuf>,
}

impl ExecutionContext {
    /// Context for running the script at `path`: the module is named after
    /// the file stem and its directory is the first search root.
    pub fn for_entry(path: &Path) -> Self {
        let entry_module = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        let search_paths = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => vec![dir.to_path_buf()],
            _ => vec![PathBuf::from(".")],
        };
        Self {
            entry_module,
            search_paths,
        }
    }
}

/// Source text that spans in a function body refer to.
#[derive(Debug)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

pub struct Interpreter {
    env: EnvironmentRef,
    context: ExecutionContext,
    pub(crate) modules: ModuleRegistry,
    pub(crate) host: Box<dyn NativeHost>,
    output: Box<dyn Write>,
    source: Option<Rc<SourceFile>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_context(ExecutionContext::default())
    }

    pub fn with_context(context: ExecutionContext) -> Self {
        let loader = FileSystemLoader::new(context.search_paths.clone());
        Self {
            env: Environment::new(),
            context,
            modules: ModuleRegistry::new(Box::new(loader)),
            host: Box::new(NoHost),
            output: Box::new(io::stdout()),
            source: None,
        }
    }

    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.modules.set_loader(Box::new(loader));
        self
    }

    pub fn with_host(mut self, host: impl NativeHost + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    /// Registers a module that `adopt` returns without consulting the loader.
    pub fn with_builtin(mut self, name: impl Into<String>, module: Value) -> Self {
        self.modules.insert_builtin(name.into(), module);
        self
    }

    /// Evaluates interactive input in the session's global scope and returns
    /// the value of its last expression statement.
    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let program = parser::parse_snippet(source).map_err(|diag| diag.locate(source))?;
        let file = Rc::new(SourceFile {
            name: "<input>".to_string(),
            text: source.to_string(),
        });
        let previous = self.source.replace(Rc::clone(&file));
        let result = self.eval_program(&program);
        self.source = previous;
        result.map_err(|err| err.locate(&file.text))
    }

    pub fn eval_program(&mut self, program: &Program) -> Result<Value> {
        match self.execute_sequence(&program.items)? {
            FlowControl::Next => Ok(Value::unit()),
            FlowControl::NextValue(value) | FlowControl::Return(value) => Ok(value),
        }
    }

    /// Runs a complete program: top-level statements in order, in the
    /// global scope.
    pub fn run(&mut self, source: &str) -> Result<()> {
        let program = parser::parse_program(source).map_err(|diag| diag.locate(source))?;
        let name = self
            .context
            .entry_module
            .clone()
            .unwrap_or_else(|| "main".to_string());
        debug!(module = %name, statements = program.items.len(), "running program");
        let file = Rc::new(SourceFile {
            name: name.clone(),
            text: source.to_string(),
        });
        self.modules.enter(name);
        let previous = self.source.replace(Rc::clone(&file));
        let result = self.eval_program(&program);
        self.source = previous;
        self.modules.leave();
        self.output.flush()?;
        result.map(|_| ()).map_err(|err| err.locate(&file.text))
    }

    pub(crate) fn env(&self) -> &EnvironmentRef {
        &self.env
    }

    pub(crate) fn source(&self) -> Option<Rc<SourceFile>> {
        self.source.clone()
    }

    pub(crate) fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    /// Runs `f` with `env` as the current scope, restoring the previous
    /// scope on every exit path.
    pub(crate) fn with_env<T>(
        &mut self,
        env: EnvironmentRef,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = std::mem::replace(&mut self.env, env);
        let result = f(self);
        self.env = previous;
        result
    }

    pub(crate) fn with_source<T>(
        &mut self,
        source: Option<Rc<SourceFile>>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = std::mem::replace(&mut self.source, source);
        let result = f(self);
        self.source = previous;
        result
    }

    pub(crate) fn execute_sequence(&mut self, statements: &[Stmt]) -> Result<FlowControl> {
        let mut last_value: Option<Value> = None;
        for stmt in statements {
            match self.execute_statement(stmt)? {
                FlowControl::Next => {}
                FlowControl::NextValue(value) => {
                    last_value = Some(value);
                }
                FlowControl::Return(value) => return Ok(FlowControl::Return(value)),
            }
        }
        match last_value {
            Some(value) => Ok(FlowControl::NextValue(value)),
            None => Ok(FlowControl::Next),
        }
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<FlowControl> {
        match &stmt.kind {
            StmtKind::Adopt { path } => {
                let module = self.resolve_module(path, stmt.span)?;
                let name = path.last().cloned().unwrap_or_default();
                self.env.borrow_mut().define(name, module);
                Ok(FlowControl::Next)
            }
            StmtKind::Keep {
                name,
                shared,
                annotation,
                initializer,
            } => {
                let native = *annotation == Some(Annotation::Native);
                if let Some(Expr {
                    kind: ExprKind::Native(_),
                    ..
                }) = initializer
                {
                    // The host result is written back into the slot by name.
                    self.env.borrow_mut().declare(
                        name.clone(),
                        Binding {
                            value: None,
                            native: true,
                            shared: *shared,
                        },
                    );
                }
                let value = match initializer {
                    Some(expr) => Some(self.evaluate_named(expr, name)?),
                    None => None,
                };
                self.env.borrow_mut().declare(
                    name.clone(),
                    Binding {
                        value,
                        native,
                        shared: *shared,
                    },
                );
                Ok(FlowControl::Next)
            }
            StmtKind::Assign { target, op, value } => {
                self.assign(target, *op, value)?;
                Ok(FlowControl::Next)
            }
            StmtKind::Expr(expr) => {
                let value = self.evaluate(expr)?;
                Ok(FlowControl::NextValue(value))
            }
            StmtKind::If {
                branches,
                else_branch,
            } => {
                for branch in branches {
                    let condition = self.evaluate(&branch.condition)?;
                    if condition.expect_bool(branch.condition.span)? {
                        return self.execute_block(&branch.body);
                    }
                }
                match else_branch {
                    Some(body) => self.execute_block(body),
                    None => Ok(FlowControl::Next),
                }
            }
            StmtKind::Go {
                iterable,
                binding,
                body,
            } => {
                let iterable_value = self.evaluate(iterable)?;
                if let ValueKind::Range(range) = &*iterable_value.0 {
                    for n in range.iter() {
                        if let Some(value) = self.iteration(binding, Value::int(n), body)? {
                            return Ok(FlowControl::Return(value));
                        }
                    }
                    return Ok(FlowControl::Next);
                }
                for item in self.iterate(&iterable_value, iterable.span)? {
                    if let Some(value) = self.iteration(binding, item, body)? {
                        return Ok(FlowControl::Return(value));
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Stay { condition, body } => {
                loop {
                    let keep_going = self.evaluate(condition)?.expect_bool(condition.span)?;
                    if !keep_going {
                        break;
                    }
                    if let FlowControl::Return(value) = self.execute_block(body)? {
                        return Ok(FlowControl::Return(value));
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::unit(),
                };
                Ok(FlowControl::Return(value))
            }
        }
    }

    /// One pass of a `go` body with `binding` in a fresh scope. Yields the
    /// value of a `return` that left the body.
    fn iteration(&mut self, binding: &str, item: Value, body: &[Stmt]) -> Result<Option<Value>> {
        let child = Environment::with_parent(Rc::clone(&self.env));
        child.borrow_mut().define(binding.to_string(), item);
        match self.with_env(child, |this| this.execute_block(body))? {
            FlowControl::Return(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<FlowControl> {
        let child = Environment::with_parent(Rc::clone(&self.env));
        self.with_env(child, |this| this.execute_sequence(statements))
    }

    fn assign(&mut self, target: &Expr, op: Option<BinaryOp>, value: &Expr) -> Result<()> {
        match &target.kind {
            ExprKind::Identifier(name) => {
                let rhs = self.evaluate_named(value, name)?;
                let new_value = match op {
                    Some(op) => {
                        let current = Environment::get(&self.env, name, target.span)?;
                        self.binary(op, current, rhs, target.span.to(value.span))?
                    }
                    None => rhs,
                };
                Environment::assign(&self.env, name, new_value, target.span)
            }
            ExprKind::Member {
                target: owner,
                member,
            } => {
                let owner_value = self.evaluate(owner)?;
                let rhs = self.evaluate(value)?;
                let new_value = match op {
                    Some(op) => {
                        let current = self.member(owner_value.clone(), member, target.span)?;
                        self.binary(op, current, rhs, target.span.to(value.span))?
                    }
                    None => rhs,
                };
                self.set_member(owner_value, member, new_value, target.span)
            }
            ExprKind::Index {
                target: owner,
                index,
            } => {
                let owner_value = self.evaluate(owner)?;
                let index_value = self.evaluate(index)?;
                let rhs = self.evaluate(value)?;
                let new_value = match op {
                    Some(op) => {
                        let current = self.index(&owner_value, &index_value, target.span)?;
                        self.binary(op, current, rhs, target.span.to(value.span))?
                    }
                    None => rhs,
                };
                self.set_index(&owner_value, &index_value, new_value, target.span)
            }
            _ => Err(error(
                DiagnosticKind::Type,
                "invalid assignment target",
                target.span,
            )),
        }
    }

    /// Evaluates an initializer, naming function literals after the binding.
    fn evaluate_named(&mut self, expr: &Expr, name: &str) -> Result<Value> {
        match &expr.kind {
            ExprKind::Function(decl) => Ok(self.closure(decl, Some(name))),
            _ => self.evaluate(expr),
        }
    }

    pub(crate) fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(self.literal(lit)),
            ExprKind::Identifier(name) => Environment::get(&self.env, name, expr.span),
            ExprKind::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => {
                let left_value = self.evaluate(left)?.expect_bool(left.span)?;
                if (*op == BinaryOp::And) != left_value {
                    return Ok(Value::bool(left_value));
                }
                let right_value = self.evaluate(right)?.expect_bool(right.span)?;
                Ok(Value::bool(right_value))
            }
            ExprKind::Binary { op, left, right } => {
                let left_value = self.evaluate(left)?;
                let right_value = self.evaluate(right)?;
                self.binary(*op, left_value, right_value, expr.span)
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.evaluate(operand)?;
                self.unary(*op, value, expr.span)
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.evaluate(callee)?;
                let mut eval_args = Vec::with_capacity(args.len());
                for arg in args {
                    eval_args.push(self.evaluate(arg)?);
                }
                self.call(&callee_value, eval_args, expr.span)
            }
            ExprKind::Member { target, member } => {
                let target_value = self.evaluate(target)?;
                self.member(target_value, member, expr.span)
            }
            ExprKind::Namespace { target, member } => {
                let target_value = self.evaluate(target)?;
                self.namespace(&target_value, member, expr.span)
            }
            ExprKind::Index { target, index } => {
                let target_value = self.evaluate(target)?;
                let index_value = self.evaluate(index)?;
                self.index(&target_value, &index_value, expr.span)
            }
            ExprKind::List(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(Value::list(values))
            }
            ExprKind::Range { start, end } => {
                let start_value = self.evaluate(start)?;
                let end_value = self.evaluate(end)?;
                let bound = |value: &Value, span: SourceSpan| {
                    value.as_integer().ok_or_else(|| {
                        error(
                            DiagnosticKind::Type,
                            format!("range bounds must be integral Numbers within 64 bits, found {value}"),
                            span,
                        )
                    })
                };
                let from = bound(&start_value, start.span)?;
                let to = bound(&end_value, end.span)?;
                Ok(Value::range(from, to))
            }
            ExprKind::Function(decl) => Ok(self.closure(decl, None)),
            ExprKind::Class(decl) => self.define_class(decl),
            ExprKind::Makeout { class, args } => {
                let class_value = self.evaluate(class)?;
                let mut eval_args = Vec::with_capacity(args.len());
                for arg in args {
                    eval_args.push(self.evaluate(arg)?);
                }
                match &*class_value.0 {
                    ValueKind::Class(class) => self.construct(class, eval_args, expr.span),
                    _ => Err(error(
                        DiagnosticKind::Type,
                        format!("`makeout` expects a class, found {}", class_value.type_name()),
                        class.span,
                    )),
                }
            }
            ExprKind::Native(block) => self.execute_native(block, expr.span),
        }
    }

    pub(crate) fn closure(&self, decl: &Rc<FunctionDecl>, name: Option<&str>) -> Value {
        Value::new(ValueKind::Function(UserFunction {
            name: name.map(str::to_string),
            decl: Rc::clone(decl),
            env: Rc::clone(&self.env),
            source: self.source.clone(),
        }))
    }

    fn literal(&self, literal: &Literal) -> Value {
        match literal {
            Literal::Int(n) => Value::int(*n),
            Literal::Float(n) => Value::float(*n),
            Literal::Bool(b) => Value::bool(*b),
            Literal::String(s) => Value::string(s.clone()),
        }
    }

    fn binary(&self, op: BinaryOp, left: Value, right: Value, span: SourceSpan) -> Result<Value> {
        use BinaryOp::*;
        match op {
            Add => match (&*left.0, &*right.0) {
                (ValueKind::String(a), ValueKind::String(b)) => Ok(Value::string(format!("{a}{b}"))),
                _ => self.numeric(op, &left, &right, span, i64::checked_add, |a, b| a + b),
            },
            Sub => self.numeric(op, &left, &right, span, i64::checked_sub, |a, b| a - b),
            Mul => self.numeric(op, &left, &right, span, i64::checked_mul, |a, b| a * b),
            Div => {
                self.check_divisor(op, &left, &right, span)?;
                let exact = |a: i64, b: i64| {
                    a.checked_rem(b)
                        .filter(|rem| *rem == 0)
                        .and_then(|_| a.checked_div(b))
                };
                self.numeric(op, &left, &right, span, exact, |a, b| a / b)
            }
            Mod => {
                self.check_divisor(op, &left, &right, span)?;
                self.numeric(op, &left, &right, span, i64::checked_rem, |a, b| a % b)
            }
            Equal => Ok(Value::bool(left.equals(&right))),
            NotEqual => Ok(Value::bool(!left.equals(&right))),
            Less => self.comparison(op, &left, &right, span, Ordering::is_lt),
            LessEqual => self.comparison(op, &left, &right, span, Ordering::is_le),
            Greater => self.comparison(op, &left, &right, span, Ordering::is_gt),
            GreaterEqual => self.comparison(op, &left, &right, span, Ordering::is_ge),
            And | Or => {
                let a = left.expect_bool(span)?;
                let b = right.expect_bool(span)?;
                Ok(Value::bool(if op == And { a && b } else { a || b }))
            }
        }
    }

    fn unary(&self, op: UnaryOp, value: Value, span: SourceSpan) -> Result<Value> {
        match op {
            UnaryOp::Negate => match &*value.0 {
                ValueKind::Int(n) => Ok(n
                    .checked_neg()
                    .map(Value::int)
                    .unwrap_or_else(|| Value::float(-(*n as f64)))),
                ValueKind::Float(n) => Ok(Value::float(-n)),
                _ => Err(error(
                    DiagnosticKind::Type,
                    format!("unary `-` expects a Number, found {}", value.type_name()),
                    span,
                )),
            },
            UnaryOp::Not => match &*value.0 {
                ValueKind::Bool(b) => Ok(Value::bool(!b)),
                _ => Err(error(
                    DiagnosticKind::Type,
                    format!("`!` expects a Boolean, found {}", value.type_name()),
                    span,
                )),
            },
        }
    }

    /// Integer arithmetic while both sides are integers and the result fits,
    /// float arithmetic otherwise.
    fn numeric(
        &self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
        span: SourceSpan,
        int_op: impl Fn(i64, i64) -> Option<i64>,
        float_op: impl Fn(f64, f64) -> f64,
    ) -> Result<Value> {
        if let (ValueKind::Int(a), ValueKind::Int(b)) = (&*left.0, &*right.0) {
            if let Some(result) = int_op(*a, *b) {
                return Ok(Value::int(result));
            }
        }
        let (a, b) = self.operands(op, left, right, span)?;
        Ok(Value::float(float_op(a, b)))
    }

    fn comparison(
        &self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
        span: SourceSpan,
        cmp: fn(Ordering) -> bool,
    ) -> Result<Value> {
        let ordering = match (&*left.0, &*right.0) {
            (ValueKind::Int(a), ValueKind::Int(b)) => Some(a.cmp(b)),
            _ => {
                let (a, b) = self.operands(op, left, right, span)?;
                a.partial_cmp(&b)
            }
        };
        Ok(Value::bool(ordering.is_some_and(cmp)))
    }

    fn operands(&self, op: BinaryOp, left: &Value, right: &Value, span: SourceSpan) -> Result<(f64, f64)> {
        match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(error(
                DiagnosticKind::Type,
                format!(
                    "cannot apply `{}` to {} and {}",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ),
                span,
            )),
        }
    }

    fn check_divisor(&self, op: BinaryOp, left: &Value, right: &Value, span: SourceSpan) -> Result<()> {
        self.operands(op, left, right, span)?;
        if right.as_number() == Some(0.0) {
            return Err(error(DiagnosticKind::DivisionByZero, "division by zero", span));
        }
        Ok(())
    }

    /// Calls any callable value with already evaluated arguments.
    pub(crate) fn call(&mut self, callee: &Value, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        match &*callee.0 {
            ValueKind::NativeFunction(fun) => fun.call(self, &args, span),
            ValueKind::Function(fun) => self.call_function(fun, args, span, None),
            ValueKind::BoundMethod(method) => {
                self.call_method(&method.receiver, &method.owner, &method.function, args, span)
            }
            ValueKind::Parent { receiver, owner } => {
                self.call_parent_constructor(receiver, owner, args, span)
            }
            ValueKind::Class(class) => Err(error(
                DiagnosticKind::Type,
                format!("class `{}` is constructed with `makeout`, not called", class.name),
                span,
            )),
            _ => Err(error(
                DiagnosticKind::Type,
                format!("{} value is not callable", callee.type_name()),
                span,
            )),
        }
    }

    /// Calls `function` as a method of `receiver`, declared by `owner`.
    pub(crate) fn call_method(
        &mut self,
        receiver: &Value,
        owner: &ClassRef,
        function: &Value,
        args: Vec<Value>,
        span: SourceSpan,
    ) -> Result<Value> {
        match &*function.0 {
            ValueKind::Function(fun) => self.call_function(fun, args, span, Some((receiver, owner))),
            _ => self.call(function, args, span),
        }
    }

    fn call_function(
        &mut self,
        fun: &UserFunction,
        mut args: Vec<Value>,
        span: SourceSpan,
        receiver: Option<(&Value, &ClassRef)>,
    ) -> Result<Value> {
        let decl = &fun.decl;
        let env = Environment::with_parent(Rc::clone(&fun.env));
        if let Some((receiver, owner)) = receiver {
            trace!(class = %owner.name, "binding method receiver");
            env.borrow_mut().define(
                "daddy",
                Value::new(ValueKind::Parent {
                    receiver: receiver.clone(),
                    owner: Rc::clone(owner),
                }),
            );
            let explicit_self = decl
                .params
                .first()
                .is_some_and(|param| param.name == "self" && !param.variadic);
            if explicit_self {
                args.insert(0, receiver.clone());
            } else {
                env.borrow_mut().define("self", receiver.clone());
            }
        }

        let fixed = decl.fixed_params();
        let variadic = decl.variadic_param();
        if args.len() < fixed.len() || (variadic.is_none() && args.len() > fixed.len()) {
            let name = fun.name.as_deref().unwrap_or("anonymous");
            let expected = if variadic.is_some() {
                format!("at least {}", fixed.len())
            } else {
                fixed.len().to_string()
            };
            return Err(error(
                DiagnosticKind::Arity,
                format!(
                    "function `{name}` expected {expected} arguments but received {}",
                    args.len()
                ),
                span,
            ));
        }
        let rest = args.split_off(fixed.len());
        {
            let mut scope = env.borrow_mut();
            for (param, value) in fixed.iter().zip(args) {
                scope.define(param.name.clone(), value);
            }
            if let Some(param) = variadic {
                scope.define(param.name.clone(), Value::list(rest));
            }
        }

        let source = fun.source.clone();
        let result = self.with_source(source.clone(), |this| {
            this.with_env(env, |this| this.execute_sequence(&decl.body))
        });
        let flow = match (result, source) {
            (Err(err), Some(file)) => return Err(err.locate(&file.text)),
            (result, _) => result?,
        };
        match flow {
            FlowControl::Return(value) => Ok(value),
            FlowControl::Next | FlowControl::NextValue(_) => Ok(Value::unit()),
        }
    }

    fn namespace(&self, target: &Value, member: &str, span: SourceSpan) -> Result<Value> {
        match &*target.0 {
            ValueKind::Module(module) => module.exports.get(member).cloned().ok_or_else(|| {
                error(
                    DiagnosticKind::NoSuchMember,
                    format!("module `{}` does not share `{member}`", module.name),
                    span,
                )
            }),
            _ => Err(error(
                DiagnosticKind::Type,
                format!("`::` expects a module, found {}", target.type_name()),
                span,
            )),
        }
    }

    fn index(&self, target: &Value, index: &Value, span: SourceSpan) -> Result<Value> {
        match (&*target.0, index.as_integer()) {
            (ValueKind::List(values), Some(idx)) => {
                let values = values.borrow();
                position(idx, values.len())
                    .map(|idx| values[idx].clone())
                    .ok_or_else(|| out_of_bounds(idx, values.len(), span))
            }
            (ValueKind::Range(range), Some(idx)) => range.get(idx).map(Value::int).ok_or_else(|| {
                out_of_bounds(idx, usize::try_from(range.len()).unwrap_or(usize::MAX), span)
            }),
            (ValueKind::String(text), Some(idx)) => {
                let len = text.chars().count();
                position(idx, len)
                    .and_then(|idx| text.chars().nth(idx))
                    .map(|ch| Value::string(ch.to_string()))
                    .ok_or_else(|| out_of_bounds(idx, len, span))
            }
            _ => Err(error(
                DiagnosticKind::Type,
                format!(
                    "cannot index {} with {}",
                    target.type_name(),
                    index.type_name()
                ),
                span,
            )),
        }
    }

    fn set_index(&self, target: &Value, index: &Value, value: Value, span: SourceSpan) -> Result<()> {
        match (&*target.0, index.as_integer()) {
            (ValueKind::List(values), Some(idx)) => {
                let mut values = values.borrow_mut();
                let len = values.len();
                let slot = position(idx, len).ok_or_else(|| out_of_bounds(idx, len, span))?;
                values[slot] = value;
                Ok(())
            }
            _ => Err(error(
                DiagnosticKind::Type,
                format!(
                    "index assignment expects a List and integral index, found {} and {}",
                    target.type_name(),
                    index.type_name()
                ),
                span,
            )),
        }
    }

    fn iterate(&self, value: &Value, span: SourceSpan) -> Result<Vec<Value>> {
        match &*value.0 {
            ValueKind::List(values) => Ok(values.borrow().clone()),
            _ => Err(error(
                DiagnosticKind::Type,
                format!("`go` expects a List or range, found {}", value.type_name()),
                span,
            )),
        }
    }
}

fn position(idx: i64, len: usize) -> Option<usize> {
    usize::try_from(idx).ok().filter(|idx| *idx < len)
}

fn out_of_bounds(idx: i64, len: usize, span: SourceSpan) -> FemboyError {
    error(
        DiagnosticKind::Index,
        format!("index {idx} out of bounds for length {len}"),
        span,
    )
}

pub(crate) enum FlowControl {
    Next,
    NextValue(Value),
    Return(Value),
}

/// Runs the program `source` read from `entry` with the default loader and
/// no native host. Failures are reported on stderr; the result is the
/// process exit status.
pub fn run(source: &str, entry: &Path) -> i32 {
    let mut interpreter = Interpreter::with_context(ExecutionContext::for_entry(entry));
    match interpreter.run(source) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            exit_status(&err)
        }
    }
}

/// 2 for programs rejected before evaluation, 1 for every other failure.
pub fn exit_status(err: &FemboyError) -> i32 {
    match err.kind() {
        Some(kind) if kind.is_compile_time() => 2,
        _ => 1,
    }
}

/// Shareable in-memory writer for capturing program output.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
