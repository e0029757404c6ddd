use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    ast::{Annotation, ClassDecl, Expr, ExprKind},
    diagnostics::{error, DiagnosticKind, Result, SourceSpan},
    environment::{Environment, EnvironmentRef},
    runtime::{Interpreter, SourceFile},
    value::{BoundMethod, Instance, Value, ValueKind},
};

pub type ClassRef = Rc<ClassDef>;

/// Member name invoked by `makeout` and `daddy(...)`.
pub const CONSTRUCTOR: &str = "constructor";

pub struct ClassDef {
    pub name: String,
    pub parent: Option<ClassRef>,
    pub members: IndexMap<String, Member>,
    /// Scope the class literal was evaluated in; field initializers run here.
    pub env: EnvironmentRef,
    pub source: Option<Rc<SourceFile>>,
}

pub enum Member {
    Method(Value),
    Field { initializer: Option<Expr>, native: bool },
}

impl ClassDef {
    /// The inheritance chain, root class first.
    pub fn lineage(self: &Rc<Self>) -> Vec<ClassRef> {
        let mut chain = Vec::new();
        let mut current = Some(Rc::clone(self));
        while let Some(class) = current {
            current = class.parent.clone();
            chain.push(class);
        }
        chain.reverse();
        chain
    }

    /// Finds a method starting at this class and walking up the parents,
    /// returning it together with the class that declares it.
    pub fn find_method(self: &Rc<Self>, name: &str) -> Option<(ClassRef, Value)> {
        let mut current = Some(Rc::clone(self));
        while let Some(class) = current {
            if let Some(Member::Method(method)) = class.members.get(name) {
                return Some((Rc::clone(&class), method.clone()));
            }
            current = class.parent.clone();
        }
        None
    }
}

impl Interpreter {
    pub(crate) fn define_class(&mut self, decl: &ClassDecl) -> Result<Value> {
        let name = if decl.name.is_empty() {
            "<anonymous>".to_string()
        } else {
            decl.name.clone()
        };
        let parent = match &decl.parent {
            Some((parent_name, parent_span)) => {
                match Environment::lookup(self.env(), parent_name).as_ref().map(|v| &*v.0) {
                    Some(ValueKind::Class(class)) => Some(Rc::clone(class)),
                    Some(_) => {
                        return Err(error(
                            DiagnosticKind::UnresolvedParent,
                            format!("parent `{parent_name}` of `{name}` is not a class"),
                            *parent_span,
                        ))
                    }
                    None => {
                        return Err(error(
                            DiagnosticKind::UnresolvedParent,
                            format!("parent class `{parent_name}` of `{name}` is not defined"),
                            *parent_span,
                        ))
                    }
                }
            }
            None => None,
        };

        let mut members = IndexMap::new();
        for member in &decl.members {
            let value = match &member.value {
                Some(Expr {
                    kind: ExprKind::Function(function),
                    ..
                }) => Member::Method(self.closure(function, Some(&member.name))),
                initializer => Member::Field {
                    initializer: initializer.clone(),
                    native: member.annotation == Some(Annotation::Native),
                },
            };
            members.insert(member.name.clone(), value);
        }
        debug!(class = %name, members = members.len(), has_parent = parent.is_some(), "defined class");
        Ok(Value::new(ValueKind::Class(Rc::new(ClassDef {
            name,
            parent,
            members,
            env: Rc::clone(self.env()),
            source: self.source(),
        }))))
    }

    /// `makeout Class(args)`: fields root-to-derived, then the nearest
    /// constructor.
    pub(crate) fn construct(&mut self, class: &ClassRef, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        debug!(class = %class.name, args = args.len(), "constructing instance");
        let mut fields = IndexMap::new();
        for ancestor in class.lineage() {
            for (name, member) in &ancestor.members {
                let Member::Field { initializer, native } = member else {
                    continue;
                };
                let value = match initializer {
                    Some(expr) => {
                        let result = self.with_source(ancestor.source.clone(), |this| {
                            this.with_env(Rc::clone(&ancestor.env), |this| this.evaluate(expr))
                        });
                        match (result, &ancestor.source) {
                            (Err(err), Some(file)) => return Err(err.locate(&file.text)),
                            (result, _) => result?,
                        }
                    }
                    None if *native => Value::unit(),
                    None => continue,
                };
                fields.insert(name.clone(), value);
            }
        }
        let instance = Value::new(ValueKind::Instance(Instance {
            class: Rc::clone(class),
            fields: RefCell::new(fields),
        }));
        if let Some((owner, constructor)) = class.find_method(CONSTRUCTOR) {
            self.call_method(&instance, &owner, &constructor, args, span)?;
        }
        Ok(instance)
    }

    /// Reads `target.name`: instance fields first, then methods up the chain.
    pub(crate) fn member(&mut self, target: Value, name: &str, span: SourceSpan) -> Result<Value> {
        match &*target.0 {
            ValueKind::Instance(instance) => {
                if let Some(value) = instance.fields.borrow().get(name) {
                    return Ok(value.clone());
                }
                match instance.class.find_method(name) {
                    Some((owner, function)) => Ok(Value::new(ValueKind::BoundMethod(BoundMethod {
                        name: name.to_string(),
                        receiver: target.clone(),
                        function,
                        owner,
                    }))),
                    None => Err(error(
                        DiagnosticKind::NoSuchMember,
                        format!("`{}` instance has no member `{name}`", instance.class.name),
                        span,
                    )),
                }
            }
            ValueKind::Parent { receiver, owner } => {
                let parent = self.parent_of(owner, span)?;
                match parent.find_method(name) {
                    Some((owner, function)) => Ok(Value::new(ValueKind::BoundMethod(BoundMethod {
                        name: name.to_string(),
                        receiver: receiver.clone(),
                        function,
                        owner,
                    }))),
                    None => Err(error(
                        DiagnosticKind::NoSuchMember,
                        format!("parent class `{}` has no method `{name}`", parent.name),
                        span,
                    )),
                }
            }
            ValueKind::Class(class) => match class.find_method(name) {
                Some((_, function)) => Ok(function),
                None => Err(error(
                    DiagnosticKind::NoSuchMember,
                    format!("class `{}` has no method `{name}`", class.name),
                    span,
                )),
            },
            ValueKind::Module(module) => Err(error(
                DiagnosticKind::Type,
                format!("module `{}` members are reached with `::`, not `.`", module.name),
                span,
            )),
            _ => Err(error(
                DiagnosticKind::Type,
                format!("cannot read member `{name}` of {}", target.type_name()),
                span,
            )),
        }
    }

    /// Writes `target.name = value`, creating the field on first assignment.
    pub(crate) fn set_member(&mut self, target: Value, name: &str, value: Value, span: SourceSpan) -> Result<()> {
        match &*target.0 {
            ValueKind::Instance(instance) => {
                instance.fields.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            _ => Err(error(
                DiagnosticKind::Type,
                format!("cannot assign member `{name}` on {}", target.type_name()),
                span,
            )),
        }
    }

    /// `daddy(args)`: the constructor found starting at the owner's parent.
    pub(crate) fn call_parent_constructor(
        &mut self,
        receiver: &Value,
        owner: &ClassRef,
        args: Vec<Value>,
        span: SourceSpan,
    ) -> Result<Value> {
        let parent = self.parent_of(owner, span)?;
        match parent.find_method(CONSTRUCTOR) {
            Some((declaring, constructor)) => {
                self.call_method(receiver, &declaring, &constructor, args, span)
            }
            None => Ok(Value::unit()),
        }
    }

    fn parent_of(&self, owner: &ClassRef, span: SourceSpan) -> Result<ClassRef> {
        owner.parent.clone().ok_or_else(|| {
            error(
                DiagnosticKind::NoParent,
                format!("`daddy` used in `{}`, which has no parent class", owner.name),
                span,
            )
        })
    }
}
