use std::rc::Rc;

use crate::diagnostics::SourceSpan;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

/// Annotation after `:` on a declaration or parameter. Only `native`
/// changes behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Native,
    Named(String),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Annotation>,
    pub variadic: bool,
    pub span: SourceSpan,
}

/// Arrow function literal. Shared between the AST and every closure
/// created from it.
#[derive(Debug)]
pub struct FunctionDecl {
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: SourceSpan,
}

impl FunctionDecl {
    pub fn fixed_params(&self) -> &[Param] {
        match self.params.last() {
            Some(last) if last.variadic => &self.params[..self.params.len() - 1],
            _ => &self.params,
        }
    }

    pub fn variadic_param(&self) -> Option<&Param> {
        self.params.last().filter(|param| param.variadic)
    }
}

#[derive(Debug, Clone)]
pub struct MemberDecl {
    pub name: String,
    pub shared: bool,
    pub annotation: Option<Annotation>,
    pub value: Option<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug)]
pub struct ClassDecl {
    pub name: String,
    pub parent: Option<(String, SourceSpan)>,
    pub members: Vec<MemberDecl>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct NativeBlock {
    pub code: String,
    /// Binding populated with the host's result when the block initializes
    /// or is assigned to a name.
    pub target: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        target: Box<Expr>,
        member: String,
    },
    Namespace {
        target: Box<Expr>,
        member: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    List(Vec<Expr>),
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    Function(Rc<FunctionDecl>),
    Class(Rc<ClassDecl>),
    Makeout {
        class: Box<Expr>,
        args: Vec<Expr>,
    },
    Native(NativeBlock),
}

#[derive(Debug, Clone)]
pub struct IfBranch {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Adopt {
        path: Vec<String>,
    },
    Keep {
        name: String,
        shared: bool,
        annotation: Option<Annotation>,
        initializer: Option<Expr>,
    },
    Assign {
        target: Expr,
        /// `None` for plain `=`, otherwise the operator of `+=`, `-=`, ...
        op: Option<BinaryOp>,
        value: Expr,
    },
    Expr(Expr),
    If {
        branches: Vec<IfBranch>,
        else_branch: Option<Vec<Stmt>>,
    },
    Go {
        iterable: Expr,
        binding: String,
        body: Vec<Stmt>,
    },
    Stay {
        condition: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Stmt>,
}
