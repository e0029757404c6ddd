use femboy::{
    ast::{Annotation, BinaryOp, ExprKind, StmtKind},
    diagnostics::{Diagnostic, DiagnosticKind},
    parser::{parse_program, parse_snippet},
};

fn parse_error(source: &str) -> Diagnostic {
    match parse_program(source) {
        Ok(program) => panic!("expected parse error, parsed {program:?}"),
        Err(err) => err,
    }
}

#[test]
fn parses_declarations_and_adopt() {
    let program = parse_program("adopt shapes.circle\nshare keep answer: Number = 42\nkeep later\n")
        .expect("program should parse");
    assert_eq!(program.items.len(), 3);
    match &program.items[0].kind {
        StmtKind::Adopt { path } => assert_eq!(path, &vec!["shapes".to_string(), "circle".to_string()]),
        other => panic!("expected adopt, found {other:?}"),
    }
    match &program.items[1].kind {
        StmtKind::Keep {
            name,
            shared,
            annotation,
            initializer,
        } => {
            assert_eq!(name, "answer");
            assert!(*shared);
            assert_eq!(annotation, &Some(Annotation::Named("Number".to_string())));
            assert!(initializer.is_some());
        }
        other => panic!("expected keep, found {other:?}"),
    }
    assert!(matches!(
        &program.items[2].kind,
        StmtKind::Keep { initializer: None, shared: false, .. }
    ));
}

#[test]
fn range_binds_between_arithmetic_and_comparison() {
    let program = parse_program("0 + 1 to 2 * 3 == x").expect("program should parse");
    let StmtKind::Expr(expr) = &program.items[0].kind else {
        panic!("expected expression statement");
    };
    let ExprKind::Binary { op, left, .. } = &expr.kind else {
        panic!("expected comparison, found {expr:?}");
    };
    assert_eq!(*op, BinaryOp::Equal);
    let ExprKind::Range { start, end } = &left.kind else {
        panic!("expected range, found {left:?}");
    };
    assert!(matches!(start.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
    assert!(matches!(end.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
}

#[test]
fn class_literal_takes_binding_name() {
    let program = parse_program("keep Cutie = boy : Human {\n    keep name\n    share keep talk = () => name\n}\n")
        .expect("program should parse");
    let StmtKind::Keep {
        initializer: Some(init),
        ..
    } = &program.items[0].kind
    else {
        panic!("expected keep with initializer");
    };
    let ExprKind::Class(class) = &init.kind else {
        panic!("expected class literal, found {init:?}");
    };
    assert_eq!(class.name, "Cutie");
    assert_eq!(class.parent.as_ref().map(|(name, _)| name.as_str()), Some("Human"));
    let members: Vec<_> = class
        .members
        .iter()
        .map(|member| (member.name.as_str(), member.shared))
        .collect();
    assert_eq!(members, vec![("name", false), ("talk", true)]);
}

#[test]
fn native_block_remembers_its_target() {
    let program = parse_program("keep slot = native => { return 1 }\n").expect("program should parse");
    let StmtKind::Keep {
        initializer: Some(init),
        ..
    } = &program.items[0].kind
    else {
        panic!("expected keep with initializer");
    };
    let ExprKind::Native(block) = &init.kind else {
        panic!("expected native block, found {init:?}");
    };
    assert_eq!(block.target.as_deref(), Some("slot"));
    assert_eq!(block.code.trim(), "return 1");
}

#[test]
fn arrow_expression_body_becomes_return() {
    let program = parse_program("keep f = (a, rest...) => a").expect("program should parse");
    let StmtKind::Keep {
        initializer: Some(init),
        ..
    } = &program.items[0].kind
    else {
        panic!("expected keep with initializer");
    };
    let ExprKind::Function(decl) = &init.kind else {
        panic!("expected function, found {init:?}");
    };
    assert_eq!(decl.fixed_params().len(), 1);
    assert_eq!(decl.variadic_param().map(|p| p.name.as_str()), Some("rest"));
    assert!(matches!(decl.body[0].kind, StmtKind::Return(Some(_))));
}

#[test]
fn makeout_accepts_qualified_class() {
    let program = parse_program("makeout shapes::Circle(1, 2)").expect("program should parse");
    let StmtKind::Expr(expr) = &program.items[0].kind else {
        panic!("expected expression statement");
    };
    let ExprKind::Makeout { class, args } = &expr.kind else {
        panic!("expected makeout, found {expr:?}");
    };
    assert!(matches!(&class.kind, ExprKind::Namespace { member, .. } if member == "Circle"));
    assert_eq!(args.len(), 2);
}

#[test]
fn if_else_chain_may_span_lines() {
    let program = parse_snippet("if a {\n  1\n}\nelse if b {\n  2\n}\nelse {\n  3\n}\n")
        .expect("snippet should parse");
    let StmtKind::If {
        branches,
        else_branch,
    } = &program.items[0].kind
    else {
        panic!("expected if statement");
    };
    assert_eq!(branches.len(), 2);
    assert!(else_branch.is_some());
}

#[test]
fn variadic_must_be_last() {
    let err = parse_error("keep f = (rest..., last) => last");
    assert_eq!(err.kind, DiagnosticKind::Parse);
    assert!(err.message.contains("variadic parameter `rest` must be the last parameter"));
}

#[test]
fn duplicate_member_is_rejected() {
    let err = parse_error("keep A = boy {\n  keep x = 1\n  keep x = 2\n}");
    assert!(err.message.contains("duplicate member `x`"), "{err}");
}

#[test]
fn program_top_level_rejects_control_flow() {
    for source in ["if YES { }", "go xs by x { }", "stay NO { }", "return"] {
        let err = parse_error(source);
        assert!(
            err.message.starts_with("expected declaration or expression at top level"),
            "{source}: {err}"
        );
        assert_eq!(err.notes, vec!["control flow belongs inside a function body".to_string()]);
    }
    assert!(parse_snippet("go xs by x { }").is_ok());
}

#[test]
fn share_and_adopt_are_top_level_only() {
    let err = parse_error("keep f = () => {\n  share keep x = 1\n}");
    assert!(err.message.contains("`share` is only allowed"), "{err}");
    let err = parse_error("keep f = () => {\n  adopt io\n}");
    assert!(err.message.contains("`adopt` is only allowed"), "{err}");
}

#[test]
fn invalid_assignment_target_is_rejected() {
    let err = parse_snippet("1 = 2").expect_err("should fail");
    assert_eq!(err.message, "invalid assignment target");
    let err = parse_snippet("f() += 1").expect_err("should fail");
    assert_eq!(err.message, "invalid assignment target");
}

#[test]
fn errors_name_expected_and_found_tokens() {
    let err = parse_error("keep = 3");
    assert_eq!(err.message, "expected binding name after `keep`, found `=`");

    let err = parse_error("keep x = (1 + 2");
    assert_eq!(err.message, "expected `)` after expression, found end of input");

    let err = parse_error("keep x = 1 2");
    assert_eq!(err.message, "expected end of statement, found number `2`");
}

#[test]
fn oversized_number_literal_is_rejected() {
    let err = parse_error("keep big = 99999999999999999999");
    assert!(err.message.contains("out of range"), "{err}");
}

#[test]
fn lex_errors_surface_through_parser() {
    let err = parse_error("keep x = \"open");
    assert_eq!(err.kind, DiagnosticKind::Lex);
}
