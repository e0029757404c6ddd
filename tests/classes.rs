use femboy::{
    diagnostics::{DiagnosticKind, FemboyError},
    runtime::{Interpreter, OutputBuffer},
    value::{Value, ValueKind},
};

fn eval(source: &str) -> Value {
    Interpreter::new()
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn eval_error(source: &str) -> FemboyError {
    match Interpreter::new().eval_source(source) {
        Ok(value) => panic!("expected error, received value {value}"),
        Err(err) => err,
    }
}

fn run(source: &str) -> String {
    let output = OutputBuffer::new();
    let mut interpreter = Interpreter::new().with_output(output.clone());
    interpreter.run(source).expect("program should run");
    output.contents()
}

fn expect_int(value: &Value) -> i64 {
    match value.0.as_ref() {
        ValueKind::Int(n) => *n,
        _ => panic!("expected Int, found {value:?}"),
    }
}

fn kind(err: &FemboyError) -> DiagnosticKind {
    err.kind().cloned().expect("diagnostic error")
}

const HUMAN_AND_CUTIE: &str = r#"
adopt io

keep Human = boy {
    keep name = "Human"
    keep privateAge = 0

    share keep constructor = (age) => {
        self.privateAge = age
    }

    share keep talk = () => {
        io::print("hi, I'm " + self.name)
    }
}

keep Cutie = boy : Human {
    share keep constructor = (age) => {
        daddy(age)
        self.name = "Cutie"
    }

    share keep talk = () => {
        daddy.talk()
        io::print("uwu, I am", self.privateAge)
    }
}

keep cutie = makeout Cutie(18)
cutie.talk()
"#;

#[test]
fn parent_method_runs_before_override_body() {
    assert_eq!(run(HUMAN_AND_CUTIE), "hi, I'm Cutie\nuwu, I am 18\n");
}

#[test]
fn parent_constructor_initializes_shared_instance() {
    let value = eval(
        r#"
        keep Base = boy {
            share keep constructor = (x) => {
                self.x = x
            }
        }
        keep Derived = boy : Base {
            share keep constructor = (x, y) => {
                daddy(x)
                self.y = y
            }
        }
        keep d = makeout Derived(3, 4)
        d.x * 10 + d.y
        "#,
    );
    assert_eq!(expect_int(&value), 34);
}

#[test]
fn daddy_resolves_lexically_through_three_levels() {
    let value = eval(
        r#"
        keep A = boy {
            share keep path = () => "A"
        }
        keep B = boy : A {
            share keep path = () => "B" + daddy.path()
        }
        keep C = boy : B {
            share keep path = () => "C" + daddy.path()
        }
        keep c = makeout C()
        c.path()
        "#,
    );
    assert_eq!(value.to_string(), "CBA");
}

#[test]
fn self_dispatch_is_dynamic() {
    let value = eval(
        r#"
        keep Animal = boy {
            share keep kind = () => "animal"
            share keep describe = () => "I am a " + self.kind()
        }
        keep Kitten = boy : Animal {
            share keep kind = () => "kitten"
        }
        keep k = makeout Kitten()
        k.describe()
        "#,
    );
    assert_eq!(value.to_string(), "I am a kitten");
}

#[test]
fn daddy_without_parent_fails() {
    let err = eval_error(
        r#"
        keep Lonely = boy {
            share keep constructor = () => {
                daddy()
            }
        }
        makeout Lonely()
        "#,
    );
    assert_eq!(kind(&err), DiagnosticKind::NoParent);
    assert!(err.to_string().contains("`Lonely`"), "{err}");

    let err = eval_error(
        r#"
        keep Lonely = boy {
            share keep talk = () => daddy.talk()
        }
        keep l = makeout Lonely()
        l.talk()
        "#,
    );
    assert_eq!(kind(&err), DiagnosticKind::NoParent);
}

#[test]
fn daddy_call_without_ancestor_constructor_is_a_no_op() {
    let value = eval(
        r#"
        keep Plain = boy {
            keep tag = "plain"
        }
        keep Child = boy : Plain {
            share keep constructor = () => {
                daddy()
                self.ready = YES
            }
        }
        keep c = makeout Child()
        [c.tag, c.ready]
        "#,
    );
    assert_eq!(value.to_string(), "[plain, YES]");
}

#[test]
fn unknown_parent_is_reported() {
    let err = eval_error("keep Orphan = boy : Nobody { }");
    assert_eq!(kind(&err), DiagnosticKind::UnresolvedParent);

    let err = eval_error("keep notAClass = 3\nkeep Odd = boy : notAClass { }");
    assert_eq!(kind(&err), DiagnosticKind::UnresolvedParent);
}

#[test]
fn missing_member_is_reported() {
    let err = eval_error("keep Empty = boy { }\nkeep e = makeout Empty()\ne.dance()");
    assert_eq!(kind(&err), DiagnosticKind::NoSuchMember);
    assert!(err.to_string().contains("no member `dance`"), "{err}");
}

#[test]
fn fields_are_created_on_first_assignment() {
    let value = eval(
        r#"
        keep Bag = boy {
            keep later
            share keep fill = () => {
                self.later = 5
            }
        }
        keep b = makeout Bag()
        b.fill()
        b.later
        "#,
    );
    assert_eq!(expect_int(&value), 5);

    let err = eval_error("keep Bag = boy {\n keep later\n}\nkeep b = makeout Bag()\nb.later");
    assert_eq!(kind(&err), DiagnosticKind::NoSuchMember);
}

#[test]
fn field_initializers_run_per_instance() {
    let value = eval(
        r#"
        adopt arr
        keep Box = boy {
            keep items = []
        }
        keep a = makeout Box()
        keep b = makeout Box()
        arr::push(a.items, 1)
        [arr::len(a.items), arr::len(b.items), a == a, a == b]
        "#,
    );
    assert_eq!(value.to_string(), "[1, 0, YES, NO]");
}

#[test]
fn explicit_self_parameter_receives_instance() {
    let value = eval(
        r#"
        keep Pet = boy {
            share keep rename = (self, name) => {
                self.name = name
            }
        }
        keep p = makeout Pet()
        p.rename("Mochi")
        p.name
        "#,
    );
    assert_eq!(value.to_string(), "Mochi");
}

#[test]
fn bound_methods_keep_their_receiver() {
    let value = eval(
        r#"
        keep Counter = boy {
            keep count = 0
            share keep bump = () => {
                self.count += 1
                return self.count
            }
        }
        keep c = makeout Counter()
        keep bump = c.bump
        bump()
        bump()
        c.count
        "#,
    );
    assert_eq!(expect_int(&value), 2);
}

#[test]
fn constructor_arity_is_checked() {
    let err = eval_error(
        r#"
        keep Point = boy {
            share keep constructor = (x, y) => {
                self.x = x
            }
        }
        makeout Point(1)
        "#,
    );
    assert_eq!(kind(&err), DiagnosticKind::Arity);
}

#[test]
fn makeout_requires_a_class() {
    assert_eq!(kind(&eval_error("keep f = () => 1\nmakeout f()")), DiagnosticKind::Type);
    assert_eq!(
        kind(&eval_error("keep Thing = boy { }\nThing()")),
        DiagnosticKind::Type
    );
}

#[test]
fn classes_and_instances_display_their_name() {
    assert_eq!(eval("keep Human = boy { }\nHuman").to_string(), "<boy Human>");
    assert_eq!(
        eval("keep Human = boy { }\nmakeout Human()").to_string(),
        "<Human instance>"
    );
}
