use std::path::Path;

use proptest::prelude::*;

use femboy::{
    lexer::tokenize,
    parser::{parse_program, parse_snippet},
    runtime::Interpreter,
    value::{Value, ValueKind},
};

fn ints(value: &Value) -> Vec<i64> {
    match value.0.as_ref() {
        ValueKind::List(values) => values
            .borrow()
            .iter()
            .map(|v| match v.0.as_ref() {
                ValueKind::Int(n) => *n,
                _ => panic!("expected Int, found {v:?}"),
            })
            .collect(),
        ValueKind::Range(range) => range.iter().collect(),
        _ => panic!("expected List or Range, found {value:?}"),
    }
}

fn collect_scripts(dir: &Path, out: &mut Vec<std::path::PathBuf>) {
    for entry in std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("cannot open {}: {e}", dir.display()))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_dir() {
            collect_scripts(&path, out);
        } else if path.extension().is_some_and(|x| x == "fl") {
            out.push(path);
        }
    }
}

/// Every bundled demo script is a valid program.
#[test]
fn parse_all_demo_scripts() {
    let demo_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
    let mut scripts = Vec::new();
    collect_scripts(&demo_dir, &mut scripts);
    scripts.sort();
    assert!(!scripts.is_empty(), "no .fl files found in {}", demo_dir.display());

    let mut failures = Vec::new();
    for path in &scripts {
        let src = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
        if let Err(e) = parse_program(&src) {
            failures.push(format!("{}: {e}", path.display()));
        }
    }
    if !failures.is_empty() {
        panic!(
            "{}/{} scripts failed to parse:\n  {}",
            failures.len(),
            scripts.len(),
            failures.join("\n  ")
        );
    }
}

proptest! {
    /// The lexer returns Ok or Err on any input, never panics.
    #[test]
    fn lexer_does_not_panic(s in "\\PC*") {
        let _ = tokenize(&s);
    }

    #[test]
    fn parser_does_not_panic(s in "\\PC*") {
        let _ = parse_snippet(&s);
        let _ = parse_program(&s);
    }

    /// Token spans always land on character boundaries of the source.
    #[test]
    fn token_spans_are_char_boundaries(s in "[a-z0-9 +*/()\\[\\]{}=.,:\"\\n#-]{0,64}") {
        if let Ok(tokens) = tokenize(&s) {
            for token in tokens {
                prop_assert!(token.span.start <= token.span.end);
                prop_assert!(token.span.end <= s.len());
                prop_assert!(s.is_char_boundary(token.span.start));
                prop_assert!(s.is_char_boundary(token.span.end));
            }
        }
    }
}

proptest! {
    /// `a to b` is the half-open integer interval.
    #[test]
    fn range_matches_half_open_interval(a in -50i64..50, b in -50i64..50) {
        let value = Interpreter::new()
            .eval_source(&format!("{a} to {b}"))
            .expect("range should evaluate");
        prop_assert_eq!(ints(&value), (a..b).collect::<Vec<_>>());
    }

    /// Small integer arithmetic agrees with i64 arithmetic.
    #[test]
    fn integer_arithmetic_matches_host(a in -10_000i64..10_000, b in 1i64..10_000) {
        let value = Interpreter::new()
            .eval_source(&format!("[{a} + {b}, {a} - {b}, {a} * {b}, {a} % {b}]"))
            .expect("arithmetic should evaluate");
        prop_assert_eq!(ints(&value), vec![a + b, a - b, a * b, a % b]);
    }

    /// Evaluating the same program twice in fresh interpreters gives the
    /// same result.
    #[test]
    fn evaluation_is_deterministic(xs in prop::collection::vec(-100i64..100, 0..12)) {
        let list = xs.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
        let source = format!(
            "adopt arr\nkeep xs = [{list}]\nkeep total = 0\ngo xs by x {{\n  total += x * x\n}}\n[total, arr::sort(xs)]"
        );
        let first = Interpreter::new().eval_source(&source).expect("program should evaluate");
        let second = Interpreter::new().eval_source(&source).expect("program should evaluate");
        prop_assert_eq!(first.to_string(), second.to_string());

        let mut sorted = xs.clone();
        sorted.sort();
        let total: i64 = xs.iter().map(|x| x * x).sum();
        let rendered = sorted.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
        prop_assert_eq!(first.to_string(), format!("[{total}, [{rendered}]]"));
    }

    /// Variadic tails receive exactly the surplus arguments.
    #[test]
    fn variadic_tail_length(n in 1usize..10) {
        let args = (0..n).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
        let value = Interpreter::new()
            .eval_source(&format!("keep f = (head, tail...) => tail\nf({args})"))
            .expect("call should evaluate");
        prop_assert_eq!(ints(&value), (1..n as i64).collect::<Vec<_>>());
    }
}
