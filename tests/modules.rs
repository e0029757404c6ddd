use std::{fs, path::Path};

use femboy::{
    diagnostics::{DiagnosticKind, FemboyError},
    module::{FileSystemLoader, MemoryLoader},
    runtime::{ExecutionContext, Interpreter, OutputBuffer},
    value::{Value, ValueKind},
};
use indexmap::IndexMap;

fn interpreter(loader: MemoryLoader) -> (Interpreter, OutputBuffer) {
    let output = OutputBuffer::new();
    let interpreter = Interpreter::new()
        .with_loader(loader)
        .with_output(output.clone());
    (interpreter, output)
}

fn run_error(loader: MemoryLoader, source: &str) -> FemboyError {
    let (mut interpreter, _) = interpreter(loader);
    match interpreter.run(source) {
        Ok(()) => panic!("expected program to fail"),
        Err(err) => err,
    }
}

fn kind(err: &FemboyError) -> DiagnosticKind {
    err.kind().cloned().expect("diagnostic error")
}

fn expect_int(value: &Value) -> i64 {
    match value.0.as_ref() {
        ValueKind::Int(n) => *n,
        _ => panic!("expected Int, found {value:?}"),
    }
}

#[test]
fn shared_bindings_are_reachable_through_namespace() {
    let loader = MemoryLoader::new().with_module(
        "util",
        "share keep double = (n) => n * 2\nshare keep answer = 21\n",
    );
    let (mut interpreter, _) = interpreter(loader);
    let value = interpreter
        .eval_source("adopt util\nutil::double(util::answer)")
        .expect("evaluation should succeed");
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn private_bindings_stay_hidden() {
    let loader = MemoryLoader::new().with_module(
        "util",
        "keep secret = 7\nshare keep reveal = () => secret\n",
    );
    let (mut interpreter, _) = interpreter(loader.clone());
    let value = interpreter
        .eval_source("adopt util\nutil::reveal()")
        .expect("shared function may use private state");
    assert_eq!(expect_int(&value), 7);

    let err = run_error(loader, "adopt util\nutil::secret\n");
    assert_eq!(kind(&err), DiagnosticKind::NoSuchMember);
    assert!(err.to_string().contains("does not share `secret`"), "{err}");
}

#[test]
fn dotted_path_binds_last_segment() {
    let loader = MemoryLoader::new().with_module(
        "shapes.circle",
        r#"
adopt math

share keep Circle = boy {
    share keep constructor = (r) => {
        self.radius = r
    }
    share keep area = () => math::round(math::PI * self.radius * self.radius)
}
"#,
    );
    let (mut interpreter, output) = interpreter(loader);
    interpreter
        .run("adopt io\nadopt shapes.circle\nkeep c = makeout circle::Circle(2)\nio::print(c.area())\n")
        .expect("program should run");
    assert_eq!(output.contents(), "13\n");
}

#[test]
fn import_cycle_is_detected() {
    let loader = MemoryLoader::new()
        .with_module("a", "adopt b\nshare keep x = 1\n")
        .with_module("b", "adopt a\nshare keep y = 2\n");
    let err = run_error(loader, "adopt a\n");
    assert_eq!(kind(&err), DiagnosticKind::ImportCycle);
    assert!(err.to_string().contains("a -> b -> a"), "{err}");
}

#[test]
fn importing_the_entry_module_is_a_cycle() {
    let loader = MemoryLoader::new()
        .with_module("main", "adopt helper\n")
        .with_module("helper", "adopt main\n");
    let err = run_error(loader, "adopt helper\n");
    assert_eq!(kind(&err), DiagnosticKind::ImportCycle);
    assert!(err.to_string().contains("main -> helper -> main"), "{err}");
}

#[test]
fn missing_module_is_reported() {
    let err = run_error(MemoryLoader::new(), "adopt nowhere.to.be.found\n");
    assert_eq!(kind(&err), DiagnosticKind::ModuleNotFound);
    assert!(err.to_string().contains("nowhere.to.be.found"), "{err}");
}

#[test]
fn modules_evaluate_once() {
    let loader = MemoryLoader::new()
        .with_module("noisy", "adopt io\nio::print(\"loading noisy\")\nshare keep n = 1\n")
        .with_module("first", "adopt noisy\nshare keep n = noisy::n\n")
        .with_module("second", "adopt noisy\nshare keep n = noisy::n + 1\n");
    let (mut interpreter, output) = interpreter(loader);
    interpreter
        .run("adopt io\nadopt first\nadopt second\nio::print(first::n, second::n)\n")
        .expect("program should run");
    assert_eq!(output.contents(), "loading noisy\n1 2\n");
}

#[test]
fn module_scope_is_isolated_from_importer() {
    let loader = MemoryLoader::new().with_module("peek", "share keep seen = hostValue\n");
    let err = run_error(loader, "keep hostValue = 1\nadopt peek\n");
    assert_eq!(kind(&err), DiagnosticKind::UndefinedName);
}

#[test]
fn errors_inside_modules_carry_module_position() {
    let loader = MemoryLoader::new().with_module(
        "broken",
        "share keep explode = () => {\n    return 1 / 0\n}\n",
    );
    let err = run_error(loader, "adopt broken\nbroken::explode()\n");
    assert_eq!(kind(&err), DiagnosticKind::DivisionByZero);
    assert!(err.to_string().contains("(at 2:12)"), "{err}");
}

#[test]
fn field_initializer_errors_carry_class_module_position() {
    let loader = MemoryLoader::new().with_module(
        "boom",
        "share keep Boom = boy {\n    keep ok = 1\n    keep bad = 1 / 0\n}\n",
    );
    let err = run_error(loader, "adopt boom\nkeep b = makeout boom::Boom()\n");
    assert_eq!(kind(&err), DiagnosticKind::DivisionByZero);
    assert!(err.to_string().contains("(at 3:16)"), "{err}");
}

#[test]
fn parse_errors_in_modules_name_the_module() {
    let loader = MemoryLoader::new().with_module("bad", "keep = 1\n");
    let err = run_error(loader, "adopt bad\n");
    assert_eq!(kind(&err), DiagnosticKind::Parse);
    assert!(err.to_string().contains("in module `bad`"), "{err}");
}

#[test]
fn modules_are_reached_with_double_colon_only() {
    let loader = MemoryLoader::new().with_module("util", "share keep x = 1\n");
    let err = run_error(loader, "adopt util\nutil.x\n");
    assert_eq!(kind(&err), DiagnosticKind::Type);
}

#[test]
fn custom_builtin_shadows_loader() {
    let mut exports = IndexMap::new();
    exports.insert("version".to_string(), Value::string("1.0"));
    let loader = MemoryLoader::new().with_module("meta", "share keep version = \"file\"\n");
    let mut interpreter = Interpreter::new()
        .with_loader(loader)
        .with_builtin("meta", Value::module("meta", exports));
    let value = interpreter
        .eval_source("adopt meta\nmeta::version")
        .expect("evaluation should succeed");
    assert_eq!(value.to_string(), "1.0");
}

fn write(path: &Path, source: &str) {
    fs::create_dir_all(path.parent().expect("module has a parent directory"))
        .expect("create module directory");
    fs::write(path, source).expect("write module");
}

#[test]
fn file_system_loader_maps_dots_to_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        &dir.path().join("lib").join("greet.fl"),
        "share keep hello = (name) => \"hello, \" + name\n",
    );
    let output = OutputBuffer::new();
    let context = ExecutionContext {
        entry_module: Some("main".to_string()),
        search_paths: vec![dir.path().to_path_buf()],
    };
    let mut interpreter = Interpreter::with_context(context).with_output(output.clone());
    interpreter
        .run("adopt io\nadopt lib.greet\nio::print(greet::hello(\"fl\"))\n")
        .expect("program should run");
    assert_eq!(output.contents(), "hello, fl\n");
}

#[test]
fn file_system_loader_tries_roots_in_order() {
    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    write(&second.path().join("pick.fl"), "share keep from = \"second\"\n");
    let loader = FileSystemLoader::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
    let mut interpreter = Interpreter::new().with_loader(loader);
    let value = interpreter
        .eval_source("adopt pick\npick::from")
        .expect("evaluation should succeed");
    assert_eq!(value.to_string(), "second");

    write(&first.path().join("pick.fl"), "share keep from = \"first\"\n");
    let loader = FileSystemLoader::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
    let mut interpreter = Interpreter::new().with_loader(loader);
    let value = interpreter
        .eval_source("adopt pick\npick::from")
        .expect("evaluation should succeed");
    assert_eq!(value.to_string(), "first");
}

#[test]
fn entry_context_uses_script_directory() {
    let context = ExecutionContext::for_entry(Path::new("scripts/app.fl"));
    assert_eq!(context.entry_module.as_deref(), Some("app"));
    assert_eq!(context.search_paths, vec![Path::new("scripts").to_path_buf()]);

    let context = ExecutionContext::for_entry(Path::new("app.fl"));
    assert_eq!(context.search_paths, vec![Path::new(".").to_path_buf()]);
}

#[test]
fn run_entry_reports_exit_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(&dir.path().join("helper.fl"), "share keep value = 3\n");
    let entry = dir.path().join("main.fl");

    assert_eq!(femboy::run("adopt helper\nkeep v = helper::value\n", &entry), 0);
    assert_eq!(femboy::run("adopt helper\nhelper::missing\n", &entry), 1);
    assert_eq!(femboy::run("keep = 1\n", &entry), 2);
    // The entry module cannot import itself.
    write(&entry, "adopt main\n");
    assert_eq!(femboy::run("adopt main\n", &entry), 1);
}
