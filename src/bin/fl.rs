use std::{fs, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use femboy::{exit_status, parser, ExecutionContext, FemboyError, Interpreter, Repl};

#[derive(Parser)]
#[command(author, version, about = "Femboy language interpreter")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a .fl script
    Run {
        script: PathBuf,
        /// Extra directories searched by `adopt`, after the script's own
        #[arg(long = "module-path", env = "FL_PATH", value_delimiter = ':')]
        module_paths: Vec<PathBuf>,
    },
    /// Evaluate a snippet and print its value
    Eval { source: String },
    /// Print the syntax tree of a script
    Ast { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
}

fn main() -> ExitCode {
    install_tracing();
    let args = Args::parse();
    let result = match args.command.unwrap_or(Command::Repl) {
        Command::Run {
            script,
            module_paths,
        } => run_script(script, module_paths),
        Command::Eval { source } => eval(&source),
        Command::Ast { script } => dump_ast(script),
        Command::Repl => Repl::new().run(),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(exit_status(&err) as u8)
        }
    }
}

fn install_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_script(script: PathBuf, module_paths: Vec<PathBuf>) -> Result<(), FemboyError> {
    let source = fs::read_to_string(&script)?;
    let mut context = ExecutionContext::for_entry(&script);
    context.search_paths.extend(module_paths);
    debug!(script = %script.display(), search_paths = ?context.search_paths, "starting run");
    Interpreter::with_context(context).run(&source)
}

fn eval(source: &str) -> Result<(), FemboyError> {
    let value = Interpreter::new().eval_source(source)?;
    if !value.is_unit() {
        println!("{value}");
    }
    Ok(())
}

fn dump_ast(script: PathBuf) -> Result<(), FemboyError> {
    let source = fs::read_to_string(&script)?;
    let program = parser::parse_program(&source).map_err(|diag| diag.locate(&source))?;
    println!("{program:#?}");
    Ok(())
}
