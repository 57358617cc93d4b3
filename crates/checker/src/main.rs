//! Concat Type Checker CLI
//!
//! Checks a program tree produced by the Concat parser, printing any type
//! error against the program's source.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use concat_check::builtins::BUILTINS;
use concat_check::{CheckerConfig, TypeChecker, report};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;

/// The program has a type error
const EXIT_TYPE_ERROR: i32 = 1;
/// Bad arguments or unreadable input
const EXIT_USAGE: i32 = 2;
/// The checker itself failed
const EXIT_INTERNAL: i32 = 3;

#[derive(ClapParser)]
#[command(name = "concat-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Concat type checker - check stack effects of Concat programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Type check a program
    Check {
        /// Program tree as JSON, as written by the parser
        tree: PathBuf,

        /// Source the tree was parsed from, for error locations
        source: PathBuf,

        /// Checker configuration declaring host types and words (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the types found as JSON
        #[arg(long)]
        emit_types: bool,
    },

    /// List builtin words and their types
    Builtins,

    /// Show how a type signature is understood
    Signature {
        /// Signature text, e.g. "(*s a -- *s a a)"
        text: String,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("concat_check=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            tree,
            source,
            config,
            emit_types,
        } => run_check(&tree, &source, config.as_deref(), emit_types),
        Commands::Builtins => run_builtins(),
        Commands::Signature { text } => run_signature(&text),
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn load_config(path: Option<&Path>) -> CheckerConfig {
    let mut config = match CheckerConfig::default_config() {
        Ok(config) => config,
        Err(e) => fail_internal(&e),
    };
    if let Some(path) = path {
        match CheckerConfig::load(path) {
            Ok(extra) => config.merge(extra),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(EXIT_USAGE);
            }
        }
    }
    config
}

fn new_checker(config: CheckerConfig) -> TypeChecker {
    match TypeChecker::new(config) {
        Ok(checker) => checker,
        Err(e) => fail_internal(&e.to_string()),
    }
}

fn run_check(tree: &Path, source: &Path, config: Option<&Path>, emit_types: bool) {
    let json = read_or_exit(tree);
    let text = read_or_exit(source);
    let program = match concat_check::parse_program(&json) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Error: {}: {}", tree.display(), e);
            process::exit(EXIT_USAGE);
        }
    };
    let mut checker = new_checker(load_config(config));
    debug!(items = program.items.len(), "checking {}", source.display());

    match checker.check_program(&program) {
        Ok(typed) => {
            if emit_types {
                match serde_json::to_string_pretty(&typed) {
                    Ok(json) => println!("{}", json),
                    Err(e) => fail_internal(&e.to_string()),
                }
            } else {
                println!("{}: no type errors", source.display());
            }
        }
        Err(err) => match report(err, &text) {
            Ok(diagnostic) => {
                eprintln!("{}: {}", source.display(), diagnostic);
                process::exit(EXIT_TYPE_ERROR);
            }
            Err(internal) => fail_internal(&internal.to_string()),
        },
    }
}

fn run_builtins() {
    let checker = new_checker(load_config(None));
    for builtin in BUILTINS {
        let ty = checker
            .word_type(builtin.name)
            .map(|ty| ty.to_string())
            .unwrap_or_else(|| builtin.signature.to_string());
        println!("{:<12} {}", builtin.name, ty);
        println!("{:<12} {}", "", builtin.doc);
    }
}

fn run_signature(text: &str) {
    let mut checker = new_checker(load_config(None));
    match checker.parse_type(text) {
        Ok(ty) => println!("{}", ty),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_TYPE_ERROR);
        }
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "concat-check", &mut io::stdout());
}

fn read_or_exit(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", path.display(), e);
            process::exit(EXIT_USAGE);
        }
    }
}

fn fail_internal(message: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("This is a bug in the type checker.");
    process::exit(EXIT_INTERNAL);
}
