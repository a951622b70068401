//! A line-oriented console over the `bigdoors` demo tree.
#[macro_use]
extern crate log;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use cmdtree::{
    demo, logger, Command, CommandRegistry, ConsoleIssuer, Issuer, ParserConfig, SimpleIssuer,
    Suggester,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "cmdtree", about = "Parses and completes bigdoors commands.")]
struct Opt {
    /// Prints the suggestions for a partial line and exits.
    #[structopt(long = "complete")]
    complete: Option<String>,
    /// A TOML file overriding the parser configuration.
    #[structopt(long = "config", parse(from_os_str))]
    config: Option<PathBuf>,
    /// Runs commands as a player holding the given permissions instead of
    /// the console.
    #[structopt(long = "as")]
    issuer: Option<String>,
    #[structopt(long = "permission")]
    permissions: Vec<String>,
    /// Prints the build environment.
    #[structopt(long = "doctor")]
    doctor: bool,
}

fn doctor() {
    println!("{}", env!("RUSTC_VERSION"));
    println!("cmdtree {}", env!("CARGO_PKG_VERSION"));
    match logger::log_file_path("cmdtree") {
        Some(path) => println!("log: {}", path.display()),
        None => println!("log: (no home directory)"),
    }
}

fn print_usage(command: &Command, config: &ParserConfig) {
    println!("usage: {}", command.path());
    if let Some(description) = command.description() {
        println!("  {}", description);
    }
    for child in command.children() {
        println!("  {:<16}{}", child.name(), child.description().unwrap_or(""));
    }
    for arg in command.schema().arguments() {
        let name = if arg.is_positional() {
            format!("<{}>", arg.name())
        } else {
            match arg.long_flag(config.flag_prefix) {
                Some(long) => format!("{}, {}", arg.short_flag(config.flag_prefix), long),
                None => arg.short_flag(config.flag_prefix),
            }
        };
        let required = if arg.is_required() { " (required)" } else { "" };
        println!("  {:<16}{}{}", name, arg.summary().unwrap_or(""), required);
    }
}

fn execute(registry: &CommandRegistry, issuer: Arc<dyn Issuer>, line: &str) {
    match registry.parse(issuer, line) {
        Ok(result) if result.is_help_requested() => print_usage(result.command(), registry.config()),
        Ok(result) => {
            if let Err(err) = result.dispatch() {
                eprintln!("cmdtree: {}: {}", result.command().path(), err);
            }
        }
        Err(err) => {
            err.log_diagnostics();
            eprintln!("cmdtree: {}", err);
        }
    }
}

fn console(registry: Arc<CommandRegistry>, issuer: Arc<dyn Issuer>) -> io::Result<()> {
    let suggester = Suggester::new(registry.clone());
    let stdin = io::stdin();
    let stdout = io::stdout();
    loop {
        {
            let mut out = stdout.lock();
            write!(out, "> ")?;
            out.flush()?;
        }

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let line = line.trim_end_matches(|ch: char| ch == '\n' || ch == '\r');
        if line.trim().is_empty() {
            continue;
        }

        // A trailing `?` asks for suggestions instead of running the line.
        if line.ends_with('?') {
            let partial = &line[..line.len() - 1];
            for candidate in suggester.suggest(&*issuer, partial) {
                println!("{}", candidate);
            }
            continue;
        }

        execute(&registry, issuer.clone(), line);
    }
}

fn main() {
    let opt = Opt::from_args();
    if opt.doctor {
        doctor();
        return;
    }

    if let Err(err) = logger::install_logger("cmdtree") {
        eprintln!("cmdtree: logging disabled: {}", err);
    }

    let config = match &opt.config {
        Some(path) => match ParserConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("cmdtree: {}: {}", path.display(), err);
                process::exit(1);
            }
        },
        None => ParserConfig::default(),
    };

    let registry = match demo::registry(config) {
        Ok(registry) => Arc::new(registry),
        Err(err) => {
            eprintln!("cmdtree: {}", err);
            process::exit(1);
        }
    };

    let issuer: Arc<dyn Issuer> = match &opt.issuer {
        Some(name) => {
            let mut issuer = SimpleIssuer::new(name);
            for node in &opt.permissions {
                issuer = issuer.with_permission(node);
            }
            Arc::new(issuer)
        }
        None => Arc::new(ConsoleIssuer),
    };

    if let Some(input) = &opt.complete {
        for candidate in registry.suggest(&*issuer, input) {
            println!("{}", candidate);
        }
        return;
    }

    info!("cmdtree: console started for {}", issuer.name());
    if let Err(err) = console(registry, issuer) {
        eprintln!("cmdtree: {}", err);
        process::exit(1);
    }
}
