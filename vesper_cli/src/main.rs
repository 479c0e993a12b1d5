// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod fmt;

use clap::{Parser as ClapParser, Subcommand};
use cliclack::{input, intro, outro};
use console::style;
use std::path::{Path, PathBuf};
use std::time::Instant;
use vesper_vm::ecmascript::abstract_operations::type_conversion::to_display_string;
use vesper_vm::{Agent, RuntimeOptions};

/// A JavaScript engine
#[derive(Debug, ClapParser)]
#[command(name = "vesper")]
#[command(about = "A JavaScript engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parses a file and logs out the AST
    Parse {
        /// The path of the file to parse
        path: String,
    },

    /// Evaluates one or more files on a shared global scope
    Eval {
        /// Disables garbage collection.
        #[arg(long)]
        nogc: bool,

        /// The files to evaluate.
        #[arg(required = true)]
        paths: Vec<String>,

        /// Prints the completion value of every file.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Runs the REPL
    Repl {
        #[arg(long)]
        disable_gc: bool,

        #[arg(long)]
        print_internals: bool,
    },

    /// Runs every .js file under a directory and reports the pass rate
    Test {
        /// Directory to scan for .js files
        path: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    match args.command {
        Command::Parse { path } => {
            let file = std::fs::read_to_string(&path)?;
            match vesper_parser::parse(&file) {
                Ok(program) => println!("{program:#?}"),
                Err(error) => {
                    fmt::print_parse_error(&error, &path, &file);
                    std::process::exit(1);
                }
            }
        }
        Command::Eval {
            nogc,
            paths,
            verbose,
        } => {
            let mut agent = Agent::new(RuntimeOptions {
                disable_gc: nogc,
                print_internals: verbose,
                ..RuntimeOptions::default()
            });
            for path in paths {
                let file = std::fs::read_to_string(&path)?;
                if let Err(exit_code) = run_source(&mut agent, &path, &file, verbose) {
                    std::process::exit(exit_code);
                }
            }
            report_unhandled_rejections(&agent);
        }
        Command::Repl {
            disable_gc,
            print_internals,
        } => {
            repl(RuntimeOptions {
                disable_gc,
                print_internals,
                ..RuntimeOptions::default()
            })?;
        }
        Command::Test { path } => {
            let failures = run_test_directory(Path::new(&path))?;
            if failures > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Parse, compile, execute, drain the loop. Returns the process exit code
/// on failure.
fn run_source(agent: &mut Agent, path: &str, source: &str, verbose: bool) -> Result<(), i32> {
    let program = match vesper_parser::parse(source) {
        Ok(program) => program,
        Err(error) => {
            fmt::print_parse_error(&error, path, source);
            return Err(1);
        }
    };
    let executable = match vesper_vm::compile(&program) {
        Ok(executable) => executable,
        Err(error) => {
            fmt::print_runtime_error(&error.to_string());
            return Err(1);
        }
    };
    match vesper_vm::execute(agent, executable) {
        Ok(value) => {
            if verbose {
                println!("{}", style(to_display_string(agent, value)).dim());
            }
        }
        Err(error) => {
            let message = error.message(agent);
            fmt::print_runtime_error(&message);
            return Err(1);
        }
    }
    if let Err(error) = agent.run_event_loop() {
        let message = error.message(agent);
        fmt::print_runtime_error(&message);
        return Err(1);
    }
    Ok(())
}

fn report_unhandled_rejections(agent: &Agent) {
    for (_, reason) in agent.unhandled_rejections() {
        fmt::print_warning(&format!(
            "unhandled promise rejection: {}",
            to_display_string(agent, reason)
        ));
    }
}

/// Line-at-a-time driver on one persistent agent: the global heap and
/// bindings carry across inputs.
fn repl(options: RuntimeOptions) -> Result<(), Box<dyn std::error::Error>> {
    // Register a signal handler for Ctrl+C
    let _ = ctrlc::set_handler(|| {
        std::process::exit(0);
    });

    intro("Vesper REPL")?;
    let mut agent = Agent::new(options);
    loop {
        let line: String = input("")
            .placeholder("Enter a line of Javascript")
            .interact()?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == "exit" {
            outro("Exiting...")?;
            break;
        }

        let program = match vesper_parser::parse(&line) {
            Ok(program) => program,
            Err(error) => {
                fmt::print_parse_error(&error, "repl", &line);
                continue;
            }
        };
        let executable = match vesper_vm::compile(&program) {
            Ok(executable) => executable,
            Err(error) => {
                fmt::print_runtime_error(&error.to_string());
                continue;
            }
        };
        match vesper_vm::execute(&mut agent, executable) {
            Ok(value) => println!("{}", to_display_string(&agent, value)),
            Err(error) => {
                let message = error.message(&agent);
                fmt::print_runtime_error(&message);
            }
        }
        if let Err(error) = agent.run_event_loop() {
            let message = error.message(&agent);
            fmt::print_runtime_error(&message);
        }
        report_unhandled_rejections(&agent);
    }
    Ok(())
}

fn collect_js_files(directory: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_js_files(&path, files)?;
        } else if path.extension().is_some_and(|extension| extension == "js") {
            files.push(path);
        }
    }
    Ok(())
}

/// Per-test: fresh agent, full pipeline, pass/fail with elapsed wall time.
/// Returns the failure count.
fn run_test_directory(directory: &Path) -> Result<usize, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    collect_js_files(directory, &mut files)?;
    files.sort();

    let mut passed = 0usize;
    let mut failed = 0usize;
    for file in &files {
        let source = std::fs::read_to_string(file)?;
        let start = Instant::now();
        let mut agent = Agent::new(RuntimeOptions::default());
        let result = vesper_vm::evaluate_script(&mut agent, &source);
        let elapsed = start.elapsed();
        let outcome = match result {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(error)) => Err(error.message(&agent)),
            Err(message) => Err(message),
        };
        match outcome {
            Ok(()) => {
                passed += 1;
                println!(
                    "{} {} ({:.1} ms)",
                    style("PASS").green().bold(),
                    file.display(),
                    elapsed.as_secs_f64() * 1000.0
                );
            }
            Err(message) => {
                failed += 1;
                println!(
                    "{} {} ({:.1} ms): {}",
                    style("FAIL").red().bold(),
                    file.display(),
                    elapsed.as_secs_f64() * 1000.0,
                    message
                );
            }
        }
    }

    let total = passed + failed;
    let rate = if total == 0 {
        100.0
    } else {
        passed as f64 / total as f64 * 100.0
    };
    println!(
        "\n{} {passed}/{total} passed ({rate:.1}%)",
        style("Results:").bold()
    );
    Ok(failed)
}
