mod config;
mod elicit;
mod error;
mod extract;
mod llm;
mod runner;
mod specs;
mod state;
mod testgen;
mod workflow;

use std::sync::mpsc;
use std::thread;

use chrono::Local;
use clap::{Parser, Subcommand};
use signal_hook::consts::SIGINT;

use crate::config::Paths;
use crate::elicit::ConsoleElicit;
use crate::llm::backend::LlmBackend;
use crate::llm::client::LlmClient;
use crate::state::{CancelToken, FlowEvent, LogLevel, Reporter};

#[derive(Parser)]
#[command(
    name = "cliforge",
    version,
    about = "Generate CLI command modules from API specifications and draft their scenario tests."
)]
struct Cli {
    /// Pipe prompts into a local model runner instead of a hosted provider.
    #[arg(long, global = true, value_name = "PROGRAM")]
    local: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Generate a CLI module from an API specification, then draft tests
    Generate {
        /// Service name under the specification root (prompted if omitted)
        #[arg(long)]
        service: Option<String>,
    },
    /// Draft scenario tests for an already-generated module
    Testgen {
        /// Module/extension name (prompted if omitted)
        #[arg(long)]
        module: Option<String>,
    },
    /// Configure the hosted generation provider
    Configure {
        /// Provider name: openai or anthropic
        provider: String,
        /// Model identifier
        model: String,
        /// API key
        api_key: String,
        /// Override the provider endpoint
        #[arg(long)]
        base_url: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Configure {
            provider,
            model,
            api_key,
            base_url,
        } => configure(&provider, model, api_key, base_url),
        command => run_workflow(cli.local, command),
    }
}

fn configure(provider: &str, model: String, api_key: String, base_url: Option<String>) {
    let client = LlmClient::new();
    match client.configure(provider, model, api_key, base_url) {
        Ok(()) => println!("Provider configuration saved."),
        Err(e) => {
            eprintln!("Configuration failed: {e}");
            std::process::exit(1);
        }
    }
}

fn run_workflow(local: Option<String>, command: CliCommand) {
    let backend = match local {
        Some(program) => LlmBackend::command(program),
        None => LlmBackend::remote(LlmClient::new()),
    };

    let cancel = CancelToken::new();
    if let Err(e) = signal_hook::flag::register(SIGINT, cancel.flag()) {
        eprintln!("Failed to install signal handler: {e}");
    }

    let (tx, rx) = mpsc::channel();

    let worker = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            // the only sender lives here, so the drain loop below ends
            // even if this thread dies without a Finished event
            let reporter = Reporter::new(tx);
            let mut elicit = ConsoleElicit;
            let paths = Paths::from_env();
            let outcome = match command {
                CliCommand::Generate { service } => workflow::run_generate(
                    &reporter, &cancel, &mut elicit, &backend, paths, service,
                ),
                CliCommand::Testgen { module } => workflow::run_testgen(
                    &reporter, &cancel, &mut elicit, &backend, paths, module,
                ),
                // handled before the worker is spawned
                CliCommand::Configure { .. } => unreachable!(),
            };
            reporter.finished(outcome);
        })
    };

    for event in rx {
        match event {
            FlowEvent::Log(level, text) => print_log(level, &text),
            FlowEvent::Progress(pct) => {
                eprintln!("{} [{pct:>3}%]", Local::now().format("%H:%M:%S"));
            }
            FlowEvent::Finished(outcome) => {
                println!("{outcome}");
                break;
            }
        }
    }

    let _ = worker.join();
}

fn print_log(level: LogLevel, text: &str) {
    let tag = match level {
        LogLevel::Info => "INFO",
        LogLevel::Success => " OK ",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "FAIL",
    };
    eprintln!("{} [{tag}] {text}", Local::now().format("%H:%M:%S"));
}
