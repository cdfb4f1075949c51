//! Validate configured scripts and try them against a request.
//!
//! ```text
//! script_runner check config/scripting.toml
//! script_runner filter --config config/scripting.toml --name large-orders --request order.json
//! cat order.json | script_runner transform --name tag-route --request - --timeout-ms 500
//! ```
//!
//! Scripts block their calling thread and cannot be interrupted, so each call
//! runs on a blocking worker and the runner gives up waiting after the
//! timeout. The process exits right after reporting so an abandoned worker
//! cannot keep it alive.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use bus_scripting::config::{NamedScript, ScriptingConfig, DEFAULT_CONFIG_PATH};
use bus_scripting::scripting::{Script, ScriptFilter, ScriptHost, ScriptTransformer};
use bus_scripting::{logging, Request};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "script_runner")]
#[command(about = "Validate and exercise bus filter/transformer scripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile every configured script and report failures
    Check {
        /// Configuration file
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Run a named filter against a request
    Filter(RunArgs),
    /// Run a named transformer against a request
    Transform(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Name of the script in the configuration
    #[arg(short, long)]
    name: String,

    /// Request JSON file, or `-` for stdin
    #[arg(short, long)]
    request: PathBuf,

    /// Give up waiting for the script after this many milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config_path = match &cli.command {
        Command::Check { config } => config,
        Command::Filter(args) | Command::Transform(args) => &args.config,
    };
    let config = ScriptingConfig::load_from(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    logging::init_from_config(&config).context("invalid log filter")?;

    let host = ScriptHost::default();
    info!(app = %config.application.name, languages = ?host.languages(), "Script host ready");

    match cli.command {
        Command::Check { .. } => Ok(check(&config, &host)),
        Command::Filter(args) => {
            let script = find(config.filter(&args.name), "filter", &args.name)?;
            let filter = ScriptFilter::from_definition(&host, script.definition.clone());
            let request = read_request(&args.request)?;
            let include = with_timeout(args.timeout_ms, move || filter.include(&request)).await?;
            println!("{}", include);
            Ok(0)
        }
        Command::Transform(args) => {
            let script = find(config.transformer(&args.name), "transformer", &args.name)?;
            let transformer = ScriptTransformer::from_definition(&host, script.definition.clone());
            let request = read_request(&args.request)?;
            let output = with_timeout(args.timeout_ms, move || transformer.transform(request)).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(0)
        }
    }
}

/// Compile every script, including disabled ones, and print one line each.
fn check(config: &ScriptingConfig, host: &ScriptHost) -> i32 {
    let mut failures = 0;
    let filters = config.filters.iter().map(|s| ("filter", s));
    let transformers = config.transformers.iter().map(|s| ("transformer", s));

    for (kind, named) in filters.chain(transformers) {
        let result = Script::from_definition(host, named.definition.clone()).check();
        match result {
            Ok(()) => println!("ok    {} {}", kind, named.name),
            Err(e) => {
                failures += 1;
                error!(kind, name = %named.name, error = %e, "Script failed to compile");
                println!("FAIL  {} {}: {}", kind, named.name, e);
            }
        }
    }

    if failures == 0 {
        0
    } else {
        1
    }
}

fn find<'a>(script: Option<&'a NamedScript>, kind: &str, name: &str) -> Result<&'a NamedScript> {
    script.ok_or_else(|| anyhow!("no {} named '{}' in configuration", kind, name))
}

fn read_request(path: &Path) -> Result<Request> {
    let mut json = String::new();
    if path == Path::new("-") {
        std::io::stdin().read_to_string(&mut json)?;
    } else {
        json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
    }
    serde_json::from_str(&json).context("request is not a valid bus request")
}

async fn with_timeout<T, F>(timeout_ms: u64, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> bus_scripting::ScriptResult<T> + Send + 'static,
{
    let worker = tokio::task::spawn_blocking(call);
    match tokio::time::timeout(Duration::from_millis(timeout_ms), worker).await {
        Ok(joined) => Ok(joined.context("script worker panicked")??),
        Err(_) => Err(anyhow!("script did not finish within {} ms", timeout_ms)),
    }
}
