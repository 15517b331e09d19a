use crate::auth::BearerAuthenticator;
use crate::dispatcher::Dispatcher;
use crate::outcome::Outcome;
use crate::request::{HttpRequest, QueuingBehaviour};
use crate::transport::{ReqwestTransport, RetryPolicy};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// Command-line interface for brrtdispatch
#[derive(Parser)]
#[command(name = "brrtdispatch")]
#[command(about = "Dispatch HTTP requests through a brrtdispatch queue", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Enqueue one GET per path and print each outcome
    Fetch {
        /// Default host merged into every request
        #[arg(long, env = "BRRTD_HOST")]
        host: String,

        /// Default scheme
        #[arg(long, default_value = "https")]
        scheme: String,

        /// Default port
        #[arg(long)]
        port: Option<u16>,

        /// Number of execution workers
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Queuing behaviour applied to every request
        #[arg(long, default_value = "plain", value_parser = parse_behaviour)]
        behaviour: QueuingBehaviour,

        /// Request kind used for same-type matching
        #[arg(long, default_value = "Fetch")]
        kind: String,

        /// Per-request timeout in milliseconds
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,

        /// Retries for connection failures, timeouts and 5xx responses
        #[arg(long, default_value_t = 0)]
        retries: u32,

        /// Bearer token sent with every request
        #[arg(long, env = "BRRTD_TOKEN")]
        token: Option<String>,

        /// Paths to fetch
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn parse_behaviour(s: &str) -> Result<QueuingBehaviour, String> {
    QueuingBehaviour::parse(s).ok_or_else(|| format!("unknown queuing behaviour '{s}'"))
}

/// One printable line per outcome
pub fn format_outcome(path: &str, outcome: &Outcome) -> String {
    match outcome {
        Outcome::Success(resp) => format!("{path} {} ({} bytes)", resp.status, resp.body.len()),
        Outcome::Failure(err) => format!("{path} failed: {err}"),
        Outcome::Cancelled(reason) => format!("{path} cancelled: {reason}"),
    }
}

pub fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Fetch {
            host,
            scheme,
            port,
            workers,
            behaviour,
            kind,
            timeout_ms,
            retries,
            token,
            paths,
        } => {
            let transport = ReqwestTransport::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .user_agent(concat!("brrtdispatch/", env!("CARGO_PKG_VERSION")))
                .interceptor(RetryPolicy::new(retries, Duration::from_millis(250)))
                .build()
                .context("Failed to build HTTP transport")?;

            let mut builder = Dispatcher::builder()
                .scheme(&scheme)
                .host(&host)
                .max_concurrent(workers);
            if let Some(port) = port {
                builder = builder.port(port);
            }
            if let Some(token) = token {
                builder = builder.authenticator(Arc::new(BearerAuthenticator::new(token)));
            }
            let dispatcher = builder
                .build(transport)
                .context("Failed to start dispatcher")?;

            let (tx, rx) = mpsc::channel();
            for (index, path) in paths.iter().enumerate() {
                let tx = tx.clone();
                let request = HttpRequest::get(kind.as_str(), path.as_str()).behaviour(behaviour);
                dispatcher.enqueue(request, move |outcome| {
                    let _ = tx.send((index, outcome));
                });
            }
            drop(tx);

            let mut outcomes: Vec<Option<Outcome>> = vec![None; paths.len()];
            for _ in 0..paths.len() {
                let (index, outcome) = rx
                    .recv()
                    .context("Dispatcher stopped before every request completed")?;
                outcomes[index] = Some(outcome);
            }

            let mut failures = 0;
            for (path, outcome) in paths.iter().zip(outcomes.iter().flatten()) {
                if matches!(outcome, Outcome::Failure(_)) {
                    failures += 1;
                }
                println!("{}", format_outcome(path, outcome));
            }

            if failures > 0 {
                return Err(anyhow!("{failures} of {} request(s) failed", paths.len()));
            }
            Ok(())
        }
    }
}
