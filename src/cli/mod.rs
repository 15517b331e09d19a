//! # CLI Module
//!
//! Command-line front-end for trying a dispatcher against a real host.
//!
//! ## Commands
//!
//! ### `fetch`
//!
//! Enqueue one GET per path and print one line per outcome, in argument order:
//!
//! ```bash
//! brrtdispatch fetch --host api.example.com --port 443 /v1/status /v1/feed
//! ```
//!
//! Options:
//! - `--host <HOST>` - Default host merged into every request (or `BRRTD_HOST`)
//! - `--scheme <SCHEME>` - Default scheme (default: https)
//! - `--port <PORT>` - Default port
//! - `--workers <N>` - Execution workers (default: 4)
//! - `--behaviour <B>` - Queuing behaviour applied to every request
//!   (`plain`, `cancel-if-same-type-exists`, `cancel-existing-of-same-type`, `cancel-existing-equal`)
//! - `--kind <KIND>` - Request kind used for same-type matching (default: Fetch)
//! - `--retries <N>` - Transport retries for transient failures (default: 0)
//! - `--token <TOKEN>` - Bearer token (or `BRRTD_TOKEN`)
//!
//! Exits non-zero when any request failed.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{format_outcome, run_cli, Cli, Commands};
