//! Unit tests for CLI commands

use crate::cli::{format_outcome, Cli, Commands};
use crate::outcome::{CancelReason, Outcome, TransportError, TransportResponse};
use crate::request::QueuingBehaviour;
use clap::Parser;
use http::StatusCode;

#[test]
fn test_fetch_command_defaults() {
    let cli = Cli::try_parse_from([
        "brrtdispatch",
        "fetch",
        "--host",
        "api.example.com",
        "/status",
    ])
    .unwrap();

    match cli.command {
        Commands::Fetch {
            host,
            scheme,
            port,
            workers,
            behaviour,
            kind,
            retries,
            paths,
            ..
        } => {
            assert_eq!(host, "api.example.com");
            assert_eq!(scheme, "https");
            assert_eq!(port, None);
            assert_eq!(workers, 4);
            assert_eq!(behaviour, QueuingBehaviour::Plain);
            assert_eq!(kind, "Fetch");
            assert_eq!(retries, 0);
            assert_eq!(paths, vec!["/status".to_string()]);
        }
    }
}

#[test]
fn test_fetch_command_with_flags() {
    let cli = Cli::try_parse_from([
        "brrtdispatch",
        "fetch",
        "--host",
        "localhost",
        "--scheme",
        "http",
        "--port",
        "8080",
        "--workers",
        "2",
        "--behaviour",
        "cancel-existing-of-same-type",
        "/a",
        "/b",
    ])
    .unwrap();

    let Commands::Fetch {
        scheme,
        port,
        workers,
        behaviour,
        paths,
        ..
    } = cli.command;
    assert_eq!(scheme, "http");
    assert_eq!(port, Some(8080));
    assert_eq!(workers, 2);
    assert_eq!(behaviour, QueuingBehaviour::CancelExistingOfSameType);
    assert_eq!(paths.len(), 2);
}

#[test]
fn test_fetch_rejects_unknown_behaviour() {
    let result = Cli::try_parse_from([
        "brrtdispatch",
        "fetch",
        "--host",
        "localhost",
        "--behaviour",
        "sometimes",
        "/a",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_fetch_requires_paths() {
    let result = Cli::try_parse_from(["brrtdispatch", "fetch", "--host", "localhost"]);
    assert!(result.is_err());
}

#[test]
fn test_format_outcome() {
    let ok = Outcome::Success(TransportResponse::new(StatusCode::OK, b"hello".to_vec()));
    assert_eq!(format_outcome("/a", &ok), "/a 200 OK (5 bytes)");

    let failed = Outcome::Failure(TransportError::Timeout);
    assert!(format_outcome("/b", &failed).starts_with("/b failed: "));

    let cancelled = Outcome::Cancelled(CancelReason::Evicted);
    assert!(format_outcome("/c", &cancelled).starts_with("/c cancelled: "));
}
