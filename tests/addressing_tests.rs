#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use brrtdispatch::{Addressing, Dispatcher, DispatcherConfig, HttpRequest};
use common::{dispatcher, MockTransport, Outcomes};

fn url_seen_for(transport: &MockTransport, key: &str) -> Option<String> {
    transport
        .seen()
        .into_iter()
        .find(|s| s.key == key)
        .and_then(|s| s.url)
}

#[test]
fn test_defaults_fill_unaddressed_requests() {
    let transport = MockTransport::new();
    let dispatcher = Dispatcher::builder()
        .scheme("http")
        .host("localhost")
        .port(8080)
        .build(transport.clone())
        .unwrap();
    let outcomes = Outcomes::new();

    dispatcher.enqueue(
        HttpRequest::get("Search", "/search").query("q", "rust"),
        outcomes.completion("search"),
    );
    outcomes.next();

    assert_eq!(
        url_seen_for(&transport, "/search?q=rust").as_deref(),
        Some("http://localhost:8080/search?q=rust")
    );
}

#[test]
fn test_request_with_own_host_is_left_alone() {
    let transport = MockTransport::new();
    let dispatcher = dispatcher(&transport, 1);
    let outcomes = Outcomes::new();

    let handle = dispatcher.enqueue(
        HttpRequest::get("Mirror", "/mirror").host("mirror.example.org"),
        outcomes.completion("mirror"),
    );
    outcomes.next();

    // No default port either: the merge is all-or-nothing.
    let addressing = handle.request().addressing().clone();
    assert_eq!(
        addressing,
        Addressing::new(None, Some("mirror.example.org"), None)
    );
    assert_eq!(
        url_seen_for(&transport, "/mirror").as_deref(),
        Some("https://mirror.example.org/mirror")
    );
}

#[test]
fn test_port_alone_does_not_block_the_merge() {
    let transport = MockTransport::new();
    let dispatcher = Dispatcher::builder()
        .scheme("http")
        .host("localhost")
        .port(8080)
        .build(transport.clone())
        .unwrap();

    let mut request = HttpRequest::get("Status", "/status").port(9000);
    assert!(dispatcher.prepare_request(&mut request));
    assert_eq!(
        request.addressing(),
        &Addressing::new(Some("http"), Some("localhost"), Some(8080))
    );

    let mut addressed = HttpRequest::get("Status", "/status").scheme("http");
    assert!(!dispatcher.prepare_request(&mut addressed));
    assert_eq!(addressed.addressing().host, None);
}

#[test]
fn test_changed_defaults_apply_to_later_requests_only() {
    let transport = MockTransport::new();
    let dispatcher = dispatcher(&transport, 1);
    let outcomes = Outcomes::new();

    let before = dispatcher.enqueue(HttpRequest::get("Ping", "/one"), outcomes.completion("one"));
    outcomes.next();

    dispatcher.set_host(Some("staging.example.com"));
    dispatcher.set_port(None);
    assert_eq!(dispatcher.host().as_deref(), Some("staging.example.com"));
    assert_eq!(dispatcher.port(), None);

    let after = dispatcher.enqueue(HttpRequest::get("Ping", "/two"), outcomes.completion("two"));
    outcomes.next();

    assert_eq!(
        before.request().addressing().host.as_deref(),
        Some("api.example.com")
    );
    assert_eq!(
        after.request().addressing().host.as_deref(),
        Some("staging.example.com")
    );
    assert_eq!(
        url_seen_for(&transport, "/two").as_deref(),
        Some("https://staging.example.com/two")
    );
}

#[test]
fn test_missing_host_surfaces_as_transport_failure() {
    let transport = MockTransport::new();
    let dispatcher = Dispatcher::builder().build(transport.clone()).unwrap();
    let outcomes = Outcomes::new();

    let mut request = HttpRequest::get("Orphan", "/orphan");
    assert!(dispatcher.prepare_request(&mut request));
    assert!(request.url().is_err());

    // The mock does not need a URL, so the request still reaches it.
    dispatcher.enqueue(request, outcomes.completion("orphan"));
    let (_, outcome) = outcomes.next();
    assert!(outcome.is_success());
    assert_eq!(url_seen_for(&transport, "/orphan"), None);
}

#[test]
fn test_yaml_config_drives_dispatcher() {
    let config = DispatcherConfig::from_yaml_str(
        "scheme: http\nhost: internal.svc\nport: 8443\nexecution:\n  max_concurrent: 3\n  stack_size: \"0x20000\"\n",
    )
    .unwrap();
    let transport = MockTransport::new();
    let dispatcher = Dispatcher::new(config, transport).unwrap();

    assert_eq!(
        dispatcher.defaults(),
        Addressing::new(Some("http"), Some("internal.svc"), Some(8443))
    );
    assert_eq!(dispatcher.execution_config().max_concurrent, 3);
    assert_eq!(dispatcher.execution_config().stack_size, 0x20000);
}
