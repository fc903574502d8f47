//! Wire-format selection, header injection/extraction, and the process-wide
//! propagator.
//!
//! Every test here mutates process-wide state (environment, global
//! propagator, tracer provider), so all of them hold the serial guard.

mod helpers;

use helpers::{install_exporter, serial};
use mirascope_ops::{
    get_propagator, reset_propagator, session_sync, Carrier, ContextPropagator, PropagatorFormat,
    SessionOptions, Span, SESSION_HEADER_NAME,
};
use opentelemetry::global;
use opentelemetry::trace::TraceContextExt;

const ENV_FORMAT: &str = "MIRASCOPE_PROPAGATOR";
const ENV_SET_GLOBAL: &str = "_MIRASCOPE_PROPAGATOR_SET_GLOBAL";

/// Checks a `traceparent` value for W3C shape: version-traceid-spanid-flags.
fn assert_w3c_traceparent(value: &str) {
    let parts: Vec<&str> = value.split('-').collect();
    assert_eq!(parts.len(), 4, "unexpected traceparent shape: {value}");
    assert_eq!(parts[0], "00");
    assert_eq!(parts[1].len(), 32);
    assert_eq!(parts[2].len(), 16);
    assert_eq!(parts[3].len(), 2);
    assert!(parts[1..].iter().all(|p| p.chars().all(|c| c.is_ascii_hexdigit())));
}

/// Injects the context of a live span through the given propagator.
fn inject_with_span(propagator: &ContextPropagator) -> Carrier {
    let mut span = Span::start("outbound");
    let mut carrier = Carrier::new();
    propagator.inject_context(&mut carrier, Some(&span.context()));
    span.finish();
    carrier
}

#[test]
fn explicit_format_wins_over_environment() {
    let _guard = serial();
    std::env::set_var(ENV_FORMAT, "jaeger");

    let propagator = ContextPropagator::new(false, Some(PropagatorFormat::B3));
    assert_eq!(propagator.format(), "b3");

    std::env::remove_var(ENV_FORMAT);
}

#[test]
fn environment_selects_the_format() {
    let _guard = serial();
    std::env::set_var(ENV_FORMAT, "b3multi");

    let propagator = ContextPropagator::new(false, None);
    assert_eq!(propagator.format(), "b3multi");

    std::env::remove_var(ENV_FORMAT);
}

#[test]
fn defaults_to_tracecontext() {
    let _guard = serial();
    std::env::remove_var(ENV_FORMAT);

    let propagator = ContextPropagator::new(false, None);
    assert_eq!(propagator.format(), "tracecontext");
}

#[test]
fn unrecognized_environment_format_is_reported_but_behaves_as_w3c() {
    let _guard = serial();
    let _exporter = install_exporter();
    std::env::set_var(ENV_FORMAT, "carrier-pigeon");

    let propagator = ContextPropagator::new(false, None);
    assert_eq!(propagator.format(), "carrier-pigeon");

    let carrier = inject_with_span(&propagator);
    assert_w3c_traceparent(carrier.get("traceparent").expect("traceparent written"));

    std::env::remove_var(ENV_FORMAT);
}

#[test]
fn each_format_writes_its_own_headers() {
    let _guard = serial();
    let _exporter = install_exporter();

    let w3c = inject_with_span(&ContextPropagator::new(
        false,
        Some(PropagatorFormat::TraceContext),
    ));
    assert_w3c_traceparent(w3c.get("traceparent").expect("traceparent written"));

    let b3 = inject_with_span(&ContextPropagator::new(false, Some(PropagatorFormat::B3)));
    assert!(b3.contains("b3"));
    assert!(!b3.contains("traceparent"));

    let b3multi = inject_with_span(&ContextPropagator::new(
        false,
        Some(PropagatorFormat::B3Multi),
    ));
    assert!(b3multi.contains("x-b3-traceid"));
    assert!(b3multi.contains("x-b3-spanid"));
    assert!(b3multi.contains("x-b3-sampled"));

    let jaeger = inject_with_span(&ContextPropagator::new(
        false,
        Some(PropagatorFormat::Jaeger),
    ));
    assert!(jaeger.contains("uber-trace-id"));

    let composite = inject_with_span(&ContextPropagator::new(
        false,
        Some(PropagatorFormat::Composite),
    ));
    assert!(composite.contains("traceparent"));
    assert!(composite.contains("b3"));
    assert!(composite.contains("x-b3-traceid"));
    assert!(composite.contains("uber-trace-id"));
}

#[test]
fn composite_extracts_any_supported_format() {
    let _guard = serial();

    let propagator = ContextPropagator::new(false, Some(PropagatorFormat::Composite));
    let carrier: Carrier = [("b3", "0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-1")]
        .into_iter()
        .collect();

    let cx = propagator.extract_context(&carrier);
    assert_eq!(
        cx.span().span_context().trace_id().to_string(),
        "0af7651916cd43dd8448eb211c80319c"
    );
}

#[test]
fn extraction_recovers_the_remote_trace() {
    let _guard = serial();

    let propagator = ContextPropagator::new(false, Some(PropagatorFormat::TraceContext));
    let carrier: Carrier = [(
        "traceparent",
        "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
    )]
    .into_iter()
    .collect();

    let cx = propagator.extract_context(&carrier);
    let span_context = cx.span().span_context().clone();
    assert_eq!(
        span_context.trace_id().to_string(),
        "0af7651916cd43dd8448eb211c80319c"
    );
    assert_eq!(span_context.span_id().to_string(), "b7ad6b7169203331");
    assert!(span_context.is_remote());
}

#[test]
fn session_header_is_injected_regardless_of_format() {
    let _guard = serial();

    for format in [
        PropagatorFormat::TraceContext,
        PropagatorFormat::B3,
        PropagatorFormat::Jaeger,
    ] {
        let propagator = ContextPropagator::new(false, Some(format));
        let injected = session_sync(SessionOptions::new().id("sess-9"), || {
            let mut carrier = Carrier::new();
            // No span active: the session header is still written.
            propagator.inject_context(&mut carrier, None);
            carrier
        });
        assert_eq!(injected.get(SESSION_HEADER_NAME), Some("sess-9"));
    }
}

#[test]
fn no_session_means_no_session_header() {
    let _guard = serial();

    let propagator = ContextPropagator::new(false, Some(PropagatorFormat::TraceContext));
    let mut carrier = Carrier::new();
    propagator.inject_context(&mut carrier, None);
    assert!(!carrier.contains(SESSION_HEADER_NAME));
}

#[test]
fn set_global_installs_the_selected_propagator() {
    let _guard = serial();
    let _exporter = install_exporter();
    std::env::remove_var(ENV_SET_GLOBAL);

    let _b3 = ContextPropagator::new(true, Some(PropagatorFormat::B3));
    let mut carrier = Carrier::new();
    let mut span = Span::start("global-inject");
    let cx = span.context();
    global::get_text_map_propagator(|p| p.inject_context(&cx, &mut carrier));
    span.finish();
    assert!(carrier.contains("b3"));

    // The guard variable suppresses a later install.
    std::env::set_var(ENV_SET_GLOBAL, "false");
    let _jaeger = ContextPropagator::new(true, Some(PropagatorFormat::Jaeger));
    let mut carrier = Carrier::new();
    let mut span = Span::start("global-inject-guarded");
    let cx = span.context();
    global::get_text_map_propagator(|p| p.inject_context(&cx, &mut carrier));
    span.finish();
    assert!(carrier.contains("b3"));
    assert!(!carrier.contains("uber-trace-id"));

    std::env::remove_var(ENV_SET_GLOBAL);
}

#[test]
fn process_wide_propagator_is_cached_until_reset() {
    let _guard = serial();
    std::env::remove_var(ENV_FORMAT);
    reset_propagator();

    let first = get_propagator();
    let second = get_propagator();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(first.format(), "tracecontext");

    reset_propagator();
    let third = get_propagator();
    assert!(!std::sync::Arc::ptr_eq(&first, &third));
}
