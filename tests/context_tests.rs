//! Session scoping and inbound propagation scopes.

mod helpers;

use std::time::Duration;

use helpers::{finished_spans, install_exporter, serial};
use mirascope_ops::{
    current_session, propagated_context, propagated_context_sync, propagated_context_with_parent,
    session, session_sync, Carrier, SessionOptions, Span,
};
use serde_json::json;

#[tokio::test]
async fn binds_an_explicit_session_id_for_the_scope() {
    assert_eq!(current_session(), None);

    session(SessionOptions::new().id("session-42"), || async {
        let active = current_session().expect("session is active inside the scope");
        assert_eq!(active.id, "session-42");
    })
    .await;

    assert_eq!(current_session(), None);
}

#[tokio::test]
async fn generates_a_unique_id_when_none_is_given() {
    let first = session(SessionOptions::new(), || async {
        current_session().expect("active").id
    })
    .await;
    let second = session(SessionOptions::new(), || async {
        current_session().expect("active").id
    })
    .await;

    assert!(!first.is_empty());
    assert_ne!(first, second);
}

#[tokio::test]
async fn carries_session_attributes() {
    let options = SessionOptions::new()
        .id("with-attrs")
        .attribute("tenant", json!("acme"));

    session(options, || async {
        let active = current_session().expect("active");
        assert_eq!(active.attributes.get("tenant"), Some(&json!("acme")));
    })
    .await;
}

#[tokio::test]
async fn nested_sessions_shadow_and_restore() {
    fn active() -> String {
        current_session().expect("a session is active").id
    }

    let observed = session(SessionOptions::new().id("A"), || async {
        let mut observed = vec![active()];
        session(SessionOptions::new().id("B"), || async {
            observed.push(active());
            session(SessionOptions::new().id("C"), || async {
                observed.push(active());
            })
            .await;
            observed.push(active());
        })
        .await;
        observed.push(active());
        observed
    })
    .await;

    assert_eq!(observed, vec!["A", "B", "C", "B", "A"]);
}

#[tokio::test]
async fn concurrent_sessions_never_observe_each_other() {
    // "session-b" finishes first; neither chain may ever see the other's id.
    let a = session(SessionOptions::new().id("session-a"), || async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        current_session().map(|s| s.id)
    });
    let b = session(SessionOptions::new().id("session-b"), || async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        current_session().map(|s| s.id)
    });

    let (a, b) = tokio::join!(a, b);
    assert_eq!(a.as_deref(), Some("session-a"));
    assert_eq!(b.as_deref(), Some("session-b"));
}

#[test]
fn session_sync_restores_on_exit() {
    let inside = session_sync(SessionOptions::new().id("sync"), || {
        current_session().map(|s| s.id)
    });
    assert_eq!(inside.as_deref(), Some("sync"));
    assert_eq!(current_session(), None);
}

#[tokio::test]
async fn propagated_context_binds_the_carrier_session() {
    let _guard = serial();
    let _exporter = install_exporter();

    // Header lookup is case-insensitive.
    let carrier: Carrier = [("mirascope-session-id", "remote-7")].into_iter().collect();

    propagated_context(&carrier, || async {
        assert_eq!(current_session().map(|s| s.id).as_deref(), Some("remote-7"));
    })
    .await;

    assert_eq!(current_session(), None);
}

#[tokio::test]
async fn propagated_context_resumes_the_remote_trace() {
    let _guard = serial();
    let exporter = install_exporter();

    let carrier: Carrier = [(
        "traceparent",
        "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
    )]
    .into_iter()
    .collect();

    propagated_context(&carrier, || async {
        let mut span = Span::start("handler");
        assert_eq!(
            span.trace_id().as_deref(),
            Some("0af7651916cd43dd8448eb211c80319c")
        );
        span.finish();
    })
    .await;

    let spans = finished_spans(&exporter);
    assert_eq!(spans.len(), 1);
    assert_eq!(
        format!("{:016x}", spans[0].parent_span_id),
        "b7ad6b7169203331"
    );
}

#[tokio::test]
async fn propagated_context_with_parent_keeps_parent_values() {
    let _guard = serial();
    let _exporter = install_exporter();

    // Capture a context that already carries a session.
    let parent = session_sync(SessionOptions::new().id("parent-session"), || {
        opentelemetry::Context::current()
    });
    let carrier: Carrier = [(
        "traceparent",
        "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
    )]
    .into_iter()
    .collect();

    propagated_context_with_parent(&parent, &carrier, || async {
        // The parent's session and the carrier's trace are both bound.
        assert_eq!(
            current_session().map(|s| s.id).as_deref(),
            Some("parent-session")
        );
        let mut span = Span::start("handler");
        assert_eq!(
            span.trace_id().as_deref(),
            Some("0af7651916cd43dd8448eb211c80319c")
        );
        span.finish();
    })
    .await;
}

#[test]
fn propagated_context_sync_tolerates_empty_carriers() {
    let _guard = serial();

    let carrier = Carrier::new();
    let value = propagated_context_sync(&carrier, || {
        assert_eq!(current_session(), None);
        11
    });
    assert_eq!(value, 11);
}
