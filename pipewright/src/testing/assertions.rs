//! Test assertions for runs and events.

use crate::context::RunContext;
use crate::core::StageKind;
use crate::events::CollectingEventSink;
use crate::pipeline::RunFailure;

/// Asserts that `ctx` holds an output for `stage`.
pub fn assert_stage_recorded(ctx: &RunContext, stage: StageKind) {
    assert!(
        ctx.has_output(stage),
        "Expected output for stage '{}', recorded: {:?}",
        stage,
        ctx.outputs().to_dict().keys().collect::<Vec<_>>()
    );
}

/// Asserts that a run failed in `stage` with error code `code`.
pub fn assert_failed_at(failure: &RunFailure, stage: StageKind, code: &str) {
    assert_eq!(
        failure.stage, stage,
        "Expected failure in stage '{}', got '{}': {}",
        stage, failure.stage, failure.error
    );
    assert_eq!(failure.error.code(), code, "Unexpected error: {}", failure.error);
}

/// Asserts that `expected` event types were emitted in this relative order.
///
/// Other events may be interleaved.
pub fn assert_event_order(sink: &CollectingEventSink, expected: &[&str]) {
    let emitted = sink.event_types();
    let mut remaining = emitted.iter();
    for event_type in expected {
        assert!(
            remaining.any(|e| e == event_type),
            "Expected '{event_type}' in order {expected:?}, emitted: {emitted:?}"
        );
    }
}
