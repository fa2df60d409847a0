//! Explicit W3C trace-context propagation.
//!
//! A [`TraceContext`] is carried in `params._meta` as `traceparent` /
//! `tracestate` pairs. It is passed explicitly through request options and
//! handler contexts rather than living in ambient task-local state; span
//! export stays behind whatever `tracing` subscriber the application
//! installs.

use serde_json::{Map, Value};
use uuid::Uuid;

pub(crate) const TRACEPARENT_KEY: &str = "traceparent";
pub(crate) const TRACESTATE_KEY: &str = "tracestate";

const SAMPLED_FLAG: u8 = 0x01;

/// One position in a distributed trace: the trace id shared by every span
/// in the trace, and the span id of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: u128,
    span_id: u64,
    sampled: bool,
    tracestate: Option<String>,
}

impl TraceContext {
    /// Starts a new trace with random ids, sampled.
    pub fn new_root() -> Self {
        Self {
            trace_id: nonzero_u128(),
            span_id: nonzero_u64(),
            sampled: true,
            tracestate: None,
        }
    }

    /// A child position in the same trace: fresh span id, everything else
    /// inherited.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: nonzero_u64(),
            sampled: self.sampled,
            tracestate: self.tracestate.clone(),
        }
    }

    pub fn trace_id(&self) -> u128 {
        self.trace_id
    }

    pub fn span_id(&self) -> u64 {
        self.span_id
    }

    pub fn sampled(&self) -> bool {
        self.sampled
    }

    pub fn tracestate(&self) -> Option<&str> {
        self.tracestate.as_deref()
    }

    pub fn with_tracestate(mut self, tracestate: impl Into<String>) -> Self {
        self.tracestate = Some(tracestate.into());
        self
    }

    /// Renders the W3C `traceparent` header value.
    pub fn to_traceparent(&self) -> String {
        let flags = if self.sampled { SAMPLED_FLAG } else { 0 };
        format!("00-{:032x}-{:016x}-{:02x}", self.trace_id, self.span_id, flags)
    }

    /// Parses a W3C `traceparent` value, rejecting malformed fields and
    /// all-zero ids.
    pub fn parse(traceparent: &str, tracestate: Option<&str>) -> Option<Self> {
        let mut parts = traceparent.split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;

        if version.len() != 2 || version == "ff" {
            return None;
        }
        if trace_id.len() != 32 || span_id.len() != 16 || flags.len() != 2 {
            return None;
        }

        let trace_id = u128::from_str_radix(trace_id, 16).ok()?;
        let span_id = u64::from_str_radix(span_id, 16).ok()?;
        let flags = u8::from_str_radix(flags, 16).ok()?;
        if trace_id == 0 || span_id == 0 {
            return None;
        }

        Some(Self {
            trace_id,
            span_id,
            sampled: flags & SAMPLED_FLAG != 0,
            tracestate: tracestate.map(str::to_string),
        })
    }

    /// Reads a propagated context out of a `_meta` object.
    pub(crate) fn from_meta(meta: &Map<String, Value>) -> Option<Self> {
        let traceparent = meta.get(TRACEPARENT_KEY)?.as_str()?;
        let tracestate = meta.get(TRACESTATE_KEY).and_then(Value::as_str);
        Self::parse(traceparent, tracestate)
    }

    /// The `_meta` entries carrying this context on the wire.
    pub(crate) fn meta_entries(&self) -> Vec<(&'static str, Value)> {
        let mut entries = vec![(TRACEPARENT_KEY, Value::String(self.to_traceparent()))];
        if let Some(tracestate) = &self.tracestate {
            entries.push((TRACESTATE_KEY, Value::String(tracestate.clone())));
        }
        entries
    }
}

fn nonzero_u128() -> u128 {
    Uuid::new_v4().as_u128().max(1)
}

fn nonzero_u64() -> u64 {
    let (high, _) = Uuid::new_v4().as_u64_pair();
    high.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traceparent_round_trips() {
        let context = TraceContext::new_root().with_tracestate("vendor=a");
        let rendered = context.to_traceparent();
        let parsed = TraceContext::parse(&rendered, Some("vendor=a")).unwrap();
        assert_eq!(parsed, context);
    }

    #[test]
    fn child_keeps_trace_id_and_changes_span_id() {
        let root = TraceContext::new_root();
        let child = root.child();
        assert_eq!(child.trace_id(), root.trace_id());
        assert_ne!(child.span_id(), root.span_id());
        assert_eq!(child.sampled(), root.sampled());
    }

    #[test]
    fn rejects_malformed_traceparent() {
        assert!(TraceContext::parse("garbage", None).is_none());
        assert!(TraceContext::parse("00-abc-def-01", None).is_none());
        // all-zero ids are invalid per W3C
        assert!(
            TraceContext::parse(
                "00-00000000000000000000000000000000-0000000000000000-01",
                None
            )
            .is_none()
        );
        assert!(
            TraceContext::parse(
                "ff-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
                None
            )
            .is_none()
        );
    }

    #[test]
    fn parses_sampled_flag() {
        let parsed = TraceContext::parse(
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-00",
            None,
        )
        .unwrap();
        assert!(!parsed.sampled());
        assert_eq!(parsed.trace_id(), 0x0af7651916cd43dd8448eb211c80319c);
        assert_eq!(parsed.span_id(), 0xb7ad6b7169203331);
    }
}
