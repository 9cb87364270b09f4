//! Per-request context: cancellation, deadline and trace propagation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::services::bus::MessageHeaders;

/// Header carrying the W3C trace context.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header carrying the checkout run id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Causal context of the originating request, in W3C `traceparent` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: String,
    span_id: String,
    sampled: bool,
}

impl TraceContext {
    /// Starts a new trace.
    pub fn new_root() -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string(),
            span_id: new_span_id(),
            sampled: true,
        }
    }

    /// Parses a `traceparent` header value.
    ///
    /// Returns `None` for anything but a well-formed version `00` value with
    /// non-zero ids.
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;
        if parts.next().is_some() || version != "00" {
            return None;
        }
        if !is_lower_hex(trace_id, 32) || !is_lower_hex(span_id, 16) || !is_lower_hex(flags, 2) {
            return None;
        }
        if trace_id.bytes().all(|b| b == b'0') || span_id.bytes().all(|b| b == b'0') {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;

        Some(Self {
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            sampled: flags & 0x01 == 0x01,
        })
    }

    /// Returns a context for an outgoing message within the same trace.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: new_span_id(),
            sampled: self.sampled,
        }
    }

    /// Returns the 32-hex-digit trace id shared by every span of the request.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Returns the 16-hex-digit id of this span.
    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    /// Formats the context as a `traceparent` header value.
    pub fn traceparent(&self) -> String {
        format!(
            "00-{}-{}-{:02x}",
            self.trace_id,
            self.span_id,
            u8::from(self.sampled)
        )
    }

    /// Writes this context into outgoing message headers.
    pub fn inject(&self, headers: &mut MessageHeaders) {
        headers.insert(TRACEPARENT_HEADER.to_string(), self.traceparent());
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new_root()
    }
}

fn new_span_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Trips the cancellation signal of a [`CheckoutContext`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Cancels the run. Calling it again has no effect.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Wraps the handle so that dropping it cancels the run.
    pub fn cancel_on_drop(self) -> CancelOnDrop {
        CancelOnDrop { handle: Some(self) }
    }
}

/// Cancels the associated run when dropped, unless disarmed first.
#[derive(Debug)]
pub struct CancelOnDrop {
    handle: Option<CancelHandle>,
}

impl CancelOnDrop {
    /// Consumes the guard without cancelling.
    pub fn disarm(mut self) {
        self.handle = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }
}

/// Caller context threaded through every outbound call of a run.
#[derive(Debug, Clone)]
pub struct CheckoutContext {
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
    trace: TraceContext,
}

impl CheckoutContext {
    /// Creates a cancellable context and the handle that cancels it.
    pub fn new(trace: TraceContext) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            cancel: rx,
            deadline: None,
            trace,
        };
        (ctx, CancelHandle { tx: Arc::new(tx) })
    }

    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        let (ctx, _handle) = Self::new(TraceContext::new_root());
        ctx
    }

    /// Sets an absolute deadline after which the run counts as cancelled.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the trace context of the run.
    pub fn trace(&self) -> &TraceContext {
        &self.trace
    }

    /// Returns the deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true once the caller cancelled or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Completes once the caller cancels or the deadline passes.
    ///
    /// Never completes for a context whose handle was dropped without
    /// cancelling and that has no deadline.
    pub async fn done(&self) {
        let mut rx = self.cancel.clone();
        let signal = async move {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = signal => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => signal.await,
        }
    }
}

/// Runs a remote call under a time limit, mapping expiry to [`ServiceError::Timeout`].
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout {
            operation,
            after_ms: limit.as_millis() as u64,
        }),
    }
}
