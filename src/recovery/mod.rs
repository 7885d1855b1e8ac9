//! Panic recovery boundary and the typed error taxonomy.
//!
//! Every request runs inside [`guard`]. A panic raised anywhere below it (a
//! filter, a direct handler or a controller stage) is caught, and
//! [`recover`] decides what the client sees:
//!
//! 1. A typed [`abort`] whose [`ErrorKind`] has a registered handler runs that
//!    handler.
//! 2. Otherwise, with recovery disabled, the original panic resumes unwinding.
//! 3. Otherwise the failure and its stack are logged. In development mode the
//!    stack is written to the response body; in other modes only the status
//!    line is sent.
//!
//! Stack locations are captured by a process-wide panic hook that is active
//! only while a guard is running on the current thread; panics elsewhere reach
//! the previously installed hook untouched.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use tracing::error;

use crate::config::RouterConfig;
use crate::context::Context;
use crate::http::StatusCode;

/// Closed set of dispatch failures that can carry their own error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    /// Also consulted for requests that matched nothing.
    NotFound,
    /// Raised for methods outside the controller verb set.
    MethodNotAllowed,
    InternalServerError,
    ServiceUnavailable,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BadRequest,
            Self::Unauthorized => StatusCode::Unauthorized,
            Self::Forbidden => StatusCode::Forbidden,
            Self::NotFound => StatusCode::NotFound,
            Self::MethodNotAllowed => StatusCode::MethodNotAllowed,
            Self::InternalServerError => StatusCode::InternalServerError,
            Self::ServiceUnavailable => StatusCode::ServiceUnavailable,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status())
    }
}

/// Panic payload raised by [`abort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort(pub ErrorKind);

/// Stops the current request with a typed failure.
///
/// Unwinds to the router's recovery boundary, which runs the handler
/// registered for `kind`.
///
/// ```no_run
/// use rttp_route::{context::Context, recovery::{abort, ErrorKind}};
///
/// fn require_token(ctx: &mut Context) {
///     if ctx.request().headers().get("authorization").is_none() {
///         abort(ErrorKind::Unauthorized);
///     }
/// }
/// ```
pub fn abort(kind: ErrorKind) -> ! {
    panic::panic_any(Abort(kind))
}

/// A registered error handler. Writes the error response into the context.
pub type ErrorHandler = Arc<dyn Fn(&mut Context) + Send + Sync + 'static>;

/// Error handlers keyed by [`ErrorKind`].
#[derive(Default, Clone)]
pub struct ErrorHandlers {
    map: HashMap<ErrorKind, ErrorHandler>,
}

impl ErrorHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: ErrorKind, handler: F)
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.map.insert(kind, Arc::new(handler));
    }

    pub fn get(&self, kind: ErrorKind) -> Option<&ErrorHandler> {
        self.map.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Runs the handler for `kind`, or writes the kind's status and reason
    /// phrase when none is registered.
    pub fn respond(&self, kind: ErrorKind, ctx: &mut Context) {
        match self.get(kind) {
            Some(handler) => handler(ctx),
            None => write_status(ctx, kind.status(), default_body(kind)),
        }
    }
}

fn default_body(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "404 page not found",
        other => other.status().canonical_reason(),
    }
}

fn write_status(ctx: &mut Context, status: StatusCode, body: &str) {
    let w = ctx.response_mut();
    w.write_header(status);
    w.write_str(body);
}

/// What was captured about a panic on a guarded thread.
#[derive(Debug, Clone, Default)]
pub struct PanicReport {
    /// The panic message, or the abort kind for typed aborts.
    pub message: String,
    /// `file:line:column` of the panic site.
    pub location: Option<String>,
    /// Source locations of the unwound frames, innermost first.
    ///
    /// Empty when the binary carries no debug info (e.g. a stripped release
    /// build); only `location` is always available.
    pub frames: Vec<String>,
}

impl PanicReport {
    /// The report as plain text: message, panic site, then one frame per line.
    pub fn render(&self) -> String {
        let mut out = format!("handler crashed: {}\n", self.message);
        if let Some(location) = &self.location {
            out.push_str(&format!("panicked at {location}\n"));
        }
        for frame in &self.frames {
            out.push_str(&format!("    at {frame}\n"));
        }
        out
    }
}

/// A caught panic: the original payload plus what the hook recorded.
pub struct Failure {
    payload: Box<dyn Any + Send>,
    report: PanicReport,
}

impl Failure {
    /// The abort kind, when the panic was raised by [`abort`].
    pub fn kind(&self) -> Option<ErrorKind> {
        self.payload.downcast_ref::<Abort>().map(|a| a.0)
    }

    pub fn report(&self) -> &PanicReport {
        &self.report
    }

    /// Resumes unwinding with the original payload.
    pub fn resume(self) -> ! {
        panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.kind())
            .field("report", &self.report)
            .finish()
    }
}

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static QUIET: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<PanicReport>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let report = PanicReport {
                message: payload_message(info.payload()),
                location: info.location().map(|l| l.to_string()),
                frames: frame_locations(&Backtrace::force_capture()),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(report));
            if !QUIET.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

/// Runs `f`, catching any panic it raises.
///
/// With `quiet` set, panics are not forwarded to the previously installed
/// panic hook (no stderr message); the router sets it when recovery is on.
pub fn guard<R>(quiet: bool, f: impl FnOnce() -> R) -> Result<R, Failure> {
    install_hook();
    // A panic caught by handler code never reaches us; drop its report.
    LAST_PANIC.with(|slot| slot.borrow_mut().take());
    let was_quiet = QUIET.with(|q| q.replace(quiet));
    GUARD_DEPTH.with(|d| d.set(d.get() + 1));

    let result = panic::catch_unwind(AssertUnwindSafe(f));

    GUARD_DEPTH.with(|d| d.set(d.get() - 1));
    QUIET.with(|q| q.set(was_quiet));

    result.map_err(|payload| {
        let report = LAST_PANIC
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(|| PanicReport {
                message: payload_message(payload.as_ref()),
                ..PanicReport::default()
            });
        Failure { payload, report }
    })
}

/// Turns a caught failure into a response, or resumes it.
///
/// See the module docs for the decision order.
pub fn recover(failure: Failure, ctx: &mut Context, handlers: &ErrorHandlers, config: &RouterConfig) {
    let kind = failure.kind();
    if let Some(handler) = kind.and_then(|k| handlers.get(k)) {
        handler(ctx);
        return;
    }

    if !config.recover_panic {
        error!(error = %failure.report.message, "handler crashed with recovery disabled, propagating");
        failure.resume();
    }

    let report = failure.report();
    error!(
        error = %report.message,
        path = %ctx.request().path(),
        location = report.location.as_deref().unwrap_or("<unknown>"),
        "handler crashed"
    );
    for frame in &report.frames {
        error!(frame = %frame, "stack frame");
    }

    if ctx.started() {
        return;
    }
    let status = kind.map_or(StatusCode::InternalServerError, ErrorKind::status);
    if config.run_mode.is_development() {
        write_status(ctx, status, &report.render());
    } else {
        write_status(ctx, status, status.canonical_reason());
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(abort) = payload.downcast_ref::<Abort>() {
        abort.0.to_string()
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

// Backtrace frames are only reachable through Display; keep the `at file:line`
// lines and drop the function-name lines.
fn frame_locations(backtrace: &Backtrace) -> Vec<String> {
    backtrace
        .to_string()
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("at "))
        .map(str::to_owned)
        .collect()
}
