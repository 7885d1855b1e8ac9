//! Filter chain — ordered middleware run between route matching and dispatch.
//!
//! Filters are registered once at startup and run, in registration order, for
//! every request that matched a controller route. Direct handlers and static
//! files bypass them. After each filter the response-started flag is checked:
//! a filter that writes anything ends the request right there, so filters
//! double as guards (authentication, maintenance pages, redirects).
//!
//! ## Core types
//!
//! - [`Filter`] — trait implemented by all filters, and by any
//!   `Fn(&mut Context)` closure.
//! - [`FilterChain`] — the ordered, append-only list the router owns.
//! - [`ParamGate`] / [`PrefixGate`] — wrappers that run a filter only when a
//!   query parameter is present or the path has a prefix.
//! - [`LoggerFilter`] — built-in request logger.

use std::sync::Arc;

use crate::context::Context;

/// The core trait for all filters.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`; one chain serves every
///   connection concurrently.
/// - Writing to [`Context::response_mut`] short-circuits the request: no
///   later filter and no controller stage runs.
pub trait Filter: Send + Sync {
    /// Inspect or decorate the request, or answer it outright.
    fn apply(&self, ctx: &mut Context);
}

impl<F> Filter for F
where
    F: Fn(&mut Context) + Send + Sync,
{
    fn apply(&self, ctx: &mut Context) {
        self(ctx)
    }
}

/// A type-erased, reference-counted filter.
pub type FilterHandler = Arc<dyn Filter + 'static>;

/// Result of running a [`FilterChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Every filter ran and none wrote a response.
    Continue,
    /// The filter at this index wrote a response; dispatch must be abandoned.
    Halted(usize),
}

/// Ordered list of filters.
///
/// # Examples
///
/// ```
/// use rttp_route::context::Context;
/// use rttp_route::http::StatusCode;
/// use rttp_route::middleware::{FilterChain, PrefixGate};
///
/// let mut chain = FilterChain::new();
/// chain.push(PrefixGate::new("/admin", |ctx: &mut Context| {
///     ctx.response_mut().write_header(StatusCode::Forbidden);
/// }));
/// assert_eq!(chain.len(), 1);
/// ```
#[derive(Default, Clone)]
pub struct FilterChain {
    filters: Vec<FilterHandler>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `filter` to the end of the chain.
    pub fn push(&mut self, filter: impl Filter + 'static) {
        self.filters.push(Arc::new(filter));
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs the filters in order, stopping after the first one that starts the
    /// response.
    pub fn run(&self, ctx: &mut Context) -> FilterOutcome {
        for (index, filter) in self.filters.iter().enumerate() {
            filter.apply(ctx);
            if ctx.started() {
                tracing::debug!(filter = index, path = %ctx.request().path(), "filter answered request");
                return FilterOutcome::Halted(index);
            }
        }
        FilterOutcome::Continue
    }
}

/// Runs the inner filter only when a query parameter is present and non-empty.
pub struct ParamGate<F> {
    param: String,
    inner: F,
}

impl<F: Filter> ParamGate<F> {
    pub fn new(param: impl Into<String>, inner: F) -> Self {
        Self {
            param: param.into(),
            inner,
        }
    }
}

impl<F: Filter> Filter for ParamGate<F> {
    fn apply(&self, ctx: &mut Context) {
        let present = ctx
            .request()
            .query_param(&self.param)
            .is_some_and(|v| !v.is_empty());
        if present {
            self.inner.apply(ctx);
        }
    }
}

/// Runs the inner filter only when the request path starts with a literal prefix.
pub struct PrefixGate<F> {
    prefix: String,
    inner: F,
}

impl<F: Filter> PrefixGate<F> {
    pub fn new(prefix: impl Into<String>, inner: F) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }
}

impl<F: Filter> Filter for PrefixGate<F> {
    fn apply(&self, ctx: &mut Context) {
        if ctx.request().path().starts_with(&self.prefix) {
            self.inner.apply(ctx);
        }
    }
}

/// Built-in filter that logs each routed request's method, path and captured
/// parameters at `info` level. Never writes, so it never short-circuits.
pub struct LoggerFilter;

impl Filter for LoggerFilter {
    fn apply(&self, ctx: &mut Context) {
        tracing::info!(
            method = %ctx.request().method(),
            path = %ctx.request().path(),
            params = ctx.params().len(),
            "routing request"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::http::{Request, StatusCode};

    fn ctx(target: &str) -> Context {
        let raw = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Context::new(Request::parse(raw.as_bytes()).unwrap().0)
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> impl Filter + 'static {
        let log = Arc::clone(log);
        move |_: &mut Context| log.lock().unwrap().push(name)
    }

    #[test]
    fn runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = FilterChain::new();
        chain.push(recorder(&log, "a"));
        chain.push(LoggerFilter);
        chain.push(recorder(&log, "b"));
        assert_eq!(chain.run(&mut ctx("/")), FilterOutcome::Continue);
        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
    }

    #[test]
    fn writing_filter_halts_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = FilterChain::new();
        chain.push(recorder(&log, "a"));
        chain.push(|ctx: &mut Context| ctx.response_mut().write_header(StatusCode::Forbidden));
        chain.push(recorder(&log, "never"));
        let mut c = ctx("/");
        assert_eq!(chain.run(&mut c), FilterOutcome::Halted(1));
        assert_eq!(*log.lock().unwrap(), ["a"]);
        assert_eq!(c.response().status(), Some(StatusCode::Forbidden));
    }

    #[test]
    fn param_gate_requires_non_empty_value() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let gate = ParamGate::new("debug", recorder(&log, "hit"));
        gate.apply(&mut ctx("/x"));
        gate.apply(&mut ctx("/x?debug="));
        assert!(log.lock().unwrap().is_empty());
        gate.apply(&mut ctx("/x?debug=1"));
        assert_eq!(*log.lock().unwrap(), ["hit"]);
    }

    #[test]
    fn prefix_gate_matches_literal_prefix() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let gate = PrefixGate::new("/admin", recorder(&log, "hit"));
        gate.apply(&mut ctx("/public/admin"));
        assert!(log.lock().unwrap().is_empty());
        gate.apply(&mut ctx("/admin/users"));
        gate.apply(&mut ctx("/administrator"));
        assert_eq!(*log.lock().unwrap(), ["hit", "hit"]);
    }
}
