//! Request routing: route templates, path matching and dispatch.
//!
//! A [`Router`] is assembled once at startup and then shared read-only by
//! every connection. Each request goes through the same pipeline inside a
//! panic [`guard`](crate::recovery::guard):
//!
//! 1. **Static directories** — a path under a registered prefix is served from
//!    disk and the request ends.
//! 2. **Direct handlers** — an exact literal hit, then regex templates in
//!    registration order. The handler runs and the request ends.
//! 3. **Controller routes** — first-registered-wins over every route that
//!    accepts the path. There is no specificity ranking: `/a/{<id>}`
//!    registered before `/a/static` captures `/a/static`.
//! 4. **Filters** — run in order; the first one that writes ends the request.
//! 5. **Controller lifecycle** — see [`controller`](crate::controller).
//!
//! Captured path parameters are appended to the request's query parameters
//! (never replacing a query value of the same name) before filters run, so
//! `ctx.request().query_param("id")` sees them too.
//!
//! Nothing matched and nothing written means the `NotFound` error handler
//! runs, or a plain `404 page not found`.

pub mod pattern;
pub mod registry;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::RouterConfig;
use crate::context::Context;
use crate::controller::{self, Controller, ControllerDescriptor};
use crate::http::{Request, Response, Values};
use crate::middleware::{Filter, FilterChain, FilterOutcome, ParamGate, PrefixGate};
use crate::recovery::{self, ErrorKind, ErrorHandlers};
use crate::static_files::StaticDirs;

use pattern::{CompileError, compile};
use registry::{DirectHandler, DirectHandlers, Registration, RouteTable};

/// What [`Router::find`] resolved a path to.
#[derive(Debug)]
pub enum RouteMatch<'a> {
    /// A direct handler registered under `template`.
    Direct { template: &'a str, params: Values },
    /// A controller route registered under `template`.
    Controller {
        template: &'a str,
        controller: &'a str,
        params: Values,
    },
}

impl RouteMatch<'_> {
    pub fn template(&self) -> &str {
        match self {
            Self::Direct { template, .. } | Self::Controller { template, .. } => template,
        }
    }

    pub fn params(&self) -> &Values {
        match self {
            Self::Direct { params, .. } | Self::Controller { params, .. } => params,
        }
    }
}

// How far a request got through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Static,
    Direct,
    Filtered,
    Dispatched,
    Unmatched,
}

/// The routing and dispatch engine.
///
/// # Examples
///
/// ```
/// use rttp_route::context::Context;
/// use rttp_route::controller::Controller;
/// use rttp_route::http::{Request, StatusCode};
/// use rttp_route::router::Router;
///
/// #[derive(Default)]
/// struct Item;
///
/// impl Controller for Item {
///     fn get(&mut self, ctx: &mut Context) {
///         let id = ctx.param("id").unwrap_or_default().to_owned();
///         ctx.response_mut().write_str(&format!("item {id}"));
///     }
/// }
///
/// let mut router = Router::new();
/// router.add::<Item>("/items/{<id(int)>}").unwrap();
///
/// let raw = b"GET /items/42 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _) = Request::parse(raw).unwrap();
/// let response = router.serve(request);
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.text(), "item 42");
/// ```
pub struct Router {
    config: RouterConfig,
    routes: RouteTable,
    direct: DirectHandlers,
    filters: FilterChain,
    statics: StaticDirs,
    errors: ErrorHandlers,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates an empty router with the default [`RouterConfig`].
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            config,
            routes: RouteTable::new(),
            direct: DirectHandlers::new(),
            filters: FilterChain::new(),
            statics: StaticDirs::new(),
            errors: ErrorHandlers::new(),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Routes `template` to a fresh `C` per request.
    ///
    /// # Errors
    ///
    /// Returns the [`CompileError`] for a malformed template. The error is
    /// already logged and the route skipped; every other route is unaffected.
    pub fn add<C>(&mut self, template: &str) -> Result<(), CompileError>
    where
        C: Controller + Default + 'static,
    {
        self.add_controller(template, ControllerDescriptor::of::<C>())
    }

    /// Routes `template` to controllers built by `descriptor`.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn add_controller(
        &mut self,
        template: &str,
        descriptor: ControllerDescriptor,
    ) -> Result<(), CompileError> {
        let pattern = compile_logged(template)?;
        let name = descriptor.name().to_owned();
        let registration = self.routes.insert(template, pattern, descriptor);
        log_registration("route", template, &name, registration);
        Ok(())
    }

    /// Registers a direct handler, checked before any controller route and
    /// bypassing filters.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn handle<F>(&mut self, template: &str, handler: F) -> Result<(), CompileError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        let pattern = compile_logged(template)?;
        let handler: DirectHandler = Arc::new(handler);
        let registration = self.direct.insert(template, pattern, handler);
        log_registration("direct handler", template, "handler", registration);
        Ok(())
    }

    /// Appends a filter that runs for every routed request.
    pub fn filter(&mut self, filter: impl Filter + 'static) {
        self.filters.push(filter);
    }

    /// Appends a filter that runs only when query parameter `param` is non-empty.
    pub fn filter_param(&mut self, param: &str, filter: impl Filter + 'static) {
        self.filters.push(ParamGate::new(param, filter));
    }

    /// Appends a filter that runs only for paths starting with `prefix`.
    pub fn filter_prefix(&mut self, prefix: &str, filter: impl Filter + 'static) {
        self.filters.push(PrefixGate::new(prefix, filter));
    }

    /// Serves files under `dir` for paths starting with `prefix`.
    pub fn set_static_path(&mut self, prefix: &str, dir: impl Into<PathBuf>) {
        self.statics.insert(prefix, dir);
    }

    /// Registers the handler for one [`ErrorKind`].
    pub fn error_handler<F>(&mut self, kind: ErrorKind, handler: F)
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.errors.register(kind, handler);
    }

    /// Number of controller routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.direct.is_empty()
    }

    pub fn direct_len(&self) -> usize {
        self.direct.len()
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Resolves `path` the way [`serve`](Self::serve) would, without
    /// dispatching. Static directories are not consulted.
    pub fn find(&self, path: &str) -> Option<RouteMatch<'_>> {
        if let Some((entry, params)) = self.direct.find(path) {
            return Some(RouteMatch::Direct {
                template: entry.template(),
                params,
            });
        }
        self.routes
            .find(path)
            .map(|(entry, params)| RouteMatch::Controller {
                template: entry.template(),
                controller: entry.target().name(),
                params,
            })
    }

    /// Handles one request end to end and returns the response.
    ///
    /// Panics raised while handling are caught and answered per the recovery
    /// rules in [`recovery`]. With `recover_panic` disabled, a panic that has
    /// no registered error handler propagates out of this call.
    pub fn serve(&self, request: Request) -> Response {
        let mut ctx = Context::new(request);

        match recovery::guard(self.config.recover_panic, || self.dispatch(&mut ctx)) {
            Ok(outcome) => debug!(path = %ctx.request().path(), ?outcome, "request handled"),
            Err(failure) => recovery::recover(failure, &mut ctx, &self.errors, &self.config),
        }

        let (_, writer) = ctx.into_parts();
        writer.into_response()
    }

    fn dispatch(&self, ctx: &mut Context) -> Outcome {
        if self.statics.serve(ctx) {
            return Outcome::Static;
        }

        ctx.request_mut().parse_form(self.config.max_memory);
        let path = ctx.request().path().to_owned();

        if let Some((entry, params)) = self.direct.find(&path) {
            debug!(path = %path, template = entry.template(), "direct handler matched");
            ctx.set_params(params);
            (entry.target())(ctx);
            return Outcome::Direct;
        }

        let Some((route, params)) = self.routes.find(&path) else {
            debug!(path = %path, "no route matched");
            self.errors.respond(ErrorKind::NotFound, ctx);
            return Outcome::Unmatched;
        };
        debug!(
            path = %path,
            template = route.template(),
            controller = route.target().name(),
            "route matched"
        );
        ctx.set_params(params);

        if let FilterOutcome::Halted(_) = self.filters.run(ctx) {
            return Outcome::Filtered;
        }

        controller::run_lifecycle(route.target(), ctx, &self.errors, self.config.auto_render);
        Outcome::Dispatched
    }
}

fn compile_logged(template: &str) -> Result<pattern::CompiledPattern, CompileError> {
    compile(template).inspect_err(|e| {
        error!(template, error = %e, "route template rejected, route skipped");
    })
}

fn log_registration(kind: &str, template: &str, target: &str, registration: Registration) {
    match registration {
        Registration::Added(index) => debug!(kind, template, target, index, "registered"),
        Registration::Replaced(index) => {
            warn!(kind, template, target, index, "template registered twice, handler replaced")
        }
    }
}
