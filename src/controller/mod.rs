//! Controllers and the per-request lifecycle.
//!
//! A controller is a type the router instantiates fresh for every request it
//! routes to. The router then drives it through a fixed, strictly forward
//! sequence of stages:
//!
//! ```text
//! init → prepare → <verb> → render → finish → destroy
//! ```
//!
//! | Stage     | Runs when                                                     |
//! |-----------|---------------------------------------------------------------|
//! | `init`    | always, first                                                 |
//! | `prepare` | always                                                        |
//! | verb      | the response has not started                                  |
//! | `render`  | the response has not started and auto-render is enabled       |
//! | `finish`  | the response still has not started                            |
//! | `destroy` | always, last                                                  |
//!
//! The verb stage calls exactly one of `get`, `head`, `delete`, `put`, `post`,
//! `patch` or `options`. A `POST` whose form field `_method` is `delete` or
//! `put` is dispatched to that verb instead. Any other method is answered with
//! `405 Method Not Allowed`.

use std::sync::Arc;

use crate::context::Context;
use crate::http::Method;
use crate::recovery::{ErrorHandlers, ErrorKind};

/// The capability set every routed handler type provides.
///
/// Every stage has a no-op default, so a controller only overrides the ones
/// it cares about and a missing stage can never surface at request time.
///
/// # Examples
///
/// ```
/// use rttp_route::context::Context;
/// use rttp_route::controller::Controller;
///
/// #[derive(Default)]
/// struct Ping;
///
/// impl Controller for Ping {
///     fn get(&mut self, ctx: &mut Context) {
///         ctx.response_mut().write_str("pong");
///     }
/// }
/// ```
#[allow(unused_variables)]
pub trait Controller: Send {
    /// Receives the request context and the name the route was registered under.
    fn init(&mut self, ctx: &mut Context, name: &str) {}

    /// Pre-processing. Writing a response here skips every stage up to `destroy`.
    fn prepare(&mut self, ctx: &mut Context) {}

    fn get(&mut self, ctx: &mut Context) {}

    fn head(&mut self, ctx: &mut Context) {}

    fn delete(&mut self, ctx: &mut Context) {}

    fn put(&mut self, ctx: &mut Context) {}

    fn post(&mut self, ctx: &mut Context) {}

    fn patch(&mut self, ctx: &mut Context) {}

    fn options(&mut self, ctx: &mut Context) {}

    /// Template or body generation when the verb handler wrote nothing.
    fn render(&mut self, ctx: &mut Context) {}

    /// Last chance to complete a response nobody has written yet.
    fn finish(&mut self, ctx: &mut Context) {}

    /// Cleanup. Runs unconditionally.
    fn destroy(&mut self, ctx: &mut Context) {}
}

/// Builds a fresh controller for one request.
pub type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync + 'static>;

/// A registered controller type: its display name plus a factory.
#[derive(Clone)]
pub struct ControllerDescriptor {
    name: String,
    factory: ControllerFactory,
}

impl ControllerDescriptor {
    /// Describes a `Default`-constructible controller type, named after the type.
    pub fn of<C>() -> Self
    where
        C: Controller + Default + 'static,
    {
        Self::new(short_type_name::<C>(), || Box::new(C::default()))
    }

    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Controller> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a new, unshared controller instance.
    pub fn instantiate(&self) -> Box<dyn Controller> {
        (self.factory)()
    }
}

impl std::fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn short_type_name<C>() -> &'static str {
    let full = std::any::type_name::<C>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

/// The verb stage a request is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Head,
    Delete,
    Put,
    Post,
    Patch,
    Options,
}

impl Verb {
    /// Selects the verb for a request, applying the `_method` override for `POST`.
    ///
    /// Returns `None` for methods outside the seven supported verbs.
    ///
    /// ```
    /// use rttp_route::controller::Verb;
    /// use rttp_route::http::Method;
    ///
    /// assert_eq!(Verb::select(&Method::Post, Some("delete")), Some(Verb::Delete));
    /// assert_eq!(Verb::select(&Method::Post, Some("put")), Some(Verb::Put));
    /// assert_eq!(Verb::select(&Method::Post, None), Some(Verb::Post));
    /// assert_eq!(Verb::select(&Method::Trace, None), None);
    /// ```
    pub fn select(method: &Method, override_field: Option<&str>) -> Option<Self> {
        match method {
            Method::Get => Some(Self::Get),
            Method::Head => Some(Self::Head),
            Method::Delete => Some(Self::Delete),
            Method::Put => Some(Self::Put),
            Method::Post => Some(match override_field {
                Some("delete") => Self::Delete,
                Some("put") => Self::Put,
                _ => Self::Post,
            }),
            Method::Patch => Some(Self::Patch),
            Method::Options => Some(Self::Options),
            _ => None,
        }
    }

    fn call(self, controller: &mut dyn Controller, ctx: &mut Context) {
        match self {
            Self::Get => controller.get(ctx),
            Self::Head => controller.head(ctx),
            Self::Delete => controller.delete(ctx),
            Self::Put => controller.put(ctx),
            Self::Post => controller.post(ctx),
            Self::Patch => controller.patch(ctx),
            Self::Options => controller.options(ctx),
        }
    }
}

/// Form field that overrides the verb of a `POST`.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

/// Drives one controller instance through the lifecycle.
///
/// `errors` answers methods outside the verb set; `auto_render` gates
/// [`Controller::render`].
pub fn run_lifecycle(
    descriptor: &ControllerDescriptor,
    ctx: &mut Context,
    errors: &ErrorHandlers,
    auto_render: bool,
) {
    let mut controller = descriptor.instantiate();
    controller.init(ctx, descriptor.name());
    controller.prepare(ctx);

    if !ctx.started() {
        let request = ctx.request();
        let verb = Verb::select(request.method(), request.form_value(METHOD_OVERRIDE_FIELD));
        match verb {
            Some(verb) => verb.call(controller.as_mut(), ctx),
            None => {
                tracing::debug!(method = %ctx.request().method(), "no verb stage for method");
                errors.respond(ErrorKind::MethodNotAllowed, ctx);
            }
        }

        if !ctx.started() && auto_render {
            controller.render(ctx);
        }
        if !ctx.started() {
            controller.finish(ctx);
        }
    }

    controller.destroy(ctx);
}
