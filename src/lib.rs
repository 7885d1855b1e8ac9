//! # rttp-route
//!
//! Request routing and controller dispatch on top of a from-scratch async
//! HTTP/1.1 server.
//!
//! Routes are URL templates with `{<name>}` or `{<name(pattern)>}`
//! placeholders, checked in registration order. A matched route is handled
//! either by a direct handler closure or by a fresh [`Controller`] driven
//! through `init → prepare → <verb> → render → finish → destroy`. Filters run
//! in between, and every request sits behind a panic recovery boundary.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rttp_route::{Context, Controller, Router, Server};
//!
//! #[derive(Default)]
//! struct Greeter;
//!
//! impl Controller for Greeter {
//!     fn get(&mut self, ctx: &mut Context) {
//!         let name = ctx.param("name").unwrap_or("world").to_owned();
//!         ctx.response_mut().write_str(&format!("Hello, {name}!"));
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     router.add::<Greeter>("/hello/{<name(string)>}")?;
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server.serve(router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod controller;
pub mod http;
pub mod middleware;
pub mod recovery;
pub mod router;
pub mod server;
pub mod static_files;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{RouterConfig, RunMode};
pub use context::Context;
pub use controller::Controller;
pub use http::{Headers, Method, Request, Response, ResponseWriter, StatusCode, Values};
pub use middleware::Filter;
pub use recovery::{ErrorKind, abort};
pub use router::Router;
pub use server::{Server, ServerError};
