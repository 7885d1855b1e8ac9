//! A small app wired through the router.
//!
//! ```text
//! RUST_LOG=debug cargo run --example hello_router
//! curl localhost:8080/articles/7
//! curl -X POST -d '_method=delete' localhost:8080/articles/7
//! curl localhost:8080/admin?token=
//! ```

use rttp_route::{
    Context, Controller, ErrorKind, Router, RouterConfig, Server, StatusCode, abort,
    middleware::LoggerFilter,
};
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct Articles {
    id: String,
}

impl Controller for Articles {
    fn prepare(&mut self, ctx: &mut Context) {
        self.id = ctx.param("id").unwrap_or_default().to_owned();
    }

    fn get(&mut self, ctx: &mut Context) {
        ctx.response_mut().write_str(&format!("article {}", self.id));
    }

    fn delete(&mut self, ctx: &mut Context) {
        ctx.response_mut().write_header(StatusCode::NoContent);
    }
}

#[derive(Default)]
struct Admin;

impl Controller for Admin {
    fn get(&mut self, _: &mut Context) {
        abort(ErrorKind::Forbidden);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut router = Router::with_config(RouterConfig::default());
    router.filter(LoggerFilter);
    router.add::<Articles>("/articles/{<id(int)>}")?;
    router.add::<Admin>("/admin")?;
    router.handle("/health", |ctx: &mut Context| ctx.response_mut().write_str("ok"))?;
    router.error_handler(ErrorKind::Forbidden, |ctx: &mut Context| {
        ctx.response_mut().write_header(StatusCode::Forbidden);
        ctx.response_mut().write_str("admins only");
    });

    let server = Server::bind("127.0.0.1:8080").await?;
    server.serve(router).await?;
    Ok(())
}
