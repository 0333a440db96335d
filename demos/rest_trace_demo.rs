//! Example: REST tracing and correlation context in an Axum service
//!
//! Run with `RUST_LOG=info cargo run --example rest_trace_demo --features axum`, then:
//!
//! ```text
//! curl -H 'uber-trace-id: abc123:1:0:1' -H 'x-demo-user: alice' \
//!      -H 'Authorization: Bearer secret' http://localhost:3000/api/hello
//! ```
//!
//! Every request under `/api/*` produces an inbound request record and an
//! outbound response record on the `rest_trace` target, and handler logs carry
//! `trace_id` / `user_id` from the request span.

use axum::{extract::Request, middleware::Next, response::Response, routing::get, Router};
use rest_trace::{CorrelationContext, CorrelationLayer, Principal, RestTraceConfig, RestTraceLayer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Records are emitted at INFO on the `rest_trace` target
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let app = Router::new()
        .route("/api/hello", get(hello_handler))
        .route("/api/whoami", get(whoami_handler))
        .route("/actuator/health", get(health_handler))
        .layer(RestTraceLayer::with_config(
            RestTraceConfig::enabled().with_url_patterns(["/api/*"]),
        ))
        .layer(CorrelationLayer::new())
        .layer(axum::middleware::from_fn(demo_auth));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("Starting server on 0.0.0.0:3000");
    axum::serve(listener, app).await.unwrap();
}

/// Stand-in for a real authentication layer: trusts the `x-demo-user` header
async fn demo_auth(mut req: Request, next: Next) -> Response {
    let user = req
        .headers()
        .get("x-demo-user")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    if let Some(user) = user {
        req.extensions_mut().insert(Principal::new(user));
    }
    next.run(req).await
}

async fn hello_handler() -> String {
    tracing::info!("Handling request");
    let trace_id = rest_trace::current_trace_id()
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    format!("Hello! Your trace ID is: {trace_id}")
}

async fn whoami_handler(context: CorrelationContext) -> String {
    tracing::info!("Resolving caller");
    let entries: Vec<String> = context
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    entries.join(", ")
}

async fn health_handler() -> &'static str {
    // Management endpoints never get a correlation context
    debug_assert!(!rest_trace::is_active());
    "UP"
}
