//! REST请求追踪与关联上下文模块
//!
//! 提供两项与Web框架无关的核心能力：
//! - 关联上下文：为每个进行中的请求保存 traceId / userId，供日志使用，请求结束时清理
//! - 追踪记录：把请求/响应渲染为可读的日志文本，机密头部自动脱敏
//!
//! 并为Axum（服务端）和tower客户端提供了开箱即用的中间件支持。
//!
//! ## Usage
//!
//! ### 基础用法：构建追踪记录
//! ```
//! use rest_trace::{Headers, RequestView, TraceRecordBuilder};
//!
//! let request = RequestView::new("GET", "https://host/api/x")
//!     .with_headers(Headers::new().with("Authorization", "secret123"));
//! let record = TraceRecordBuilder::new().inbound_request(&request);
//! assert!(record.as_str().contains("Authorization : \"_redacted(9)_\""));
//! ```
//!
//! ### 基础用法：关联上下文
//! ```
//! use rest_trace::{correlate, current_trace_id, CorrelationSeed, Headers};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let headers = Headers::new().with("uber-trace-id", "abc123:1:1:1");
//! let seed = CorrelationSeed::extract(&headers, Some("alice"));
//! correlate(seed, async {
//!     assert_eq!(current_trace_id().unwrap().as_str(), "abc123");
//! })
//! .await;
//! # });
//! ```
//!
//! ### Axum 集成（需要启用 axum feature）
//! ```ignore
//! use axum::{routing::get, Router};
//! use rest_trace::{CorrelationLayer, RestTraceConfig, RestTraceLayer};
//!
//! async fn handler() -> &'static str {
//!     tracing::info!("handling request");
//!     "Hello!"
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .route("/api/hello", get(handler))
//!         .layer(RestTraceLayer::with_config(RestTraceConfig::enabled()))
//!         .layer(CorrelationLayer::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

mod config;
mod context;
mod headers;
mod record;
mod redaction;
mod trace_id;

pub use config::{
    CorrelationConfig, RestTraceConfig, UrlPattern, DEFAULT_URL_PATTERN, MANAGEMENT_PATH_PREFIX,
};
pub use context::{
    clear_current, correlate, current_context, current_trace_id, current_user_id, is_active,
    propagate, seed_current, with_correlation, CorrelationContext, CorrelationSeed,
};
pub use headers::{HeaderLookup, Headers};
pub use record::{
    Direction, RequestView, ResponseView, TraceRecord, TraceRecordBuilder, UNKNOWN_STATUS_CODE,
};
pub use redaction::{redact, HeaderRedactionPolicy, DEFAULT_CONFIDENTIAL_HEADERS};
pub use trace_id::TraceId;

/// 旧版 Jaeger/OpenTracing 追踪头部
pub const UBER_TRACE_ID_HEADER: &str = "uber-trace-id";

/// W3C TraceContext 追踪头部
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// 关联上下文中追踪ID的键名
pub const TRACE_ID_KEY: &str = "traceId";

/// 关联上下文中用户ID的键名
pub const USER_ID_KEY: &str = "userId";

/// 追踪记录使用的日志 target
pub const REST_TRACE_TARGET: &str = "rest_trace";

// -- axum feature --
#[cfg(feature = "axum")]
mod integrations;
#[cfg(feature = "axum")]
pub use integrations::axum::{
    CorrelationLayer, CorrelationService, Principal, RestTraceLayer, RestTraceService,
};
#[cfg(feature = "axum")]
pub use integrations::client::{ClientTraceLayer, ClientTraceService};
