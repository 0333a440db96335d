//! Axum框架的关联上下文和REST追踪中间件

use crate::config::{CorrelationConfig, RestTraceConfig};
use crate::context::{self, CorrelationContext, CorrelationSeed};
use crate::record::{RequestView, ResponseView, TraceRecord};
use crate::redaction::HeaderRedactionPolicy;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header::HOST, request::Parts},
    response::Response,
};
use std::convert::Infallible;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{field, Instrument};

use super::{headers_from_map, Emitter};

type BoxFuture<T, E> =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<T, E>> + Send>>;

/// 当前认证主体
///
/// 由认证中间件放入请求扩展中，关联中间件读取其名称作为 userId。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal(pub String);

impl Principal {
    /// 使用主体名称创建
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// 主体名称
    pub fn name(&self) -> &str {
        &self.0
    }
}

// -- 关联上下文中间件 --

/// 关联上下文中间件层
///
/// 为匹配的请求建立关联上下文：从追踪头部和认证主体中提取 traceId / userId，
/// 并把它们记录到 `request` span 上，请求结束时清理上下文。
#[derive(Clone, Default)]
pub struct CorrelationLayer {
    config: CorrelationConfig,
}

impl CorrelationLayer {
    /// 创建新的关联上下文层，使用默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义配置创建关联上下文层
    pub fn with_config(config: CorrelationConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// 关联上下文服务
#[derive(Clone)]
pub struct CorrelationService<S> {
    inner: S,
    config: CorrelationConfig,
}

impl<S> Service<Request> for CorrelationService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // 未启用或路径不匹配时不做任何处理
        if !self.config.applies_to(req.uri().path()) {
            return Box::pin(self.inner.call(req));
        }

        // 在req被移动之前提取关联信息
        let principal = req.extensions().get::<Principal>().map(Principal::name);
        let seed = CorrelationSeed::extract(req.headers(), principal);
        let method = req.method().clone();
        // 查询字符串可能携带令牌，span 上只记录路径
        let path = req.uri().path().to_string();

        let future = self.inner.call(req);

        Box::pin(context::correlate(seed, async move {
            let span = tracing::info_span!(
                "request",
                method = %method,
                path = %path,
                trace_id = field::Empty,
                user_id = field::Empty
            );
            // 外层可能已经建立了上下文，因此以实际生效的值为准
            if let Some(trace_id) = context::current_trace_id() {
                span.record("trace_id", trace_id.as_str());
            }
            if let Some(user_id) = context::current_user_id() {
                span.record("user_id", user_id.as_str());
            }

            future.instrument(span).await
        }))
    }
}

// -- REST追踪中间件 --

/// REST追踪中间件层
///
/// 在处理器执行前记录入站请求，执行后记录出站响应。
#[derive(Clone)]
pub struct RestTraceLayer {
    config: RestTraceConfig,
    emitter: Emitter,
}

impl RestTraceLayer {
    /// 创建新的REST追踪层，使用默认配置（默认关闭）
    pub fn new() -> Self {
        Self::with_config(RestTraceConfig::default())
    }

    /// 使用自定义配置创建REST追踪层
    pub fn with_config(config: RestTraceConfig) -> Self {
        Self {
            config,
            emitter: Emitter::new(),
        }
    }

    /// 使用自定义的脱敏策略
    pub fn with_policy(mut self, policy: HeaderRedactionPolicy) -> Self {
        self.emitter.set_policy(policy);
        self
    }

    /// 使用自定义的记录输出代替默认的 `tracing` 日志
    ///
    /// # 示例
    /// ```
    /// use rest_trace::{RestTraceConfig, RestTraceLayer};
    ///
    /// let layer = RestTraceLayer::with_config(RestTraceConfig::enabled())
    ///     .with_sink(|record| eprintln!("{record}"));
    /// ```
    pub fn with_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&TraceRecord) + Send + Sync + 'static,
    {
        self.emitter.set_sink(Arc::new(sink));
        self
    }
}

impl Default for RestTraceLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for RestTraceLayer {
    type Service = RestTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RestTraceService {
            inner,
            config: self.config.clone(),
            emitter: self.emitter.clone(),
        }
    }
}

/// REST追踪服务
#[derive(Clone)]
pub struct RestTraceService<S> {
    inner: S,
    config: RestTraceConfig,
    emitter: Emitter,
}

impl<S> Service<Request> for RestTraceService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        if !self.config.applies_to(req.uri().path()) || !self.emitter.is_enabled() {
            return Box::pin(self.inner.call(req));
        }

        let request = RequestView::new(req.method().as_str(), request_url(&req))
            .with_headers(headers_from_map(req.headers()));
        let emitter = self.emitter.clone();
        let future = self.inner.call(req);

        Box::pin(async move {
            // 在请求的上下文中输出，使日志带上关联信息
            emitter.emit(emitter.builder().inbound_request(&request));

            let response = future.await?;

            let response_view = ResponseView::new(response.status().as_u16())
                .with_headers(headers_from_map(response.headers()));
            emitter.emit(emitter.builder().outbound_response(&request, &response_view));

            Ok(response)
        })
    }
}

/// 重建请求的完整URL（不含查询字符串）
///
/// 优先使用请求行中的绝对URI，其次使用 Host 头部，都没有时只返回路径。
fn request_url(req: &Request) -> String {
    let uri = req.uri();
    if let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) {
        return format!("{scheme}://{authority}{}", uri.path());
    }
    match req.headers().get(HOST).and_then(|host| host.to_str().ok()) {
        Some(host) => format!("http://{host}{}", uri.path()),
        None => uri.path().to_string(),
    }
}

// -- CorrelationContext Extractor --

/// Axum 提取器，用于在 handler 函数签名中直接获取当前的关联上下文
///
/// # 示例
/// ```no_run
/// use axum::{routing::get, Router};
/// use rest_trace::{CorrelationContext, CorrelationLayer};
///
/// async fn my_handler(context: CorrelationContext) -> String {
///     format!("trace id: {:?}", context.trace_id())
/// }
///
/// let app: Router = Router::new()
///     .route("/api/hello", get(my_handler))
///     .layer(CorrelationLayer::new());
/// ```
impl<S> FromRequestParts<S> for CorrelationContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    /// 返回当前关联上下文的快照；不在上下文中时返回空上下文，因此永远不会失败
    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(context::current_context().unwrap_or_default())
    }
}
