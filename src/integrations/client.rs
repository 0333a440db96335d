//! HTTP客户端的REST追踪中间件
//!
//! 适用于任何以 `http::Request` / `http::Response` 为输入输出的 tower 客户端服务，
//! 记录出站请求和入站响应。

use crate::config::RestTraceConfig;
use crate::record::{RequestView, ResponseView, TraceRecord};
use crate::redaction::HeaderRedactionPolicy;
use axum::http::{Request, Response};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use super::{headers_from_map, Emitter};

/// 客户端追踪中间件层
#[derive(Clone)]
pub struct ClientTraceLayer {
    enabled: bool,
    emitter: Emitter,
}

impl ClientTraceLayer {
    /// 创建客户端追踪层
    ///
    /// # 参数
    /// * `enabled` - 是否记录请求和响应
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            emitter: Emitter::new(),
        }
    }

    /// 根据REST追踪配置创建客户端追踪层（客户端只使用其中的开关）
    pub fn from_config(config: &RestTraceConfig) -> Self {
        Self::new(config.enabled)
    }

    /// 使用自定义的脱敏策略
    pub fn with_policy(mut self, policy: HeaderRedactionPolicy) -> Self {
        self.emitter.set_policy(policy);
        self
    }

    /// 使用自定义的记录输出代替默认的 `tracing` 日志
    pub fn with_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&TraceRecord) + Send + Sync + 'static,
    {
        self.emitter.set_sink(Arc::new(sink));
        self
    }
}

impl<S> Layer<S> for ClientTraceLayer {
    type Service = ClientTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientTraceService {
            inner,
            enabled: self.enabled,
            emitter: self.emitter.clone(),
        }
    }
}

/// 客户端追踪服务
#[derive(Clone)]
pub struct ClientTraceService<S> {
    inner: S,
    enabled: bool,
    emitter: Emitter,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ClientTraceService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        if !self.enabled || !self.emitter.is_enabled() {
            return Box::pin(self.inner.call(req));
        }

        let request = RequestView::new(req.method().as_str(), req.uri().to_string())
            .with_headers(headers_from_map(req.headers()));
        self.emitter
            .emit(self.emitter.builder().outbound_request(&request));

        let future = self.inner.call(req);
        let emitter = self.emitter.clone();

        // 内部服务失败时直接返回错误，不记录响应
        Box::pin(async move {
            let response = future.await?;

            let status = response.status();
            let mut response_view =
                ResponseView::new(status.as_u16()).with_headers(headers_from_map(response.headers()));
            if let Some(reason) = status.canonical_reason() {
                response_view = response_view.with_status_text(reason);
            }
            emitter.emit(emitter.builder().inbound_response(&request, &response_view));

            Ok(response)
        })
    }
}
