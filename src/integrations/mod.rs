//! 框架集成
//!
//! 服务端（Axum）和客户端（tower HTTP 客户端）中间件共享的部分：
//! `http` 类型到核心视图的转换，以及追踪记录的输出。

pub mod axum;
pub mod client;

use std::sync::Arc;

use ::axum::http::HeaderMap;

use crate::headers::{HeaderLookup, Headers};
use crate::record::{TraceRecord, TraceRecordBuilder};
use crate::redaction::HeaderRedactionPolicy;
use crate::REST_TRACE_TARGET;

/// 接收追踪记录的函数签名
type Sink = Arc<dyn Fn(&TraceRecord) + Send + Sync>;

/// 追踪记录的构建和输出
///
/// 未设置自定义输出时，记录以 INFO 级别写入 `rest_trace` target。
#[derive(Clone)]
pub(crate) struct Emitter {
    builder: TraceRecordBuilder,
    sink: Option<Sink>,
}

impl Emitter {
    /// `http` 会把头部名称统一转为小写，因此默认按不区分大小写的方式脱敏
    pub(crate) fn new() -> Self {
        Self {
            builder: TraceRecordBuilder::with_policy(HeaderRedactionPolicy::new().ignore_case()),
            sink: None,
        }
    }

    pub(crate) fn set_policy(&mut self, policy: HeaderRedactionPolicy) {
        self.builder = TraceRecordBuilder::with_policy(policy);
    }

    pub(crate) fn set_sink(&mut self, sink: Sink) {
        self.sink = Some(sink);
    }

    pub(crate) fn builder(&self) -> &TraceRecordBuilder {
        &self.builder
    }

    /// 是否有人接收追踪记录；返回 false 时调用方不应构建任何记录
    pub(crate) fn is_enabled(&self) -> bool {
        self.sink.is_some() || tracing::enabled!(target: REST_TRACE_TARGET, tracing::Level::INFO)
    }

    pub(crate) fn emit(&self, record: TraceRecord) {
        match &self.sink {
            Some(sink) => sink(&record),
            None => tracing::info!(target: REST_TRACE_TARGET, "{}", record),
        }
    }
}

/// 把 `http` 头部转换为有序头部集合
///
/// 无法按UTF-8解析的值以有损方式转换，而不是丢弃。
pub(crate) fn headers_from_map(map: &HeaderMap) -> Headers {
    map.iter()
        .map(|(name, value)| {
            (
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

impl HeaderLookup for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::axum::http::HeaderValue;

    #[test]
    fn test_header_map_lookup() {
        let mut map = HeaderMap::new();
        map.insert("uber-trace-id", HeaderValue::from_static("abc123:1:1:1"));
        assert_eq!(map.header("uber-trace-id"), Some("abc123:1:1:1"));
        // HeaderMap 按不区分大小写的方式查找
        assert_eq!(map.header("Uber-Trace-Id"), Some("abc123:1:1:1"));
        assert_eq!(map.header("traceparent"), None);
        // 非法的头部名称不应 panic
        assert_eq!(map.header("bad header"), None);
    }

    #[test]
    fn test_headers_from_map_groups_values() {
        let mut map = HeaderMap::new();
        map.append("accept", HeaderValue::from_static("application/json"));
        map.append("accept", HeaderValue::from_static("text/plain"));
        let headers = headers_from_map(&map);
        assert_eq!(headers.len(), 1);
        assert_eq!(
            headers.get_all("accept"),
            &["application/json".to_string(), "text/plain".to_string()]
        );
    }

    #[test]
    fn test_lossy_header_values() {
        let mut map = HeaderMap::new();
        map.insert("x-binary", HeaderValue::from_bytes(&[0xFF, b'a']).unwrap());
        let headers = headers_from_map(&map);
        assert_eq!(headers.get_all("x-binary").len(), 1);
    }

    #[test]
    fn test_emitter_redacts_lowercase_authorization() {
        let mut map = HeaderMap::new();
        map.insert("authorization", HeaderValue::from_static("secret123"));
        let request = crate::RequestView::new("GET", "/api/x").with_headers(headers_from_map(&map));
        let record = Emitter::new().builder().inbound_request(&request);
        assert!(record.as_str().contains("authorization : \"_redacted(9)_\""));
    }
}
