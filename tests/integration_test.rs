//! 集成测试：验证追踪记录和关联上下文与 tracing 系统的集成

#![cfg(feature = "axum")]

use axum::http::Request;
use axum::{
    http::{Method, StatusCode},
    routing::get,
    Router,
};
use rest_trace::{
    propagate, ClientTraceLayer, CorrelationLayer, Direction, Principal, RestTraceConfig,
    RestTraceLayer, UBER_TRACE_ID_HEADER,
};
use std::io;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use tracing_subscriber::{fmt, fmt::MakeWriter, EnvFilter};

/// 把日志输出收集到内存中的 writer
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture_subscriber(filter: &str) -> (impl tracing::Subscriber + Send + Sync, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_env_filter(EnvFilter::new(filter))
        .finish();
    (subscriber, logs)
}

/// 简单的测试处理器
async fn test_handler() -> &'static str {
    tracing::info!("Test handler called");
    "Hello, World!"
}

/// 测试追踪记录和关联信息一起出现在日志中
#[tokio::test]
async fn test_tracing_integration() {
    let (subscriber, logs) = capture_subscriber("info");
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = Router::new()
        .route("/api/test", get(test_handler))
        .layer(RestTraceLayer::with_config(RestTraceConfig::enabled()))
        .layer(CorrelationLayer::new());

    let mut request = Request::builder()
        .method(Method::GET)
        .uri("/api/test")
        .header("host", "localhost")
        .header(UBER_TRACE_ID_HEADER, "abc123:1:0:1")
        .header("authorization", "Bearer secret-token")
        .body(axum::body::Body::empty())
        .unwrap();
    request.extensions_mut().insert(Principal::new("alice"));

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let output = logs.contents();
    assert!(output.contains(
        "*** REST REQUEST IN *** { request : { uri : \"http://localhost/api/test\", method : \"GET\""
    ));
    assert!(output.contains("authorization : \"_redacted(19)_\""));
    assert!(!output.contains("secret-token"), "日志中不应出现机密头部的原值");
    assert!(output.contains("*** REST RESPONSE OUT ***"));
    assert!(output.contains("statusCode : 200"));

    // 处理器中的日志带有请求 span 上的关联信息
    let handler_line = output
        .lines()
        .find(|line| line.contains("Test handler called"))
        .expect("handler log line");
    assert!(handler_line.contains("trace_id="), "{handler_line}");
    assert!(handler_line.contains("abc123"), "{handler_line}");
    assert!(handler_line.contains("user_id="), "{handler_line}");
    assert!(handler_line.contains("alice"), "{handler_line}");
}

/// 测试请求 span 只记录路径，查询字符串中的令牌不会出现在处理器日志中
#[tokio::test]
async fn test_request_span_omits_query_string() {
    let (subscriber, logs) = capture_subscriber("info");
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = Router::new()
        .route("/api/test", get(test_handler))
        .layer(CorrelationLayer::new());

    let request = Request::builder()
        .uri("/api/test?access_token=query-secret")
        .header(UBER_TRACE_ID_HEADER, "abc123:1:0:1")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let output = logs.contents();
    let handler_line = output
        .lines()
        .find(|line| line.contains("Test handler called"))
        .expect("handler log line");
    assert!(handler_line.contains("path=/api/test"), "{handler_line}");
    assert!(!output.contains("query-secret"), "{output}");
}

/// 测试日志级别高于 INFO 时不输出追踪记录
#[tokio::test]
async fn test_no_records_when_info_disabled() {
    let (subscriber, logs) = capture_subscriber("rest_trace=warn");
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = Router::new()
        .route("/api/test", get(test_handler))
        .layer(RestTraceLayer::with_config(RestTraceConfig::enabled()));

    let request = Request::builder()
        .uri("/api/test")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(!logs.contents().contains("*** REST"));
}

/// 测试处理器内发出的客户端请求带上入站请求的关联信息
#[tokio::test]
async fn test_client_calls_inside_request_share_context() {
    let seen: Arc<Mutex<Vec<(Option<String>, Direction)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let handler = move || {
        let sink = Arc::clone(&sink);
        async move {
            let client = tower::ServiceBuilder::new()
                .layer(ClientTraceLayer::new(true).with_sink(move |record| {
                    let trace_id = rest_trace::current_trace_id().map(|id| id.to_string());
                    sink.lock().unwrap().push((trace_id, record.direction()));
                }))
                .service(tower::service_fn(|_req: Request<()>| async {
                    Ok::<_, std::convert::Infallible>(axum::http::Response::new(()))
                }));

            // 显式传递到新任务中，客户端调用仍然能看到追踪ID
            let call = client.oneshot(
                Request::builder()
                    .uri("http://backend/items")
                    .body(())
                    .unwrap(),
            );
            tokio::spawn(propagate(call)).await.unwrap().unwrap();
            "ok"
        }
    };

    let app = Router::new()
        .route("/api/test", get(handler))
        .layer(CorrelationLayer::new());

    let request = Request::builder()
        .uri("/api/test")
        .header(UBER_TRACE_ID_HEADER, "abc123:1:0:1")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen
        .iter()
        .all(|(trace_id, _)| trace_id.as_deref() == Some("abc123")));
}
