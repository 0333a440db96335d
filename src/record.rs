//! REST追踪记录的构建
//!
//! 四种记录形态（入站/出站 × 请求/响应）统一由 [`TraceRecordBuilder::build`] 生成，
//! 输入是与具体HTTP框架无关的 [`RequestView`] / [`ResponseView`]。
//! 构建过程是纯函数：不做I/O，不会失败，缺失的可选字段直接省略。

use std::fmt::{self, Write};

use crate::headers::Headers;
use crate::redaction::HeaderRedactionPolicy;

/// 无法获取响应状态码时使用的哨兵值
pub const UNKNOWN_STATUS_CODE: i32 = -1;

/// 追踪记录的方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// 服务端收到的请求
    InboundRequest,
    /// 客户端即将发出的请求
    OutboundRequest,
    /// 客户端收到的、对自己请求的响应
    InboundResponse,
    /// 服务端即将返回的响应
    OutboundResponse,
}

impl Direction {
    /// 记录开头的标记
    pub fn banner(self) -> &'static str {
        match self {
            Direction::InboundRequest => "*** REST REQUEST IN ***",
            Direction::OutboundRequest => "*** REST REQUEST OUT ***",
            Direction::InboundResponse => "*** REST RESPONSE IN ***",
            Direction::OutboundResponse => "*** REST RESPONSE OUT ***",
        }
    }

    /// 是否为响应记录
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Direction::InboundResponse | Direction::OutboundResponse
        )
    }
}

/// 请求的只读视图
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestView {
    pub method: String,
    pub uri: String,
    pub headers: Headers,
}

impl RequestView {
    /// 创建没有头部的请求视图
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers: Headers::new(),
        }
    }

    /// 设置请求头部
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}

/// 响应的只读视图
///
/// `status` 为 None 表示状态码无法获取（例如底层连接已关闭），渲染时输出 `-1`。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseView {
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub headers: Headers,
}

impl ResponseView {
    /// 使用已知状态码创建响应视图
    pub fn new(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// 从可能失败的状态码读取结果创建响应视图
    ///
    /// 读取失败不会向上传播，只记录一条 debug 日志并使用哨兵值。
    pub fn from_status_result<E: fmt::Display>(status: Result<u16, E>) -> Self {
        let status = status
            .map_err(|err| tracing::debug!(error = %err, "Unable to read response status code"))
            .ok();
        Self {
            status,
            ..Self::default()
        }
    }

    /// 设置状态描述，空字符串在渲染时被省略
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = Some(status_text.into());
        self
    }

    /// 设置响应头部
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    fn status_code(&self) -> i32 {
        self.status.map_or(UNKNOWN_STATUS_CODE, i32::from)
    }
}

/// 已渲染的追踪记录
///
/// 构建完成后不可变，除文本内容外没有其他标识。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    direction: Direction,
    text: String,
}

impl TraceRecord {
    /// 记录的方向
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// 记录的文本内容
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// 取出记录的文本内容
    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// 追踪记录构建器
#[derive(Debug, Clone, Default)]
pub struct TraceRecordBuilder {
    policy: HeaderRedactionPolicy,
}

impl TraceRecordBuilder {
    /// 使用默认脱敏策略创建构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义脱敏策略创建构建器
    pub fn with_policy(policy: HeaderRedactionPolicy) -> Self {
        Self { policy }
    }

    /// 当前使用的脱敏策略
    pub fn policy(&self) -> &HeaderRedactionPolicy {
        &self.policy
    }

    /// 构建追踪记录
    ///
    /// # 参数
    /// * `direction` - 记录方向
    /// * `request` - 请求视图；响应记录中表示发起该响应的请求
    /// * `response` - 响应视图，仅响应记录使用
    ///
    /// 请求记录输出完整的请求头；响应记录只输出请求的URI和方法，
    /// 随后是响应状态码、可选的状态描述和响应头。
    /// 响应记录缺少响应视图时按状态码未知处理。
    pub fn build(
        &self,
        direction: Direction,
        request: &RequestView,
        response: Option<&ResponseView>,
    ) -> TraceRecord {
        let mut text = String::with_capacity(256);
        // 写入 String 不会失败
        let _ = self.write_record(&mut text, direction, request, response);
        TraceRecord { direction, text }
    }

    /// 服务端收到的请求
    pub fn inbound_request(&self, request: &RequestView) -> TraceRecord {
        self.build(Direction::InboundRequest, request, None)
    }

    /// 客户端即将发出的请求
    pub fn outbound_request(&self, request: &RequestView) -> TraceRecord {
        self.build(Direction::OutboundRequest, request, None)
    }

    /// 客户端收到的响应
    pub fn inbound_response(&self, request: &RequestView, response: &ResponseView) -> TraceRecord {
        self.build(Direction::InboundResponse, request, Some(response))
    }

    /// 服务端即将返回的响应
    pub fn outbound_response(&self, request: &RequestView, response: &ResponseView) -> TraceRecord {
        self.build(Direction::OutboundResponse, request, Some(response))
    }

    fn write_record(
        &self,
        out: &mut String,
        direction: Direction,
        request: &RequestView,
        response: Option<&ResponseView>,
    ) -> fmt::Result {
        write!(out, "{} {{ ", direction.banner())?;
        out.push_str("request : { ");
        write!(
            out,
            "uri : \"{}\", method : \"{}\"",
            request.uri, request.method
        )?;
        if !direction.is_response() {
            out.push_str(", ");
            self.write_headers(out, &request.headers)?;
        }
        out.push_str(" }");

        if direction.is_response() {
            let missing = ResponseView::default();
            let response = response.unwrap_or(&missing);
            out.push_str(", response { ");
            write!(out, "statusCode : {}", response.status_code())?;
            if let Some(status_text) = response.status_text.as_deref().filter(|t| !t.is_empty()) {
                write!(out, ", statusText : \"{status_text}\"")?;
            }
            out.push_str(", ");
            self.write_headers(out, &response.headers)?;
            out.push_str(" }");
        }

        out.push_str(" }");
        Ok(())
    }

    fn write_headers(&self, out: &mut String, headers: &Headers) -> fmt::Result {
        out.push_str("headers : { ");
        for (index, (name, values)) in headers.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            write!(out, "{name} : ")?;
            if let [value] = values {
                write!(out, "\"{}\"", self.policy.filter(name, value))?;
            } else {
                out.push('[');
                for (value_index, value) in values.iter().enumerate() {
                    if value_index > 0 {
                        out.push_str(", ");
                    }
                    write!(out, "\"{}\"", self.policy.filter(name, value))?;
                }
                out.push(']');
            }
        }
        out.push_str(" }");
        Ok(())
    }
}
