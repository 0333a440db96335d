//! TraceId 核心结构体定义
//!
//! 负责从分布式追踪头部中解析出追踪ID，支持两种约定：
//! - 旧版 Jaeger/OpenTracing 头部 `uber-trace-id`（冒号分隔，可能被URL编码为 `%3A`）
//! - W3C TraceContext 头部 `traceparent`（`version-traceid-spanid-flags`）

use std::fmt;

/// URL编码后的冒号分隔符
const ENCODED_COLON: &str = "%3A";

/// 追踪ID结构体
///
/// 只保存从请求头中解析出的原始标识符，不做格式校验：
/// 不同的追踪系统使用不同长度的ID，这里只保证它非空。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(String);

impl TraceId {
    /// 从旧版 `uber-trace-id` 头部解析追踪ID
    ///
    /// 头部格式为 `{trace-id}:{span-id}:{parent-span-id}:{flags}`。
    /// 如果按 `:` 拆分只得到一个字段，则认为分隔符被URL编码过，改按 `%3A` 重新拆分。
    ///
    /// # 返回
    /// 第一个字段非空时返回 Some(TraceId)，否则返回 None
    pub fn from_uber_trace_header(value: &str) -> Option<Self> {
        let mut fields: Vec<&str> = value.split(':').collect();
        if fields.len() == 1 {
            fields = value.split(ENCODED_COLON).collect();
        }
        Self::from_field(fields.first().copied())
    }

    /// 从 W3C `traceparent` 头部解析追踪ID
    ///
    /// 头部格式为 `{version}-{trace-id}-{parent-id}-{trace-flags}`，取第二个字段。
    ///
    /// # 返回
    /// 第二个字段存在且非空时返回 Some(TraceId)，否则返回 None
    pub fn from_traceparent(value: &str) -> Option<Self> {
        Self::from_field(value.split('-').nth(1))
    }

    #[inline]
    fn from_field(field: Option<&str>) -> Option<Self> {
        field
            .filter(|id| !id.is_empty())
            .map(|id| Self(id.to_string()))
    }

    /// 从字符串创建追踪ID（不进行解析，用于已知标识符）
    ///
    /// 空字符串没有意义，因此返回 None。
    pub fn from_string(id: &str) -> Option<Self> {
        Self::from_field(Some(id))
    }

    /// 获取追踪ID字符串
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TraceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
