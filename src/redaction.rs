//! 机密头部值的脱敏策略

use std::borrow::Cow;
use std::collections::HashSet;

/// 默认需要脱敏的头部名称
pub const DEFAULT_CONFIDENTIAL_HEADERS: &[&str] = &["Authorization"];

/// 头部脱敏策略
///
/// 对命中的头部，用 `_redacted(<N>)_` 替换原值，其中 `N` 是原值的字符数：
/// 日志中可以确认该值存在以及大致长度，但不会泄露内容。
///
/// 默认按名称区分大小写匹配（只匹配 `Authorization`）。
/// HTTP头部名称本身不区分大小写，需要时可通过 [`HeaderRedactionPolicy::ignore_case`] 切换。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRedactionPolicy {
    names: HashSet<String>,
    ignore_case: bool,
}

impl HeaderRedactionPolicy {
    /// 创建默认策略：区分大小写地匹配 `Authorization`
    pub fn new() -> Self {
        Self {
            names: DEFAULT_CONFIDENTIAL_HEADERS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            ignore_case: false,
        }
    }

    /// 创建不脱敏任何头部的策略
    pub fn none() -> Self {
        Self {
            names: HashSet::new(),
            ignore_case: false,
        }
    }

    /// 增加一个需要脱敏的头部名称
    pub fn with_header(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.names.insert(if self.ignore_case {
            name.to_ascii_lowercase()
        } else {
            name
        });
        self
    }

    /// 切换为不区分大小写匹配
    pub fn ignore_case(self) -> Self {
        Self {
            names: self
                .names
                .into_iter()
                .map(|name| name.to_ascii_lowercase())
                .collect(),
            ignore_case: true,
        }
    }

    /// 判断指定头部的值是否需要脱敏
    pub fn is_confidential(&self, name: &str) -> bool {
        if self.ignore_case {
            self.names.contains(&name.to_ascii_lowercase())
        } else {
            self.names.contains(name)
        }
    }

    /// 按策略过滤头部值：命中时返回占位符，否则原样返回
    pub fn filter<'a>(&self, name: &str, value: &'a str) -> Cow<'a, str> {
        if self.is_confidential(name) {
            Cow::Owned(redact(value))
        } else {
            Cow::Borrowed(value)
        }
    }
}

impl Default for HeaderRedactionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// 生成保留长度信息的脱敏占位符
pub fn redact(value: &str) -> String {
    format!("_redacted({})_", value.chars().count())
}
