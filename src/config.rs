//! 追踪与关联功能的配置
//!
//! 配置值的加载（配置文件、环境变量等）由使用方负责，这里只定义配置结构及其默认值。

use std::fmt;

/// 默认生效的URL模式
pub const DEFAULT_URL_PATTERN: &str = "/api/*";

/// 健康检查/管理端点的路径前缀，关联上下文始终跳过这些请求
pub const MANAGEMENT_PATH_PREFIX: &str = "/actuator";

/// Servlet 风格的URL匹配模式
///
/// 支持以下形式：
/// - `/*` 或 `*`：匹配所有路径
/// - `/prefix/*`：匹配 `/prefix` 本身及其下的所有路径
/// - `*.ext`：匹配以 `.ext` 结尾的路径
/// - 其他：精确匹配
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPattern {
    Any,
    Prefix(String),
    Extension(String),
    Exact(String),
}

impl UrlPattern {
    /// 解析URL模式，任何字符串都是合法的模式
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern == "/*" || pattern == "*" {
            UrlPattern::Any
        } else if let Some(prefix) = pattern.strip_suffix("/*") {
            UrlPattern::Prefix(prefix.to_string())
        } else if let Some(extension) = pattern.strip_prefix("*.") {
            UrlPattern::Extension(extension.to_string())
        } else {
            UrlPattern::Exact(pattern.to_string())
        }
    }

    /// 判断路径是否匹配
    pub fn matches(&self, path: &str) -> bool {
        match self {
            UrlPattern::Any => true,
            UrlPattern::Prefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
            UrlPattern::Extension(extension) => path
                .rsplit_once('.')
                .is_some_and(|(_, ext)| ext == extension && !ext.contains('/')),
            UrlPattern::Exact(exact) => path == exact,
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Any => f.write_str("/*"),
            UrlPattern::Prefix(prefix) => write!(f, "{prefix}/*"),
            UrlPattern::Extension(extension) => write!(f, "*.{extension}"),
            UrlPattern::Exact(exact) => f.write_str(exact),
        }
    }
}

impl From<&str> for UrlPattern {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}

fn matches_any(patterns: &[UrlPattern], path: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(path))
}

/// REST追踪配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestTraceConfig {
    /// 是否启用REST追踪（默认关闭）
    pub enabled: bool,
    /// 需要追踪的URL模式（默认 `/api/*`）
    pub url_patterns: Vec<UrlPattern>,
}

impl Default for RestTraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url_patterns: vec![UrlPattern::parse(DEFAULT_URL_PATTERN)],
        }
    }
}

impl RestTraceConfig {
    /// 创建已启用、使用默认URL模式的配置
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// 替换URL模式
    pub fn with_url_patterns<I, P>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<UrlPattern>,
    {
        self.url_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// 判断指定路径的请求是否需要追踪
    pub fn applies_to(&self, path: &str) -> bool {
        self.enabled && matches_any(&self.url_patterns, path)
    }
}

/// 关联上下文配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationConfig {
    /// 是否启用关联上下文（默认启用）
    pub enabled: bool,
    /// 生效的URL模式（默认 `/api/*`）
    pub url_patterns: Vec<UrlPattern>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url_patterns: vec![UrlPattern::parse(DEFAULT_URL_PATTERN)],
        }
    }
}

impl CorrelationConfig {
    /// 创建已关闭的配置
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// 替换URL模式
    pub fn with_url_patterns<I, P>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<UrlPattern>,
    {
        self.url_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// 判断指定路径的请求是否需要建立关联上下文
    ///
    /// 管理端点（`/actuator` 前缀）始终被跳过，避免健康检查产生噪音。
    pub fn applies_to(&self, path: &str) -> bool {
        self.enabled
            && !path.starts_with(MANAGEMENT_PATH_PREFIX)
            && matches_any(&self.url_patterns, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_patterns() {
        assert_eq!(UrlPattern::parse("/*"), UrlPattern::Any);
        assert_eq!(UrlPattern::parse("/api/*"), UrlPattern::Prefix("/api".into()));
        assert_eq!(UrlPattern::parse("*.json"), UrlPattern::Extension("json".into()));
        assert_eq!(UrlPattern::parse("/health"), UrlPattern::Exact("/health".into()));
        assert_eq!(UrlPattern::parse("/api/*").to_string(), "/api/*");
    }

    #[test]
    fn test_prefix_pattern() {
        let pattern = UrlPattern::parse("/api/*");
        assert!(pattern.matches("/api"));
        assert!(pattern.matches("/api/"));
        assert!(pattern.matches("/api/orders/1"));
        assert!(!pattern.matches("/apis"));
        assert!(!pattern.matches("/other/api"));
    }

    #[test]
    fn test_extension_and_exact_patterns() {
        let extension = UrlPattern::parse("*.json");
        assert!(extension.matches("/data/items.json"));
        assert!(!extension.matches("/data/items.xml"));
        assert!(!extension.matches("/v1.json/items"));

        let exact = UrlPattern::parse("/health");
        assert!(exact.matches("/health"));
        assert!(!exact.matches("/health/live"));
    }

    #[test]
    fn test_rest_trace_config_defaults() {
        let config = RestTraceConfig::default();
        assert!(!config.enabled);
        assert!(!config.applies_to("/api/x"), "默认关闭时不应追踪任何请求");

        let config = RestTraceConfig::enabled();
        assert!(config.applies_to("/api/x"));
        assert!(!config.applies_to("/static/app.js"));

        let config = RestTraceConfig::enabled().with_url_patterns(["/*"]);
        assert!(config.applies_to("/static/app.js"));
    }

    #[test]
    fn test_correlation_config_skips_management_paths() {
        let config = CorrelationConfig::default().with_url_patterns(["/*"]);
        assert!(config.applies_to("/api/x"));
        assert!(!config.applies_to("/actuator/health"));
        assert!(!config.applies_to("/actuator"));

        assert!(!CorrelationConfig::disabled().applies_to("/api/x"));
    }
}
