//! 关联上下文管理
//!
//! 使用 `tokio::task_local` 保存当前请求的关联信息（traceId、userId）。
//! 上下文绑定在请求的异步任务上而不是线程上：即使多个请求交替运行在同一个工作线程，
//! 也不会相互看到或覆盖对方的值。

use std::cell::RefCell;
use std::future::Future;

use crate::headers::HeaderLookup;
use crate::trace_id::TraceId;
use crate::{TRACEPARENT_HEADER, TRACE_ID_KEY, UBER_TRACE_ID_HEADER, USER_ID_KEY};
use tokio::task_local;

// 使用tokio的task_local来存储当前请求的关联上下文
task_local! {
    static CURRENT_CONTEXT: RefCell<CorrelationContext>;
}

/// 从请求中提取出的关联信息
///
/// 在请求进入时同步提取（此时请求头仍然可用），稍后在请求的上下文作用域内应用。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationSeed {
    trace_id: Option<TraceId>,
    user_id: Option<String>,
}

impl CorrelationSeed {
    /// 从请求头和当前认证主体中提取关联信息
    ///
    /// 追踪ID的查找顺序：
    /// 1. 旧版 `uber-trace-id` 头部的第一个字段
    /// 2. W3C `traceparent` 头部的第二个字段
    ///
    /// 头部格式错误时不会失败，只是不设置追踪ID。
    pub fn extract<H>(headers: &H, principal: Option<&str>) -> Self
    where
        H: HeaderLookup + ?Sized,
    {
        let trace_id = headers
            .header(UBER_TRACE_ID_HEADER)
            .and_then(TraceId::from_uber_trace_header)
            .or_else(|| {
                headers
                    .header(TRACEPARENT_HEADER)
                    .and_then(TraceId::from_traceparent)
            });

        if trace_id.is_none()
            && (headers.header(UBER_TRACE_ID_HEADER).is_some()
                || headers.header(TRACEPARENT_HEADER).is_some())
        {
            tracing::debug!("Ignoring malformed trace header, trace id stays unset");
        }

        Self {
            trace_id,
            ..Self::from_principal(principal)
        }
    }

    /// 只携带认证主体的关联信息
    pub fn from_principal(principal: Option<&str>) -> Self {
        Self {
            trace_id: None,
            user_id: principal.filter(|name| !name.is_empty()).map(str::to_string),
        }
    }

    /// 提取到的追踪ID
    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    /// 提取到的用户ID
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

/// 单个请求的关联上下文
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationContext {
    trace_id: Option<TraceId>,
    user_id: Option<String>,
}

impl CorrelationContext {
    /// 创建空的关联上下文
    pub fn new() -> Self {
        Self::default()
    }

    /// 根据请求头和认证主体填充上下文
    ///
    /// - traceId 只在尚未设置时写入，不覆盖外层已经建立的追踪ID
    /// - userId 每次都以最新的认证主体为准
    pub fn seed<H>(&mut self, headers: &H, principal: Option<&str>)
    where
        H: HeaderLookup + ?Sized,
    {
        let seed = if self.trace_id.is_some() {
            CorrelationSeed::from_principal(principal)
        } else {
            CorrelationSeed::extract(headers, principal)
        };
        self.apply(&seed);
    }

    /// 应用预先提取的关联信息，规则与 [`CorrelationContext::seed`] 相同
    pub fn apply(&mut self, seed: &CorrelationSeed) {
        if self.trace_id.is_none() {
            self.trace_id = seed.trace_id.clone();
        }
        if let Some(user_id) = &seed.user_id {
            self.user_id = Some(user_id.clone());
        }
    }

    /// 移除所有关联信息
    pub fn clear(&mut self) {
        self.trace_id = None;
        self.user_id = None;
    }

    /// 当前的追踪ID
    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    /// 当前的用户ID
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// 按键名读取关联信息（`traceId` 或 `userId`）
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            TRACE_ID_KEY => self.trace_id.as_ref().map(TraceId::as_str),
            USER_ID_KEY => self.user_id(),
            _ => None,
        }
    }

    /// 遍历已设置的键值对
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [TRACE_ID_KEY, USER_ID_KEY]
            .into_iter()
            .filter_map(move |key| self.get(key).map(|value| (key, value)))
    }

    /// 是否没有任何关联信息
    pub fn is_empty(&self) -> bool {
        self.trace_id.is_none() && self.user_id.is_none()
    }
}

/// 在新的空关联上下文中执行异步操作
///
/// # 参数
/// * `future` - 要执行的异步操作
///
/// # 返回
/// 异步操作的结果
pub async fn with_correlation<F>(future: F) -> F::Output
where
    F: Future,
{
    CURRENT_CONTEXT
        .scope(RefCell::new(CorrelationContext::new()), future)
        .await
}

/// 在请求的关联上下文中执行异步操作，并保证结束时清理上下文
///
/// 如果当前已经处于外层建立的上下文中，则把关联信息应用到外层上下文，
/// 结束时恢复为进入前的状态；否则建立新的上下文，结束时清空。
/// 无论 `future` 正常结束、返回错误、panic 还是被取消，都会执行清理。
pub async fn correlate<F>(seed: CorrelationSeed, future: F) -> F::Output
where
    F: Future,
{
    if is_active() {
        apply_scoped(seed, future).await
    } else {
        with_correlation(apply_scoped(seed, future)).await
    }
}

/// 把关联信息应用到当前上下文，并在 `future` 结束或被丢弃时恢复原状态
async fn apply_scoped<F>(seed: CorrelationSeed, future: F) -> F::Output
where
    F: Future,
{
    let previous = CURRENT_CONTEXT
        .try_with(|context| {
            context.replace_with(|current| {
                let mut next = current.clone();
                next.apply(&seed);
                next
            })
        })
        .unwrap_or_default();
    let _guard = RestoreOnDrop(previous);
    future.await
}

/// 在当前上下文的副本中执行异步操作
///
/// 用于把关联信息显式传递给 `tokio::spawn` 等异步移交的任务。
/// 副本在调用时捕获，子任务中的修改和清理不会影响父任务。
/// 不在关联上下文中调用时，子任务得到一个空上下文。
pub fn propagate<F>(future: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let snapshot = current_context().unwrap_or_default();
    CURRENT_CONTEXT.scope(RefCell::new(snapshot), future)
}

/// 判断当前是否处于关联上下文中
pub fn is_active() -> bool {
    CURRENT_CONTEXT.try_with(|_| ()).is_ok()
}

/// 获取当前关联上下文的快照
pub fn current_context() -> Option<CorrelationContext> {
    CURRENT_CONTEXT
        .try_with(|context| context.borrow().clone())
        .ok()
}

/// 获取当前追踪ID，不在上下文中或未设置时返回 None
pub fn current_trace_id() -> Option<TraceId> {
    CURRENT_CONTEXT
        .try_with(|context| context.borrow().trace_id.clone())
        .ok()
        .flatten()
}

/// 获取当前用户ID，不在上下文中或未设置时返回 None
pub fn current_user_id() -> Option<String> {
    CURRENT_CONTEXT
        .try_with(|context| context.borrow().user_id.clone())
        .ok()
        .flatten()
}

/// 用请求头和认证主体填充当前上下文
///
/// # 返回
/// 当前处于关联上下文中时返回 true
pub fn seed_current<H>(headers: &H, principal: Option<&str>) -> bool
where
    H: HeaderLookup + ?Sized,
{
    CURRENT_CONTEXT
        .try_with(|context| context.borrow_mut().seed(headers, principal))
        .is_ok()
}

/// 清理当前上下文中的所有关联信息
pub fn clear_current() {
    let _ = CURRENT_CONTEXT.try_with(|context| {
        if let Ok(mut context) = context.try_borrow_mut() {
            context.clear();
        }
    });
}

/// 丢弃时把当前上下文恢复为保存的状态
struct RestoreOnDrop(CorrelationContext);

impl Drop for RestoreOnDrop {
    fn drop(&mut self) {
        let previous = std::mem::take(&mut self.0);
        let _ = CURRENT_CONTEXT.try_with(|context| {
            if let Ok(mut context) = context.try_borrow_mut() {
                *context = previous;
            }
        });
    }
}
