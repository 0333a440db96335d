//! 有序的HTTP头部集合
//!
//! 追踪记录需要按头部出现的顺序输出，且同名头部的多个值也要保持顺序，
//! 因此这里使用按插入顺序保存的 `Vec` 而不是哈希表。

/// 按名称读取头部首个值的抽象
///
/// 上下文管理器只依赖这个trait，不关心头部来自哪种HTTP抽象。
pub trait HeaderLookup {
    /// 返回指定头部的第一个值，不存在时返回 None
    fn header(&self, name: &str) -> Option<&str>;
}

/// 有序头部集合：名称 → 一个或多个值
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// 创建空的头部集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个头部值
    ///
    /// 名称已存在（精确匹配）时追加到该名称的值列表末尾，否则在末尾新增一项。
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// 链式追加头部值，便于构造测试数据和视图
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// 返回指定名称的全部值
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    /// 按插入顺序遍历所有头部
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// 不同头部名称的数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否没有任何头部
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HeaderLookup for Headers {
    fn header(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}
