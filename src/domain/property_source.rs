//! 属性源
//!
//! 属性源是具名、不可变的键值叠加层。多个属性源组合为 [`CompositePropertySource`]，
//! 从前向后查找，第一个包含该键的源胜出。

use crate::config::format::properties::PropertiesParser;
use crate::error::Result;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static SOURCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 匿名属性源的唯一名称
pub(crate) fn generated_name(kind: &str) -> String {
    let n = SOURCE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{kind}-property-source-{n}")
}

/// 具名键值叠加层
pub trait PropertySource: fmt::Debug + Send + Sync {
    /// 源名称，仅用于诊断
    fn name(&self) -> &str;

    /// `key` 的值（若存在）
    fn get_property(&self, key: &str) -> Option<&str>;

    /// 该源的全部键
    fn property_names(&self) -> Vec<String>;

    fn contains_property(&self, key: &str) -> bool {
        self.get_property(key).is_some()
    }
}

/// 基于私有 map 副本的属性源
#[derive(Debug, Clone)]
pub struct MapPropertySource {
    name: String,
    source: HashMap<String, String>,
}

impl MapPropertySource {
    /// 从任意键值集合创建
    ///
    /// 条目会被复制，调用方之后对原集合的修改不可见。
    pub fn new<I, K, V>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            source: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// 从 `.properties` 流创建
    ///
    /// # 错误
    ///
    /// I/O 错误转换为 [`crate::MultiEnvError::PropertiesRead`]。
    pub fn from_properties<R: Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let name = name.into();
        let entries = PropertiesParser::read(reader, &name)?;
        Ok(Self::new(name, entries))
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_property(&self, key: &str) -> Option<&str> {
        self.source.get(key).map(String::as_str)
    }

    fn property_names(&self) -> Vec<String> {
        self.source.keys().cloned().collect()
    }
}

/// 进程环境变量快照
///
/// 查找 `foo.bar` 或 `foo-bar` 时也会尝试 `FOO_BAR` 形式。
#[derive(Debug, Clone)]
pub struct SystemEnvironmentPropertySource {
    inner: MapPropertySource,
}

impl SystemEnvironmentPropertySource {
    pub const NAME: &'static str = "systemEnvironment";

    /// 捕获当前进程环境
    pub fn snapshot() -> Self {
        Self {
            inner: MapPropertySource::new(
                Self::NAME,
                std::env::vars_os()
                    .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
            ),
        }
    }

    fn resolve_key(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.inner.get_property(key) {
            return Some(value);
        }

        let underscored = key.replace(['.', '-'], "_");
        if let Some(value) = self.inner.get_property(&underscored) {
            return Some(value);
        }

        self.inner.get_property(&underscored.to_uppercase())
    }
}

impl PropertySource for SystemEnvironmentPropertySource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get_property(&self, key: &str) -> Option<&str> {
        self.resolve_key(key)
    }

    fn property_names(&self) -> Vec<String> {
        self.inner.property_names()
    }
}

/// 有序叠加层，最高优先级在前
#[derive(Debug, Clone, Default)]
pub struct CompositePropertySource {
    name: String,
    sources: Vec<Arc<dyn PropertySource>>,
}

impl CompositePropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
        }
    }

    /// 以最高优先级添加 `source`
    pub fn add_first(&mut self, source: Arc<dyn PropertySource>) {
        self.sources.insert(0, source);
    }

    /// 以最低优先级添加 `source`
    pub fn add_last(&mut self, source: Arc<dyn PropertySource>) {
        self.sources.push(source);
    }

    /// 按查找顺序排列的源
    pub fn sources(&self) -> impl Iterator<Item = &Arc<dyn PropertySource>> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// 合并后的 `(key, value)`，按键排序
    pub fn resolved_entries(&self) -> Vec<(String, String)> {
        self.property_names()
            .into_iter()
            .filter_map(|key| {
                let value = self.get_property(&key)?.to_string();
                Some((key, value))
            })
            .collect()
    }
}

impl PropertySource for CompositePropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_property(&self, key: &str) -> Option<&str> {
        self.sources.iter().find_map(|s| s.get_property(key))
    }

    fn property_names(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .sources
            .iter()
            .flat_map(|s| s.property_names())
            .collect();
        names.into_iter().collect()
    }
}
