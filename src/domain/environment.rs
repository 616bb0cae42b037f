//! 容器环境：profile 与属性解析

use crate::domain::property_source::{CompositePropertySource, PropertySource};
use crate::error::{MultiEnvError, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::LazyLock;

/// `${...}` 展开的最大轮数
const MAX_PLACEHOLDER_DEPTH: usize = 32;

/// `${key}` 或 `${key:default}`，最内层的占位符先匹配
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^{}:]+)(?::([^{}]*))?\}").expect("placeholder pattern is valid")
});

/// 单个容器的 profile 与属性源
#[derive(Debug, Clone)]
pub struct Environment {
    active_profiles: BTreeSet<String>,
    default_profiles: BTreeSet<String>,
    property_sources: CompositePropertySource,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            active_profiles: BTreeSet::new(),
            default_profiles: BTreeSet::new(),
            property_sources: CompositePropertySource::new("environment"),
        }
    }

    /// 替换激活的 profile
    pub fn set_active_profiles<I, S>(&mut self, profiles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_profiles = profiles.into_iter().map(Into::into).collect();
    }

    /// 替换默认 profile
    pub fn set_default_profiles<I, S>(&mut self, profiles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_profiles = profiles.into_iter().map(Into::into).collect();
    }

    pub fn active_profiles(&self) -> Vec<String> {
        self.active_profiles.iter().cloned().collect()
    }

    pub fn default_profiles(&self) -> Vec<String> {
        self.default_profiles.iter().cloned().collect()
    }

    /// `profile` 是否生效
    ///
    /// 只有在没有任何激活 profile 时，默认 profile 才生效。
    pub fn is_profile_active(&self, profile: &str) -> bool {
        if self.active_profiles.is_empty() {
            self.default_profiles.contains(profile)
        } else {
            self.active_profiles.contains(profile)
        }
    }

    /// `expressions` 中任一项匹配即为真，`!name` 表示取反
    pub fn accepts_profiles<S: AsRef<str>>(&self, expressions: &[S]) -> bool {
        expressions.iter().any(|expr| {
            let expr = expr.as_ref().trim();
            match expr.strip_prefix('!') {
                Some(negated) => !self.is_profile_active(negated.trim()),
                None => self.is_profile_active(expr),
            }
        })
    }

    pub fn property_sources(&self) -> &CompositePropertySource {
        &self.property_sources
    }

    pub fn property_sources_mut(&mut self) -> &mut CompositePropertySource {
        &mut self.property_sources
    }

    /// `key` 的原始值（不展开占位符）
    pub fn get_raw_property(&self, key: &str) -> Option<&str> {
        self.property_sources.get_property(key)
    }

    pub fn contains_property(&self, key: &str) -> bool {
        self.property_sources.contains_property(key)
    }

    /// 展开占位符后的 `key` 值
    ///
    /// # 错误
    ///
    /// 值中引用了无法解析或循环的占位符时失败。
    pub fn get_property(&self, key: &str) -> Result<Option<String>> {
        match self.get_raw_property(key) {
            Some(raw) => self.resolve_placeholders(raw).map(Some),
            None => Ok(None),
        }
    }

    /// 同 [`Environment::get_property`]，但键不存在时返回错误
    pub fn require_property(&self, key: &str) -> Result<String> {
        self.get_property(key)?
            .ok_or_else(|| MultiEnvError::PropertyNotFound(key.to_string()))
    }

    /// 解析为 `T` 的 `key` 值
    pub fn get_property_as<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_property(key)? {
            Some(value) => value.parse::<T>().map(Some).map_err(|e| {
                MultiEnvError::Parse(format!("property '{key}' = '{value}': {e}"))
            }),
            None => Ok(None),
        }
    }

    /// 全部属性，按键排序
    ///
    /// 占位符能解析的值会被展开；无法解析（缺失或循环）的值按原文列出，
    /// 单个坏值不影响整个列表。
    pub fn resolved_properties(&self) -> Vec<(String, String)> {
        self.property_sources
            .property_names()
            .into_iter()
            .filter_map(|key| {
                let raw = self.get_raw_property(&key)?;
                let value = match self.resolve_placeholders(raw) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::debug!(key = %key, error = %e, "listing unresolved value as-is");
                        raw.to_string()
                    }
                };
                Some((key, value))
            })
            .collect()
    }

    /// 展开 `text` 中的 `${key}` 与 `${key:default}`
    ///
    /// 展开结果会被再次展开，直到不再包含占位符。
    ///
    /// # 错误
    ///
    /// - 键不存在且没有默认值：[`MultiEnvError::PropertyNotFound`]
    /// - 展开无法收敛：[`MultiEnvError::CircularPlaceholder`]
    pub fn resolve_placeholders(&self, text: &str) -> Result<String> {
        let mut current = text.to_string();

        for _ in 0..MAX_PLACEHOLDER_DEPTH {
            if !PLACEHOLDER.is_match(&current) {
                return Ok(current);
            }
            current = self.expand_once(&current)?;
        }

        if PLACEHOLDER.is_match(&current) {
            return Err(MultiEnvError::CircularPlaceholder(text.to_string()));
        }
        Ok(current)
    }

    fn expand_once(&self, text: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let key = caps.get(1).map_or("", |m| m.as_str()).trim();

            let replacement = match (self.get_raw_property(key), caps.get(2)) {
                (Some(value), _) => value,
                (None, Some(default)) => default.as_str(),
                (None, None) => return Err(MultiEnvError::PropertyNotFound(key.to_string())),
            };

            out.push_str(&text[last..whole.start()]);
            out.push_str(replacement);
            last = whole.end();
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}
