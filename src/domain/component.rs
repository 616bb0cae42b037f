//! 组件定义与组件目录
//!
//! 组件定义 = 类型 + 构建它的工厂。定义按位置（形如 `app::simple` 的模块路径）
//! 存放在 [`ComponentCatalog`] 中，容器按位置前缀或显式的 [`ComponentId`] 选取。

use crate::domain::environment::Environment;
use crate::error::{MultiEnvError, Result};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 已创建的 bean（类型擦除）
pub type BeanInstance = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn(&dyn BeanFactory) -> Result<BeanInstance> + Send + Sync>;
type DestroyHook = Arc<dyn Fn(&BeanInstance) + Send + Sync>;

/// 组件标识：具体类型
#[derive(Clone, Copy)]
pub struct ComponentId {
    type_id: TypeId,
    type_name: &'static str,
}

impl ComponentId {
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// 完整类型路径，例如 `app::simple::SimpleBean`
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// 类型名的最后一段
    pub fn short_name(&self) -> &'static str {
        let base = self.type_name.split('<').next().unwrap_or(self.type_name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for ComponentId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentId {}

impl Hash for ComponentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// 持有资源的组件的清理钩子
///
/// 所属容器关闭时执行一次。
pub trait Disposable {
    fn destroy(&self);
}

/// 工厂创建组件时可见的依赖视图
pub trait BeanFactory {
    fn environment(&self) -> &Environment;

    /// `id` 对应的 bean，不存在时按需创建
    fn get_bean_erased(&self, id: &ComponentId) -> Result<BeanInstance>;
}

impl dyn BeanFactory + '_ {
    /// 按类型获取依赖
    pub fn get_bean<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let id = ComponentId::of::<T>();
        downcast_bean(self.get_bean_erased(&id)?, &id)
    }

    /// 必需属性（已展开占位符）
    pub fn property(&self, key: &str) -> Result<String> {
        self.environment().require_property(key)
    }

    /// 展开 `text` 中的 `${...}` 占位符
    pub fn resolve(&self, text: &str) -> Result<String> {
        self.environment().resolve_placeholders(text)
    }
}

/// 还原 bean 的具体类型
pub(crate) fn downcast_bean<T: Any + Send + Sync>(
    bean: BeanInstance,
    id: &ComponentId,
) -> Result<Arc<T>> {
    bean.downcast::<T>().map_err(|_| MultiEnvError::BeanCreation {
        type_name: id.type_name().to_string(),
        reason: "bean has an unexpected concrete type".to_string(),
    })
}

/// 单个组件的构建方式
#[derive(Clone)]
pub struct ComponentDefinition {
    id: ComponentId,
    location: String,
    profiles: Vec<String>,
    factory: Factory,
    destroy: Option<DestroyHook>,
}

impl ComponentDefinition {
    /// 在 `location` 下定义组件 `T`
    pub fn new<T, F>(location: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn BeanFactory) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            id: ComponentId::of::<T>(),
            location: location.into(),
            profiles: Vec::new(),
            factory: Arc::new(move |beans: &dyn BeanFactory| {
                let bean: BeanInstance = Arc::new(factory(beans)?);
                Ok(bean)
            }),
            destroy: None,
        }
    }

    /// 定义组件 `T`，关闭时执行其 [`Disposable::destroy`]
    pub fn disposable<T, F>(location: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send + Sync + Disposable,
        F: Fn(&dyn BeanFactory) -> Result<T> + Send + Sync + 'static,
    {
        let mut definition = Self::new(location, factory);
        definition.destroy = Some(Arc::new(|bean: &BeanInstance| {
            if let Some(bean) = bean.downcast_ref::<T>() {
                bean.destroy();
            }
        }));
        definition
    }

    /// 仅在 `profile` 生效时创建组件
    ///
    /// 多次调用会累加，任一 profile 生效即启用。
    #[must_use]
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.push(profile.into());
        self
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    /// 该组件是否属于使用 `environment` 的容器
    pub fn is_enabled_in(&self, environment: &Environment) -> bool {
        self.profiles.is_empty() || environment.accepts_profiles(self.profiles.as_slice())
    }

    pub(crate) fn create(&self, beans: &dyn BeanFactory) -> Result<BeanInstance> {
        (self.factory)(beans)
    }

    pub(crate) fn destroy(&self, bean: &BeanInstance) {
        if let Some(hook) = &self.destroy {
            hook(bean);
        }
    }

    /// 扫描 `location` 时是否选中该定义
    pub fn matches_location(&self, location: &str) -> bool {
        let location = location.trim_end_matches("::");
        self.location == location
            || self
                .location
                .strip_prefix(location)
                .is_some_and(|rest| rest.starts_with("::"))
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("profiles", &self.profiles)
            .field("disposable", &self.destroy.is_some())
            .finish()
    }
}

/// 进程内已知的全部组件定义
#[derive(Debug, Clone, Default)]
pub struct ComponentCatalog {
    definitions: Vec<ComponentDefinition>,
}

impl ComponentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加定义，同类型的定义原地替换
    pub fn register(&mut self, definition: ComponentDefinition) {
        match self
            .definitions
            .iter_mut()
            .find(|d| d.id == definition.id)
        {
            Some(existing) => *existing = definition,
            None => self.definitions.push(definition),
        }
    }

    /// [`ComponentCatalog::register`] 的链式版本
    #[must_use]
    pub fn with(mut self, definition: ComponentDefinition) -> Self {
        self.register(definition);
        self
    }

    pub fn get(&self, id: &ComponentId) -> Option<&ComponentDefinition> {
        self.definitions.iter().find(|d| d.id == *id)
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.get(id).is_some()
    }

    /// 按完整或短类型名查找定义
    pub fn find_by_name(&self, name: &str) -> Option<&ComponentDefinition> {
        self.definitions
            .iter()
            .find(|d| d.id.type_name() == name)
            .or_else(|| self.definitions.iter().find(|d| d.id.short_name() == name))
    }

    /// `location` 下的定义，按注册顺序
    pub fn scan(&self, location: &str) -> Vec<&ComponentDefinition> {
        self.definitions
            .iter()
            .filter(|d| d.matches_location(location))
            .collect()
    }

    pub fn definitions(&self) -> &[ComponentDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_component_id_names() {
        let id = ComponentId::of::<Alpha>();
        assert!(id.type_name().ends_with("::Alpha"));
        assert_eq!(id.short_name(), "Alpha");
        assert_eq!(id, ComponentId::of::<Alpha>());
        assert_ne!(id, ComponentId::of::<Beta>());
        assert_eq!(ComponentId::of::<Vec<String>>().short_name(), "Vec");
    }

    #[test]
    fn test_location_matching() {
        let def = ComponentDefinition::new("app::simple", |_| Ok(Alpha));

        assert!(def.matches_location("app::simple"));
        assert!(def.matches_location("app"));
        assert!(def.matches_location("app::"));
        assert!(!def.matches_location("ap"));
        assert!(!def.matches_location("app::simple::deeper"));
        assert!(!def.matches_location("app::simp"));
    }

    #[test]
    fn test_catalog_scan_and_lookup() {
        let catalog = ComponentCatalog::new()
            .with(ComponentDefinition::new("app::a", |_| Ok(Alpha)))
            .with(ComponentDefinition::new("other", |_| Ok(Beta)));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.scan("app").len(), 1);
        assert!(catalog.scan("missing").is_empty());
        assert!(catalog.contains(&ComponentId::of::<Beta>()));
        assert!(catalog.find_by_name("Alpha").is_some());
        assert!(catalog.find_by_name("Gamma").is_none());
    }

    #[test]
    fn test_catalog_replaces_same_type() {
        let catalog = ComponentCatalog::new()
            .with(ComponentDefinition::new("first", |_| Ok(Alpha)))
            .with(ComponentDefinition::new("second", |_| Ok(Alpha)));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.definitions()[0].location(), "second");
    }

    #[test]
    fn test_profile_gate() {
        let def = ComponentDefinition::new("app", |_| Ok(Alpha)).profile("production");

        let mut env = Environment::new();
        assert!(!def.is_enabled_in(&env));

        env.set_active_profiles(["production"]);
        assert!(def.is_enabled_in(&env));

        let ungated = ComponentDefinition::new("app", |_| Ok(Beta));
        assert!(ungated.is_enabled_in(&Environment::new()));
    }
}
