//! 单个环境容器的不可变构建器
//!
//! 每次配置调用都返回新的构建器，原构建器保持不变：同一个构建器可以
//! 同时用于多个注册表条目，也可以多次构建。

use crate::domain::component::{ComponentCatalog, ComponentId};
use crate::domain::property_source::{
    CompositePropertySource, MapPropertySource, PropertySource, SystemEnvironmentPropertySource,
    generated_name,
};
use crate::error::{MultiEnvError, Result};
use crate::infrastructure::container::{Container, GenericContainer};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

type Customizer = Arc<dyn Fn(&mut dyn Container) -> Result<()> + Send + Sync>;

const COMPOSITE_NAME: &str = "env-composite-property-source";

/// 单个环境的配置
#[derive(Clone)]
pub struct ContextBuilder {
    catalog: Arc<ComponentCatalog>,
    active_profiles: BTreeSet<String>,
    default_profiles: BTreeSet<String>,
    property_source: CompositePropertySource,
    locations: Vec<String>,
    component_ids: Vec<ComponentId>,
    include_system_environment: bool,
    customizer: Option<Customizer>,
}

impl ContextBuilder {
    /// 尚未注册任何内容的构建器
    pub fn new(catalog: Arc<ComponentCatalog>) -> Self {
        Self {
            catalog,
            active_profiles: BTreeSet::new(),
            default_profiles: BTreeSet::new(),
            property_source: CompositePropertySource::new(COMPOSITE_NAME),
            locations: Vec::new(),
            component_ids: Vec::new(),
            include_system_environment: false,
            customizer: None,
        }
    }

    /// 扫描 `catalog` 中 `locations` 的构建器
    pub fn scanning<I, S>(catalog: Arc<ComponentCatalog>, locations: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(catalog).register_locations(locations)
    }

    /// 只注册 `catalog` 中 `ids` 的构建器
    pub fn components(catalog: Arc<ComponentCatalog>, ids: &[ComponentId]) -> Result<Self> {
        Self::new(catalog).register_components(ids)
    }

    /// 扫描 `locations` 并注册 `ids` 的构建器
    pub fn annotation_config<I, S>(
        catalog: Arc<ComponentCatalog>,
        locations: I,
        ids: &[ComponentId],
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(catalog)
            .register_locations(locations)?
            .register_components(ids)
    }

    /// 替换扫描位置
    ///
    /// # 错误
    ///
    /// 位置为空白时返回 [`MultiEnvError::InvalidArgument`]。
    pub fn register_locations<I, S>(&self, locations: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let locations = non_blank(locations, "location")?;
        Ok(Self {
            locations,
            ..self.clone()
        })
    }

    /// 替换显式注册的组件
    ///
    /// # 错误
    ///
    /// 标识不在组件目录中时返回 [`MultiEnvError::InvalidArgument`]。
    pub fn register_components(&self, ids: &[ComponentId]) -> Result<Self> {
        if let Some(unknown) = ids.iter().find(|id| !self.catalog.contains(id)) {
            return Err(MultiEnvError::InvalidArgument(format!(
                "component {unknown} is not in the catalog"
            )));
        }
        Ok(Self {
            component_ids: ids.to_vec(),
            ..self.clone()
        })
    }

    /// 追加一个显式注册的组件类型
    pub fn with_component<T: Any>(&self) -> Result<Self> {
        let mut ids = self.component_ids.clone();
        let id = ComponentId::of::<T>();
        if !ids.contains(&id) {
            ids.push(id);
        }
        self.register_components(&ids)
    }

    /// 替换激活的 profile，空表示没有
    pub fn active_profiles<I, S>(&self, profiles: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let active_profiles = non_blank(profiles, "active profile")?.into_iter().collect();
        Ok(Self {
            active_profiles,
            ..self.clone()
        })
    }

    /// 替换默认 profile，空表示没有
    pub fn default_profiles<I, S>(&self, profiles: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let default_profiles = non_blank(profiles, "default profile")?.into_iter().collect();
        Ok(Self {
            default_profiles,
            ..self.clone()
        })
    }

    /// 以最高优先级添加 `source`
    #[must_use]
    pub fn add_property_source(&self, source: Arc<dyn PropertySource>) -> Self {
        let mut property_source = self.property_source.clone();
        property_source.add_first(source);
        Self {
            property_source,
            ..self.clone()
        }
    }

    /// 以最高优先级添加 `entries` 的副本
    #[must_use]
    pub fn add_map_property_source<I, K, V>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.add_property_source(Arc::new(MapPropertySource::new(
            generated_name("map"),
            entries,
        )))
    }

    /// 解析 `.properties` 流并以最高优先级添加
    ///
    /// # 错误
    ///
    /// I/O 错误转换为 [`MultiEnvError::PropertiesRead`]，原构建器不受影响。
    pub fn add_properties_property_source<R: Read>(&self, reader: R) -> Result<Self> {
        let source = MapPropertySource::from_properties(generated_name("properties"), reader)?;
        Ok(self.add_property_source(Arc::new(source)))
    }

    /// 读取 `.properties` 文件并以最高优先级添加
    pub fn add_properties_file(&self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let file = File::open(path).map_err(|e| MultiEnvError::properties_read(&origin, e))?;
        let source = MapPropertySource::from_properties(origin, BufReader::new(file))?;
        Ok(self.add_property_source(Arc::new(source)))
    }

    /// 清空已添加的属性源
    #[must_use]
    pub fn reset_property_source(&self) -> Self {
        Self {
            property_source: CompositePropertySource::new(COMPOSITE_NAME),
            ..self.clone()
        }
    }

    /// 以最低优先级暴露进程环境变量
    ///
    /// 每次 `build()` 时重新取快照。
    #[must_use]
    pub fn include_system_environment(&self, include: bool) -> Self {
        Self {
            include_system_environment: include,
            ..self.clone()
        }
    }

    /// 在容器刷新前执行 `customizer`
    #[must_use]
    pub fn customizer<F>(&self, customizer: F) -> Self
    where
        F: Fn(&mut dyn Container) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            customizer: Some(Arc::new(customizer)),
            ..self.clone()
        }
    }

    pub fn catalog(&self) -> &Arc<ComponentCatalog> {
        &self.catalog
    }

    pub fn get_active_profiles(&self) -> Vec<String> {
        self.active_profiles.iter().cloned().collect()
    }

    pub fn get_default_profiles(&self) -> Vec<String> {
        self.default_profiles.iter().cloned().collect()
    }

    pub fn property_source(&self) -> &CompositePropertySource {
        &self.property_source
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn component_ids(&self) -> &[ComponentId] {
        &self.component_ids
    }

    /// 构建并刷新一个新容器
    ///
    /// # 错误
    ///
    /// - 既没有位置也没有组件：[`MultiEnvError::IllegalState`]
    /// - 容器刷新失败时的错误
    pub fn build(&self) -> Result<Box<dyn Container>> {
        self.build_named("context")
    }

    /// 同 [`ContextBuilder::build`]，附带用于日志与错误的名称
    pub fn build_named(&self, name: &str) -> Result<Box<dyn Container>> {
        self.validate_configuration()?;

        let mut container: Box<dyn Container> =
            Box::new(GenericContainer::new(name, Arc::clone(&self.catalog)));
        self.populate_environment(container.as_mut());

        if !self.locations.is_empty() {
            container.scan(&self.locations)?;
        }
        if !self.component_ids.is_empty() {
            container.register(&self.component_ids)?;
        }
        if let Some(customizer) = &self.customizer {
            customizer(container.as_mut())?;
        }

        container.refresh()?;

        tracing::debug!(
            container = name,
            active_profiles = ?self.active_profiles,
            property_sources = self.property_source.len(),
            "container built"
        );
        Ok(container)
    }

    fn validate_configuration(&self) -> Result<()> {
        if self.locations.is_empty() && self.component_ids.is_empty() {
            return Err(MultiEnvError::IllegalState(
                "nothing to register: either locations or components should be provided"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn populate_environment(&self, container: &mut dyn Container) {
        let environment = container.environment_mut();
        environment.set_active_profiles(self.active_profiles.iter().cloned());
        environment.set_default_profiles(self.default_profiles.iter().cloned());

        let sources = environment.property_sources_mut();
        sources.add_last(Arc::new(self.property_source.clone()));
        if self.include_system_environment {
            sources.add_last(Arc::new(SystemEnvironmentPropertySource::snapshot()));
        }
    }
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("active_profiles", &self.active_profiles)
            .field("default_profiles", &self.default_profiles)
            .field("property_sources", &self.property_source.len())
            .field("locations", &self.locations)
            .field("component_ids", &self.component_ids)
            .field("include_system_environment", &self.include_system_environment)
            .field("customizer", &self.customizer.is_some())
            .finish()
    }
}

fn non_blank<I, S>(values: I, what: &str) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(Into::into)
        .map(|value: String| {
            if value.trim().is_empty() {
                Err(MultiEnvError::InvalidArgument(format!("{what} cannot be blank")))
            } else {
                Ok(value)
            }
        })
        .collect()
}
