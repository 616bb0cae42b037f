//! 描述一组环境的 TOML 清单
//!
//! ```toml
//! [settings]
//! lazy = false
//!
//! [environments.dev]
//! active_profiles = ["production"]
//! locations = ["app"]
//! properties_files = ["dev.properties"]
//!
//! [environments.dev.properties]
//! envProp = "envValue"
//! ```
//!
//! 同一环境内，properties 文件按列出顺序叠加，内联表优先级最高；
//! 开启 `system_environment` 时进程环境变量位于所有叠加层之下。

use crate::application::context_builder::ContextBuilder;
use crate::application::multi_env::MultiEnvContext;
use crate::domain::component::{ComponentCatalog, ComponentId};
use crate::error::{MultiEnvError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 默认清单文件名
pub const MANIFEST_FILE: &str = "multienv.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestSettings {
    /// 按需构建环境
    pub lazy: bool,
    /// 在每个环境中暴露进程环境变量
    pub system_environment: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentManifest {
    pub active_profiles: Vec<String>,
    pub default_profiles: Vec<String>,
    pub locations: Vec<String>,
    /// 组件目录中的完整或短类型名
    pub components: Vec<String>,
    /// 相对路径基于清单所在目录
    pub properties_files: Vec<PathBuf>,
    pub properties: BTreeMap<String, toml::Value>,
    /// 覆盖 `settings.system_environment`
    pub system_environment: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MultiEnvManifest {
    pub settings: ManifestSettings,
    pub environments: BTreeMap<String, EnvironmentManifest>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl MultiEnvManifest {
    /// 解析清单文本，相对路径基于 `base_dir`
    pub fn parse(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut manifest: MultiEnvManifest =
            toml::from_str(content).map_err(|e| MultiEnvError::Manifest(e.to_string()))?;
        manifest.base_dir = base_dir.into();
        Ok(manifest)
    }

    /// 读取并解析清单文件
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MultiEnvError::Manifest(format!("cannot read {}: {e}", path.display()))
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&content, base_dir)
    }

    /// 优先 `./multienv.toml`，否则 `~/.multienv/multienv.toml`
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from(MANIFEST_FILE);
        if local.exists() {
            return local;
        }
        dirs::home_dir()
            .map(|home| home.join(".multienv").join(MANIFEST_FILE))
            .unwrap_or(local)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 单个环境条目对应的构建器
    pub fn builder_for(
        &self,
        name: &str,
        environment: &EnvironmentManifest,
        catalog: &Arc<ComponentCatalog>,
    ) -> Result<ContextBuilder> {
        let component_ids = environment
            .components
            .iter()
            .map(|component| {
                catalog
                    .find_by_name(component)
                    .map(|definition| definition.id())
                    .ok_or_else(|| {
                        MultiEnvError::Manifest(format!(
                            "environment '{name}': unknown component '{component}'"
                        ))
                    })
            })
            .collect::<Result<Vec<ComponentId>>>()?;

        let mut builder = ContextBuilder::new(Arc::clone(catalog))
            .register_locations(environment.locations.iter().cloned())?
            .register_components(&component_ids)?
            .active_profiles(environment.active_profiles.iter().cloned())?
            .default_profiles(environment.default_profiles.iter().cloned())?
            .include_system_environment(
                environment
                    .system_environment
                    .unwrap_or(self.settings.system_environment),
            );

        for file in &environment.properties_files {
            builder = builder.add_properties_file(self.base_dir.join(file))?;
        }

        if !environment.properties.is_empty() {
            let mut flat = Vec::new();
            flatten_properties("", &environment.properties, &mut flat);
            builder = builder.add_map_property_source(flat);
        }

        Ok(builder)
    }

    /// 每个环境条目一个构建器的注册表
    pub fn to_context(&self, catalog: &Arc<ComponentCatalog>) -> Result<MultiEnvContext> {
        let builders = self
            .environments
            .iter()
            .map(|(name, environment)| {
                Ok((name.clone(), self.builder_for(name, environment, catalog)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MultiEnvContext::new(builders)?.lazy_initialization(self.settings.lazy))
    }
}

/// 嵌套表展开为点分键，非字符串值使用其 TOML 文本
fn flatten_properties(
    prefix: &str,
    table: &BTreeMap<String, toml::Value>,
    out: &mut Vec<(String, String)>,
) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            toml::Value::Table(nested) => {
                let nested: BTreeMap<String, toml::Value> =
                    nested.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                flatten_properties(&full_key, &nested, out);
            }
            toml::Value::String(s) => out.push((full_key, s.clone())),
            other => out.push((full_key, other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::component::ComponentDefinition;
    use crate::test_utils::with_env_vars;
    use serial_test::serial;

    struct Service {
        url: String,
    }

    fn catalog() -> Arc<ComponentCatalog> {
        Arc::new(ComponentCatalog::new().with(ComponentDefinition::new("app::svc", |beans| {
            Ok(Service {
                url: beans.property("db.url")?,
            })
        })))
    }

    const MANIFEST: &str = r#"
[settings]
lazy = false

[environments.dev]
active_profiles = ["local"]
locations = ["app"]

[environments.dev.properties]
db.url = "db://dev"
port = 8080
debug = true

[environments.prod]
components = ["Service"]
properties_files = ["prod.properties"]

[environments.prod.properties]
port = 443
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = MultiEnvManifest::parse(MANIFEST, ".").unwrap();

        assert!(!manifest.settings.lazy);
        assert_eq!(manifest.environments.len(), 2);
        assert_eq!(manifest.environments["dev"].active_profiles, vec!["local"]);
        assert_eq!(manifest.environments["prod"].components, vec!["Service"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = MultiEnvManifest::parse("[environments.dev]\nbogus = 1\n", ".").unwrap_err();
        assert!(matches!(err, MultiEnvError::Manifest(_)));
    }

    #[test]
    fn test_to_context_layers_files_then_inline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("prod.properties"),
            "db.url=db://prod\nport=80\n",
        )
        .unwrap();

        let manifest = MultiEnvManifest::parse(MANIFEST, dir.path()).unwrap();
        let registry = manifest.to_context(&catalog()).unwrap();
        registry.start().unwrap();

        assert_eq!(registry.environment_names(), vec!["dev", "prod"]);
        assert_eq!(registry.get_bean::<Service>("dev").unwrap().url, "db://dev");
        assert_eq!(registry.get_bean::<Service>("prod").unwrap().url, "db://prod");
        assert_eq!(
            registry.get_property("prod", "port").unwrap().as_deref(),
            Some("443")
        );
        assert_eq!(
            registry.get_property("dev", "debug").unwrap().as_deref(),
            Some("true")
        );
    }

    #[test]
    #[serial]
    fn test_system_environment_setting_and_override() {
        let manifest = r#"
[settings]
system_environment = true

[environments.shared]
locations = ["none"]

[environments.isolated]
locations = ["none"]
system_environment = false
"#;

        with_env_vars(&[("MULTIENV_MANIFEST_REGION", "eu-west")], || {
            let registry = MultiEnvManifest::parse(manifest, ".")
                .unwrap()
                .to_context(&catalog())
                .unwrap();
            registry.start().unwrap();

            assert_eq!(
                registry
                    .get_property("shared", "MULTIENV_MANIFEST_REGION")
                    .unwrap()
                    .as_deref(),
                Some("eu-west")
            );
            assert_eq!(
                registry
                    .get_property("shared", "multienv.manifest.region")
                    .unwrap()
                    .as_deref(),
                Some("eu-west")
            );
            assert_eq!(
                registry
                    .get_property("isolated", "MULTIENV_MANIFEST_REGION")
                    .unwrap(),
                None
            );
        });
    }

    #[test]
    #[serial]
    fn test_system_environment_enabled_per_environment() {
        let manifest = r#"
[environments.plain]
locations = ["none"]

[environments.with_env]
locations = ["none"]
system_environment = true

[environments.with_env.properties]
MULTIENV_MANIFEST_REGION = "inline"
"#;

        let vars = [
            ("MULTIENV_MANIFEST_REGION", "eu-west"),
            ("MULTIENV_MANIFEST_ZONE", "b"),
        ];
        with_env_vars(&vars, || {
            let parsed = MultiEnvManifest::parse(manifest, ".").unwrap();
            assert!(!parsed.settings.system_environment);

            let registry = parsed.to_context(&catalog()).unwrap();
            registry.start().unwrap();

            assert_eq!(
                registry
                    .get_property("plain", "MULTIENV_MANIFEST_REGION")
                    .unwrap(),
                None
            );
            // 内联表高于进程环境
            assert_eq!(
                registry
                    .get_property("with_env", "MULTIENV_MANIFEST_REGION")
                    .unwrap()
                    .as_deref(),
                Some("inline")
            );
            assert_eq!(
                registry
                    .get_property("with_env", "MULTIENV_MANIFEST_ZONE")
                    .unwrap()
                    .as_deref(),
                Some("b")
            );
        });
    }

    #[test]
    fn test_unknown_component() {
        let manifest =
            MultiEnvManifest::parse("[environments.dev]\ncomponents = [\"Nope\"]\n", ".").unwrap();
        assert!(matches!(
            manifest.to_context(&catalog()),
            Err(MultiEnvError::Manifest(_))
        ));
    }

    #[test]
    fn test_missing_properties_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = MultiEnvManifest::parse(
            "[environments.dev]\nlocations = [\"app\"]\nproperties_files = [\"nope.properties\"]\n",
            dir.path(),
        )
        .unwrap();

        assert!(matches!(
            manifest.to_context(&catalog()),
            Err(MultiEnvError::PropertiesRead { .. })
        ));
    }

    #[test]
    fn test_load_resolves_relative_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, "[environments.dev]\nlocations = [\"app\"]\n").unwrap();

        let manifest = MultiEnvManifest::load(&path).unwrap();
        assert_eq!(manifest.base_dir(), dir.path());
    }
}
