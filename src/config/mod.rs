//! 配置输入：`.properties` 流与 TOML 清单

pub mod format;
pub mod manifest;

pub use manifest::{EnvironmentManifest, ManifestSettings, MultiEnvManifest};
