//! multienv - 多环境依赖注入容器注册表
//!
//! 多个独立配置的容器，各自拥有 profile 与属性叠加层，通过环境名统一访问。
//!
//! 分层结构：
//! - domain: 属性源、环境、组件定义
//! - infrastructure: 容器实现
//! - application: 构建器、单环境与注册表
//! - config: `.properties` 解析与 TOML 清单

pub mod error;

pub mod domain;

pub mod infrastructure;

pub mod application;

pub mod config;

pub mod cli;

#[cfg(test)]
mod test_utils;

pub use application::{ContextBuilder, EnvContext, MultiEnvContext};
pub use config::MultiEnvManifest;
pub use domain::{
    BeanFactory, ComponentCatalog, ComponentDefinition, ComponentId, CompositePropertySource,
    Disposable, Environment, MapPropertySource, PropertySource, SystemEnvironmentPropertySource,
};
pub use error::{MultiEnvError, Result};
pub use infrastructure::{Container, GenericContainer};
