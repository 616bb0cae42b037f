//! Domain Layer - 核心领域模型
//!
//! - property_source: 按优先级叠加的键值源
//! - environment: profile 与占位符解析
//! - component: 组件标识、定义与组件目录

pub mod component;
pub mod environment;
pub mod property_source;

pub use component::{
    BeanFactory, BeanInstance, ComponentCatalog, ComponentDefinition, ComponentId, Disposable,
};
pub use environment::Environment;
pub use property_source::{
    CompositePropertySource, MapPropertySource, PropertySource, SystemEnvironmentPropertySource,
};
