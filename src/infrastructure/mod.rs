//! Infrastructure Layer - 技术实现
//!
//! - container: 进程内依赖注入容器

pub mod container;

pub use container::{Container, GenericContainer};
