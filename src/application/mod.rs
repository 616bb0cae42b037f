//! Application Layer - 应用服务
//!
//! - context_builder: 不可变的容器配置
//! - env_context: 单个运行中的环境
//! - multi_env: 命名环境注册表

pub mod context_builder;
pub mod env_context;
pub mod multi_env;

pub use context_builder::ContextBuilder;
pub use env_context::EnvContext;
pub use multi_env::MultiEnvContext;
