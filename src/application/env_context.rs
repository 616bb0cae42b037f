//! 单个运行中的环境

use crate::application::context_builder::ContextBuilder;
use crate::domain::environment::Environment;
use crate::error::{MultiEnvError, Result};
use crate::infrastructure::container::Container;
use std::any::Any;
use std::sync::Arc;

/// 已刷新的容器及其环境名
pub struct EnvContext {
    environment_id: String,
    container: Box<dyn Container>,
}

impl EnvContext {
    pub fn new(environment_id: impl Into<String>, container: Box<dyn Container>) -> Self {
        Self {
            environment_id: environment_id.into(),
            container,
        }
    }

    /// 以 `builder` 构建名为 `environment_id` 的运行环境
    pub fn build(environment_id: &str, builder: &ContextBuilder) -> Result<Self> {
        let container = builder.build_named(environment_id)?;
        Ok(Self::new(environment_id, container))
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub fn environment(&self) -> &Environment {
        self.container.environment()
    }

    pub fn get_bean<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.container.get_bean::<T>().map_err(|e| match e {
            MultiEnvError::BeanNotFound { type_name, .. } => MultiEnvError::BeanNotFound {
                environment: self.environment_id.clone(),
                type_name,
            },
            other => other,
        })
    }

    pub fn bean_names(&self) -> Vec<String> {
        self.container.bean_names()
    }

    pub fn is_active(&self) -> bool {
        self.container.is_active()
    }

    pub fn close(&mut self) {
        self.container.close();
    }
}

impl std::fmt::Debug for EnvContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvContext")
            .field("environment_id", &self.environment_id)
            .field("active", &self.container.is_active())
            .finish()
    }
}
