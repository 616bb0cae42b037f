//! 多环境注册表
//!
//! # 生命周期
//!
//! `NotStarted -> Started -> NotStarted -> ...`，由 [`MultiEnvContext::start`]
//! 与 [`MultiEnvContext::close`] 驱动。两者都在注册表级别的同一把互斥锁下执行：
//! 容器构建期间外部看不到 `started == true`，也看不到清理到一半的缓存。
//!
//! 实例缓存中的条目只在 `started == true` 时存在。
//!
//! 默认（eager）模式下 `start()` 构建全部环境；lazy 模式下 `start()` 只切换
//! 状态，每个环境需通过 [`MultiEnvContext::start_environment_context`] 单独启动，
//! 查询操作从不隐式启动环境。

use crate::application::context_builder::ContextBuilder;
use crate::application::env_context::EnvContext;
use crate::error::{MultiEnvError, Result};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct RegistryState {
    started: bool,
    contexts: HashMap<String, EnvContext>,
}

impl RegistryState {
    fn close_all(&mut self) {
        for (name, context) in self.contexts.iter_mut() {
            tracing::debug!(environment = %name, "closing environment");
            context.close();
        }
        self.contexts.clear();
    }
}

/// 按名称访问的多个独立容器
pub struct MultiEnvContext {
    builders: BTreeMap<String, ContextBuilder>,
    lazy_initialization: bool,
    state: Mutex<RegistryState>,
}

impl MultiEnvContext {
    /// 以 `builders` 的副本创建注册表
    ///
    /// # 错误
    ///
    /// 环境名为空白时返回 [`MultiEnvError::InvalidArgument`]。
    pub fn new<I, K>(builders: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, ContextBuilder)>,
        K: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (name, builder) in builders {
            let name: String = name.into();
            if name.trim().is_empty() {
                return Err(MultiEnvError::InvalidArgument(
                    "environment name cannot be blank".to_string(),
                ));
            }
            map.insert(name, builder);
        }

        Ok(Self {
            builders: map,
            lazy_initialization: false,
            state: Mutex::new(RegistryState::default()),
        })
    }

    /// 按需构建环境，而不是在 `start()` 中全部构建
    #[must_use]
    pub fn lazy_initialization(mut self, lazy: bool) -> Self {
        self.lazy_initialization = lazy;
        self
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy_initialization
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 已注册的环境名（有序）
    pub fn environment_names(&self) -> Vec<String> {
        self.builders.keys().cloned().collect()
    }

    pub fn builder(&self, name: &str) -> Option<&ContextBuilder> {
        self.builders.get(name)
    }

    /// 启动注册表，已启动时不做任何事
    ///
    /// # 错误
    ///
    /// eager 模式下第一个构建失败的环境会中止启动：已构建的容器全部关闭，
    /// 注册表保持未启动状态。
    pub fn start(&self) -> Result<()> {
        let mut state = self.lock_state();
        if state.started {
            return Ok(());
        }

        if !self.lazy_initialization {
            for (name, builder) in &self.builders {
                if state.contexts.contains_key(name) {
                    continue;
                }
                match EnvContext::build(name, builder) {
                    Ok(context) => {
                        state.contexts.insert(name.clone(), context);
                    }
                    Err(e) => {
                        state.close_all();
                        return Err(e);
                    }
                }
            }
        }

        state.started = true;
        tracing::info!(
            environments = self.builders.len(),
            lazy = self.lazy_initialization,
            "multi-environment context started"
        );
        Ok(())
    }

    /// 构建环境 `name`，已在运行时不做任何事
    ///
    /// # 错误
    ///
    /// - 未知名称：[`MultiEnvError::EnvironmentNotFound`]
    /// - 注册表未启动（从未 `start()` 或已 `close()`）：[`MultiEnvError::IllegalState`]
    /// - 该环境的构建错误
    pub fn start_environment_context(&self, name: &str) -> Result<()> {
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| MultiEnvError::EnvironmentNotFound(name.to_string()))?;

        let mut state = self.lock_state();
        if !state.started {
            return Err(MultiEnvError::IllegalState(format!(
                "cannot start environment '{name}': the registry is not started"
            )));
        }
        if state.contexts.contains_key(name) {
            return Ok(());
        }

        let context = EnvContext::build(name, builder)?;
        state.contexts.insert(name.to_string(), context);
        tracing::debug!(environment = %name, "environment started");
        Ok(())
    }

    /// 在运行中的环境 `name` 上执行 `f`
    fn with_context<R>(&self, name: &str, f: impl FnOnce(&EnvContext) -> Result<R>) -> Result<R> {
        if !self.builders.contains_key(name) {
            return Err(MultiEnvError::EnvironmentNotFound(name.to_string()));
        }

        let state = self.lock_state();
        let context = state
            .contexts
            .get(name)
            .ok_or_else(|| MultiEnvError::EnvironmentNotStarted(name.to_string()))?;
        f(context)
    }

    /// 环境 `name` 中类型为 `T` 的 bean
    ///
    /// # 错误
    ///
    /// [`MultiEnvError::EnvironmentNotFound`]、[`MultiEnvError::EnvironmentNotStarted`]
    /// 或 [`MultiEnvError::BeanNotFound`]。
    pub fn get_bean<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.with_context(name, EnvContext::get_bean::<T>)
    }

    /// 环境 `name` 的属性 `key`（已展开占位符）
    pub fn get_property(&self, name: &str, key: &str) -> Result<Option<String>> {
        self.with_context(name, |context| context.environment().get_property(key))
    }

    /// 环境 `name` 的全部属性，按键排序；无法解析的值保留原文
    pub fn properties(&self, name: &str) -> Result<Vec<(String, String)>> {
        self.with_context(name, |context| Ok(context.environment().resolved_properties()))
    }

    /// 环境 `name` 中各 bean 的类型名
    pub fn bean_names(&self, name: &str) -> Result<Vec<String>> {
        self.with_context(name, |context| Ok(context.bean_names()))
    }

    pub fn is_started(&self) -> bool {
        self.lock_state().started
    }

    pub fn is_environment_started(&self, name: &str) -> bool {
        self.lock_state().contexts.contains_key(name)
    }

    /// 关闭所有运行中的环境，回到未启动状态
    ///
    /// 未启动时调用也安全；关闭后可以再次启动。
    pub fn close(&self) {
        let mut state = self.lock_state();
        if !state.started {
            return;
        }

        let closed = state.contexts.len();
        state.close_all();
        state.started = false;
        tracing::info!(environments = closed, "multi-environment context closed");
    }
}

impl Drop for MultiEnvContext {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MultiEnvContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiEnvContext")
            .field("environments", &self.environment_names())
            .field("lazy_initialization", &self.lazy_initialization)
            .field("started", &self.is_started())
            .finish()
    }
}
