//! 测试辅助工具
//!
//! 修改进程环境变量的测试通过 [`EnvGuard`] 还原现场，且必须标注 `#[serial]`。

use std::cell::RefCell;
use std::env;
use std::ffi::OsString;

/// 记录被修改的变量，drop 时逐个还原
#[derive(Default)]
pub struct EnvGuard {
    // (变量名, 第一次修改前的值)
    touched: RefCell<Vec<(String, Option<OsString>)>>,
}

impl EnvGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn remember(&self, key: &str) {
        let mut touched = self.touched.borrow_mut();
        if !touched.iter().any(|(k, _)| k == key) {
            touched.push((key.to_string(), env::var_os(key)));
        }
    }

    pub fn set_var(&self, key: &str, value: &str) {
        self.remember(key);
        // SAFETY: 调用方以 #[serial] 串行执行
        unsafe { env::set_var(key, value) }
    }

    pub fn remove_var(&self, key: &str) {
        self.remember(key);
        // SAFETY: 同上
        unsafe { env::remove_var(key) }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, previous) in self.touched.get_mut().drain(..).rev() {
            // SAFETY: 同上
            unsafe {
                match previous {
                    Some(value) => env::set_var(&key, value),
                    None => env::remove_var(&key),
                }
            }
        }
    }
}

/// 临时设置 `vars` 后执行 `f`，结束时还原
pub fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let guard = EnvGuard::new();
    for (key, value) in vars {
        guard.set_var(key, value);
    }
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_guard_cleanup() {
        {
            let guard = EnvGuard::new();
            guard.set_var("MULTIENV_GUARD_VAR", "value");
            assert_eq!(env::var("MULTIENV_GUARD_VAR").as_deref(), Ok("value"));
        }
        assert!(env::var("MULTIENV_GUARD_VAR").is_err());
    }

    #[test]
    #[serial]
    fn test_env_guard_restores_previous_value() {
        let outer = EnvGuard::new();
        outer.set_var("MULTIENV_GUARD_KEEP", "before");
        {
            let guard = EnvGuard::new();
            guard.set_var("MULTIENV_GUARD_KEEP", "first");
            guard.set_var("MULTIENV_GUARD_KEEP", "second");
            guard.remove_var("MULTIENV_GUARD_KEEP");
        }
        assert_eq!(env::var("MULTIENV_GUARD_KEEP").as_deref(), Ok("before"));
    }

    #[test]
    #[serial]
    fn test_with_env_vars() {
        with_env_vars(&[("MULTIENV_TEST_VAR1", "value1")], || {
            assert_eq!(env::var("MULTIENV_TEST_VAR1").as_deref(), Ok("value1"));
        });
        assert!(env::var("MULTIENV_TEST_VAR1").is_err());
    }
}
