//! 错误处理模块
//!
//! 所有错误都直接返回给调用方，不重试，也不会只记录日志后吞掉。

use miette::Diagnostic;
use std::error::Error as _;
use thiserror::Error;

/// 全局 Result 类型
pub type Result<T> = std::result::Result<T, MultiEnvError>;

#[derive(Error, Debug, Diagnostic)]
pub enum MultiEnvError {
    // === 参数校验 ===
    #[error("invalid argument: {0}")]
    #[diagnostic(code(multienv::invalid_argument))]
    InvalidArgument(String),

    // === 配置状态 ===
    #[error("illegal state: {0}")]
    #[diagnostic(code(multienv::illegal_state))]
    IllegalState(String),

    // === 查询 ===
    #[error("environment not found: {0}")]
    #[diagnostic(
        code(multienv::environment_not_found),
        help("use `multienv envs` to list the registered environments")
    )]
    EnvironmentNotFound(String),

    #[error("environment '{0}' has not been started")]
    #[diagnostic(
        code(multienv::environment_not_started),
        help("call start() in eager mode or start_environment_context() in lazy mode first")
    )]
    EnvironmentNotStarted(String),

    #[error("no bean of type {type_name} in environment '{environment}'")]
    #[diagnostic(code(multienv::bean_not_found))]
    BeanNotFound {
        environment: String,
        type_name: String,
    },

    #[error("property not found: {0}")]
    #[diagnostic(code(multienv::property_not_found))]
    PropertyNotFound(String),

    // === I/O ===
    #[error("error reading properties from {origin}")]
    #[diagnostic(code(multienv::properties_read))]
    PropertiesRead {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    // === 解析 ===
    #[error("parse error: {0}")]
    #[diagnostic(code(multienv::parse))]
    Parse(String),

    #[error("manifest error: {0}")]
    #[diagnostic(code(multienv::manifest))]
    Manifest(String),

    #[error("circular placeholder reference in '{0}'")]
    #[diagnostic(code(multienv::circular_placeholder))]
    CircularPlaceholder(String),

    // === 容器 ===
    #[error("failed to create bean {type_name}: {reason}")]
    #[diagnostic(code(multienv::bean_creation))]
    BeanCreation { type_name: String, reason: String },
}

impl MultiEnvError {
    /// 包装读取 properties 流时的 I/O 错误
    pub fn properties_read(origin: impl Into<String>, source: std::io::Error) -> Self {
        MultiEnvError::PropertiesRead {
            origin: origin.into(),
            source,
        }
    }

    /// 是否为查询类错误（环境、bean 或属性不存在）
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            MultiEnvError::EnvironmentNotFound(_)
                | MultiEnvError::EnvironmentNotStarted(_)
                | MultiEnvError::BeanNotFound { .. }
                | MultiEnvError::PropertyNotFound(_)
        )
    }

    /// 在命令行输出错误
    ///
    /// verbose = true 时输出完整的错误链。
    pub fn report(&self, verbose: bool) {
        eprintln!("error: {self}");
        if !verbose {
            return;
        }

        let mut current = self.source();
        while let Some(cause) = current {
            eprintln!("  caused by: {cause}");
            current = cause.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_classification() {
        assert!(MultiEnvError::EnvironmentNotFound("dev".into()).is_lookup());
        assert!(
            MultiEnvError::BeanNotFound {
                environment: "dev".into(),
                type_name: "Foo".into(),
            }
            .is_lookup()
        );
        assert!(!MultiEnvError::IllegalState("x".into()).is_lookup());
    }

    #[test]
    fn test_properties_read_keeps_cause() {
        let err = MultiEnvError::properties_read(
            "stream",
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "closed"),
        );
        assert_eq!(err.to_string(), "error reading properties from stream");
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("closed"));
    }
}
