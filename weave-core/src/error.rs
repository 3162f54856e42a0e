//! 统一的错误类型
//!
//! 错误分为三类：
//! - [`RegistrationError`]：注册阶段（定义、别名）的错误，总是直接返回给调用方
//! - [`ContainerError`]：解析 / 创建组件时的错误，由触发的 `get_component` 调用返回
//! - [`MethodError`]：组件方法调用时抛出的错误，沿通知链原样传播
//!
//! 框架边界处可以通过 [`ContainerError::Other`] 接收任意 `anyhow::Error`。

use thiserror::Error;

/// 注册错误
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("component name must not be blank")]
    BlankName,

    #[error("invalid definition for component '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("component '{name}' is already registered")]
    Duplicate { name: String },

    #[error("invalid alias '{alias}' for '{name}': {reason}")]
    InvalidAlias {
        name: String,
        alias: String,
        reason: String,
    },
}

/// 容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("no component named '{0}' is defined")]
    NotFound(String),

    #[error("circular dependency detected: {chain}")]
    CircularDependency { name: String, chain: String },

    #[error("type '{0}' is not known to the introspector")]
    UnknownType(String),

    #[error("no constructor of '{type_name}' accepts ({args})")]
    NoMatchingConstructor { type_name: String, args: String },

    #[error("no factory method '{method}' on '{type_name}' accepts ({args})")]
    NoMatchingFactoryMethod {
        type_name: String,
        method: String,
        args: String,
    },

    #[error(
        "{} components of type '{type_name}' found but none is primary: {}",
        .candidates.len(),
        .candidates.join(", ")
    )]
    NoPrimary {
        type_name: String,
        candidates: Vec<String>,
    },

    #[error("more than one primary component of type '{type_name}': {}", .primaries.join(", "))]
    MultiplePrimary {
        type_name: String,
        primaries: Vec<String>,
    },

    #[error("cannot inject field '{field}' of component '{name}': {reason}")]
    FieldInjection {
        name: String,
        field: String,
        reason: String,
    },

    #[error("failed to create component '{name}'")]
    CreationFailed {
        name: String,
        #[source]
        source: MethodError,
    },

    #[error("lifecycle hook '{hook}' of component '{name}' failed")]
    LifecycleHook {
        name: String,
        hook: String,
        #[source]
        source: MethodError,
    },

    #[error("cannot create proxy for component '{name}': {reason}")]
    ProxyCreation { name: String, reason: String },

    #[error("type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error("dependency validation failed: {0}")]
    DependencyValidationFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 容器操作的结果类型
pub type ContainerResult<T> = Result<T, ContainerError>;

/// 方法调用错误
///
/// `Raised` 对应组件代码主动抛出的业务错误，其余变体由运行时产生。
#[derive(Debug, Error)]
pub enum MethodError {
    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },

    #[error("no method '{method}' on '{type_name}' accepts ({args})")]
    NoSuchMethod {
        type_name: String,
        method: String,
        args: String,
    },

    #[error("method '{method}' of '{type_name}' has no implementation")]
    Abstract { type_name: String, method: String },

    #[error("component lookup failed during invocation")]
    Container(#[source] Box<ContainerError>),

    #[error("the owning container has been dropped")]
    ContainerDropped,
}

impl MethodError {
    /// 创建业务错误
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// 业务错误的类别（非业务错误返回 `None`）
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Raised { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl From<ContainerError> for MethodError {
    fn from(error: ContainerError) -> Self {
        Self::Container(Box::new(error))
    }
}

/// 方法调用的结果类型
pub type MethodResult = Result<crate::Value, MethodError>;
