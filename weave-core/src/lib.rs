// weave-core: 元数据驱动的组件容器
//
// 提供：
// - 单例和原型作用域
// - 构造方法 / 字段 / 工厂方法注入
// - 按名称、别名、类型查找组件
// - 生命周期管理（init/destroy 回调）与后置处理器
// - 插件机制（例如 AOP）

pub mod component_factory;
pub mod config;
pub mod construction;
pub mod context;
pub mod definition;
pub mod error;
pub mod introspect;
pub mod lifecycle;
pub mod logging;
pub mod object;
pub mod plugin;
pub mod registry;
pub mod scope;
pub mod utils;
pub mod value;

// 重新导出常用类型
pub use component_factory::{ComponentFactory, DefaultComponentFactory};
pub use config::{AopSettings, ContainerSettings, ProxyMode};
pub use construction::ConstructionContext;
pub use context::{ApplicationContext, ApplicationContextBuilder, ShutdownHook};
pub use definition::{
    ComponentDefinition, ComponentReference, InstantiationStrategy, PropertyBinding,
    ValueDescriptor,
};
pub use error::{ContainerError, ContainerResult, MethodError, MethodResult, RegistrationError};
pub use introspect::{
    resolve_overload, ConstructorDescriptor, FieldDescriptor, Introspector, MethodDescriptor,
    ParamType, Signature, TypeBuilder, TypeCatalog, TypeDescriptor, TypeKey, TypeKind,
    TypeSubmission,
};
pub use lifecycle::ComponentPostProcessor;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use object::{FieldAccessError, Managed, Object, ObjectState};
pub use registry::{AliasRegistry, DefinitionRegistry, DefinitionStore};
pub use scope::Scope;
pub use value::{describe_args, same_instance, ObjectRef, Value};

// 导出 inventory，供 submit_plugin! 和类型提交使用
pub use inventory;

// 导出插件相关
pub use plugin::{load_plugins, ContainerPlugin, PluginRegistry, PluginSubmission};

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::component_factory::{ComponentFactory, DefaultComponentFactory};
    pub use crate::config::{ContainerSettings, ProxyMode};
    pub use crate::context::{ApplicationContext, ApplicationContextBuilder};
    pub use crate::definition::{ComponentDefinition, ComponentReference, ValueDescriptor};
    pub use crate::error::{ContainerError, ContainerResult, MethodError, MethodResult};
    pub use crate::introspect::{Introspector, ParamType, TypeCatalog, TypeDescriptor, TypeKey};
    pub use crate::lifecycle::ComponentPostProcessor;
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::object::{Managed, Object, ObjectState};
    pub use crate::plugin::{ContainerPlugin, PluginRegistry};
    pub use crate::registry::{AliasRegistry, DefinitionRegistry};
    pub use crate::scope::Scope;
    pub use crate::utils;
    pub use crate::value::{ObjectRef, Value};
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
