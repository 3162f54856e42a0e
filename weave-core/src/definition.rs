//! 组件定义
//!
//! 描述如何生产一个组件的纯数据：类型或工厂、作用域、构造参数、属性绑定、
//! 生命周期钩子。除两个惰性解析缓存外，注册后不可变。

use std::fmt;

use parking_lot::RwLock;

use crate::introspect::{MethodDescriptor, TypeKey};
use crate::scope::Scope;
use crate::value::Value;

/// 对另一个组件的引用，在构造时才解析
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentReference {
    ByName(String),
    /// 按类型解析；没有候选时得到 `Null`
    ByType(TypeKey),
}

/// 值描述
#[derive(Debug, Clone, PartialEq)]
pub enum ValueDescriptor {
    Literal(Value),
    Reference(ComponentReference),
    List(Vec<ValueDescriptor>),
    Set(Vec<ValueDescriptor>),
    Map(Vec<(ValueDescriptor, ValueDescriptor)>),
}

impl ValueDescriptor {
    pub fn literal(value: impl Into<Value>) -> Self {
        ValueDescriptor::Literal(value.into())
    }

    /// 按名称引用组件
    pub fn reference(name: impl Into<String>) -> Self {
        ValueDescriptor::Reference(ComponentReference::ByName(name.into()))
    }

    /// 按类型引用组件
    pub fn reference_type(key: impl Into<TypeKey>) -> Self {
        ValueDescriptor::Reference(ComponentReference::ByType(key.into()))
    }

    /// 递归收集按名称引用的组件
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            ValueDescriptor::Literal(_) => {}
            ValueDescriptor::Reference(ComponentReference::ByName(name)) => names.push(name),
            ValueDescriptor::Reference(ComponentReference::ByType(_)) => {}
            ValueDescriptor::List(items) | ValueDescriptor::Set(items) => {
                for item in items {
                    item.collect_names(names);
                }
            }
            ValueDescriptor::Map(entries) => {
                for (key, value) in entries {
                    key.collect_names(names);
                    value.collect_names(names);
                }
            }
        }
    }
}

impl From<Value> for ValueDescriptor {
    fn from(value: Value) -> Self {
        ValueDescriptor::Literal(value)
    }
}

impl From<ComponentReference> for ValueDescriptor {
    fn from(reference: ComponentReference) -> Self {
        ValueDescriptor::Reference(reference)
    }
}

/// 属性绑定：字段名 + 值描述
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBinding {
    pub name: String,
    pub value: ValueDescriptor,
}

/// 实例化策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstantiationStrategy {
    /// 声明类型 + 构造方法
    Constructor,
    /// 声明类型上的静态工厂方法
    StaticFactory,
    /// 另一个组件上的工厂方法
    InstanceFactory,
}

/// 已解析的构造方法 / 工厂方法
#[derive(Debug, Clone)]
pub enum ResolvedHandle {
    /// 构造方法在声明类型中的序号
    Constructor(usize),
    FactoryMethod(MethodDescriptor),
}

/// 组件定义
#[derive(Default)]
pub struct ComponentDefinition {
    type_key: Option<TypeKey>,
    scope: Scope,
    factory_component: Option<String>,
    factory_method: Option<String>,
    init_method: Option<String>,
    destroy_method: Option<String>,
    constructor_args: Vec<ValueDescriptor>,
    properties: Vec<PropertyBinding>,
    primary: bool,

    resolved_handle: RwLock<Option<ResolvedHandle>>,
    resolved_args: RwLock<Option<Vec<Value>>>,
}

impl ComponentDefinition {
    /// 由声明类型的构造方法生产
    pub fn of_type(key: impl Into<TypeKey>) -> Self {
        Self {
            type_key: Some(key.into()),
            ..Self::default()
        }
    }

    /// 由另一个组件的工厂方法生产
    pub fn from_factory(component: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            factory_component: Some(component.into()),
            factory_method: Some(method.into()),
            ..Self::default()
        }
    }

    /// 设置工厂方法；没有工厂组件时是声明类型上的静态方法
    pub fn factory_method(mut self, method: impl Into<String>) -> Self {
        self.factory_method = Some(method.into());
        self
    }

    pub fn with_factory_component(mut self, component: impl Into<String>) -> Self {
        self.factory_component = Some(component.into());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_constructor_arg(mut self, arg: impl Into<ValueDescriptor>) -> Self {
        self.constructor_args.push(arg.into());
        self
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<ValueDescriptor>,
    ) -> Self {
        self.properties.push(PropertyBinding {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_init_method(mut self, method: impl Into<String>) -> Self {
        self.init_method = Some(method.into());
        self
    }

    pub fn with_destroy_method(mut self, method: impl Into<String>) -> Self {
        self.destroy_method = Some(method.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn type_key(&self) -> Option<&TypeKey> {
        self.type_key.as_ref()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_singleton(&self) -> bool {
        self.scope.is_singleton()
    }

    pub fn is_prototype(&self) -> bool {
        self.scope.is_prototype()
    }

    pub fn factory_component(&self) -> Option<&str> {
        self.factory_component.as_deref()
    }

    pub fn factory_method_name(&self) -> Option<&str> {
        self.factory_method.as_deref()
    }

    pub fn init_method(&self) -> Option<&str> {
        self.init_method.as_deref()
    }

    pub fn destroy_method(&self) -> Option<&str> {
        self.destroy_method.as_deref()
    }

    pub fn constructor_args(&self) -> &[ValueDescriptor] {
        &self.constructor_args
    }

    pub fn properties(&self) -> &[PropertyBinding] {
        &self.properties
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// 声明类型与（工厂组件, 工厂方法）二者恰好其一
    pub fn validate(&self) -> Result<(), &'static str> {
        match (&self.type_key, &self.factory_component, &self.factory_method) {
            (Some(_), Some(_), _) => Err("declares both a type and a factory component"),
            (Some(_), None, _) => Ok(()),
            (None, Some(_), Some(_)) => Ok(()),
            (None, Some(_), None) => Err("factory component given without a factory method"),
            (None, None, _) => Err("neither a type nor a factory component is declared"),
        }
    }

    pub fn strategy(&self) -> InstantiationStrategy {
        match (&self.type_key, &self.factory_method) {
            (None, _) => InstantiationStrategy::InstanceFactory,
            (Some(_), Some(_)) => InstantiationStrategy::StaticFactory,
            (Some(_), None) => InstantiationStrategy::Constructor,
        }
    }

    /// 构造参数和工厂组件中按名称引用的组件
    pub fn construction_dependencies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .constructor_args
            .iter()
            .flat_map(|arg| arg.referenced_names())
            .collect();
        if let Some(factory) = &self.factory_component {
            names.push(factory);
        }
        names
    }

    pub fn cached_handle(&self) -> Option<ResolvedHandle> {
        self.resolved_handle.read().clone()
    }

    pub fn cache_handle(&self, handle: ResolvedHandle) {
        *self.resolved_handle.write() = Some(handle);
    }

    /// 最近一次构造使用的实参
    pub fn recorded_args(&self) -> Option<Vec<Value>> {
        self.resolved_args.read().clone()
    }

    pub fn record_args(&self, args: Vec<Value>) {
        *self.resolved_args.write() = Some(args);
    }
}

impl Clone for ComponentDefinition {
    /// 复制元数据，解析缓存从空开始
    fn clone(&self) -> Self {
        Self {
            type_key: self.type_key.clone(),
            scope: self.scope,
            factory_component: self.factory_component.clone(),
            factory_method: self.factory_method.clone(),
            init_method: self.init_method.clone(),
            destroy_method: self.destroy_method.clone(),
            constructor_args: self.constructor_args.clone(),
            properties: self.properties.clone(),
            primary: self.primary,
            resolved_handle: RwLock::new(None),
            resolved_args: RwLock::new(None),
        }
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("type_key", &self.type_key)
            .field("scope", &self.scope)
            .field("factory_component", &self.factory_component)
            .field("factory_method", &self.factory_method)
            .field("init_method", &self.init_method)
            .field("destroy_method", &self.destroy_method)
            .field("constructor_args", &self.constructor_args)
            .field("properties", &self.properties)
            .field("primary", &self.primary)
            .finish()
    }
}
