//! 代理策略
//!
//! 两种转发对象：
//! - [`InterfaceProxy`]：实现目标的全部接口，只暴露接口方法
//! - [`SubclassProxy`]：继承目标类型，暴露目标的全部方法
//!
//! 两者都把调用交给 [`AdvisedSupport::dispatch`]，再进入通知链。

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use weave_core::{
    describe_args, ComponentFactory, ContainerError, ContainerResult, FieldAccessError, Managed,
    MethodDescriptor, MethodError, MethodResult, ObjectRef, ProxyMode, TypeDescriptor, Value,
};

use crate::advisor::{AdvisorHandle, PointcutAdvisor};
use crate::chain::AdviceChain;
use crate::joinpoint::JoinPoint;
use crate::support::{advice_of, ADVICE_TYPE};

/// 代理共享的状态：真实对象、匹配到的通知器、所属容器
pub struct AdvisedSupport {
    name: String,
    target: ObjectRef,
    advisors: Vec<AdvisorHandle>,
    /// 行为单元在每次调用时按名称从容器取出
    factory: Weak<dyn ComponentFactory>,
}

impl AdvisedSupport {
    pub fn new(
        name: impl Into<String>,
        target: ObjectRef,
        advisors: Vec<AdvisorHandle>,
        factory: Weak<dyn ComponentFactory>,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            advisors,
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    pub fn advisors(&self) -> &[AdvisorHandle] {
        &self.advisors
    }

    /// 只有切点匹配当前方法的通知器参与本次调用
    pub fn dispatch(&self, method: &MethodDescriptor, args: Vec<Value>) -> MethodResult {
        let target_type = self.target.descriptor();
        let matching: Vec<&AdvisorHandle> = self
            .advisors
            .iter()
            .filter(|advisor| advisor.pointcut().matches_method(method, target_type))
            .collect();

        if matching.is_empty() {
            return self.target.invoke(method.name(), args);
        }

        let factory = self.factory.upgrade().ok_or(MethodError::ContainerDropped)?;
        let advices = matching
            .iter()
            .map(|advisor| {
                let component = factory.get_component(advisor.advice_name())?;
                advice_of(&component).ok_or_else(|| {
                    MethodError::from(ContainerError::TypeMismatch {
                        expected: ADVICE_TYPE.to_string(),
                        found: component.type_key().to_string(),
                    })
                })
            })
            .collect::<Result<Vec<_>, MethodError>>()?;

        tracing::trace!(
            "Invoking {}.{} through {} advice(s)",
            self.name,
            method.name(),
            advices.len()
        );
        let join_point = JoinPoint::new(Arc::clone(&self.target), method.clone(), args);
        AdviceChain::new(join_point, advices).proceed()
    }
}

/// 接口代理
pub struct InterfaceProxy {
    descriptor: Arc<TypeDescriptor>,
    advised: AdvisedSupport,
}

impl InterfaceProxy {
    pub fn new(advised: AdvisedSupport) -> ContainerResult<Self> {
        let target_type = advised.target.descriptor();
        let interfaces = target_type.all_interfaces();
        if interfaces.is_empty() {
            return Err(ContainerError::ProxyCreation {
                name: advised.name.clone(),
                reason: format!("'{}' implements no interfaces", target_type.key()),
            });
        }

        let mut builder = TypeDescriptor::class(format!("$Proxy({})", target_type.key()));
        for iface in &interfaces {
            builder = builder.implements(iface);
        }
        Ok(Self {
            descriptor: builder.build(),
            advised,
        })
    }
}

impl Managed for InterfaceProxy {
    fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    fn invoke(&self, method: &str, args: Vec<Value>) -> MethodResult {
        let declared = self
            .descriptor
            .resolve_method(method, &args)
            .ok_or_else(|| MethodError::NoSuchMethod {
                type_name: self.descriptor.key().to_string(),
                method: method.to_string(),
                args: describe_args(&args),
            })?;
        // 匹配和连接点使用目标上的具体实现
        let resolved = self
            .advised
            .target
            .descriptor()
            .resolve_method(method, &args)
            .unwrap_or(declared)
            .clone();
        self.advised.dispatch(&resolved, args)
    }

    fn field(&self, _name: &str) -> Option<Value> {
        None
    }

    fn set_field(&self, _name: &str, _value: Value) -> Result<(), FieldAccessError> {
        Err(FieldAccessError::ReadOnly(self.descriptor.key().to_string()))
    }

    fn native_any(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.advised.target.native_any()
    }

    fn proxied_target(&self) -> Option<ObjectRef> {
        Some(Arc::clone(&self.advised.target))
    }
}

/// 子类代理
///
/// 代理自身是一个由目标构造方法（无参或重放记录的实参）生成的外壳，
/// 字段和原生数据读写的是外壳；方法调用转发给真实对象。
pub struct SubclassProxy {
    descriptor: Arc<TypeDescriptor>,
    shell: ObjectRef,
    advised: AdvisedSupport,
}

impl SubclassProxy {
    pub fn new(
        advised: AdvisedSupport,
        recorded_args: Option<Vec<Value>>,
    ) -> ContainerResult<Self> {
        let target_type = Arc::clone(advised.target.descriptor());
        let args = recorded_args.unwrap_or_default();
        let index = target_type
            .resolve_constructor(&args)
            .ok_or_else(|| ContainerError::ProxyCreation {
                name: advised.name.clone(),
                reason: format!(
                    "'{}' has no constructor accepting ({})",
                    target_type.key(),
                    describe_args(&args)
                ),
            })?;
        let shell = target_type
            .new_instance(index, &args)
            .map_err(|e| ContainerError::ProxyCreation {
                name: advised.name.clone(),
                reason: e.to_string(),
            })?;

        let descriptor = TypeDescriptor::class(format!("{}$$Proxy", target_type.key()))
            .extends(&target_type)
            .build();
        Ok(Self {
            descriptor,
            shell,
            advised,
        })
    }
}

impl Managed for SubclassProxy {
    fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    fn invoke(&self, method: &str, args: Vec<Value>) -> MethodResult {
        let resolved = self
            .descriptor
            .resolve_method(method, &args)
            .ok_or_else(|| MethodError::NoSuchMethod {
                type_name: self.descriptor.key().to_string(),
                method: method.to_string(),
                args: describe_args(&args),
            })?
            .clone();
        if resolved.is_static() {
            return resolved.call(None, &args);
        }
        self.advised.dispatch(&resolved, args)
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.shell.field(name)
    }

    fn set_field(&self, name: &str, value: Value) -> Result<(), FieldAccessError> {
        self.shell.set_field(name, value)
    }

    fn native_any(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.shell.native_any()
    }

    fn proxied_target(&self) -> Option<ObjectRef> {
        Some(Arc::clone(&self.advised.target))
    }
}

/// 代理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStrategy {
    Interface,
    Subclass,
}

impl ProxyStrategy {
    /// 按设置选择策略；`InterfacesOnly` 且目标没有接口时返回 `None`
    pub fn select(mode: ProxyMode, target: &TypeDescriptor) -> Option<Self> {
        let has_interfaces = !target.all_interfaces().is_empty();
        match mode {
            ProxyMode::Auto if has_interfaces => Some(ProxyStrategy::Interface),
            ProxyMode::Auto => Some(ProxyStrategy::Subclass),
            ProxyMode::TargetType => Some(ProxyStrategy::Subclass),
            ProxyMode::InterfacesOnly if has_interfaces => Some(ProxyStrategy::Interface),
            ProxyMode::InterfacesOnly => None,
        }
    }
}

/// 创建好的代理
#[derive(Clone)]
pub struct ProxyHandle {
    strategy: ProxyStrategy,
    proxy: ObjectRef,
}

impl ProxyHandle {
    pub fn strategy(&self) -> ProxyStrategy {
        self.strategy
    }

    pub fn get_proxy(&self) -> ObjectRef {
        Arc::clone(&self.proxy)
    }
}

impl fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("strategy", &self.strategy)
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// 代理工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyFactory {
    mode: ProxyMode,
}

impl ProxyFactory {
    pub fn new(mode: ProxyMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ProxyMode {
        self.mode
    }

    pub fn create_proxy(
        &self,
        instance: ObjectRef,
        name: &str,
        advisors: Vec<AdvisorHandle>,
        factory: &Weak<dyn ComponentFactory>,
    ) -> ContainerResult<ProxyHandle> {
        let strategy = ProxyStrategy::select(self.mode, instance.descriptor()).ok_or_else(|| {
            ContainerError::ProxyCreation {
                name: name.to_string(),
                reason: format!(
                    "interface proxies are required but '{}' implements no interfaces",
                    instance.type_key()
                ),
            }
        })?;

        let recorded = match strategy {
            ProxyStrategy::Subclass => recorded_args(factory, name, &instance),
            ProxyStrategy::Interface => None,
        };
        let advised = AdvisedSupport::new(name, instance, advisors, Weak::clone(factory));
        let proxy: ObjectRef = match strategy {
            ProxyStrategy::Interface => Arc::new(InterfaceProxy::new(advised)?),
            ProxyStrategy::Subclass => Arc::new(SubclassProxy::new(advised, recorded)?),
        };

        tracing::debug!(
            "Created {:?} proxy for component '{}' ({})",
            strategy,
            name,
            proxy.type_key()
        );
        Ok(ProxyHandle { strategy, proxy })
    }
}

/// 定义记录的构造实参；实例不是由该定义的类型构造出来时不使用
fn recorded_args(
    factory: &Weak<dyn ComponentFactory>,
    name: &str,
    instance: &ObjectRef,
) -> Option<Vec<Value>> {
    let factory = factory.upgrade()?;
    let definition = factory.definition(name)?;
    if definition.type_key() != Some(instance.type_key()) {
        return None;
    }
    definition.recorded_args()
}
