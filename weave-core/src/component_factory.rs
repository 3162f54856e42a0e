//! Component Factory - 核心容器
//!
//! 把注册表中的定义解析成存活的组件：解析构造参数、选择构造方法或工厂方法、
//! 缓存单例、提前暴露半成品以打破字段循环依赖、执行字段注入和生命周期钩子。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};

use crate::construction::ConstructionContext;
use crate::definition::{
    ComponentDefinition, ComponentReference, InstantiationStrategy, ResolvedHandle, ValueDescriptor,
};
use crate::error::{ContainerError, ContainerResult, RegistrationError};
use crate::introspect::{
    resolve_overload, Introspector, MethodDescriptor, ParamType, TypeDescriptor, TypeKey,
};
use crate::lifecycle::ComponentPostProcessor;
use crate::registry::{AliasRegistry, DefinitionRegistry, DefinitionStore};
use crate::utils::dependency::validate_dependency_graph;
use crate::utils::naming::generated_component_name;
use crate::value::{describe_args, ObjectRef, Value};

/// ComponentFactory - 组件查找接口
///
/// 不含泛型方法，可以作为 trait object 使用
pub trait ComponentFactory: Send + Sync {
    /// 通过名称（或别名）获取组件
    fn get_component(&self, name: &str) -> ContainerResult<ObjectRef>;

    /// 通过类型获取组件
    ///
    /// 没有候选时返回 `None`；多个候选时取唯一的 primary。
    fn get_component_by_type(&self, key: &TypeKey) -> ContainerResult<Option<ObjectRef>>;

    /// 某类型的全部组件，按名称排序
    fn get_components_of_type(&self, key: &TypeKey) -> ContainerResult<BTreeMap<String, ObjectRef>>;

    fn get_components_of_type_list(&self, key: &TypeKey) -> ContainerResult<Vec<ObjectRef>> {
        Ok(self.get_components_of_type(key)?.into_values().collect())
    }

    fn contains_component(&self, name: &str) -> bool;

    /// 组件生产出的类型
    fn get_type(&self, name: &str) -> Option<TypeKey>;

    fn definition(&self, name: &str) -> Option<Arc<ComponentDefinition>>;

    /// 持有单例创建锁
    ///
    /// 扩展组件若有自己的锁，并且持锁期间会查找组件，必须先取得这个守卫，
    /// 与容器保持相同的加锁顺序。没有创建锁的实现返回 `None`。
    fn creation_guard(&self) -> Option<ReentrantMutexGuard<'_, ()>> {
        None
    }
}

/// ComponentFactory 的默认实现
pub struct DefaultComponentFactory {
    introspector: Arc<dyn Introspector>,

    /// 定义、别名和类型索引
    store: DefinitionStore,

    /// 单例缓存
    singletons: RwLock<HashMap<String, ObjectRef>>,

    /// 首次创建单例时持有的粗粒度锁，可重入以支持嵌套解析
    creation_lock: ReentrantMutex<()>,

    /// 后置处理器（按 order 排序）
    post_processors: RwLock<Vec<Arc<dyn ComponentPostProcessor>>>,
}

impl DefaultComponentFactory {
    pub fn new(introspector: Arc<dyn Introspector>) -> Self {
        Self {
            introspector,
            store: DefinitionStore::new(),
            singletons: RwLock::new(HashMap::new()),
            creation_lock: ReentrantMutex::new(()),
            post_processors: RwLock::new(Vec::new()),
        }
    }

    pub fn introspector(&self) -> &Arc<dyn Introspector> {
        &self.introspector
    }

    /// 以类型简单名称的 camelCase 作为名称注册
    pub fn register_with_generated_name(
        &self,
        definition: ComponentDefinition,
    ) -> Result<String, RegistrationError> {
        let name = definition
            .type_key()
            .map(generated_component_name)
            .ok_or_else(|| RegistrationError::InvalidDefinition {
                name: String::new(),
                reason: "a name can only be generated for a declared type".to_string(),
            })?;
        self.register_definition(&name, definition)?;
        Ok(name)
    }

    /// 添加后置处理器
    pub fn add_post_processor(&self, processor: Arc<dyn ComponentPostProcessor>) {
        tracing::debug!(
            "Adding post processor '{}' (order {})",
            processor.name(),
            processor.order()
        );
        let mut processors = self.post_processors.write();
        processors.push(processor);
        processors.sort_by_key(|p| p.order());
    }

    pub fn post_processors(&self) -> Vec<Arc<dyn ComponentPostProcessor>> {
        self.post_processors.read().clone()
    }

    /// 构建类型索引
    ///
    /// 每个定义按其生产类型、所有父类型和传递实现的接口建立索引。重复调用会
    /// 重新计算整个索引。
    pub fn build_type_index(&self) {
        let mut index: HashMap<TypeKey, BTreeSet<String>> = HashMap::new();
        for name in self.store.definition_names() {
            let Some(key) = self.get_type(&name) else {
                tracing::debug!("Type of component '{}' cannot be determined, not indexed", name);
                continue;
            };
            let closure = self
                .introspector
                .describe(&key)
                .map(|descriptor| descriptor.type_closure())
                .unwrap_or_else(|| vec![key.clone()]);
            for ty in closure {
                index.entry(ty).or_default().insert(name.clone());
            }
        }
        tracing::debug!("Type index built with {} types", index.len());
        self.store.replace_type_index(index);
    }

    /// 按类型查找的候选名称（来自类型索引）
    pub fn names_for_type(&self, key: &TypeKey) -> Vec<String> {
        self.store.names_for_type(key)
    }

    /// 在给定的构造上下文中获取组件
    pub fn get_component_in(
        &self,
        name: &str,
        ctx: &mut ConstructionContext,
    ) -> ContainerResult<ObjectRef> {
        let name = self.store.canonical_name(name);
        tracing::trace!("Requesting component: '{}'", name);

        if let Some(component) = self.singletons.read().get(&name) {
            tracing::trace!("Returning cached instance of singleton component '{}'", name);
            return Ok(Arc::clone(component));
        }

        if let Some(early) = ctx.early_reference(&name) {
            tracing::debug!("Returning early reference to component '{}'", name);
            return Ok(early);
        }

        let definition = self.store.get_definition(&name).ok_or_else(|| {
            tracing::debug!("Component '{}' not found in container", name);
            ContainerError::NotFound(name.clone())
        })?;

        if definition.is_singleton() {
            let _guard = self.creation_lock.lock();
            if let Some(component) = self.singletons.read().get(&name) {
                return Ok(Arc::clone(component));
            }

            tracing::debug!("Creating shared instance of singleton component '{}'", name);
            let component = self.build(&name, &definition, ctx)?;
            self.singletons
                .write()
                .insert(name.clone(), Arc::clone(&component));
            tracing::debug!("Singleton component '{}' created and cached", name);
            Ok(component)
        } else {
            tracing::debug!("Creating new instance of prototype component '{}'", name);
            self.build(&name, &definition, ctx)
        }
    }

    /// 在给定的构造上下文中按类型获取组件
    pub fn get_component_by_type_in(
        &self,
        key: &TypeKey,
        ctx: &mut ConstructionContext,
    ) -> ContainerResult<Option<ObjectRef>> {
        let names = self.store.names_for_type(key);
        match names.len() {
            0 => Ok(None),
            1 => self.get_component_in(&names[0], ctx).map(Some),
            _ => {
                let primaries: Vec<String> = names
                    .iter()
                    .filter(|name| {
                        self.store
                            .get_definition(name)
                            .map(|d| d.is_primary())
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect();
                match primaries.len() {
                    1 => self.get_component_in(&primaries[0], ctx).map(Some),
                    0 => Err(ContainerError::NoPrimary {
                        type_name: key.to_string(),
                        candidates: names,
                    }),
                    _ => Err(ContainerError::MultiplePrimary {
                        type_name: key.to_string(),
                        primaries,
                    }),
                }
            }
        }
    }

    fn build(
        &self,
        name: &str,
        definition: &ComponentDefinition,
        ctx: &mut ConstructionContext,
    ) -> ContainerResult<ObjectRef> {
        ctx.begin(name)?;
        let result = self.create_component(name, definition, ctx);
        ctx.retract_early(name);
        ctx.finish(name);
        result
    }

    fn create_component(
        &self,
        name: &str,
        definition: &ComponentDefinition,
        ctx: &mut ConstructionContext,
    ) -> ContainerResult<ObjectRef> {
        // 1. 实例化
        let raw = self.instantiate(name, definition, ctx)?;

        // 2. 提前暴露，然后字段注入
        ctx.expose_early(name, Arc::clone(&raw));
        self.inject_properties(name, definition, &raw, ctx)?;
        ctx.retract_early(name);

        // 3. before_initialization -> init -> after_initialization
        let mut component = self.apply_before_initialization(raw, name)?;
        if let Some(init) = definition.init_method() {
            tracing::debug!("Invoking init method '{}' on component '{}'", init, name);
            component
                .invoke(init, Vec::new())
                .map_err(|source| ContainerError::LifecycleHook {
                    name: name.to_string(),
                    hook: init.to_string(),
                    source,
                })?;
        }
        component = self.apply_after_initialization(component, name)?;
        Ok(component)
    }

    fn instantiate(
        &self,
        name: &str,
        definition: &ComponentDefinition,
        ctx: &mut ConstructionContext,
    ) -> ContainerResult<ObjectRef> {
        match definition.strategy() {
            InstantiationStrategy::Constructor => {
                let descriptor = self.declared_descriptor(definition)?;
                let args = self.resolve_values(definition.constructor_args(), ctx)?;
                let index = match definition.cached_handle() {
                    Some(ResolvedHandle::Constructor(index)) => index,
                    _ => {
                        let index = descriptor.resolve_constructor(&args).ok_or_else(|| {
                            ContainerError::NoMatchingConstructor {
                                type_name: descriptor.key().to_string(),
                                args: describe_args(&args),
                            }
                        })?;
                        if definition.is_prototype() {
                            definition.cache_handle(ResolvedHandle::Constructor(index));
                        }
                        index
                    }
                };
                let instance = descriptor
                    .new_instance(index, &args)
                    .map_err(|source| ContainerError::CreationFailed {
                        name: name.to_string(),
                        source,
                    })?;
                definition.record_args(args);
                Ok(instance)
            }
            InstantiationStrategy::StaticFactory => {
                let descriptor = self.declared_descriptor(definition)?;
                let args = self.resolve_values(definition.constructor_args(), ctx)?;
                let method = self.factory_method(definition, &descriptor, &args, true)?;
                let value = method
                    .call(None, &args)
                    .map_err(|source| ContainerError::CreationFailed {
                        name: name.to_string(),
                        source,
                    })?;
                expect_object(value)
            }
            InstantiationStrategy::InstanceFactory => {
                let factory_name = definition.factory_component().unwrap_or_default();
                let factory = self.get_component_in(factory_name, ctx)?;
                let args = self.resolve_values(definition.constructor_args(), ctx)?;
                let method = self.factory_method(definition, factory.descriptor(), &args, false)?;
                // 被代理的工厂组件经由代理调用，通知照常生效
                let result = if factory.proxied_target().is_some() {
                    factory.invoke(method.name(), args)
                } else {
                    method.call(Some(&*factory), &args)
                };
                let value = result.map_err(|source| ContainerError::CreationFailed {
                    name: name.to_string(),
                    source,
                })?;
                expect_object(value)
            }
        }
    }

    fn declared_descriptor(
        &self,
        definition: &ComponentDefinition,
    ) -> ContainerResult<Arc<TypeDescriptor>> {
        let key = definition
            .type_key()
            .ok_or_else(|| ContainerError::UnknownType("<none>".to_string()))?;
        self.introspector
            .describe(key)
            .ok_or_else(|| ContainerError::UnknownType(key.to_string()))
    }

    /// 解析工厂方法；原型定义会缓存结果
    fn factory_method(
        &self,
        definition: &ComponentDefinition,
        descriptor: &TypeDescriptor,
        args: &[Value],
        is_static: bool,
    ) -> ContainerResult<MethodDescriptor> {
        if let Some(ResolvedHandle::FactoryMethod(method)) = definition.cached_handle() {
            return Ok(method);
        }
        let method_name = definition.factory_method_name().unwrap_or_default();
        let candidates: Vec<&MethodDescriptor> = descriptor
            .all_methods()
            .into_iter()
            .filter(|method| method.name() == method_name && method.is_static() == is_static)
            .collect();
        let method = resolve_overload(&candidates, args)
            .cloned()
            .ok_or_else(|| ContainerError::NoMatchingFactoryMethod {
                type_name: descriptor.key().to_string(),
                method: method_name.to_string(),
                args: describe_args(args),
            })?;
        if definition.is_prototype() {
            definition.cache_handle(ResolvedHandle::FactoryMethod(method.clone()));
        }
        Ok(method)
    }

    fn inject_properties(
        &self,
        name: &str,
        definition: &ComponentDefinition,
        instance: &ObjectRef,
        ctx: &mut ConstructionContext,
    ) -> ContainerResult<()> {
        for binding in definition.properties() {
            let value = self.resolve_value(&binding.value, ctx)?;
            tracing::trace!("Injecting field '{}' of component '{}'", binding.name, name);
            instance
                .set_field(&binding.name, value)
                .map_err(|e| ContainerError::FieldInjection {
                    name: name.to_string(),
                    field: binding.name.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    fn resolve_values(
        &self,
        descriptors: &[ValueDescriptor],
        ctx: &mut ConstructionContext,
    ) -> ContainerResult<Vec<Value>> {
        descriptors
            .iter()
            .map(|descriptor| self.resolve_value(descriptor, ctx))
            .collect()
    }

    /// 把值描述解析为真实值，递归处理引用和嵌套容器
    fn resolve_value(
        &self,
        descriptor: &ValueDescriptor,
        ctx: &mut ConstructionContext,
    ) -> ContainerResult<Value> {
        Ok(match descriptor {
            ValueDescriptor::Literal(value) => value.clone(),
            ValueDescriptor::Reference(ComponentReference::ByName(name)) => {
                Value::Object(self.get_component_in(name, ctx)?)
            }
            ValueDescriptor::Reference(ComponentReference::ByType(key)) => self
                .get_component_by_type_in(key, ctx)?
                .map(Value::Object)
                .unwrap_or(Value::Null),
            ValueDescriptor::List(items) => Value::List(self.resolve_values(items, ctx)?),
            ValueDescriptor::Set(items) => Value::set(self.resolve_values(items, ctx)?),
            ValueDescriptor::Map(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    pairs.push((self.resolve_value(key, ctx)?, self.resolve_value(value, ctx)?));
                }
                Value::map(pairs)
            }
        })
    }

    fn apply_before_initialization(
        &self,
        component: ObjectRef,
        name: &str,
    ) -> ContainerResult<ObjectRef> {
        let mut current = component;
        for processor in self.post_processors() {
            current = processor.before_initialization(current, name)?;
        }
        Ok(current)
    }

    fn apply_after_initialization(
        &self,
        component: ObjectRef,
        name: &str,
    ) -> ContainerResult<ObjectRef> {
        let mut current = component;
        for processor in self.post_processors() {
            current = processor.after_initialization(current, name)?;
        }
        Ok(current)
    }

    fn produced_type(&self, name: &str, seen: &mut Vec<String>) -> Option<TypeKey> {
        let name = self.store.canonical_name(name);
        if seen.contains(&name) {
            return None;
        }
        seen.push(name.clone());

        let definition = self.store.get_definition(&name)?;
        match definition.strategy() {
            InstantiationStrategy::Constructor => definition.type_key().cloned(),
            InstantiationStrategy::StaticFactory => {
                let descriptor = self.introspector.describe(definition.type_key()?)?;
                factory_return_type(&descriptor, definition.factory_method_name()?, true)
            }
            InstantiationStrategy::InstanceFactory => {
                let factory_type = self.produced_type(definition.factory_component()?, seen)?;
                let descriptor = self.introspector.describe(&factory_type)?;
                factory_return_type(&descriptor, definition.factory_method_name()?, false)
            }
        }
    }

    /// 预实例化所有单例（按注册顺序）
    pub fn preinstantiate_singletons(&self) -> ContainerResult<()> {
        let names = self.store.definition_names();
        let mut count = 0;
        for name in &names {
            let singleton = self
                .store
                .get_definition(name)
                .map(|d| d.is_singleton())
                .unwrap_or(false);
            if singleton {
                self.get_component(name)?;
                count += 1;
            }
        }
        tracing::info!("Pre-instantiated {} singleton components", count);
        Ok(())
    }

    /// 静态检查构造依赖：缺失的引用和构造方法循环
    pub fn validate_dependencies(&self) -> ContainerResult<()> {
        let graph: BTreeMap<String, Vec<String>> = self
            .store
            .definition_names()
            .into_iter()
            .filter_map(|name| {
                let definition = self.store.get_definition(&name)?;
                let deps = definition
                    .construction_dependencies()
                    .into_iter()
                    .map(|dep| self.store.canonical_name(dep))
                    .collect();
                Some((name, deps))
            })
            .collect();

        validate_dependency_graph(&graph).map_err(|e| {
            tracing::error!("Dependency validation failed: {}", e);
            ContainerError::DependencyValidationFailed(e.to_string())
        })?;
        tracing::debug!("Dependency graph of {} components is valid", graph.len());
        Ok(())
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        self.singletons
            .read()
            .contains_key(&self.store.canonical_name(name))
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.read().len()
    }

    /// 销毁单例
    ///
    /// 按注册的逆序调用 destroy 钩子；单个钩子失败只记录日志，不影响其余组件。
    /// 最后清空单例缓存。
    ///
    /// 清空缓存只释放容器持有的引用。通过字段互相引用的组件（字段循环依赖）
    /// 构成 `Arc` 环，关闭后仍不会被释放；需要回收时由 destroy 钩子把字段置为 `Null`。
    pub fn close(&self) {
        let names = self.store.definition_names();
        let mut failures = 0;
        for name in names.iter().rev() {
            let Some(definition) = self.store.get_definition(name) else {
                continue;
            };
            let Some(hook) = definition.destroy_method() else {
                continue;
            };
            if !definition.is_singleton() {
                continue;
            }
            let Some(instance) = self.singletons.read().get(name).cloned() else {
                continue;
            };
            let target = instance.proxied_target().unwrap_or(instance);
            tracing::debug!("Invoking destroy method '{}' on component '{}'", hook, name);
            if let Err(e) = target.invoke(hook, Vec::new()) {
                failures += 1;
                tracing::error!("Destroy method '{}' of component '{}' failed: {}", hook, name, e);
            }
        }
        self.singletons.write().clear();
        if failures > 0 {
            tracing::warn!("Container closed with {} failed destroy hooks", failures);
        } else {
            tracing::info!("Container closed");
        }
    }
}

fn factory_return_type(
    descriptor: &TypeDescriptor,
    method: &str,
    is_static: bool,
) -> Option<TypeKey> {
    descriptor
        .all_methods()
        .into_iter()
        .find(|m| m.name() == method && m.is_static() == is_static)
        .and_then(|m| match m.returns() {
            ParamType::Object(key) => Some(key.clone()),
            _ => None,
        })
}

fn expect_object(value: Value) -> ContainerResult<ObjectRef> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(ContainerError::TypeMismatch {
            expected: "object".to_string(),
            found: other.runtime_type().to_string(),
        }),
    }
}

impl ComponentFactory for DefaultComponentFactory {
    fn get_component(&self, name: &str) -> ContainerResult<ObjectRef> {
        self.get_component_in(name, &mut ConstructionContext::new())
    }

    fn get_component_by_type(&self, key: &TypeKey) -> ContainerResult<Option<ObjectRef>> {
        self.get_component_by_type_in(key, &mut ConstructionContext::new())
    }

    fn get_components_of_type(
        &self,
        key: &TypeKey,
    ) -> ContainerResult<BTreeMap<String, ObjectRef>> {
        let mut components = BTreeMap::new();
        for name in self.store.names_for_type(key) {
            let component = self.get_component(&name)?;
            components.insert(name, component);
        }
        Ok(components)
    }

    fn contains_component(&self, name: &str) -> bool {
        self.store
            .contains_definition(&self.store.canonical_name(name))
    }

    fn get_type(&self, name: &str) -> Option<TypeKey> {
        self.produced_type(name, &mut Vec::new())
    }

    fn definition(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        self.store.get_definition(&self.store.canonical_name(name))
    }

    fn creation_guard(&self) -> Option<ReentrantMutexGuard<'_, ()>> {
        Some(self.creation_lock.lock())
    }
}

impl DefinitionRegistry for DefaultComponentFactory {
    fn register_definition(
        &self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<(), RegistrationError> {
        self.store.register_definition(name, definition)
    }

    fn get_definition(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        self.store.get_definition(name)
    }

    fn contains_definition(&self, name: &str) -> bool {
        self.store.contains_definition(name)
    }

    fn definition_names(&self) -> Vec<String> {
        self.store.definition_names()
    }

    fn definition_count(&self) -> usize {
        self.store.definition_count()
    }
}

impl AliasRegistry for DefaultComponentFactory {
    fn register_alias(&self, name: &str, alias: &str) -> Result<(), RegistrationError> {
        self.store.register_alias(name, alias)
    }

    fn remove_alias(&self, alias: &str) -> bool {
        self.store.remove_alias(alias)
    }

    fn is_alias(&self, name: &str) -> bool {
        self.store.is_alias(name)
    }

    fn canonical_name(&self, name: &str) -> String {
        self.store.canonical_name(name)
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        self.store.aliases(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MethodError;
    use crate::introspect::TypeCatalog;
    use crate::object::ObjectState;
    use crate::scope::Scope;
    use crate::value::same_instance;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn factory_with(types: &[Arc<TypeDescriptor>]) -> DefaultComponentFactory {
        let catalog = TypeCatalog::new();
        for ty in types {
            catalog.register(ty);
        }
        DefaultComponentFactory::new(Arc::new(catalog))
    }

    fn repository_types() -> (Arc<TypeDescriptor>, Arc<TypeDescriptor>, Arc<TypeDescriptor>) {
        let repository = TypeDescriptor::interface("demo.Repository")
            .abstract_method("find", vec![ParamType::Int], ParamType::Str)
            .build();
        let memory = TypeDescriptor::class("demo.MemoryRepository")
            .implements(&repository)
            .method("find", vec![ParamType::Int], ParamType::Str, |_, args| {
                Ok(Value::from(format!("item-{}", args[0].as_int().unwrap_or_default())))
            })
            .build();
        let cached = TypeDescriptor::class("demo.CachedRepository")
            .implements(&repository)
            .method("find", vec![ParamType::Int], ParamType::Str, |_, _| Ok(Value::from("cached")))
            .build();
        (repository, memory, cached)
    }

    fn order_service(repository: &Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        TypeDescriptor::class("demo.OrderService")
            .field("repo", ParamType::Object(repository.key().clone()))
            .constructor(vec![ParamType::Object(repository.key().clone())], |args| {
                Ok(ObjectState::new().with_field("repo", args[0].clone()))
            })
            .method("describe", vec![ParamType::Int], ParamType::Str, |this, args| {
                let repo = this.field("repo").and_then(|v| v.as_object().cloned());
                match repo {
                    Some(repo) => repo.invoke("find", args.to_vec()),
                    None => Err(MethodError::raised("IllegalState", "no repository")),
                }
            })
            .build()
    }

    #[test]
    fn test_singleton_identity_and_prototype_distinct() {
        let (_, memory, _) = repository_types();
        let factory = factory_with(&[memory]);
        factory
            .register_definition("single", ComponentDefinition::of_type("demo.MemoryRepository"))
            .unwrap();
        factory
            .register_definition(
                "proto",
                ComponentDefinition::of_type("demo.MemoryRepository").with_scope(Scope::Prototype),
            )
            .unwrap();

        let a = factory.get_component("single").unwrap();
        let b = factory.get_component("single").unwrap();
        assert!(same_instance(&a, &b));

        let p1 = factory.get_component("proto").unwrap();
        let p2 = factory.get_component("proto").unwrap();
        assert!(!same_instance(&p1, &p2));
        assert!(!factory.contains_singleton("proto"));
        assert!(matches!(
            factory.definition("proto").unwrap().cached_handle(),
            Some(ResolvedHandle::Constructor(0))
        ));
        assert!(factory.definition("single").unwrap().cached_handle().is_none());
    }

    #[test]
    fn test_unknown_component() {
        let factory = factory_with(&[]);
        assert!(matches!(
            factory.get_component("nope"),
            Err(ContainerError::NotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_constructor_injection_by_name() {
        let (repository, memory, _) = repository_types();
        let service = order_service(&repository);
        let factory = factory_with(&[memory, service]);
        factory
            .register_definition("repo", ComponentDefinition::of_type("demo.MemoryRepository"))
            .unwrap();
        factory
            .register_definition(
                "orders",
                ComponentDefinition::of_type("demo.OrderService")
                    .with_constructor_arg(ValueDescriptor::reference("repo")),
            )
            .unwrap();

        let orders = factory.get_component("orders").unwrap();
        assert_eq!(orders.invoke("describe", vec![Value::from(7)]).unwrap(), Value::from("item-7"));
        let recorded = factory.definition("orders").unwrap().recorded_args().unwrap();
        assert!(recorded[0].same_object(&Value::Object(factory.get_component("repo").unwrap())));
    }

    #[test]
    fn test_no_matching_constructor() {
        let (repository, _, _) = repository_types();
        let factory = factory_with(&[order_service(&repository)]);
        factory
            .register_definition(
                "orders",
                ComponentDefinition::of_type("demo.OrderService")
                    .with_constructor_arg(ValueDescriptor::literal("not a repository")),
            )
            .unwrap();
        assert!(matches!(
            factory.get_component("orders"),
            Err(ContainerError::NoMatchingConstructor { .. })
        ));
    }

    #[test]
    fn test_constructor_cycle_fails_fast() {
        let a = TypeDescriptor::class("demo.A")
            .constructor(vec![ParamType::object("demo.B")], |_| Ok(ObjectState::new()))
            .build();
        let b = TypeDescriptor::class("demo.B")
            .constructor(vec![ParamType::object("demo.A")], |_| Ok(ObjectState::new()))
            .build();
        let factory = factory_with(&[a, b]);
        factory
            .register_definition(
                "a",
                ComponentDefinition::of_type("demo.A")
                    .with_constructor_arg(ValueDescriptor::reference("b")),
            )
            .unwrap();
        factory
            .register_definition(
                "b",
                ComponentDefinition::of_type("demo.B")
                    .with_constructor_arg(ValueDescriptor::reference("a")),
            )
            .unwrap();

        match factory.get_component("a") {
            Err(ContainerError::CircularDependency { name, chain }) => {
                assert_eq!(name, "a");
                assert_eq!(chain, "a -> b -> a");
            }
            other => panic!("expected a cycle, got {:?}", other.err()),
        }
        assert_eq!(factory.singleton_count(), 0);
        assert!(factory.validate_dependencies().is_err());
    }

    #[test]
    fn test_field_cycle_resolves_with_mutual_references() {
        let x = TypeDescriptor::class("demo.X")
            .field("y", ParamType::object("demo.Y"))
            .build();
        let y = TypeDescriptor::class("demo.Y")
            .field("x", ParamType::object("demo.X"))
            .build();
        let factory = factory_with(&[x, y]);
        factory
            .register_definition(
                "x",
                ComponentDefinition::of_type("demo.X")
                    .with_property("y", ValueDescriptor::reference("y")),
            )
            .unwrap();
        factory
            .register_definition(
                "y",
                ComponentDefinition::of_type("demo.Y")
                    .with_property("x", ValueDescriptor::reference("x")),
            )
            .unwrap();

        let mut ctx = ConstructionContext::new();
        let x = factory.get_component_in("x", &mut ctx).unwrap();
        assert!(ctx.is_idle());
        let y = factory.get_component("y").unwrap();
        assert!(x.field("y").unwrap().same_object(&Value::Object(Arc::clone(&y))));
        assert!(y.field("x").unwrap().same_object(&Value::Object(Arc::clone(&x))));
        assert!(factory.validate_dependencies().is_ok());
    }

    #[test]
    fn test_destroy_hook_releases_field_cycle() {
        let x = TypeDescriptor::class("demo.X")
            .field("y", ParamType::object("demo.Y"))
            .method("release", vec![], ParamType::Void, |this, _| {
                this.set_field("y", Value::Null)
                    .map_err(|e| MethodError::raised("IllegalState", e.to_string()))?;
                Ok(Value::Null)
            })
            .build();
        let y = TypeDescriptor::class("demo.Y")
            .field("x", ParamType::object("demo.X"))
            .build();
        let factory = factory_with(&[x, y]);
        factory
            .register_definition(
                "x",
                ComponentDefinition::of_type("demo.X")
                    .with_property("y", ValueDescriptor::reference("y"))
                    .with_destroy_method("release"),
            )
            .unwrap();
        factory
            .register_definition(
                "y",
                ComponentDefinition::of_type("demo.Y")
                    .with_property("x", ValueDescriptor::reference("x")),
            )
            .unwrap();

        let x = factory.get_component("x").unwrap();
        let y = factory.get_component("y").unwrap();
        let (weak_x, weak_y) = (Arc::downgrade(&x), Arc::downgrade(&y));
        drop((x, y));

        factory.close();
        assert!(weak_x.upgrade().is_none());
        assert!(weak_y.upgrade().is_none());
    }

    #[test]
    fn test_primary_resolution() {
        let (repository, memory, cached) = repository_types();
        let factory = factory_with(&[memory, cached]);
        factory
            .register_definition("memory", ComponentDefinition::of_type("demo.MemoryRepository"))
            .unwrap();
        factory
            .register_definition(
                "cached",
                ComponentDefinition::of_type("demo.CachedRepository").primary(),
            )
            .unwrap();
        factory.build_type_index();

        let found = factory.get_component_by_type(repository.key()).unwrap().unwrap();
        assert_eq!(found.type_key().as_str(), "demo.CachedRepository");
        assert_eq!(factory.get_components_of_type(repository.key()).unwrap().len(), 2);
        let exact = factory
            .get_component_by_type(&TypeKey::new("demo.MemoryRepository"))
            .unwrap()
            .unwrap();
        assert_eq!(exact.type_key().as_str(), "demo.MemoryRepository");
        assert!(factory.get_component_by_type(&TypeKey::new("demo.Nothing")).unwrap().is_none());
    }

    #[test]
    fn test_primary_ambiguity() {
        let (repository, memory, cached) = repository_types();
        let none = factory_with(&[memory.clone(), cached.clone()]);
        none.register_definition("memory", ComponentDefinition::of_type("demo.MemoryRepository"))
            .unwrap();
        none.register_definition("cached", ComponentDefinition::of_type("demo.CachedRepository"))
            .unwrap();
        none.build_type_index();
        assert!(matches!(
            none.get_component_by_type(repository.key()),
            Err(ContainerError::NoPrimary { candidates, .. })
                if candidates == vec!["cached", "memory"]
        ));

        let both = factory_with(&[memory, cached]);
        both.register_definition(
            "memory",
            ComponentDefinition::of_type("demo.MemoryRepository").primary(),
        )
        .unwrap();
        both.register_definition(
            "cached",
            ComponentDefinition::of_type("demo.CachedRepository").primary(),
        )
        .unwrap();
        both.build_type_index();
        assert!(matches!(
            both.get_component_by_type(repository.key()),
            Err(ContainerError::MultiplePrimary { .. })
        ));
    }

    #[test]
    fn test_reference_by_type_without_candidates_is_null() {
        let holder = TypeDescriptor::class("demo.Holder")
            .field("missing", ParamType::object("demo.Missing"))
            .build();
        let factory = factory_with(&[holder]);
        factory
            .register_definition(
                "holder",
                ComponentDefinition::of_type("demo.Holder")
                    .with_property("missing", ValueDescriptor::reference_type("demo.Missing")),
            )
            .unwrap();
        factory.build_type_index();
        let holder = factory.get_component("holder").unwrap();
        assert_eq!(holder.field("missing"), Some(Value::Null));
    }

    #[test]
    fn test_alias_returns_same_singleton() {
        let (_, memory, _) = repository_types();
        let factory = factory_with(&[memory]);
        factory
            .register_definition("a", ComponentDefinition::of_type("demo.MemoryRepository"))
            .unwrap();
        factory.register_alias("a", "b").unwrap();
        let via_alias = factory.get_component("b").unwrap();
        let via_name = factory.get_component("a").unwrap();
        assert!(same_instance(&via_alias, &via_name));
        assert!(factory.contains_component("b"));
        assert!(factory.register_alias("ghost", "g").is_err());
    }

    #[test]
    fn test_static_and_instance_factories() {
        let connection = TypeDescriptor::class("demo.Connection")
            .field("url", ParamType::Str)
            .constructor(vec![ParamType::Str], |args| {
                Ok(ObjectState::new().with_field("url", args[0].clone()))
            })
            .build();
        let for_static = Arc::clone(&connection);
        let connections = TypeDescriptor::class("demo.Connections")
            .static_method("local", vec![], ParamType::object("demo.Connection"), move |_| {
                Ok(Value::Object(for_static.instantiate(&[Value::from("local://")])?))
            })
            .build();
        let for_instance = Arc::clone(&connection);
        let pool = TypeDescriptor::class("demo.Pool")
            .method(
                "open",
                vec![ParamType::Str],
                ParamType::object("demo.Connection"),
                move |_, args| Ok(Value::Object(for_instance.instantiate(args)?)),
            )
            .build();
        let factory = factory_with(&[connection, connections, pool]);
        factory
            .register_definition(
                "local",
                ComponentDefinition::of_type("demo.Connections").factory_method("local"),
            )
            .unwrap();
        factory
            .register_definition("pool", ComponentDefinition::of_type("demo.Pool"))
            .unwrap();
        factory
            .register_definition(
                "main",
                ComponentDefinition::from_factory("pool", "open")
                    .with_constructor_arg(ValueDescriptor::literal("db://main"))
                    .with_scope(Scope::Prototype),
            )
            .unwrap();

        let local = factory.get_component("local").unwrap();
        assert_eq!(local.type_key().as_str(), "demo.Connection");
        assert_eq!(local.field("url"), Some(Value::from("local://")));

        let main = factory.get_component("main").unwrap();
        assert_eq!(main.field("url"), Some(Value::from("db://main")));
        assert!(matches!(
            factory.definition("main").unwrap().cached_handle(),
            Some(ResolvedHandle::FactoryMethod(_))
        ));

        assert_eq!(factory.get_type("local").unwrap().as_str(), "demo.Connection");
        assert_eq!(factory.get_type("main").unwrap().as_str(), "demo.Connection");
        factory.build_type_index();
        assert_eq!(
            factory.names_for_type(&TypeKey::new("demo.Connection")),
            vec!["local", "main"]
        );
    }

    #[test]
    fn test_static_factory_skips_instance_method_with_same_name() {
        let clock = TypeDescriptor::class("demo.Clock")
            .field("zone", ParamType::Str)
            .constructor(vec![ParamType::Str], |args| {
                Ok(ObjectState::new().with_field("zone", args[0].clone()))
            })
            .build();
        let for_static = Arc::clone(&clock);
        let clocks = TypeDescriptor::class("demo.Clocks")
            .method("create", vec![ParamType::Str], ParamType::object("demo.Clock"), |_, _| {
                Err(MethodError::raised("IllegalState", "instance factory called"))
            })
            .static_method(
                "create",
                vec![ParamType::Str],
                ParamType::object("demo.Clock"),
                move |args| Ok(Value::Object(for_static.instantiate(args)?)),
            )
            .build();
        let factory = factory_with(&[clock, clocks]);
        factory
            .register_definition(
                "utc",
                ComponentDefinition::of_type("demo.Clocks")
                    .factory_method("create")
                    .with_constructor_arg(ValueDescriptor::literal("UTC")),
            )
            .unwrap();

        let utc = factory.get_component("utc").unwrap();
        assert_eq!(utc.type_key().as_str(), "demo.Clock");
        assert_eq!(utc.field("zone"), Some(Value::from("UTC")));
        assert_eq!(factory.get_type("utc").unwrap().as_str(), "demo.Clock");
    }

    #[test]
    fn test_nested_collections_are_resolved() {
        let (_, memory, _) = repository_types();
        let bag = TypeDescriptor::class("demo.Bag")
            .field("items", ParamType::List)
            .field("tags", ParamType::Set)
            .field("index", ParamType::Map)
            .build();
        let factory = factory_with(&[memory, bag]);
        factory
            .register_definition("repo", ComponentDefinition::of_type("demo.MemoryRepository"))
            .unwrap();
        factory
            .register_definition(
                "bag",
                ComponentDefinition::of_type("demo.Bag")
                    .with_property(
                        "items",
                        ValueDescriptor::List(vec![
                            ValueDescriptor::reference("repo"),
                            ValueDescriptor::List(vec![ValueDescriptor::literal(1)]),
                        ]),
                    )
                    .with_property(
                        "tags",
                        ValueDescriptor::Set(vec![
                            ValueDescriptor::literal("a"),
                            ValueDescriptor::literal("a"),
                        ]),
                    )
                    .with_property(
                        "index",
                        ValueDescriptor::Map(vec![(
                            ValueDescriptor::literal("main"),
                            ValueDescriptor::reference("repo"),
                        )]),
                    ),
            )
            .unwrap();

        let bag = factory.get_component("bag").unwrap();
        let repo = Value::Object(factory.get_component("repo").unwrap());
        let items = bag.field("items").unwrap();
        let items = items.as_list().unwrap();
        assert!(items[0].same_object(&repo));
        assert_eq!(items[1], Value::List(vec![Value::from(1)]));
        assert_eq!(bag.field("tags").unwrap().as_list().unwrap().len(), 1);
        let index = bag.field("index").unwrap();
        assert!(index.get(&Value::from("main")).unwrap().same_object(&repo));
    }

    #[test]
    fn test_field_injection_type_mismatch() {
        let holder = TypeDescriptor::class("demo.Holder")
            .field("count", ParamType::Int)
            .build();
        let factory = factory_with(&[holder]);
        factory
            .register_definition(
                "holder",
                ComponentDefinition::of_type("demo.Holder")
                    .with_property("count", ValueDescriptor::literal("x")),
            )
            .unwrap();
        assert!(matches!(
            factory.get_component("holder"),
            Err(ContainerError::FieldInjection { .. })
        ));
    }

    fn journaled_type(
        name: &str,
        journal: &Arc<Mutex<Vec<String>>>,
        fail_destroy: bool,
    ) -> Arc<TypeDescriptor> {
        let on_init = Arc::clone(journal);
        let on_destroy = Arc::clone(journal);
        let label = name.to_string();
        let label_destroy = name.to_string();
        TypeDescriptor::class(format!("demo.{}", name))
            .method("start", vec![], ParamType::Void, move |_, _| {
                on_init.lock().push(format!("init:{}", label));
                Ok(Value::Null)
            })
            .method("stop", vec![], ParamType::Void, move |_, _| {
                on_destroy.lock().push(format!("destroy:{}", label_destroy));
                if fail_destroy {
                    Err(MethodError::raised("IOError", "disk gone"))
                } else {
                    Ok(Value::Null)
                }
            })
            .build()
    }

    #[test]
    fn test_init_and_close_isolate_failures() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let first = journaled_type("First", &journal, false);
        let second = journaled_type("Second", &journal, true);
        let factory = factory_with(&[first, second]);
        for (name, ty) in [("first", "demo.First"), ("second", "demo.Second")] {
            factory
                .register_definition(
                    name,
                    ComponentDefinition::of_type(ty)
                        .with_init_method("start")
                        .with_destroy_method("stop"),
                )
                .unwrap();
        }
        factory.preinstantiate_singletons().unwrap();
        assert_eq!(factory.singleton_count(), 2);

        factory.close();
        assert_eq!(
            *journal.lock(),
            vec!["init:First", "init:Second", "destroy:Second", "destroy:First"]
        );
        assert_eq!(factory.singleton_count(), 0);
    }

    #[test]
    fn test_init_failure_is_reported() {
        let broken = TypeDescriptor::class("demo.Broken")
            .method("start", vec![], ParamType::Void, |_, _| {
                Err(MethodError::raised("IllegalState", "not ready"))
            })
            .build();
        let factory = factory_with(&[broken]);
        factory
            .register_definition(
                "broken",
                ComponentDefinition::of_type("demo.Broken").with_init_method("start"),
            )
            .unwrap();
        assert!(matches!(
            factory.get_component("broken"),
            Err(ContainerError::LifecycleHook { hook, .. }) if hook == "start"
        ));
        assert!(!factory.contains_singleton("broken"));
    }

    struct Recording {
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl ComponentPostProcessor for Recording {
        fn before_initialization(
            &self,
            component: ObjectRef,
            name: &str,
        ) -> ContainerResult<ObjectRef> {
            self.journal.lock().push(format!("before:{}", name));
            Ok(component)
        }

        fn after_initialization(
            &self,
            component: ObjectRef,
            name: &str,
        ) -> ContainerResult<ObjectRef> {
            self.journal.lock().push(format!("after:{}", name));
            Ok(component)
        }
    }

    #[test]
    fn test_post_processors_wrap_init() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let ty = journaled_type("Svc", &journal, false);
        let factory = factory_with(&[ty]);
        factory.add_post_processor(Arc::new(Recording {
            journal: Arc::clone(&journal),
        }));
        factory
            .register_definition(
                "svc",
                ComponentDefinition::of_type("demo.Svc").with_init_method("start"),
            )
            .unwrap();
        factory.get_component("svc").unwrap();
        assert_eq!(*journal.lock(), vec!["before:svc", "init:Svc", "after:svc"]);
    }

    #[test]
    fn test_concurrent_first_access_creates_one_singleton() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let slow = TypeDescriptor::class("demo.Slow")
            .constructor(vec![], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                Ok(ObjectState::new())
            })
            .build();
        let factory = Arc::new(factory_with(&[slow]));
        factory
            .register_definition("slow", ComponentDefinition::of_type("demo.Slow"))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = Arc::clone(&factory);
                std::thread::spawn(move || factory.get_component("slow").unwrap())
            })
            .collect();
        let instances: Vec<ObjectRef> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| same_instance(i, &instances[0])));
    }

    #[test]
    fn test_generated_name_and_missing_reference_validation() {
        let (repository, _, _) = repository_types();
        let factory = factory_with(&[order_service(&repository)]);
        let name = factory
            .register_with_generated_name(
                ComponentDefinition::of_type("demo.OrderService")
                    .with_constructor_arg(ValueDescriptor::reference("repo")),
            )
            .unwrap();
        assert_eq!(name, "orderService");
        assert!(matches!(
            factory.validate_dependencies(),
            Err(ContainerError::DependencyValidationFailed(message)) if message.contains("'repo'")
        ));
        assert!(factory
            .register_with_generated_name(ComponentDefinition::from_factory("f", "m"))
            .is_err());
    }
}
