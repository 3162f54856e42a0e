use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{ReentrantMutexGuard, RwLock};

use crate::component_factory::{ComponentFactory, DefaultComponentFactory};
use crate::config::ContainerSettings;
use crate::definition::ComponentDefinition;
use crate::error::{ContainerError, ContainerResult};
use crate::introspect::{Introspector, TypeCatalog, TypeKey};
use crate::lifecycle::ComponentPostProcessor;
use crate::plugin::{load_plugins, ContainerPlugin, PluginRegistry};
use crate::registry::{AliasRegistry, DefinitionRegistry};
use crate::value::ObjectRef;

/// Shutdown hook类型
pub type ShutdownHook = Box<dyn Fn() -> ContainerResult<()> + Send + Sync>;

/// 应用上下文
///
/// 持有组件工厂、设置和插件，负责 refresh / shutdown 流程
pub struct ApplicationContext {
    /// 组件工厂 - 负责组件的创建和管理
    factory: Arc<DefaultComponentFactory>,

    settings: ContainerSettings,

    plugins: PluginRegistry,

    /// Shutdown hooks
    shutdown_hooks: RwLock<Vec<ShutdownHook>>,

    refreshed: AtomicBool,

    closed: AtomicBool,
}

impl ApplicationContext {
    /// 构建器模式创建上下文
    pub fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::new()
    }

    /// 获取内部的组件工厂
    pub fn factory(&self) -> &Arc<DefaultComponentFactory> {
        &self.factory
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn is_active(&self) -> bool {
        self.refreshed.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    /// 注册 shutdown hook
    ///
    /// Shutdown hook 会在应用关闭时按注册顺序执行
    pub fn register_shutdown_hook<F>(&self, hook: F)
    where
        F: Fn() -> ContainerResult<()> + Send + Sync + 'static,
    {
        let mut hooks = self.shutdown_hooks.write();
        hooks.push(Box::new(hook));
        tracing::debug!("Registered shutdown hook, total: {}", hooks.len());
    }

    /// 注册组件后置处理器
    pub fn add_post_processor(&self, processor: Arc<dyn ComponentPostProcessor>) {
        self.factory.add_post_processor(processor);
    }

    /// 刷新上下文
    ///
    /// 1. 构建类型索引
    /// 2. 插件配置（安装后置处理器等）
    /// 3. 可选的静态依赖检查
    /// 4. 可选的单例预实例化
    pub fn refresh(&self) -> ContainerResult<()> {
        if self.refreshed.swap(true, Ordering::SeqCst) {
            return Err(ContainerError::Other(anyhow::anyhow!(
                "application context has already been refreshed"
            )));
        }
        tracing::info!(
            "Refreshing application context with {} component definition(s)",
            self.factory.definition_count()
        );

        self.factory.build_type_index();

        let before = self.factory.definition_count();
        self.plugins.configure_all(self)?;
        if self.factory.definition_count() != before {
            tracing::debug!("Plugins registered new definitions, rebuilding type index");
            self.factory.build_type_index();
        }

        if self.settings.validate_dependencies {
            self.factory.validate_dependencies()?;
            tracing::info!("Dependency validation passed");
        }

        if self.settings.preinstantiate_singletons {
            self.factory.preinstantiate_singletons()?;
        }

        tracing::info!("Application context refreshed");
        Ok(())
    }

    /// 关闭上下文：执行 shutdown hooks、插件关闭，然后销毁单例
    ///
    /// 重复调用无效果
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Starting application shutdown");

        let hooks = self.shutdown_hooks.read();
        tracing::info!("Executing {} shutdown hook(s)", hooks.len());
        for (idx, hook) in hooks.iter().enumerate() {
            match hook() {
                Ok(_) => tracing::debug!("Shutdown hook {} executed successfully", idx + 1),
                Err(e) => tracing::warn!("Shutdown hook {} failed: {}", idx + 1, e),
            }
        }
        drop(hooks);

        self.plugins.shutdown_all(self);
        self.factory.close();
        tracing::info!("Application shutdown completed");
    }
}

impl ComponentFactory for ApplicationContext {
    fn get_component(&self, name: &str) -> ContainerResult<ObjectRef> {
        self.factory.get_component(name)
    }

    fn get_component_by_type(&self, key: &TypeKey) -> ContainerResult<Option<ObjectRef>> {
        self.factory.get_component_by_type(key)
    }

    fn get_components_of_type(
        &self,
        key: &TypeKey,
    ) -> ContainerResult<BTreeMap<String, ObjectRef>> {
        self.factory.get_components_of_type(key)
    }

    fn contains_component(&self, name: &str) -> bool {
        self.factory.contains_component(name)
    }

    fn get_type(&self, name: &str) -> Option<TypeKey> {
        self.factory.get_type(name)
    }

    fn definition(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        self.factory.definition(name)
    }

    fn creation_guard(&self) -> Option<ReentrantMutexGuard<'_, ()>> {
        self.factory.creation_guard()
    }
}

/// 应用上下文构建器
#[derive(Default)]
pub struct ApplicationContextBuilder {
    introspector: Option<Arc<dyn Introspector>>,
    settings: ContainerSettings,
    definitions: Vec<(Option<String>, ComponentDefinition)>,
    aliases: Vec<(String, String)>,
    plugins: PluginRegistry,
    post_processors: Vec<Arc<dyn ComponentPostProcessor>>,
}

impl ApplicationContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置内省器；未设置时收集链接期提交的类型
    pub fn introspector(mut self, introspector: Arc<dyn Introspector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    pub fn settings(mut self, settings: ContainerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 注册组件定义
    pub fn definition(mut self, name: impl Into<String>, definition: ComponentDefinition) -> Self {
        self.definitions.push((Some(name.into()), definition));
        self
    }

    /// 注册组件定义，名称由类型生成
    pub fn unnamed_definition(mut self, definition: ComponentDefinition) -> Self {
        self.definitions.push((None, definition));
        self
    }

    pub fn alias(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.push((name.into(), alias.into()));
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn ContainerPlugin>) -> Self {
        self.plugins.register(plugin);
        self
    }

    /// 加入通过 `submit_plugin!` 提交的插件
    pub fn with_submitted_plugins(mut self) -> Self {
        for plugin in load_plugins().plugins() {
            self.plugins.register(Arc::clone(plugin));
        }
        self
    }

    pub fn post_processor(mut self, processor: Arc<dyn ComponentPostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    /// 构建上下文（尚未 refresh）
    pub fn build(self) -> ContainerResult<Arc<ApplicationContext>> {
        let introspector = self
            .introspector
            .unwrap_or_else(|| Arc::new(TypeCatalog::from_submissions()));
        let factory = Arc::new(DefaultComponentFactory::new(introspector));

        for (name, definition) in self.definitions {
            match name {
                Some(name) => factory.register_definition(&name, definition)?,
                None => {
                    factory.register_with_generated_name(definition)?;
                }
            }
        }
        for (name, alias) in &self.aliases {
            factory.register_alias(name, alias)?;
        }
        for processor in self.post_processors {
            factory.add_post_processor(processor);
        }

        let mut plugins = self.plugins;
        plugins.sort_by_priority();

        Ok(Arc::new(ApplicationContext {
            factory,
            settings: self.settings,
            plugins,
            shutdown_hooks: RwLock::new(Vec::new()),
            refreshed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }))
    }

    /// 构建并 refresh
    pub fn refresh(self) -> ContainerResult<Arc<ApplicationContext>> {
        let context = self.build()?;
        context.refresh()?;
        Ok(context)
    }
}
