//! 插件机制
//!
//! 插件在 refresh 时配置上下文（例如安装后置处理器），在 shutdown 时清理。

use std::sync::Arc;

use crate::context::ApplicationContext;
use crate::error::ContainerResult;

/// 容器插件 trait
pub trait ContainerPlugin: Send + Sync {
    /// 插件名称
    fn name(&self) -> &str;

    /// 插件优先级（数字越小优先级越高）
    fn priority(&self) -> i32 {
        100
    }

    /// 配置阶段 - 类型索引建立之后、单例预实例化之前执行
    fn configure(&self, _context: &ApplicationContext) -> ContainerResult<()> {
        Ok(())
    }

    /// 关闭阶段 - 在单例销毁之前执行
    fn on_shutdown(&self, _context: &ApplicationContext) -> ContainerResult<()> {
        Ok(())
    }
}

/// 插件注册表
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn ContainerPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn ContainerPlugin>) {
        tracing::debug!("Registering plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    /// 按优先级排序插件（稳定排序，同优先级保持注册顺序）
    pub fn sort_by_priority(&mut self) {
        self.plugins.sort_by_key(|p| p.priority());
    }

    pub fn plugins(&self) -> &[Arc<dyn ContainerPlugin>] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// 执行配置阶段，第一个失败的插件终止 refresh
    pub fn configure_all(&self, context: &ApplicationContext) -> ContainerResult<()> {
        for plugin in &self.plugins {
            tracing::info!("Configuring plugin: {}", plugin.name());
            plugin.configure(context)?;
        }
        Ok(())
    }

    /// 执行关闭阶段（逆序），失败只记录日志
    pub fn shutdown_all(&self, context: &ApplicationContext) {
        for plugin in self.plugins.iter().rev() {
            tracing::info!("Shutting down plugin: {}", plugin.name());
            if let Err(e) = plugin.on_shutdown(context) {
                tracing::error!("Failed to shutdown plugin {}: {}", plugin.name(), e);
            }
        }
    }
}

/// 用于全局收集插件的宏
#[macro_export]
macro_rules! submit_plugin {
    ($plugin_type:ty) => {
        $crate::inventory::submit! {
            $crate::PluginSubmission {
                create: || ::std::sync::Arc::new(<$plugin_type>::default())
                    as ::std::sync::Arc<dyn $crate::ContainerPlugin>,
            }
        }
    };
}

/// 插件提交结构
pub struct PluginSubmission {
    pub create: fn() -> Arc<dyn ContainerPlugin>,
}

inventory::collect!(PluginSubmission);

/// 从全局注册表加载所有插件
pub fn load_plugins() -> PluginRegistry {
    let mut registry = PluginRegistry::new();

    for submission in inventory::iter::<PluginSubmission> {
        registry.register((submission.create)());
    }

    registry.sort_by_priority();
    registry
}
