//! AOP Plugin - 通过插件机制集成 AOP 到容器
//!
//! 提供 ContainerPlugin 实现，自动注册 AutoProxyCreator

use std::sync::Arc;

use weave_core::prelude::*;

use crate::auto_proxy::AutoProxyCreator;

/// AOP 插件
///
/// refresh 时把 [`AutoProxyCreator`] 安装为后置处理器。设置中
/// `aop.enabled = false` 时不做任何事。
///
/// ## 使用方式
///
/// ```ignore
/// let context = ApplicationContext::builder()
///     .plugin(Arc::new(AopPlugin::new()))
///     .definition("auditAdvisor", advisor_definition("audit", "within(shop..*)"))
///     .refresh()?;
/// ```
///
/// 也可以通过 `with_submitted_plugins()` 自动加载（本 crate 已提交该插件）。
pub struct AopPlugin {
    /// 插件名称
    name: String,
    /// 是否启用
    enabled: bool,
}

impl AopPlugin {
    pub fn new() -> Self {
        Self {
            name: "AopPlugin".to_string(),
            enabled: true,
        }
    }

    /// 创建禁用的 AOP 插件
    pub fn disabled() -> Self {
        Self {
            name: "AopPlugin".to_string(),
            enabled: false,
        }
    }

    /// 设置插件名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for AopPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerPlugin for AopPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        1000
    }

    fn configure(&self, context: &ApplicationContext) -> ContainerResult<()> {
        if !self.enabled || !context.settings().aop.enabled {
            tracing::info!("AOP is disabled, skipping initialization");
            return Ok(());
        }

        let creator = AutoProxyCreator::for_context(context);
        context.add_post_processor(Arc::new(creator));
        tracing::info!(
            "AOP support initialized (proxy mode: {:?})",
            context.settings().aop.proxy_target_type
        );
        Ok(())
    }

    fn on_shutdown(&self, _context: &ApplicationContext) -> ContainerResult<()> {
        if self.enabled {
            tracing::debug!("Shutting down AOP support");
        }
        Ok(())
    }
}

weave_core::submit_plugin!(AopPlugin);
