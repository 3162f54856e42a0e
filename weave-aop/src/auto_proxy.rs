//! 自动代理创建器
//!
//! 作为 ComponentPostProcessor 在每个组件初始化完成后运行：
//! 找出与组件匹配的通知器，有匹配时用代理替换组件。

use std::cell::Cell;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::ReentrantMutex;
use weave_core::{
    ApplicationContext, ComponentFactory, ComponentPostProcessor, ContainerResult, ObjectRef,
    ProxyMode, TypeDescriptor, TypeKey,
};

use crate::advisor::{sort_advisors, AdvisorHandle, PointcutAdvisor};
use crate::proxy::ProxyFactory;
use crate::support::{advisor_of, is_infrastructure, ADVISOR_TYPE};

/// 自动代理创建器
///
/// ## 工作原理
///
/// 1. 跳过通知器和行为单元组件本身
/// 2. 第一次需要时从容器加载全部通知器组件（只加载一次）
/// 3. 通知器的切点匹配组件类型，并且至少匹配它的一个方法时，组件被代理
///
/// 加载通知器时先取容器的创建锁，再取自身的加载锁，与单例创建的加锁顺序一致。
/// 加载期间同一线程上创建的组件（例如通知器或行为单元的依赖）看到的候选通知器
/// 为空，因此不会被代理。
pub struct AutoProxyCreator {
    factory: Weak<dyn ComponentFactory>,
    proxy_factory: ProxyFactory,
    /// 以编程方式加入的通知器
    extra_advisors: Vec<AdvisorHandle>,
    advisors: OnceCell<Vec<AdvisorHandle>>,
    /// 加载期间为 true；同一线程内的嵌套请求据此跳过
    loading: ReentrantMutex<Cell<bool>>,
}

impl AutoProxyCreator {
    pub fn new(factory: Weak<dyn ComponentFactory>, mode: ProxyMode) -> Self {
        Self {
            factory,
            proxy_factory: ProxyFactory::new(mode),
            extra_advisors: Vec::new(),
            advisors: OnceCell::new(),
            loading: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// 按上下文的 AOP 设置创建
    pub fn for_context(context: &ApplicationContext) -> Self {
        let factory: Arc<dyn ComponentFactory> =
            Arc::clone(context.factory()) as Arc<dyn ComponentFactory>;
        Self::new(Arc::downgrade(&factory), context.settings().aop.proxy_target_type)
    }

    pub fn with_advisor(mut self, advisor: AdvisorHandle) -> Self {
        self.extra_advisors.push(advisor);
        self
    }

    /// 候选通知器，首次调用时加载
    pub fn candidate_advisors(&self) -> ContainerResult<&[AdvisorHandle]> {
        if let Some(loaded) = self.advisors.get() {
            return Ok(loaded);
        }

        let factory = self.factory.upgrade();
        let _creation = factory.as_ref().and_then(|factory| factory.creation_guard());
        let loading = self.loading.lock();
        if let Some(loaded) = self.advisors.get() {
            return Ok(loaded);
        }
        if loading.get() {
            tracing::debug!(
                "Advisors are being loaded on this thread, component will not be proxied"
            );
            return Ok(&[]);
        }

        loading.set(true);
        let result = self.load_advisors(factory.as_deref());
        loading.set(false);

        let advisors = result?;
        tracing::info!("Loaded {} advisor(s)", advisors.len());
        Ok(self.advisors.get_or_init(|| advisors))
    }

    fn load_advisors(
        &self,
        factory: Option<&dyn ComponentFactory>,
    ) -> ContainerResult<Vec<AdvisorHandle>> {
        let mut advisors = self.extra_advisors.clone();
        if let Some(factory) = factory {
            for (name, component) in factory.get_components_of_type(&TypeKey::new(ADVISOR_TYPE))? {
                match advisor_of(&component) {
                    Some(advisor) => {
                        tracing::debug!(
                            "Found advisor '{}' for advice '{}'",
                            name,
                            advisor.advice_name()
                        );
                        advisors.push(advisor);
                    }
                    None => tracing::warn!(
                        "Component '{}' is typed as an advisor but carries no advisor",
                        name
                    ),
                }
            }
        }
        sort_advisors(&mut advisors);
        Ok(advisors)
    }

    /// 与类型匹配、并且至少匹配一个方法的通知器
    pub fn matching_advisors(
        &self,
        target: &TypeDescriptor,
    ) -> ContainerResult<Vec<AdvisorHandle>> {
        let methods = target.all_methods();
        Ok(self
            .candidate_advisors()?
            .iter()
            .filter(|advisor| {
                let pointcut = advisor.pointcut();
                pointcut.matches_type(target)
                    && methods
                        .iter()
                        .any(|method| {
                            !method.is_static() && pointcut.matches_method(method, target)
                        })
            })
            .cloned()
            .collect())
    }
}

impl ComponentPostProcessor for AutoProxyCreator {
    fn name(&self) -> &str {
        "AutoProxyCreator"
    }

    fn order(&self) -> i32 {
        // 在其他处理器之后执行，拿到完全初始化的组件
        2000
    }

    fn after_initialization(&self, component: ObjectRef, name: &str) -> ContainerResult<ObjectRef> {
        if is_infrastructure(&*component) {
            tracing::trace!("Component '{}' is AOP infrastructure, not proxying", name);
            return Ok(component);
        }

        let matched = self.matching_advisors(component.descriptor())?;
        if matched.is_empty() {
            tracing::trace!("Component '{}' does not match any advisor", name);
            return Ok(component);
        }

        tracing::debug!("Component '{}' matches {} advisor(s)", name, matched.len());
        let handle = self
            .proxy_factory
            .create_proxy(component, name, matched, &self.factory)?;
        Ok(handle.get_proxy())
    }
}
