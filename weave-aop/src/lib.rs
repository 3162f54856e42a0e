//! Weave AOP - 面向切面编程支持
//!
//! 提供类似 Spring 的 AOP 功能：
//! - 切点表达式（execution / within，可用 && || ! 组合）
//! - 五种通知（Before、Around、AfterReturning、After、Throws）
//! - 接口代理和子类代理两种策略
//! - 通过 ComponentPostProcessor 自动为匹配的组件创建代理

pub mod advice;
pub mod advisor;
pub mod auto_proxy;
pub mod chain;
pub mod joinpoint;
pub mod plugin;
pub mod pointcut;
pub mod proxy;
pub mod support;

// 重新导出核心类型
pub use advice::{
    Advice, AdviceType, AfterAdvice, AfterReturningAdvice, MethodBeforeAdvice, MethodInterceptor,
    ThrowsAdvice,
};
pub use advisor::{AdvisorHandle, ExpressionPointcutAdvisor, PointcutAdvisor};
pub use auto_proxy::AutoProxyCreator;
pub use chain::AdviceChain;
pub use joinpoint::JoinPoint;
pub use plugin::AopPlugin;
pub use pointcut::{ExpressionPointcut, Pointcut, PointcutExpression, PointcutParseError};
pub use proxy::{
    AdvisedSupport, InterfaceProxy, ProxyFactory, ProxyHandle, ProxyStrategy, SubclassProxy,
};
pub use support::{
    advice_component_type, advisor_component_type, advisor_definition, ordered_advisor_definition,
    ADVICE_TYPE, ADVISOR_TYPE, EXPRESSION_ADVISOR_TYPE,
};

/// 预导入模块
pub mod prelude {
    pub use crate::advice::*;
    pub use crate::advisor::{AdvisorHandle, ExpressionPointcutAdvisor, PointcutAdvisor};
    pub use crate::auto_proxy::AutoProxyCreator;
    pub use crate::chain::AdviceChain;
    pub use crate::joinpoint::JoinPoint;
    pub use crate::plugin::AopPlugin;
    pub use crate::pointcut::{ExpressionPointcut, Pointcut, PointcutExpression};
    pub use crate::support::{advice_component_type, advisor_component_type, advisor_definition};
}
