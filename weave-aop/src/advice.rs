//! 通知（Advice）定义
//!
//! 定义了在连接点执行的各种动作

use std::fmt;
use std::sync::Arc;

use weave_core::{MethodError, MethodResult, Value};

use crate::chain::AdviceChain;
use crate::joinpoint::JoinPoint;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceType {
    /// 前置通知
    Before,
    /// 环绕通知（可以控制方法执行）
    Around,
    /// 返回后通知（成功返回时执行）
    AfterReturning,
    /// 后置通知（无论成功还是失败都执行）
    After,
    /// 异常通知（抛出异常时执行）
    Throws,
}

/// 前置通知
///
/// 在目标方法执行前调用；返回错误会中止本次调用
pub trait MethodBeforeAdvice: Send + Sync {
    fn before(&self, join_point: &JoinPoint) -> Result<(), MethodError>;
}

/// 环绕通知
///
/// 完全控制后续执行：可以调用 `chain.proceed()` 零次、一次或多次
pub trait MethodInterceptor: Send + Sync {
    fn invoke(&self, chain: &mut AdviceChain) -> MethodResult;
}

/// 返回后通知
///
/// 在目标方法成功返回后调用，看到的是真实返回值
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(&self, join_point: &JoinPoint, value: &Value) -> Result<(), MethodError>;
}

/// 后置通知（finally 语义）
pub trait AfterAdvice: Send + Sync {
    fn after(&self, join_point: &JoinPoint) -> Result<(), MethodError>;
}

/// 异常通知
///
/// 观察下游抛出的错误，不能吞掉它
pub trait ThrowsAdvice: Send + Sync {
    fn after_throwing(
        &self,
        join_point: &JoinPoint,
        error: &MethodError,
    ) -> Result<(), MethodError>;
}

impl<F> MethodBeforeAdvice for F
where
    F: Fn(&JoinPoint) -> Result<(), MethodError> + Send + Sync,
{
    fn before(&self, join_point: &JoinPoint) -> Result<(), MethodError> {
        self(join_point)
    }
}

impl<F> MethodInterceptor for F
where
    F: Fn(&mut AdviceChain) -> MethodResult + Send + Sync,
{
    fn invoke(&self, chain: &mut AdviceChain) -> MethodResult {
        self(chain)
    }
}

impl<F> AfterReturningAdvice for F
where
    F: Fn(&JoinPoint, &Value) -> Result<(), MethodError> + Send + Sync,
{
    fn after_returning(&self, join_point: &JoinPoint, value: &Value) -> Result<(), MethodError> {
        self(join_point, value)
    }
}

impl<F> AfterAdvice for F
where
    F: Fn(&JoinPoint) -> Result<(), MethodError> + Send + Sync,
{
    fn after(&self, join_point: &JoinPoint) -> Result<(), MethodError> {
        self(join_point)
    }
}

impl<F> ThrowsAdvice for F
where
    F: Fn(&JoinPoint, &MethodError) -> Result<(), MethodError> + Send + Sync,
{
    fn after_throwing(
        &self,
        join_point: &JoinPoint,
        error: &MethodError,
    ) -> Result<(), MethodError> {
        self(join_point, error)
    }
}

/// 一个行为单元
///
/// 作为通知组件的原生数据保存，代理在每次调用时按名称取出
#[derive(Clone)]
pub enum Advice {
    Before(Arc<dyn MethodBeforeAdvice>),
    Around(Arc<dyn MethodInterceptor>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    After(Arc<dyn AfterAdvice>),
    Throws(Arc<dyn ThrowsAdvice>),
}

impl Advice {
    pub fn before<F>(hook: F) -> Self
    where
        F: Fn(&JoinPoint) -> Result<(), MethodError> + Send + Sync + 'static,
    {
        Advice::Before(Arc::new(hook))
    }

    pub fn around<F>(hook: F) -> Self
    where
        F: Fn(&mut AdviceChain) -> MethodResult + Send + Sync + 'static,
    {
        Advice::Around(Arc::new(hook))
    }

    pub fn after_returning<F>(hook: F) -> Self
    where
        F: Fn(&JoinPoint, &Value) -> Result<(), MethodError> + Send + Sync + 'static,
    {
        Advice::AfterReturning(Arc::new(hook))
    }

    pub fn after<F>(hook: F) -> Self
    where
        F: Fn(&JoinPoint) -> Result<(), MethodError> + Send + Sync + 'static,
    {
        Advice::After(Arc::new(hook))
    }

    pub fn throws<F>(hook: F) -> Self
    where
        F: Fn(&JoinPoint, &MethodError) -> Result<(), MethodError> + Send + Sync + 'static,
    {
        Advice::Throws(Arc::new(hook))
    }

    pub fn advice_type(&self) -> AdviceType {
        match self {
            Advice::Before(_) => AdviceType::Before,
            Advice::Around(_) => AdviceType::Around,
            Advice::AfterReturning(_) => AdviceType::AfterReturning,
            Advice::After(_) => AdviceType::After,
            Advice::Throws(_) => AdviceType::Throws,
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice::{:?}", self.advice_type())
    }
}
