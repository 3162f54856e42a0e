//! 通知链
//!
//! 一次调用对应一条链：按顺序执行匹配到的通知，最后调用真实方法。
//! 链只在当前调用内使用，不在线程或调用之间共享。

use weave_core::{MethodResult, Value};

use crate::advice::Advice;
use crate::joinpoint::JoinPoint;

/// 通知链游标
///
/// 环绕通知拿到的就是它，通过 [`AdviceChain::proceed`] 继续执行下游
pub struct AdviceChain {
    join_point: JoinPoint,
    advices: Vec<Advice>,
    /// `proceed` 从这里继续
    next: usize,
}

impl AdviceChain {
    pub fn new(join_point: JoinPoint, advices: Vec<Advice>) -> Self {
        Self {
            join_point,
            advices,
            next: 0,
        }
    }

    pub fn join_point(&self) -> &JoinPoint {
        &self.join_point
    }

    pub fn args(&self) -> &[Value] {
        self.join_point.args()
    }

    /// 执行下游（剩余通知和真实方法）
    ///
    /// 环绕通知可以多次调用以实现重试
    pub fn proceed(&mut self) -> MethodResult {
        self.invoke_from(self.next)
    }

    /// 用替换后的实参执行下游，返回后恢复原实参
    pub fn proceed_with(&mut self, args: Vec<Value>) -> MethodResult {
        let original = self.join_point.replace_args(args);
        let result = self.proceed();
        self.join_point.replace_args(original);
        result
    }

    fn invoke_from(&mut self, index: usize) -> MethodResult {
        let Some(advice) = self.advices.get(index).cloned() else {
            return self.invoke_target();
        };

        match advice {
            Advice::Before(hook) => {
                hook.before(&self.join_point)?;
                self.invoke_from(index + 1)
            }
            Advice::Around(hook) => {
                let saved = self.next;
                self.next = index + 1;
                let result = hook.invoke(self);
                self.next = saved;
                result
            }
            Advice::AfterReturning(hook) => {
                let value = self.invoke_from(index + 1)?;
                hook.after_returning(&self.join_point, &value)?;
                Ok(value)
            }
            Advice::After(hook) => {
                let result = self.invoke_from(index + 1);
                match (result, hook.after(&self.join_point)) {
                    (Ok(value), Ok(())) => Ok(value),
                    (Ok(_), Err(hook_error)) => Err(hook_error),
                    (Err(error), Ok(())) => Err(error),
                    (Err(error), Err(hook_error)) => {
                        tracing::warn!(
                            "After advice on {} failed while propagating an error: {}",
                            self.join_point,
                            hook_error
                        );
                        Err(error)
                    }
                }
            }
            Advice::Throws(hook) => match self.invoke_from(index + 1) {
                Ok(value) => Ok(value),
                Err(error) => {
                    if let Err(hook_error) = hook.after_throwing(&self.join_point, &error) {
                        tracing::warn!(
                            "Throws advice on {} failed: {}",
                            self.join_point,
                            hook_error
                        );
                    }
                    Err(error)
                }
            },
        }
    }

    fn invoke_target(&self) -> MethodResult {
        tracing::trace!("Invoking target method {}", self.join_point);
        self.join_point
            .target()
            .invoke(self.join_point.method_name(), self.join_point.args().to_vec())
    }
}
