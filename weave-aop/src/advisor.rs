//! 通知器（Advisor）：切点 + 通知组件名称

use std::fmt;
use std::sync::Arc;

use crate::pointcut::{ExpressionPointcut, Pointcut, PointcutParseError};

/// 通知器
///
/// 把一个切点和一个行为单元组件（按名称）绑定在一起
pub trait PointcutAdvisor: Send + Sync {
    fn pointcut(&self) -> &dyn Pointcut;

    /// 行为单元组件的名称
    fn advice_name(&self) -> &str;

    /// 排序值（数字越小越靠外层）
    fn order(&self) -> i32 {
        0
    }
}

/// 基于切点表达式的通知器
#[derive(Debug, Clone)]
pub struct ExpressionPointcutAdvisor {
    advice_name: String,
    pointcut: ExpressionPointcut,
    order: i32,
}

impl ExpressionPointcutAdvisor {
    pub fn new(
        advice_name: impl Into<String>,
        expression: &str,
    ) -> Result<Self, PointcutParseError> {
        Ok(Self {
            advice_name: advice_name.into(),
            pointcut: ExpressionPointcut::parse(expression)?,
            order: 0,
        })
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn expression(&self) -> &str {
        self.pointcut.source()
    }
}

impl PointcutAdvisor for ExpressionPointcutAdvisor {
    fn pointcut(&self) -> &dyn Pointcut {
        &self.pointcut
    }

    fn advice_name(&self) -> &str {
        &self.advice_name
    }

    fn order(&self) -> i32 {
        self.order
    }
}

impl fmt::Display for ExpressionPointcutAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.pointcut.source(), self.advice_name)
    }
}

/// 共享的通知器句柄
pub type AdvisorHandle = Arc<dyn PointcutAdvisor>;

/// 按 order 稳定排序
pub fn sort_advisors(advisors: &mut [AdvisorHandle]) {
    advisors.sort_by_key(|advisor| advisor.order());
}
