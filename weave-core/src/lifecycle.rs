//! ComponentPostProcessor - 组件工厂扩展机制
//!
//! 提供在组件初始化前后进行自定义处理的钩子

use crate::error::ContainerResult;
use crate::value::ObjectRef;

/// ComponentPostProcessor trait
///
/// 在组件初始化的不同阶段提供钩子，允许替换组件实例
///
/// 使用场景：
/// - AOP 代理创建
/// - 组件包装
/// - 校验
pub trait ComponentPostProcessor: Send + Sync {
    /// 在字段注入之后、init 钩子之前调用
    fn before_initialization(
        &self,
        component: ObjectRef,
        _name: &str,
    ) -> ContainerResult<ObjectRef> {
        Ok(component)
    }

    /// 在 init 钩子之后调用
    ///
    /// 返回值替换原组件，例如 AOP 代理
    fn after_initialization(
        &self,
        component: ObjectRef,
        _name: &str,
    ) -> ContainerResult<ObjectRef> {
        Ok(component)
    }

    /// 处理器名称（用于日志）
    fn name(&self) -> &str {
        "ComponentPostProcessor"
    }

    /// 优先级（数字越小越先执行）
    fn order(&self) -> i32 {
        1000
    }
}
