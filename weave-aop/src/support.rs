//! 通知器和行为单元本身也是组件
//!
//! 这里提供它们的类型描述和定义构造函数，注册方式与普通组件相同，
//! 自动代理创建器按类型找到它们。

use std::sync::Arc;

use weave_core::{
    ComponentDefinition, Managed, MethodError, ObjectRef, ObjectState, ParamType, TypeDescriptor,
    Value, ValueDescriptor,
};

use crate::advice::Advice;
use crate::advisor::{AdvisorHandle, ExpressionPointcutAdvisor, PointcutAdvisor};

/// 通知器接口
pub const ADVISOR_TYPE: &str = "weave.aop.Advisor";

/// 基于表达式的通知器实现
pub const EXPRESSION_ADVISOR_TYPE: &str = "weave.aop.ExpressionPointcutAdvisor";

/// 行为单元接口
pub const ADVICE_TYPE: &str = "weave.aop.Advice";

pub fn advisor_interface() -> Arc<TypeDescriptor> {
    TypeDescriptor::interface(ADVISOR_TYPE)
        .abstract_method("adviceName", vec![], ParamType::Str)
        .abstract_method("expression", vec![], ParamType::Str)
        .build()
}

pub fn advice_interface() -> Arc<TypeDescriptor> {
    TypeDescriptor::interface(ADVICE_TYPE)
        .abstract_method("adviceType", vec![], ParamType::Str)
        .build()
}

/// 通知器组件类型
///
/// 构造参数：行为单元组件名称、切点表达式，可选的排序值
pub fn advisor_component_type() -> Arc<TypeDescriptor> {
    TypeDescriptor::class(EXPRESSION_ADVISOR_TYPE)
        .implements(&advisor_interface())
        .constructor(vec![ParamType::Str, ParamType::Str], |args| {
            build_advisor(args, 0)
        })
        .constructor(vec![ParamType::Str, ParamType::Str, ParamType::Int], |args| {
            let order = args.get(2).and_then(Value::as_int).unwrap_or_default();
            build_advisor(args, i32::try_from(order).unwrap_or(i32::MAX))
        })
        .method("adviceName", vec![], ParamType::Str, |this, _| {
            let advisor = native_advisor(this)?;
            Ok(Value::from(advisor.advice_name()))
        })
        .method("expression", vec![], ParamType::Str, |this, _| {
            let advisor = native_advisor(this)?;
            Ok(Value::from(advisor.expression()))
        })
        .build()
}

fn build_advisor(args: &[Value], order: i32) -> Result<ObjectState, MethodError> {
    let advice_name = args.first().and_then(Value::as_str).unwrap_or_default();
    let expression = args.get(1).and_then(Value::as_str).unwrap_or_default();
    let advisor = ExpressionPointcutAdvisor::new(advice_name, expression)
        .map_err(|e| MethodError::raised("PointcutParseError", e.to_string()))?
        .with_order(order);
    Ok(ObjectState::new().with_native(advisor))
}

fn native_advisor(this: &dyn Managed) -> Result<&ExpressionPointcutAdvisor, MethodError> {
    this.native::<ExpressionPointcutAdvisor>().ok_or_else(|| {
        MethodError::raised("IllegalState", "advisor component without advisor data")
    })
}

/// 行为单元组件类型
///
/// 每个实例都持有同一个 [`Advice`]
pub fn advice_component_type(type_name: &str, advice: Advice) -> Arc<TypeDescriptor> {
    let kind = format!("{:?}", advice.advice_type());
    TypeDescriptor::class(type_name)
        .implements(&advice_interface())
        .constructor(vec![], move |_| Ok(ObjectState::new().with_native(advice.clone())))
        .method("adviceType", vec![], ParamType::Str, move |_, _| Ok(Value::from(kind.as_str())))
        .build()
}

/// 通知器组件的定义
pub fn advisor_definition(advice_name: &str, expression: &str) -> ComponentDefinition {
    ComponentDefinition::of_type(EXPRESSION_ADVISOR_TYPE)
        .with_constructor_arg(ValueDescriptor::literal(advice_name))
        .with_constructor_arg(ValueDescriptor::literal(expression))
}

/// 带排序值的通知器组件定义
pub fn ordered_advisor_definition(
    advice_name: &str,
    expression: &str,
    order: i32,
) -> ComponentDefinition {
    advisor_definition(advice_name, expression)
        .with_constructor_arg(ValueDescriptor::literal(i64::from(order)))
}

/// 取出组件携带的行为单元（穿透代理）
pub fn advice_of(component: &ObjectRef) -> Option<Advice> {
    let target = component.proxied_target().unwrap_or_else(|| Arc::clone(component));
    target.native::<Advice>().cloned()
}

/// 取出组件携带的通知器（穿透代理）
pub fn advisor_of(component: &ObjectRef) -> Option<AdvisorHandle> {
    let target = component.proxied_target().unwrap_or_else(|| Arc::clone(component));
    target
        .native::<ExpressionPointcutAdvisor>()
        .map(|advisor| Arc::new(advisor.clone()) as AdvisorHandle)
}

/// 通知器和行为单元组件不会被代理
pub fn is_infrastructure(component: &dyn Managed) -> bool {
    component.is_instance_of(&ADVISOR_TYPE.into())
        || component.is_instance_of(&ADVICE_TYPE.into())
        || component.native::<Advice>().is_some()
        || component.native::<ExpressionPointcutAdvisor>().is_some()
}

weave_core::inventory::submit! {
    weave_core::TypeSubmission {
        build: advisor_component_type,
    }
}
