//! 构造上下文
//!
//! 一次顶层 `get_component` 调用及其嵌套解析共享同一个
//! [`ConstructionContext`]：记录“正在创建”的名称链和提前暴露的实例。
//! 上下文显式地沿调用链传递，不同线程上互不相关的调用看不到彼此的中间状态。

use std::collections::HashMap;

use crate::error::{ContainerError, ContainerResult};
use crate::value::ObjectRef;

#[derive(Default)]
pub struct ConstructionContext {
    building: Vec<String>,
    early: HashMap<String, ObjectRef>,
}

impl ConstructionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_building(&self, name: &str) -> bool {
        self.building.iter().any(|n| n == name)
    }

    /// 标记开始创建；名称已在链上时报告循环依赖
    pub fn begin(&mut self, name: &str) -> ContainerResult<()> {
        if self.is_building(name) {
            return Err(ContainerError::CircularDependency {
                name: name.to_string(),
                chain: format!("{} -> {}", self.building.join(" -> "), name),
            });
        }
        self.building.push(name.to_string());
        Ok(())
    }

    pub fn finish(&mut self, name: &str) {
        if let Some(pos) = self.building.iter().rposition(|n| n == name) {
            self.building.remove(pos);
        }
    }

    /// 当前创建链，外层在前
    pub fn chain(&self) -> &[String] {
        &self.building
    }

    /// 原始实例创建后、字段注入前发布
    pub fn expose_early(&mut self, name: &str, instance: ObjectRef) {
        tracing::trace!("Exposing early reference to '{}'", name);
        self.early.insert(name.to_string(), instance);
    }

    pub fn early_reference(&self, name: &str) -> Option<ObjectRef> {
        self.early.get(name).cloned()
    }

    pub fn retract_early(&mut self, name: &str) {
        self.early.remove(name);
    }

    pub fn is_idle(&self) -> bool {
        self.building.is_empty() && self.early.is_empty()
    }
}
