//! 连接点（JoinPoint）定义
//!
//! 连接点表示一次被拦截的方法调用

use std::fmt;
use std::time::Instant;

use weave_core::{MethodDescriptor, ObjectRef, TypeKey, Value};

/// 连接点信息
///
/// 包含方法调用时的上下文信息
#[derive(Clone)]
pub struct JoinPoint {
    /// 被代理的真实对象
    target: ObjectRef,

    /// 被调用的方法
    method: MethodDescriptor,

    /// 实参
    args: Vec<Value>,

    /// 调用时间戳
    timestamp: Instant,
}

impl JoinPoint {
    pub fn new(target: ObjectRef, method: MethodDescriptor, args: Vec<Value>) -> Self {
        Self {
            target,
            method,
            args,
            timestamp: Instant::now(),
        }
    }

    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    pub fn target_type(&self) -> &TypeKey {
        self.target.type_key()
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn timestamp(&self) -> &Instant {
        &self.timestamp
    }

    /// 获取完整的方法签名
    pub fn signature(&self) -> String {
        format!("{}.{}", self.target_type(), self.method.signature())
    }

    pub(crate) fn replace_args(&mut self, args: Vec<Value>) -> Vec<Value> {
        std::mem::replace(&mut self.args, args)
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("signature", &self.signature())
            .field("args", &self.args)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}
