//! 托管对象
//!
//! [`Managed`] 是容器能持有的一切对象的能力面：普通对象 [`Object`] 和
//! AOP 生成的代理都实现它，调用方无法区分二者。

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::error::{MethodError, MethodResult};
use crate::introspect::{TypeDescriptor, TypeKey};
use crate::value::{describe_args, ObjectRef, Value};

/// 字段写入错误
#[derive(Debug, Error)]
pub enum FieldAccessError {
    #[error("type '{type_name}' has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("fields of '{0}' are not writable")]
    ReadOnly(String),
}

/// 托管对象的能力面
pub trait Managed: Send + Sync {
    /// 对象的运行时类型
    fn descriptor(&self) -> &Arc<TypeDescriptor>;

    /// 按名称和实参调用方法
    fn invoke(&self, method: &str, args: Vec<Value>) -> MethodResult;

    /// 读取字段
    fn field(&self, name: &str) -> Option<Value>;

    /// 直接写入字段，不经过任何方法
    fn set_field(&self, name: &str, value: Value) -> Result<(), FieldAccessError>;

    /// 构造方法附带的原生数据
    fn native_any(&self) -> Option<&(dyn Any + Send + Sync)>;

    fn type_key(&self) -> &TypeKey {
        self.descriptor().key()
    }

    fn is_instance_of(&self, key: &TypeKey) -> bool {
        self.descriptor().is_subtype_of(key)
    }

    /// 代理背后的真实对象；普通对象返回 `None`
    fn proxied_target(&self) -> Option<ObjectRef> {
        None
    }
}

impl<'a> dyn Managed + 'a {
    /// 按具体类型读取原生数据
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.native_any()?.downcast_ref::<T>()
    }
}

impl<'a> fmt::Debug for dyn Managed + 'a {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.type_key(), self as *const Self as *const ())
    }
}

/// 构造方法产出的初始状态
#[derive(Default)]
pub struct ObjectState {
    fields: BTreeMap<String, Value>,
    native: Option<Box<dyn Any + Send + Sync>>,
}

impl ObjectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_native<T: Any + Send + Sync>(mut self, native: T) -> Self {
        self.native = Some(Box::new(native));
        self
    }
}

/// 普通对象
pub struct Object {
    descriptor: Arc<TypeDescriptor>,
    fields: RwLock<BTreeMap<String, Value>>,
    native: Option<Box<dyn Any + Send + Sync>>,
}

impl Object {
    /// 声明过但构造方法没有赋值的字段初始化为 `Null`
    pub fn new(descriptor: Arc<TypeDescriptor>, state: ObjectState) -> Self {
        let mut fields = state.fields;
        for field in descriptor.all_fields() {
            fields.entry(field.name.clone()).or_insert(Value::Null);
        }
        Self {
            descriptor,
            fields: RwLock::new(fields),
            native: state.native,
        }
    }
}

impl Managed for Object {
    fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    fn invoke(&self, method: &str, args: Vec<Value>) -> MethodResult {
        let resolved = self
            .descriptor
            .resolve_method(method, &args)
            .ok_or_else(|| MethodError::NoSuchMethod {
                type_name: self.descriptor.key().to_string(),
                method: method.to_string(),
                args: describe_args(&args),
            })?;
        resolved.call(Some(self as &dyn Managed), &args)
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    fn set_field(&self, name: &str, value: Value) -> Result<(), FieldAccessError> {
        let declared = self
            .descriptor
            .find_field(name)
            .ok_or_else(|| FieldAccessError::UnknownField {
                type_name: self.descriptor.key().to_string(),
                field: name.to_string(),
            })?;
        if !declared.ty.accepts(&value) {
            return Err(FieldAccessError::TypeMismatch {
                field: name.to_string(),
                expected: declared.ty.to_string(),
                found: value.runtime_type().to_string(),
            });
        }
        self.fields.write().insert(name.to_string(), value);
        Ok(())
    }

    fn native_any(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.native.as_deref()
    }
}
