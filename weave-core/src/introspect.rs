//! 类型内省
//!
//! 容器不依赖任何语言级反射，而是通过 [`Introspector`] 读取显式登记的
//! [`TypeDescriptor`]：构造方法、方法、字段以及类型层次。
//!
//! 类型可以在运行时登记到 [`TypeCatalog`]，也可以在链接期通过
//! `inventory::submit!` 提交 [`TypeSubmission`]，再由
//! [`TypeCatalog::from_submissions`] 统一收集。

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{MethodError, MethodResult};
use crate::object::{Managed, Object, ObjectState};
use crate::value::{describe_args, ObjectRef, Value};

/// 类型句柄
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 去掉包路径后的简单名称：`shop.OrderService` -> `OrderService`
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<&TypeKey> for TypeKey {
    fn from(key: &TypeKey) -> Self {
        key.clone()
    }
}

/// 声明的参数 / 字段 / 返回值类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    Any,
    Bool,
    Int,
    Float,
    Str,
    List,
    Set,
    Map,
    Object(TypeKey),
    Void,
}

impl ParamType {
    pub fn object(name: impl AsRef<str>) -> Self {
        ParamType::Object(TypeKey::new(name))
    }

    /// 值是否可以赋给该类型
    ///
    /// `Null` 可以赋给对象类型和 `Any`；整数不会被放宽为浮点数。
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ParamType::Any, _) => true,
            (ParamType::Void, Value::Null) => true,
            (ParamType::Bool, Value::Bool(_)) => true,
            (ParamType::Int, Value::Int(_)) => true,
            (ParamType::Float, Value::Float(_)) => true,
            (ParamType::Str, Value::Str(_)) => true,
            (ParamType::List, Value::List(_)) => true,
            (ParamType::Set, Value::Set(_)) => true,
            (ParamType::Map, Value::Map(_)) => true,
            (ParamType::Object(_), Value::Null) => true,
            (ParamType::Object(key), Value::Object(object)) => object.is_instance_of(key),
            _ => false,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Any => f.write_str("Any"),
            ParamType::Bool => f.write_str("Bool"),
            ParamType::Int => f.write_str("Int"),
            ParamType::Float => f.write_str("Float"),
            ParamType::Str => f.write_str("Str"),
            ParamType::List => f.write_str("List"),
            ParamType::Set => f.write_str("Set"),
            ParamType::Map => f.write_str("Map"),
            ParamType::Object(key) => write!(f, "{}", key),
            ParamType::Void => f.write_str("Void"),
        }
    }
}

/// 有参数列表的可调用对象（构造方法、方法）
pub trait Signature {
    fn params(&self) -> &[ParamType];
}

/// 按参数选择重载
///
/// 先按实参的运行时类型做精确匹配；失败时按声明顺序选出第一个参数个数相同、
/// 且每个参数都可以接收对应实参的候选。
pub fn resolve_overload<'a, T: Signature>(candidates: &[&'a T], args: &[Value]) -> Option<&'a T> {
    let exact = candidates.iter().find(|candidate| {
        let params = candidate.params();
        params.len() == args.len()
            && params
                .iter()
                .zip(args)
                .all(|(param, arg)| *param == arg.runtime_type())
    });
    if let Some(found) = exact {
        return Some(*found);
    }

    candidates
        .iter()
        .filter(|candidate| candidate.params().len() == args.len())
        .find(|candidate| {
            candidate
                .params()
                .iter()
                .zip(args)
                .all(|(param, arg)| param.accepts(arg))
        })
        .copied()
}

/// 构造方法体：根据实参生成对象初始状态
pub type ConstructorFn = Arc<dyn Fn(&[Value]) -> Result<ObjectState, MethodError> + Send + Sync>;

/// 实例方法体
pub type InstanceFn = Arc<dyn Fn(&dyn Managed, &[Value]) -> MethodResult + Send + Sync>;

/// 静态方法体
pub type StaticFn = Arc<dyn Fn(&[Value]) -> MethodResult + Send + Sync>;

/// 构造方法描述
#[derive(Clone)]
pub struct ConstructorDescriptor {
    params: Vec<ParamType>,
    body: ConstructorFn,
}

impl ConstructorDescriptor {
    pub fn new(params: Vec<ParamType>, body: ConstructorFn) -> Self {
        Self { params, body }
    }

    pub fn construct(&self, args: &[Value]) -> Result<ObjectState, MethodError> {
        (self.body)(args)
    }
}

impl Signature for ConstructorDescriptor {
    fn params(&self) -> &[ParamType] {
        &self.params
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("params", &self.params)
            .finish()
    }
}

/// 方法体
#[derive(Clone)]
pub enum MethodBody {
    Instance(InstanceFn),
    Static(StaticFn),
    Abstract,
}

/// 方法描述
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    declaring_type: TypeKey,
    params: Vec<ParamType>,
    returns: ParamType,
    body: MethodBody,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> &TypeKey {
        &self.declaring_type
    }

    pub fn returns(&self) -> &ParamType {
        &self.returns
    }

    pub fn is_static(&self) -> bool {
        matches!(self.body, MethodBody::Static(_))
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.body, MethodBody::Abstract)
    }

    /// 调用方法；静态方法忽略接收者
    pub fn call(&self, receiver: Option<&dyn Managed>, args: &[Value]) -> MethodResult {
        match (&self.body, receiver) {
            (MethodBody::Static(body), _) => body(args),
            (MethodBody::Instance(body), Some(receiver)) => body(receiver, args),
            (MethodBody::Instance(_), None) => Err(MethodError::raised(
                "IllegalState",
                format!("instance method '{}' invoked without a receiver", self.name),
            )),
            (MethodBody::Abstract, _) => Err(MethodError::Abstract {
                type_name: self.declaring_type.to_string(),
                method: self.name.clone(),
            }),
        }
    }

    /// `name(Int, Str)` 形式的签名
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, params)
    }
}

impl Signature for MethodDescriptor {
    fn params(&self) -> &[ParamType] {
        &self.params
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.returns, self.declaring_type, self.signature())
    }
}

/// 字段描述
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: ParamType,
}

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    /// 能力接口，只声明抽象方法，不能实例化
    Interface,
}

/// 类型描述
///
/// 父类型和接口以 `Arc` 直接持有，所以对象只凭自身的描述就能回答
/// `is_instance_of`，无需回查目录。
pub struct TypeDescriptor {
    key: TypeKey,
    kind: TypeKind,
    superclass: Option<Arc<TypeDescriptor>>,
    interfaces: Vec<Arc<TypeDescriptor>>,
    constructors: Vec<ConstructorDescriptor>,
    methods: Vec<MethodDescriptor>,
    fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// 开始描述一个类
    pub fn class(name: impl AsRef<str>) -> TypeBuilder {
        TypeBuilder::new(TypeKey::new(name), TypeKind::Class)
    }

    /// 开始描述一个能力接口
    pub fn interface(name: impl AsRef<str>) -> TypeBuilder {
        TypeBuilder::new(TypeKey::new(name), TypeKind::Interface)
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn superclass(&self) -> Option<&Arc<TypeDescriptor>> {
        self.superclass.as_ref()
    }

    /// 直接实现的接口
    pub fn interfaces(&self) -> &[Arc<TypeDescriptor>] {
        &self.interfaces
    }

    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    /// 本类型声明的方法
    pub fn declared_methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// 本类型声明的字段
    pub fn declared_fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// 是否是 `key` 本身、它的子类或实现类
    pub fn is_subtype_of(&self, key: &TypeKey) -> bool {
        if &self.key == key {
            return true;
        }
        if let Some(superclass) = &self.superclass {
            if superclass.is_subtype_of(key) {
                return true;
            }
        }
        self.interfaces.iter().any(|iface| iface.is_subtype_of(key))
    }

    /// 自身及所有父类型、接口的键（自身在前）
    pub fn type_closure(&self) -> Vec<TypeKey> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        self.collect_closure(&mut seen, &mut out);
        out
    }

    fn collect_closure(&self, seen: &mut BTreeSet<TypeKey>, out: &mut Vec<TypeKey>) {
        if !seen.insert(self.key.clone()) {
            return;
        }
        out.push(self.key.clone());
        if let Some(superclass) = &self.superclass {
            superclass.collect_closure(seen, out);
        }
        for iface in &self.interfaces {
            iface.collect_closure(seen, out);
        }
    }

    /// 传递实现的全部接口，含父类实现的接口
    pub fn all_interfaces(&self) -> Vec<Arc<TypeDescriptor>> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        self.collect_interfaces(&mut seen, &mut out);
        out
    }

    fn collect_interfaces(&self, seen: &mut BTreeSet<TypeKey>, out: &mut Vec<Arc<TypeDescriptor>>) {
        for iface in &self.interfaces {
            if seen.insert(iface.key.clone()) {
                out.push(Arc::clone(iface));
                iface.collect_interfaces(seen, out);
            }
        }
        if let Some(superclass) = &self.superclass {
            superclass.collect_interfaces(seen, out);
        }
    }

    /// 全部可调用方法：自身、父类链、传递实现的接口，按此顺序
    pub fn all_methods(&self) -> Vec<&MethodDescriptor> {
        let mut out: Vec<&MethodDescriptor> = self.methods.iter().collect();
        let mut current = self.superclass.as_deref();
        while let Some(ty) = current {
            out.extend(ty.methods.iter());
            current = ty.superclass.as_deref();
        }
        let mut seen = BTreeSet::new();
        self.collect_interface_methods(&mut seen, &mut out);
        out
    }

    fn collect_interface_methods<'a>(
        &'a self,
        seen: &mut BTreeSet<TypeKey>,
        out: &mut Vec<&'a MethodDescriptor>,
    ) {
        for iface in &self.interfaces {
            if seen.insert(iface.key.clone()) {
                out.extend(iface.methods.iter());
                iface.collect_interface_methods(seen, out);
            }
        }
        if let Some(superclass) = &self.superclass {
            superclass.collect_interface_methods(seen, out);
        }
    }

    /// 全部字段，含继承的字段
    pub fn all_fields(&self) -> Vec<&FieldDescriptor> {
        let mut out: Vec<&FieldDescriptor> = self.fields.iter().collect();
        let mut current = self.superclass.as_deref();
        while let Some(ty) = current {
            out.extend(ty.fields.iter());
            current = ty.superclass.as_deref();
        }
        out
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.all_fields().into_iter().find(|field| field.name == name)
    }

    /// 按名称和实参解析方法
    pub fn resolve_method(&self, name: &str, args: &[Value]) -> Option<&MethodDescriptor> {
        let candidates: Vec<&MethodDescriptor> = self
            .all_methods()
            .into_iter()
            .filter(|method| method.name == name)
            .collect();
        resolve_overload(&candidates, args)
    }

    /// 按实参解析构造方法，返回声明序号
    pub fn resolve_constructor(&self, args: &[Value]) -> Option<usize> {
        let candidates: Vec<&ConstructorDescriptor> = self.constructors.iter().collect();
        let found = resolve_overload(&candidates, args)?;
        self.constructors
            .iter()
            .position(|ctor| std::ptr::eq(ctor, found))
    }

    /// 用指定构造方法创建实例
    pub fn new_instance(
        self: &Arc<Self>,
        index: usize,
        args: &[Value],
    ) -> Result<ObjectRef, MethodError> {
        if self.is_interface() {
            return Err(MethodError::raised(
                "InstantiationError",
                format!("'{}' is an interface", self.key),
            ));
        }
        let ctor = self.constructors.get(index).ok_or_else(|| MethodError::NoSuchMethod {
            type_name: self.key.to_string(),
            method: "<init>".to_string(),
            args: describe_args(args),
        })?;
        let state = ctor.construct(args)?;
        Ok(Arc::new(Object::new(Arc::clone(self), state)))
    }

    /// 解析构造方法并创建实例，供工厂方法体使用
    pub fn instantiate(self: &Arc<Self>, args: &[Value]) -> Result<ObjectRef, MethodError> {
        let index = self.resolve_constructor(args).ok_or_else(|| MethodError::NoSuchMethod {
            type_name: self.key.to_string(),
            method: "<init>".to_string(),
            args: describe_args(args),
        })?;
        self.new_instance(index, args)
    }

    /// 调用静态方法
    pub fn invoke_static(&self, name: &str, args: &[Value]) -> MethodResult {
        let method = self
            .resolve_method(name, args)
            .filter(|method| method.is_static())
            .ok_or_else(|| MethodError::NoSuchMethod {
                type_name: self.key.to_string(),
                method: name.to_string(),
                args: describe_args(args),
            })?;
        method.call(None, args)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("superclass", &self.superclass.as_ref().map(|s| s.key.clone()))
            .field(
                "interfaces",
                &self.interfaces.iter().map(|i| i.key.clone()).collect::<Vec<_>>(),
            )
            .field("constructors", &self.constructors.len())
            .field("methods", &self.methods)
            .field("fields", &self.fields)
            .finish()
    }
}

/// [`TypeDescriptor`] 构建器
pub struct TypeBuilder {
    key: TypeKey,
    kind: TypeKind,
    superclass: Option<Arc<TypeDescriptor>>,
    interfaces: Vec<Arc<TypeDescriptor>>,
    constructors: Vec<ConstructorDescriptor>,
    methods: Vec<MethodDescriptor>,
    fields: Vec<FieldDescriptor>,
}

impl TypeBuilder {
    fn new(key: TypeKey, kind: TypeKind) -> Self {
        Self {
            key,
            kind,
            superclass: None,
            interfaces: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn extends(mut self, superclass: &Arc<TypeDescriptor>) -> Self {
        self.superclass = Some(Arc::clone(superclass));
        self
    }

    pub fn implements(mut self, iface: &Arc<TypeDescriptor>) -> Self {
        self.interfaces.push(Arc::clone(iface));
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.fields.push(FieldDescriptor { name: name.into(), ty });
        self
    }

    pub fn constructor<F>(mut self, params: Vec<ParamType>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<ObjectState, MethodError> + Send + Sync + 'static,
    {
        self.constructors
            .push(ConstructorDescriptor::new(params, Arc::new(body)));
        self
    }

    pub fn method<F>(
        mut self,
        name: impl Into<String>,
        params: Vec<ParamType>,
        returns: ParamType,
        body: F,
    ) -> Self
    where
        F: Fn(&dyn Managed, &[Value]) -> MethodResult + Send + Sync + 'static,
    {
        self.push_method(name.into(), params, returns, MethodBody::Instance(Arc::new(body)));
        self
    }

    pub fn static_method<F>(
        mut self,
        name: impl Into<String>,
        params: Vec<ParamType>,
        returns: ParamType,
        body: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> MethodResult + Send + Sync + 'static,
    {
        self.push_method(name.into(), params, returns, MethodBody::Static(Arc::new(body)));
        self
    }

    pub fn abstract_method(
        mut self,
        name: impl Into<String>,
        params: Vec<ParamType>,
        returns: ParamType,
    ) -> Self {
        self.push_method(name.into(), params, returns, MethodBody::Abstract);
        self
    }

    fn push_method(
        &mut self,
        name: String,
        params: Vec<ParamType>,
        returns: ParamType,
        body: MethodBody,
    ) {
        self.methods.push(MethodDescriptor {
            name,
            declaring_type: self.key.clone(),
            params,
            returns,
            body,
        });
    }

    /// 完成构建；没有声明构造方法的类获得一个无参构造方法
    pub fn build(mut self) -> Arc<TypeDescriptor> {
        if self.kind == TypeKind::Class && self.constructors.is_empty() {
            self.constructors.push(ConstructorDescriptor::new(
                Vec::new(),
                Arc::new(|_| Ok(ObjectState::new())),
            ));
        }
        Arc::new(TypeDescriptor {
            key: self.key,
            kind: self.kind,
            superclass: self.superclass,
            interfaces: self.interfaces,
            constructors: self.constructors,
            methods: self.methods,
            fields: self.fields,
        })
    }
}

/// 能力内省接口
pub trait Introspector: Send + Sync {
    /// 查找类型描述
    fn describe(&self, key: &TypeKey) -> Option<Arc<TypeDescriptor>>;

    /// 全部已知类型
    fn known_types(&self) -> Vec<TypeKey>;

    fn list_constructors(&self, key: &TypeKey) -> Option<Vec<ConstructorDescriptor>> {
        self.describe(key).map(|ty| ty.constructors().to_vec())
    }

    fn list_methods(&self, key: &TypeKey) -> Option<Vec<MethodDescriptor>> {
        self.describe(key)
            .map(|ty| ty.all_methods().into_iter().cloned().collect())
    }

    fn list_fields(&self, key: &TypeKey) -> Option<Vec<FieldDescriptor>> {
        self.describe(key)
            .map(|ty| ty.all_fields().into_iter().cloned().collect())
    }
}

/// 链接期提交的类型
pub struct TypeSubmission {
    pub build: fn() -> Arc<TypeDescriptor>,
}

inventory::collect!(TypeSubmission);

/// 显式登记表实现的内省器
#[derive(Default)]
pub struct TypeCatalog {
    types: RwLock<HashMap<TypeKey, Arc<TypeDescriptor>>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 收集所有通过 `inventory` 提交的类型
    pub fn from_submissions() -> Self {
        let catalog = Self::new();
        for submission in inventory::iter::<TypeSubmission> {
            catalog.register(&(submission.build)());
        }
        tracing::debug!("Collected {} types from submissions", catalog.len());
        catalog
    }

    /// 登记类型及其父类型、接口；同名类型保留先登记的
    pub fn register(&self, descriptor: &Arc<TypeDescriptor>) {
        {
            let mut types = self.types.write();
            if types.contains_key(descriptor.key()) {
                return;
            }
            tracing::trace!("Registering type '{}'", descriptor.key());
            types.insert(descriptor.key().clone(), Arc::clone(descriptor));
        }
        if let Some(superclass) = descriptor.superclass() {
            self.register(superclass);
        }
        for iface in descriptor.interfaces() {
            self.register(iface);
        }
    }

    pub fn with(self, descriptor: &Arc<TypeDescriptor>) -> Self {
        self.register(descriptor);
        self
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.types.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

impl Introspector for TypeCatalog {
    fn describe(&self, key: &TypeKey) -> Option<Arc<TypeDescriptor>> {
        self.types.read().get(key).cloned()
    }

    fn known_types(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.types.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}
