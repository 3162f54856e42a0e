//! 定义注册表
//!
//! 保存名称到定义的映射、别名表以及按类型的索引。类型索引在所有定义注册完成后
//! 由容器一次性构建，见 `DefaultComponentFactory::build_type_index`。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::definition::ComponentDefinition;
use crate::error::RegistrationError;
use crate::introspect::TypeKey;

/// 定义注册接口
pub trait DefinitionRegistry: Send + Sync {
    /// 注册定义；空名称、非法定义和重名都会失败
    fn register_definition(
        &self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<(), RegistrationError>;

    fn get_definition(&self, name: &str) -> Option<Arc<ComponentDefinition>>;

    fn contains_definition(&self, name: &str) -> bool;

    /// 按注册顺序返回全部名称
    fn definition_names(&self) -> Vec<String>;

    fn definition_count(&self) -> usize {
        self.definition_names().len()
    }
}

/// 别名注册接口
pub trait AliasRegistry: Send + Sync {
    fn register_alias(&self, name: &str, alias: &str) -> Result<(), RegistrationError>;

    /// 移除别名，返回它是否存在
    fn remove_alias(&self, alias: &str) -> bool;

    fn is_alias(&self, name: &str) -> bool;

    /// 别名解析为规范名称；不是别名时原样返回
    fn canonical_name(&self, name: &str) -> String;

    /// 指向 `name` 的全部别名
    fn aliases(&self, name: &str) -> Vec<String>;
}

/// 注册表的默认存储
#[derive(Default)]
pub struct DefinitionStore {
    definitions: RwLock<HashMap<String, Arc<ComponentDefinition>>>,
    order: RwLock<Vec<String>>,
    aliases: RwLock<HashMap<String, String>>,
    type_index: RwLock<HashMap<TypeKey, BTreeSet<String>>>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以新的内容替换整个类型索引
    pub fn replace_type_index(&self, index: HashMap<TypeKey, BTreeSet<String>>) {
        *self.type_index.write() = index;
    }

    /// 索引在 `key` 下的组件名称
    pub fn names_for_type(&self, key: &TypeKey) -> Vec<String> {
        self.type_index
            .read()
            .get(key)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn indexed_type_count(&self) -> usize {
        self.type_index.read().len()
    }
}

impl DefinitionRegistry for DefinitionStore {
    fn register_definition(
        &self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<(), RegistrationError> {
        if name.trim().is_empty() {
            return Err(RegistrationError::BlankName);
        }

        definition
            .validate()
            .map_err(|reason| RegistrationError::InvalidDefinition {
                name: name.to_string(),
                reason: reason.to_string(),
            })?;

        let mut definitions = self.definitions.write();
        if definitions.contains_key(name) {
            tracing::warn!("Rejecting duplicate definition for component '{}'", name);
            return Err(RegistrationError::Duplicate {
                name: name.to_string(),
            });
        }
        if let Some(target) = self.aliases.read().get(name) {
            tracing::warn!("Rejecting definition '{}': the name is an alias of '{}'", name, target);
            return Err(RegistrationError::Duplicate {
                name: name.to_string(),
            });
        }

        tracing::debug!("Registering component definition '{}': {:?}", name, definition);
        definitions.insert(name.to_string(), Arc::new(definition));
        self.order.write().push(name.to_string());
        Ok(())
    }

    fn get_definition(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        self.definitions.read().get(name).cloned()
    }

    fn contains_definition(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    fn definition_names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    fn definition_count(&self) -> usize {
        self.definitions.read().len()
    }
}

impl AliasRegistry for DefinitionStore {
    fn register_alias(&self, name: &str, alias: &str) -> Result<(), RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidAlias {
            name: name.to_string(),
            alias: alias.to_string(),
            reason: reason.to_string(),
        };

        if name.trim().is_empty() || alias.trim().is_empty() {
            return Err(invalid("name and alias must not be blank"));
        }
        if name == alias {
            return Err(invalid("alias equals the name"));
        }

        let canonical = self.canonical_name(name);
        if !self.contains_definition(&canonical) {
            return Err(invalid("no component with that name is registered"));
        }
        if self.contains_definition(alias) {
            return Err(invalid("alias shadows a registered component"));
        }

        let mut aliases = self.aliases.write();
        match aliases.get(alias) {
            Some(existing) if *existing == canonical => Ok(()),
            Some(existing) => Err(RegistrationError::InvalidAlias {
                name: name.to_string(),
                alias: alias.to_string(),
                reason: format!("alias already points to '{}'", existing),
            }),
            None => {
                tracing::debug!("Registering alias '{}' for component '{}'", alias, canonical);
                aliases.insert(alias.to_string(), canonical);
                Ok(())
            }
        }
    }

    fn remove_alias(&self, alias: &str) -> bool {
        self.aliases.write().remove(alias).is_some()
    }

    fn is_alias(&self, name: &str) -> bool {
        self.aliases.read().contains_key(name)
    }

    fn canonical_name(&self, name: &str) -> String {
        self.aliases
            .read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        let mut found: Vec<String> = self
            .aliases
            .read()
            .iter()
            .filter(|(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.clone())
            .collect();
        found.sort();
        found
    }
}
