//! 容器设置
//!
//! 从 TOML 读取，环境变量可以覆盖其中的开关：
//!
//! ```toml
//! preinstantiate_singletons = true
//! validate_dependencies = false
//!
//! [logging]
//! level = "debug"
//! format = "json"
//!
//! [aop]
//! enabled = true
//! proxy_target_type = "auto"
//! ```

use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

use crate::logging::LoggingConfig;

/// 代理策略选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    /// 目标实现了接口时用接口代理，否则用子类代理
    #[default]
    Auto,
    /// 总是使用子类代理
    TargetType,
    /// 只用接口代理，目标没有接口时失败
    InterfacesOnly,
}

impl FromStr for ProxyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ProxyMode::Auto),
            "target_type" | "true" => Ok(ProxyMode::TargetType),
            "interfaces_only" | "false" => Ok(ProxyMode::InterfacesOnly),
            _ => Err(format!("Invalid proxy mode: {}", s)),
        }
    }
}

/// AOP 设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AopSettings {
    pub enabled: bool,
    pub proxy_target_type: ProxyMode,
}

impl Default for AopSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            proxy_target_type: ProxyMode::Auto,
        }
    }
}

/// 容器设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// refresh 时是否预实例化全部单例
    pub preinstantiate_singletons: bool,

    /// refresh 时是否先做静态依赖检查
    pub validate_dependencies: bool,

    pub logging: LoggingConfig,

    pub aop: AopSettings,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            preinstantiate_singletons: true,
            validate_dependencies: false,
            logging: LoggingConfig::default(),
            aop: AopSettings::default(),
        }
    }
}

impl ContainerSettings {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("failed to parse container settings")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        tracing::debug!("Loaded container settings from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// 读取设置文件（若存在）并应用环境变量覆盖
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                tracing::debug!("Settings file {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        Ok(settings.with_env_overrides())
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// 用查找函数提供的值覆盖开关，无法解析的值被忽略
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("WEAVE_PREINSTANTIATE").and_then(|v| parse_bool(&v)) {
            self.preinstantiate_singletons = value;
        }
        if let Some(value) = lookup("WEAVE_VALIDATE_DEPENDENCIES").and_then(|v| parse_bool(&v)) {
            self.validate_dependencies = value;
        }
        if let Some(value) = lookup("WEAVE_AOP_ENABLED").and_then(|v| parse_bool(&v)) {
            self.aop.enabled = value;
        }
        if let Some(mode) = lookup("WEAVE_AOP_PROXY_TARGET_TYPE").and_then(|v| v.parse().ok()) {
            self.aop.proxy_target_type = mode;
        }
        self.logging = self.logging.with_overrides(&lookup);
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
