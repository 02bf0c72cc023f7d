use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use vef_types::abi::VefSqlType;

/// Manifest file name inside a package.
pub const MANIFEST_FILE: &str = "vef.toml";
/// Checksum file name inside a package.
pub const CHECKSUM_FILE: &str = "CHECKSUMS";

/// `vef.toml` 清单模型，安装器据此登记扩展
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionManifest {
    pub extension: ExtensionMeta,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionMeta {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    /// File name of the shared library inside the package.
    pub library: String,
}

/// Declared signature of one SQL-visible function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub returns: VefSqlType,
    #[serde(default)]
    pub args: Vec<VefSqlType>,
    #[serde(default)]
    pub max_result_len: usize,
}

impl ExtensionManifest {
    /// 从文件加载并校验清单
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let manifest = Self::parse(&raw)
            .with_context(|| format!("failed to parse manifest {}", path.display()))?;
        Ok(manifest)
    }

    /// 解析并校验清单文本
    pub fn parse(raw: &str) -> Result<Self> {
        let manifest: ExtensionManifest = toml::from_str(raw)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// 校验清单内容
    pub fn validate(&self) -> Result<()> {
        if self.extension.name.is_empty() {
            return Err(anyhow!("extension name must not be empty"));
        }
        if !self
            .extension
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(anyhow!(
                "extension name must be alphanumeric/underscore: {}",
                self.extension.name
            ));
        }
        if self.extension.version.is_empty() {
            return Err(anyhow!("extension version must not be empty"));
        }
        if self.extension.library.is_empty() {
            return Err(anyhow!("extension library must not be empty"));
        }
        // 库文件以归档条目名出现，不允许携带路径
        if self.extension.library.contains('/') || self.extension.library.contains('\\') {
            return Err(anyhow!(
                "library must be a bare file name: {}",
                self.extension.library
            ));
        }

        for decl in &self.functions {
            if decl.name.is_empty() {
                return Err(anyhow!("function name must not be empty"));
            }
            if decl.returns == VefSqlType::Text && decl.max_result_len == 0 {
                return Err(anyhow!(
                    "function {} returns text but declares no max_result_len",
                    decl.name
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[extension]
name = "hello_world"
version = "0.1.0"
description = "Example extension"
author = "VillageSQL"
license = "MIT"
library = "libhello_world.so"

[[functions]]
name = "hello_world"
returns = "text"
args = []
max_result_len = 255

[[functions]]
name = "greet"
returns = "text"
args = ["text"]
max_result_len = 255
"#;

    #[test]
    fn test_parse_valid_manifest() {
        let manifest = ExtensionManifest::parse(VALID).unwrap();
        assert_eq!(manifest.extension.name, "hello_world");
        assert_eq!(manifest.extension.library, "libhello_world.so");
        assert_eq!(manifest.functions.len(), 2);
        assert_eq!(manifest.functions[1].args, vec![VefSqlType::Text]);
    }

    #[test]
    fn test_reject_text_function_without_capacity() {
        let raw = r#"
[extension]
name = "x"
version = "0.1.0"
library = "libx.so"

[[functions]]
name = "f"
returns = "text"
"#;
        let err = ExtensionManifest::parse(raw).unwrap_err();
        assert!(err.to_string().contains("max_result_len"));
    }

    #[test]
    fn test_reject_library_with_path_components() {
        let raw = r#"
[extension]
name = "x"
version = "0.1.0"
library = "../libx.so"
"#;
        assert!(ExtensionManifest::parse(raw).is_err());
    }

    #[test]
    fn test_reject_bad_extension_name() {
        let raw = r#"
[extension]
name = "hello world"
version = "0.1.0"
library = "libx.so"
"#;
        assert!(ExtensionManifest::parse(raw).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, VALID).unwrap();

        let manifest = ExtensionManifest::load(&path).unwrap();
        assert_eq!(manifest.extension.version, "0.1.0");
    }
}
