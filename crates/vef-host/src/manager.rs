use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Context, Result};
use vef_types::abi::VefEntryFn;

use crate::loader::{ExtensionHost, LoadedExtension};
use crate::value::{HostValue, SqlReturn};

/// Installed extensions by name, resolving SQL-level calls to registered
/// callbacks. Functions are reachable unqualified (`greet()`) when the
/// name is unique, or qualified with the extension name
/// (`hello_world.greet()`).
pub struct ExtensionManager {
    host: ExtensionHost,
    extensions: RwLock<HashMap<String, LoadedExtension>>,
}

impl ExtensionManager {
    pub fn new() -> Self {
        Self {
            host: ExtensionHost::new(),
            extensions: RwLock::new(HashMap::new()),
        }
    }

    /// Install from a `.veb` package: unpack under `work_dir`, load the
    /// contained library, and expose the extension under its manifest
    /// name. Reinstalling an existing name replaces it.
    pub fn install_package(&self, package: &Path, work_dir: &Path) -> Result<String> {
        let stem = package
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("extension");
        let unpacked = vef_pack::unpack(package, &work_dir.join(stem))
            .with_context(|| format!("failed to unpack {}", package.display()))?;

        let extension = self.host.load(&unpacked.library_path)?;

        // 清单声明的函数必须真的被注册，装半截的包直接拒绝
        for decl in &unpacked.manifest.functions {
            if extension.registry().get(&decl.name).is_none() {
                bail!(
                    "manifest declares function {} but the library does not register it",
                    decl.name
                );
            }
        }
        for name in extension.registry().names() {
            if !unpacked.manifest.functions.iter().any(|d| d.name == name) {
                tracing::warn!("library registers undeclared function {name}");
            }
        }

        let name = unpacked.manifest.extension.name.clone();
        let mut extensions = self
            .extensions
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {e}"))?;
        extensions.insert(name.clone(), extension);

        tracing::info!("installed extension {name} from {}", package.display());
        Ok(name)
    }

    /// Install an extension linked into this process under the given name.
    pub fn install_static(&self, name: &str, entry: VefEntryFn) -> Result<()> {
        let extension = self.host.load_static(entry)?;
        let mut extensions = self
            .extensions
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {e}"))?;
        extensions.insert(name.to_string(), extension);
        Ok(())
    }

    /// Call a function by SQL name, `fn` or `extension.fn`.
    pub fn call_function(&self, name: &str, args: &[HostValue]) -> Result<SqlReturn> {
        let extensions = self
            .extensions
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {e}"))?;

        if let Some((namespace, func)) = name.split_once('.') {
            let extension = extensions
                .get(namespace)
                .ok_or_else(|| anyhow!("unknown extension: {namespace}"))?;
            return extension.call(func, args);
        }

        let mut hits = extensions
            .values()
            .filter(|ext| ext.registry().get(name).is_some());
        let Some(first) = hits.next() else {
            bail!("unknown function: {name}");
        };
        if hits.next().is_some() {
            bail!("ambiguous function name: {name} (qualify with extension name)");
        }
        first.call(name, args)
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.read().map(|map| map.len()).unwrap_or(0)
    }

    /// Sorted `extension.function` names across all installed extensions.
    pub fn function_names(&self) -> Vec<String> {
        let Ok(extensions) = self.extensions.read() else {
            return Vec::new();
        };
        let mut names: Vec<String> = extensions
            .iter()
            .flat_map(|(ext_name, ext)| {
                ext.registry()
                    .names()
                    .into_iter()
                    .map(move |f| format!("{ext_name}.{f}"))
            })
            .collect();
        names.sort();
        names
    }
}

impl Default for ExtensionManager {
    fn default() -> Self {
        Self::new()
    }
}
