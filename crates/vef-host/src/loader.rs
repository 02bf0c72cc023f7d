use std::path::Path;

use anyhow::{bail, Context, Result};
use vef_types::abi::{
    VefAbiVersionFn, VefEntryFn, VefRegistrar, VefRegistry, VEF_ABI_VERSION,
    VEF_ABI_VERSION_SYMBOL, VEF_ENTRY_SYMBOL, VEF_OK,
};
use vef_types::VefError;

use crate::registry::{self, FunctionRegistry};
use crate::value::{HostValue, SqlReturn};

/// Loads extensions and drives their registration entry point with a
/// host-side registrar.
pub struct ExtensionHost;

impl ExtensionHost {
    pub fn new() -> Self {
        Self
    }

    /// Load an extension from a shared library.
    pub fn load(&self, path: &Path) -> Result<LoadedExtension> {
        // Safety: loading a library runs its initializers; the path comes
        // from an installed package the operator chose to load.
        let library = unsafe { libloading::Library::new(path) }
            .with_context(|| format!("failed to load extension library {}", path.display()))?;

        // 1. ABI 版本握手
        let reported = unsafe {
            let abi_version = library
                .get::<VefAbiVersionFn>(VEF_ABI_VERSION_SYMBOL)
                .context("extension must export 'vef_abi_version'")?;
            abi_version()
        };
        if reported != VEF_ABI_VERSION {
            return Err(VefError::AbiMismatch {
                host: VEF_ABI_VERSION,
                extension: reported,
            }
            .into());
        }

        // 2. 取出入口并注册
        let entry: VefEntryFn = unsafe {
            *library
                .get::<VefEntryFn>(VEF_ENTRY_SYMBOL)
                .context("extension must export 'vef_extension_entry'")?
        };
        let functions = drive_entry(entry)?;

        tracing::info!(
            "loaded extension library {} ({} functions)",
            path.display(),
            functions.len()
        );
        Ok(LoadedExtension {
            registry: functions,
            _library: Some(library),
        })
    }

    /// Register an extension linked into this process. Same registration
    /// path as [`ExtensionHost::load`], minus the dynamic loader; used by
    /// in-process test harnesses.
    pub fn load_static(&self, entry: VefEntryFn) -> Result<LoadedExtension> {
        let functions = drive_entry(entry)?;
        Ok(LoadedExtension {
            registry: functions,
            _library: None,
        })
    }
}

impl Default for ExtensionHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Run an extension entry point against a fresh registry.
fn drive_entry(entry: VefEntryFn) -> Result<FunctionRegistry> {
    let mut functions = FunctionRegistry::default();
    let registrar = VefRegistrar {
        abi_version: VEF_ABI_VERSION,
        registry: &mut functions as *mut FunctionRegistry as *mut VefRegistry,
        register_function: registry::register_function,
        log: registry::host_log,
    };

    // Safety: the registrar outlives the call and its registry pointer
    // targets the stack slot above, untouched until entry returns.
    let rc = unsafe { entry(&registrar) };
    if rc != VEF_OK {
        let detail = functions
            .take_last_error()
            .unwrap_or_else(|| "extension entry returned failure".to_string());
        bail!("extension registration failed: {detail}");
    }
    Ok(functions)
}

/// An extension with its registered functions, keeping the backing
/// library mapped for as long as the callbacks are callable.
pub struct LoadedExtension {
    registry: FunctionRegistry,
    _library: Option<libloading::Library>,
}

impl LoadedExtension {
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<SqlReturn> {
        self.registry.call(name, args)
    }
}
