use vef_types::abi::{VefContext, VefInValue, VefSqlType};
use vef_types::VefError;

/// Opaque per-call execution context handed in by the host. The example
/// functions never look inside it; it exists so callbacks that do need
/// host services have somewhere to get them from.
pub struct CallContext {
    raw: *mut VefContext,
}

impl CallContext {
    /// Context-free invocation, used by harnesses and unit tests.
    pub fn detached() -> Self {
        Self {
            raw: std::ptr::null_mut(),
        }
    }

    pub(crate) fn from_raw(raw: *mut VefContext) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> *mut VefContext {
        self.raw
    }
}

/// One decoded argument, borrowed from host memory for the duration of a
/// single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlArg<'a> {
    Null,
    Text(&'a str),
    Integer(i64),
}

impl SqlArg<'_> {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlArg::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlArg::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlArg::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

/// Decoded argument list for one call.
pub struct Args<'a> {
    values: Vec<SqlArg<'a>>,
}

impl<'a> Args<'a> {
    /// Build an argument list directly, for calling extension functions
    /// from tests without a host.
    pub fn new(values: Vec<SqlArg<'a>>) -> Self {
        Self { values }
    }

    /// Decode a host-provided `VefInValue` array.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `argc` valid `VefInValue`s whose text ranges
    /// stay readable for the lifetime `'a` (the host guarantees this for
    /// the duration of the call).
    pub(crate) unsafe fn from_raw(ptr: *const VefInValue, argc: usize) -> Result<Self, VefError> {
        if argc == 0 {
            return Ok(Self { values: Vec::new() });
        }
        if ptr.is_null() {
            return Err(VefError::InvalidArgument(
                "argument array is null".to_string(),
            ));
        }

        let raw = std::slice::from_raw_parts(ptr, argc);
        let mut values = Vec::with_capacity(argc);
        for (idx, value) in raw.iter().enumerate() {
            if value.is_null {
                values.push(SqlArg::Null);
                continue;
            }
            match value.value_type {
                VefSqlType::Integer => values.push(SqlArg::Integer(value.int_value)),
                VefSqlType::Text => {
                    let bytes = if value.len == 0 {
                        &[][..]
                    } else if value.data.is_null() {
                        return Err(VefError::InvalidArgument(format!(
                            "argument {} has a null data pointer",
                            idx + 1
                        )));
                    } else {
                        std::slice::from_raw_parts(value.data, value.len)
                    };
                    let text = std::str::from_utf8(bytes).map_err(|_| {
                        VefError::InvalidArgument(format!("argument {} is not valid UTF-8", idx + 1))
                    })?;
                    values.push(SqlArg::Text(text));
                }
            }
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&SqlArg<'a>> {
        self.values.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SqlArg<'a>> {
        self.values.iter()
    }
}

/// A successful scalar value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlOutput {
    Text(String),
    Integer(i64),
}

/// Outcome of a scalar function: `Ok(Some(..))` is a value, `Ok(None)` is
/// SQL NULL, `Err(..)` becomes an error result with the error's message.
pub type ScalarResult = Result<Option<SqlOutput>, VefError>;

/// The safe callback shape extension authors implement.
pub type ScalarFn = fn(&CallContext, &Args) -> ScalarResult;

/// Declaration of one SQL-visible function: name, typed signature,
/// declared output capacity, and the callback that implements it.
pub struct FunctionDef {
    name: String,
    callback: ScalarFn,
    return_type: VefSqlType,
    arg_types: Vec<VefSqlType>,
    max_result_len: usize,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, callback: ScalarFn) -> Self {
        Self {
            name: name.into(),
            callback,
            return_type: VefSqlType::Text,
            arg_types: Vec::new(),
            max_result_len: 0,
        }
    }

    /// Append one declared argument type.
    pub fn arg(mut self, ty: VefSqlType) -> Self {
        self.arg_types.push(ty);
        self
    }

    pub fn returns(mut self, ty: VefSqlType) -> Self {
        self.return_type = ty;
        self
    }

    /// Declared output buffer capacity in bytes. Required (non-zero) for
    /// text-returning functions.
    pub fn max_result_len(mut self, len: usize) -> Self {
        self.max_result_len = len;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn callback(&self) -> ScalarFn {
        self.callback
    }

    pub fn return_type(&self) -> VefSqlType {
        self.return_type
    }

    pub fn arg_types(&self) -> &[VefSqlType] {
        &self.arg_types
    }

    pub fn declared_max_result_len(&self) -> usize {
        self.max_result_len
    }
}

/// A validated extension declaration: name, version, functions.
pub struct Extension {
    name: String,
    version: String,
    functions: Vec<FunctionDef>,
}

impl Extension {
    pub fn builder(name: impl Into<String>) -> ExtensionBuilder {
        ExtensionBuilder {
            name: name.into(),
            version: "0.0.0".to_string(),
            functions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn functions(&self) -> &[FunctionDef] {
        &self.functions
    }
}

pub struct ExtensionBuilder {
    name: String,
    version: String,
    functions: Vec<FunctionDef>,
}

impl ExtensionBuilder {
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn function(mut self, def: FunctionDef) -> Self {
        self.functions.push(def);
        self
    }

    /// Validate and freeze the declaration. Registration-time checks live
    /// here: every declared buffer capacity must be usable before the host
    /// ever invokes a callback.
    pub fn build(self) -> Result<Extension, VefError> {
        if self.name.is_empty() {
            return Err(VefError::Registration(
                "extension name must not be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for def in &self.functions {
            if def.name.is_empty() {
                return Err(VefError::InvalidFunction(
                    "function name must not be empty".to_string(),
                ));
            }
            if !seen.insert(def.name.clone()) {
                return Err(VefError::DuplicateFunction(def.name.clone()));
            }
            if def.return_type == VefSqlType::Text && def.max_result_len == 0 {
                return Err(VefError::InvalidFunction(format!(
                    "{}: text return requires a non-zero max_result_len",
                    def.name
                )));
            }
        }

        Ok(Extension {
            name: self.name,
            version: self.version,
            functions: self.functions,
        })
    }
}
