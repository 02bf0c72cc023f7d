/// SQL argument value as the harness passes it into a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostValue {
    Null,
    Text(String),
    Integer(i64),
}

/// Decoded outcome of one call: the three-way result discriminant with
/// the value typed per the function's declared return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlReturn {
    Text(String),
    Integer(i64),
    Null,
    Error(String),
}
