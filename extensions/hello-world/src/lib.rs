use vef_sdk::{
    debug, export_extension, trace, warn, Args, CallContext, Extension, FunctionDef, ScalarResult,
    SqlArg, SqlOutput, VefError, VefSqlType,
};

/// Declared output capacity for both functions, mirrored in vef.toml.
const MAX_RESULT_LEN: usize = 255;

const HELLO: &str = "Hello, World!";

/// "Hello, " 前缀 7 字节 + "!" 后缀 1 字节
const GREETING_OVERHEAD: usize = 8;
const MAX_NAME_LEN: usize = MAX_RESULT_LEN - GREETING_OVERHEAD;

// 固定输出必须装得进声明的缓冲区，注册前在编译期钉死
const _: () = assert!(HELLO.len() <= MAX_RESULT_LEN);

/// 零参数示例函数：固定返回 "Hello, World!"，永远不会是 NULL 或错误
fn hello_world(_ctx: &CallContext, _args: &Args) -> ScalarResult {
    trace!("hello_world called");
    Ok(Some(SqlOutput::Text(HELLO.to_string())))
}

/// 单参数示例函数：NULL 入参返回 NULL，否则返回 "Hello, <name>!"
///
/// 长度为 L 的入参产生长度恰为 L + 8 的结果；超过缓冲区允许的长度走
/// 错误路径而不是截断。
fn greet(_ctx: &CallContext, args: &Args) -> ScalarResult {
    let name = match args.get(0) {
        Some(SqlArg::Null) => {
            debug!("greet called with NULL, returning NULL");
            return Ok(None);
        }
        Some(SqlArg::Text(name)) => *name,
        Some(SqlArg::Integer(_)) => {
            return Err(VefError::InvalidArgument(
                "greet expects a text argument".to_string(),
            ));
        }
        None => {
            return Err(VefError::InvalidArgument(
                "greet expects exactly one argument".to_string(),
            ));
        }
    };

    if name.len() > MAX_NAME_LEN {
        warn!("greet input too long: {} bytes", name.len());
        return Err(VefError::InvalidArgument(format!(
            "name too long: {} bytes (max {})",
            name.len(),
            MAX_NAME_LEN
        )));
    }

    Ok(Some(SqlOutput::Text(format!("Hello, {name}!"))))
}

fn extension() -> vef_sdk::Result<Extension> {
    Extension::builder("hello_world")
        .version(env!("CARGO_PKG_VERSION"))
        .function(
            FunctionDef::new("hello_world", hello_world)
                .returns(VefSqlType::Text)
                .max_result_len(MAX_RESULT_LEN),
        )
        .function(
            FunctionDef::new("greet", greet)
                .arg(VefSqlType::Text)
                .returns(VefSqlType::Text)
                .max_result_len(MAX_RESULT_LEN),
        )
        .build()
}

export_extension!(extension);

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CallContext {
        CallContext::detached()
    }

    #[test]
    fn test_hello_world_returns_fixed_string() {
        let result = hello_world(&ctx(), &Args::new(vec![])).unwrap();
        assert_eq!(result, Some(SqlOutput::Text("Hello, World!".to_string())));
    }

    #[test]
    fn test_greet_wraps_input() {
        let args = Args::new(vec![SqlArg::Text("VillageSQL")]);
        let result = greet(&ctx(), &args).unwrap();
        assert_eq!(
            result,
            Some(SqlOutput::Text("Hello, VillageSQL!".to_string()))
        );
    }

    #[test]
    fn test_greet_output_length_is_input_plus_eight() {
        for len in [0, 1, 10, MAX_NAME_LEN] {
            let name = "x".repeat(len);
            let args = Args::new(vec![SqlArg::Text(&name)]);
            let result = greet(&ctx(), &args).unwrap();
            match result {
                Some(SqlOutput::Text(s)) => assert_eq!(s.len(), len + GREETING_OVERHEAD),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn test_greet_null_yields_null() {
        let args = Args::new(vec![SqlArg::Null]);
        assert_eq!(greet(&ctx(), &args).unwrap(), None);
    }

    #[test]
    fn test_greet_rejects_oversized_input() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        let args = Args::new(vec![SqlArg::Text(&name)]);
        let err = greet(&ctx(), &args).unwrap_err();
        assert!(err.to_string().contains("name too long"));
    }

    #[test]
    fn test_greet_rejects_integer_input() {
        let args = Args::new(vec![SqlArg::Integer(7)]);
        assert!(greet(&ctx(), &args).is_err());
    }

    #[test]
    fn test_longest_accepted_input_fits_declared_capacity() {
        let name = "x".repeat(MAX_NAME_LEN);
        let args = Args::new(vec![SqlArg::Text(&name)]);
        match greet(&ctx(), &args).unwrap() {
            Some(SqlOutput::Text(s)) => assert!(s.len() <= MAX_RESULT_LEN),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_extension_declaration_builds() {
        let ext = extension().unwrap();
        assert_eq!(ext.name(), "hello_world");
        assert_eq!(ext.functions().len(), 2);
    }
}
