use vef_host::ExtensionManager;
use vef_test_runner::{Runner, Suite};

/// 预装静态链接的示例扩展，不经过动态加载器
fn runner_with_hello(scratch: &std::path::Path) -> Runner {
    let manager = ExtensionManager::new();
    manager
        .install_static("hello_world", hello_world::vef_extension_entry)
        .unwrap();
    Runner::with_manager(manager, scratch)
}

#[test]
fn test_select_hello_world() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = runner_with_hello(scratch.path());

    let output = runner.run_source("t", "SELECT hello_world();").unwrap();
    assert_eq!(output, "SELECT hello_world();\nHello, World!\n");
}

#[test]
fn test_select_greet_variants() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = runner_with_hello(scratch.path());

    let source = "SELECT greet('VillageSQL');\nSELECT greet(NULL);\n";
    let output = runner.run_source("t", source).unwrap();
    assert_eq!(
        output,
        "SELECT greet('VillageSQL');\n\
         Hello, VillageSQL!\n\
         SELECT greet(NULL);\n\
         NULL\n"
    );
}

#[test]
fn test_select_qualified_name() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = runner_with_hello(scratch.path());

    let output = runner
        .run_source("t", "SELECT hello_world.greet('x');")
        .unwrap();
    assert_eq!(output, "SELECT hello_world.greet('x');\nHello, x!\n");
}

#[test]
fn test_quote_escaping_reaches_the_function() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = runner_with_hello(scratch.path());

    let output = runner
        .run_source("t", "SELECT greet('O''Brien');")
        .unwrap();
    assert_eq!(output, "SELECT greet('O''Brien');\nHello, O'Brien!\n");
}

#[test]
fn test_empty_string_argument() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = runner_with_hello(scratch.path());

    let output = runner.run_source("t", "SELECT greet('');").unwrap();
    assert_eq!(output, "SELECT greet('');\nHello, !\n");
}

#[test]
fn test_wrong_argument_type_is_error_line() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = runner_with_hello(scratch.path());

    let output = runner.run_source("t", "SELECT greet(42);").unwrap();
    assert_eq!(
        output,
        "SELECT greet(42);\nERROR: wrong argument type for greet: argument 1 expects text\n"
    );
}

#[test]
fn test_record_then_compare_roundtrip() {
    // 自带一个只依赖错误路径的小套件，不需要安装任何扩展
    let suite_dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(suite_dir.path().join("t")).unwrap();
    std::fs::create_dir_all(suite_dir.path().join("r")).unwrap();
    std::fs::write(
        suite_dir.path().join("t/basic.test"),
        "SELECT nope();\n",
    )
    .unwrap();

    let suite = Suite::new(suite_dir.path());

    let outcome = suite.run(None, true).unwrap();
    assert_eq!(outcome.recorded, vec!["basic".to_string()]);
    let recorded = std::fs::read_to_string(suite_dir.path().join("r/basic.result")).unwrap();
    assert_eq!(recorded, "SELECT nope();\nERROR: unknown function: nope\n");

    let outcome = suite.run(None, false).unwrap();
    assert!(outcome.ok());
    assert_eq!(outcome.passed, vec!["basic".to_string()]);
}

#[test]
fn test_missing_expected_file_fails_the_case() {
    let suite_dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(suite_dir.path().join("t")).unwrap();
    std::fs::create_dir_all(suite_dir.path().join("r")).unwrap();
    std::fs::write(suite_dir.path().join("t/lost.test"), "SELECT nope();\n").unwrap();

    let outcome = Suite::new(suite_dir.path()).run(None, false).unwrap();
    assert_eq!(outcome.failed.len(), 1);
    assert!(outcome.failed[0].detail.contains("missing expected file"));
}

#[test]
fn test_case_filter() {
    let suite_dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(suite_dir.path().join("t")).unwrap();
    std::fs::create_dir_all(suite_dir.path().join("r")).unwrap();
    std::fs::write(suite_dir.path().join("t/one.test"), "SELECT nope();\n").unwrap();
    std::fs::write(suite_dir.path().join("t/two.test"), "SELECT nope();\n").unwrap();

    let outcome = Suite::new(suite_dir.path()).run(Some("one"), true).unwrap();
    assert_eq!(outcome.recorded, vec!["one".to_string()]);
}
