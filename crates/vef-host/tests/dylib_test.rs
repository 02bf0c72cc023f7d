//! End-to-end loading of the example extension as a real shared library.
//!
//! The cdylib is produced by building the `hello_world` workspace member;
//! when the artifact is not there (e.g. a doc-only build), these tests
//! skip instead of failing, the same way the wasm host tests skip when the
//! plugin artifact is missing.

use std::path::PathBuf;

use vef_host::{ExtensionHost, ExtensionManager, HostValue, SqlReturn};

fn find_example_library() -> Option<PathBuf> {
    let target_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target");
    let names = ["libhello_world.so", "libhello_world.dylib", "hello_world.dll"];

    for profile in ["debug", "release"] {
        for name in names {
            let candidate = target_root.join(profile).join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[test]
fn test_load_example_library() {
    let Some(library) = find_example_library() else {
        eprintln!("Skipping test: hello_world cdylib not found");
        return;
    };

    let host = ExtensionHost::new();
    let extension = host.load(&library).unwrap();
    assert_eq!(extension.registry().len(), 2);

    let result = extension.call("hello_world", &[]).unwrap();
    assert_eq!(result, SqlReturn::Text("Hello, World!".to_string()));

    let result = extension
        .call("greet", &[HostValue::Text("VillageSQL".to_string())])
        .unwrap();
    assert_eq!(result, SqlReturn::Text("Hello, VillageSQL!".to_string()));
}

#[test]
fn test_install_packaged_extension() {
    let Some(library) = find_example_library() else {
        eprintln!("Skipping test: hello_world cdylib not found");
        return;
    };

    let scratch = tempfile::tempdir().unwrap();

    // 用示例清单现场打一个 .veb 再走完整安装路径
    let manifest_src = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../extensions/hello-world/vef.toml");
    let package = scratch.path().join("hello_world.veb");
    vef_pack::pack(&manifest_src, &library, &package).unwrap();

    let manager = ExtensionManager::new();
    let name = manager
        .install_package(&package, &scratch.path().join("work"))
        .unwrap();
    assert_eq!(name, "hello_world");

    let result = manager
        .call_function("hello_world.greet", &[HostValue::Null])
        .unwrap();
    assert_eq!(result, SqlReturn::Null);
}

#[test]
fn test_load_missing_library_fails() {
    let host = ExtensionHost::new();
    assert!(host.load(&PathBuf::from("/nonexistent/libnothing.so")).is_err());
}
