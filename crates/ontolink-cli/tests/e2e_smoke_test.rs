use std::{
    fs,
    path::{Path, PathBuf},
};

use ontolink_cli::{Args, CatalogArgs, Command, RegistryArgs, ValidateArgs};

fn demos_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("Failed to find workspace root")
        .join("demos")
}

fn spec_root(name: &str) -> String {
    demos_dir().join(name).display().to_string()
}

fn args(command: Command, config: Option<String>) -> Args {
    Args {
        command,
        config,
        log_level: "off".to_string(),
    }
}

fn validate(name: &str, strict: bool, output: &Path) -> Args {
    args(
        Command::Validate(ValidateArgs {
            layer: None,
            strict,
            spec_root: Some(spec_root(name)),
            output: Some(output.display().to_string()),
        }),
        None,
    )
}

#[test]
fn test_demo_tree_passes() {
    let output = tempfile::tempdir().expect("Failed to create temp directory");

    let code = ontolink_cli::run(&validate("spec", false, output.path()))
        .unwrap_or_else(|e| panic!("Failed to validate demo tree: {e}"));
    assert_eq!(code, 0);

    let markdown = fs::read_to_string(output.path().join("validation-report.md")).unwrap();
    assert!(markdown.contains("**Status:** PASSED"));
    assert!(output.path().join("validation-report.json").exists());
}

#[test]
fn test_broken_tree_fails() {
    let output = tempfile::tempdir().expect("Failed to create temp directory");

    let code = ontolink_cli::run(&validate("broken", false, output.path())).unwrap();
    assert_eq!(code, 1);

    let json = fs::read_to_string(output.path().join("validation-report.json")).unwrap();
    assert!(json.contains("\"missing-target\""));
    assert!(json.contains("\"unregistered-link\""));
}

#[test]
fn test_strict_from_config_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let layers = dir.path().join("layers");
    fs::create_dir(&layers).unwrap();
    fs::copy(
        demos_dir().join("spec/link-registry.json"),
        dir.path().join("link-registry.json"),
    )
    .unwrap();
    // A relationship without a target is a parser warning.
    fs::write(
        layers.join("02-business-layer.md"),
        "# Business Layer\n\n<element id=\"business.actor.customer\"/>\n\
         <relationship type=\"Serving\" source=\"business.actor.customer\"/>\n",
    )
    .unwrap();

    let config_path = dir.path().join("config.toml");
    let spec_root = dir.path().display().to_string();

    fs::write(&config_path, "[validation]\nstrict = false\n").unwrap();
    let lenient = args(
        Command::Validate(ValidateArgs {
            spec_root: Some(spec_root.clone()),
            ..ValidateArgs::default()
        }),
        Some(config_path.display().to_string()),
    );
    assert_eq!(ontolink_cli::run(&lenient).unwrap(), 0);

    fs::write(&config_path, "[validation]\nstrict = true\n").unwrap();
    assert_eq!(ontolink_cli::run(&lenient).unwrap(), 1);
}

#[test]
fn test_catalog_and_registry_commands() {
    for json in [false, true] {
        let catalog = args(
            Command::Catalog(CatalogArgs {
                spec_root: Some(spec_root("spec")),
                json,
            }),
            None,
        );
        assert_eq!(ontolink_cli::run(&catalog).unwrap(), 0);
    }

    let registry = args(
        Command::Registry(RegistryArgs {
            spec_root: Some(spec_root("spec")),
        }),
        None,
    );
    assert_eq!(ontolink_cli::run(&registry).unwrap(), 0);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let missing = args(
        Command::Registry(RegistryArgs {
            spec_root: Some(spec_root("spec")),
        }),
        Some("does-not-exist.toml".to_string()),
    );
    assert!(ontolink_cli::run(&missing).is_err());
}
