//! Config cascade behavior over real directory trees: layer precedence,
//! per-command merging, and the adapter-provided built-ins.

use std::path::Path;

use mdflow::adapters::builtin_defaults_layer;
use mdflow::config::{defaults_for, find_git_root, load_cascade, merge_layers, ConfigMap, ConfigValue};
use tempfile::TempDir;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn map_from_yaml(yaml: &str) -> ConfigMap {
    match ConfigValue::from_yaml(serde_yaml::from_str(yaml).unwrap()) {
        ConfigValue::Map(m) => m,
        other => panic!("expected map, got {other:?}"),
    }
}

#[test]
fn builtins_alone_provide_adapter_defaults() {
    let temp = TempDir::new().unwrap();
    let merged = load_cascade(&builtin_defaults_layer(), temp.path());
    let claude = defaults_for(&merged, "claude");
    assert!(claude.get("print").unwrap().is_true());
    let codex = defaults_for(&merged, "codex");
    assert_eq!(codex.get("_subcommand").unwrap().as_str(), Some("exec"));
    // Unknown drivers get no defaults.
    assert!(defaults_for(&merged, "mystery").is_empty());
}

#[test]
fn cwd_project_config_overrides_builtins() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "mdflow.config.yaml",
        "commands:\n  claude:\n    model: opus\n    print: false",
    );
    let merged = load_cascade(&builtin_defaults_layer(), temp.path());
    let claude = defaults_for(&merged, "claude");
    assert_eq!(claude.get("model").unwrap().as_str(), Some("opus"));
    assert!(claude.get("print").unwrap().is_false());
}

#[test]
fn git_root_layer_applies_below_cwd_layer() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("repo");
    let nested = root.join("crates/app");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::create_dir(root.join(".git")).unwrap();
    write(&root, ".mdflow.yaml", "commands:\n  claude:\n    model: root-model\n    temp: 1");
    write(&nested, ".mdflow.yaml", "commands:\n  claude:\n    model: local-model");

    assert_eq!(find_git_root(&nested).unwrap(), root);

    let merged = load_cascade(&builtin_defaults_layer(), &nested);
    let claude = defaults_for(&merged, "claude");
    // cwd layer wins on conflict; git-root keys without conflict survive.
    assert_eq!(claude.get("model").unwrap().as_str(), Some("local-model"));
    assert_eq!(claude.get("temp").unwrap().as_usize(), Some(1));
    // Built-in defaults still show through both layers.
    assert!(claude.get("print").unwrap().is_true());
}

#[test]
fn json_project_config_is_last_resort_name() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), ".mdflow.json", r#"{"commands": {"gemini": {"sandbox": true}}}"#);
    let merged = load_cascade(&builtin_defaults_layer(), temp.path());
    let gemini = defaults_for(&merged, "gemini");
    assert!(gemini.get("sandbox").unwrap().is_true());
    // The adapter's own $1 mapping is still present underneath.
    assert_eq!(gemini.get("$1").unwrap().as_str(), Some("prompt"));
}

#[test]
fn yaml_name_beats_json_name() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), ".mdflow.yaml", "commands:\n  claude:\n    pick: yaml");
    write(temp.path(), ".mdflow.json", r#"{"commands": {"claude": {"pick": "json"}}}"#);
    let merged = load_cascade(&builtin_defaults_layer(), temp.path());
    assert_eq!(defaults_for(&merged, "claude").get("pick").unwrap().as_str(), Some("yaml"));
}

#[test]
fn broken_layer_degrades_to_nothing() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "mdflow.config.yaml", "commands: [not: valid: yaml");
    let merged = load_cascade(&builtin_defaults_layer(), temp.path());
    // Cascade still works from the built-ins.
    assert!(defaults_for(&merged, "claude").get("print").unwrap().is_true());
}

#[test]
fn non_command_top_level_keys_replace_shallowly() {
    let base = map_from_yaml("editor: vim\nlimits:\n  a: 1\n  b: 2");
    let over = map_from_yaml("limits:\n  c: 3");
    let merged = merge_layers(&base, &over);
    assert_eq!(merged.get("editor").unwrap().as_str(), Some("vim"));
    // `limits` is not `commands`: replaced wholesale, not merged.
    let limits = merged.get("limits").unwrap().as_map().unwrap();
    assert!(limits.get("a").is_none());
    assert_eq!(limits.get("c").unwrap().as_usize(), Some(3));
}

#[test]
fn merge_is_idempotent_and_associative_over_real_layers() {
    let a = map_from_yaml("commands:\n  claude:\n    print: true\n  codex:\n    _subcommand: exec");
    let b = map_from_yaml("commands:\n  claude:\n    model: opus");
    let c = map_from_yaml("commands:\n  claude:\n    model: sonnet\n  gemini:\n    x: 1");

    assert_eq!(merge_layers(&a, &a), a);
    assert_eq!(
        merge_layers(&merge_layers(&a, &b), &c),
        merge_layers(&a, &merge_layers(&b, &c))
    );
    let merged = merge_layers(&merge_layers(&a, &b), &c);
    let claude = defaults_for(&merged, "claude");
    assert_eq!(claude.get("model").unwrap().as_str(), Some("sonnet"));
    assert!(claude.get("print").unwrap().is_true());
}
