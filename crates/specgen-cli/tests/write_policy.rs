//! End-to-end: load a specification file, generate, and write to disk.

use pretty_assertions::assert_eq;
use specgen::output::{destination, write_artifacts, WriteSummary};
use specgen::validate::{run_check, SpecSummary};
use specgen_codegen::{generate, GeneratorConfig, Target};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SPEC: &str = r#"{
  "versions": [
    {
      "name": "v1",
      "models": [
        {"name": "Pet", "kind": "object", "fields": [{"name": "name", "type": "string"}]}
      ],
      "apis": [
        {"name": "pets", "operations": [
          {
            "name": "getPet",
            "endpoint": {"method": "GET", "url": "/pets/{name}", "url_params": [{"name": "name", "type": "string"}]},
            "responses": [{"status": "ok", "type": "Pet"}]
          }
        ]}
      ]
    }
  ]
}"#;

fn write_spec(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("spec.json");
    fs::write(&path, content).unwrap();
    path
}

fn generate_go(spec_path: &Path) -> Vec<specgen_codegen::Artifact> {
    let spec = specgen::load_spec(spec_path).unwrap();
    let config = GeneratorConfig::builder(Target::Go, "github.com/acme/pets")
        .build()
        .unwrap();
    generate(&spec, &config).unwrap()
}

#[test]
fn test_writes_every_artifact() {
    let dir = TempDir::new().unwrap();
    let spec_path = write_spec(dir.path(), SPEC);
    let out = dir.path().join("gen");

    let artifacts = generate_go(&spec_path);
    let summary = write_artifacts(&artifacts, &out).unwrap();
    assert_eq!(
        summary,
        WriteSummary {
            written: artifacts.len(),
            skipped: 0
        }
    );
    for artifact in &artifacts {
        let written = fs::read_to_string(destination(&out, artifact)).unwrap();
        assert_eq!(written, artifact.content);
    }
    assert!(out.join("v1").join("models").join("models.go").exists());
}

#[test]
fn test_existing_scaffold_is_kept_and_generated_files_are_overwritten() {
    let dir = TempDir::new().unwrap();
    let spec_path = write_spec(dir.path(), SPEC);
    let out = dir.path().join("gen");
    let artifacts = generate_go(&spec_path);

    let scaffold = out.join("services").join("v1").join("pets.go");
    fs::create_dir_all(scaffold.parent().unwrap()).unwrap();
    fs::write(&scaffold, "package v1\n\n// my implementation\n").unwrap();
    let models = out.join("v1").join("models").join("models.go");
    fs::create_dir_all(models.parent().unwrap()).unwrap();
    fs::write(&models, "stale").unwrap();

    let summary = write_artifacts(&artifacts, &out).unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.written, artifacts.len() - 1);
    assert_eq!(
        fs::read_to_string(&scaffold).unwrap(),
        "package v1\n\n// my implementation\n"
    );
    assert!(fs::read_to_string(&models)
        .unwrap()
        .starts_with("// Code generated by specgen. DO NOT EDIT."));
}

#[test]
fn test_check_reports_counts() {
    let dir = TempDir::new().unwrap();
    let spec_path = write_spec(dir.path(), SPEC);
    assert_eq!(
        run_check(&spec_path).unwrap(),
        SpecSummary {
            versions: 1,
            models: 1,
            apis: 1,
            operations: 1
        }
    );
}

#[test]
fn test_invalid_specification_is_reported_with_its_path() {
    let dir = TempDir::new().unwrap();
    let invalid = SPEC.replace("/pets/{name}", "/pets/{id}");
    let spec_path = write_spec(dir.path(), &invalid);
    let err = run_check(&spec_path).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Invalid specification"), "{}", message);
    assert!(
        message.contains("version.v1.api.pets.operation.getPet"),
        "{}",
        message
    );
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = run_check(&dir.path().join("absent.json")).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read specification"));
}
