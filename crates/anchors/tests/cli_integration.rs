//! Runs the `anchors` binary against temporary projects

mod common;

use std::process::{Command, Output};

use common::Project;
use serde_json::Value;

fn anchors(project: &Project, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_anchors"))
        .arg("--root")
        .arg(project.root())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run anchors")
}

fn json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "anchors failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

fn sample_project() -> Project {
    let project = Project::with_sources();
    project.write(
        "src/login.rs",
        "// SECTION: form\n\
         // TODO[epic=Login,seq=2]: validate input\n\
         // !SECTION\n\
         // FIXME[epic=Login,seq=1,id=login-form]: render the form\n",
    );
    project.write("src/util.rs", "// NOTE: helpers only\n");
    project
}

#[test]
fn test_tags_lists_the_default_registry() {
    let project = Project::new();
    let tags = json(&anchors(&project, &["tags", "--format", "json"]));
    let names: Vec<&str> = tags
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"TODO"));
    assert!(names.contains(&"SECTION"));
}

#[test]
fn test_tags_include_config_overrides() {
    let project = Project::new();
    project.config("tags:\n  list:\n    - tag: todo\n      enabled: false\n    - tag: chore\n");
    let tags = json(&anchors(&project, &["tags", "--format", "json"]));
    let names: Vec<&str> = tags
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(!names.contains(&"TODO"));
    assert!(names.contains(&"CHORE"));
}

#[test]
fn test_workspace_listing() {
    let project = sample_project();
    let views = json(&anchors(&project, &["workspace", "--format", "json"]));
    let views = views.as_array().unwrap();

    // util.rs only has document-scoped anchors
    assert_eq!(views.len(), 1);
    let view = &views[0];
    assert!(view["document"].as_str().unwrap().ends_with("login.rs"));
    assert_eq!(view["visible"], 2);

    let anchors = view["anchors"].as_array().unwrap();
    assert_eq!(anchors[0]["label"], "[1 - 3] SECTION: form");
    assert_eq!(anchors[0]["children"][0]["text"], "TODO: validate input");
    assert_eq!(anchors[1]["tag"], "FIXME");
}

#[test]
fn test_epics_are_ordered_by_seq() {
    let project = sample_project();
    let epics = json(&anchors(&project, &["epics", "--format", "json"]));
    let epics = epics.as_array().unwrap();

    assert_eq!(epics.len(), 1);
    assert_eq!(epics[0]["epic"], "Login");
    let anchors = epics[0]["anchors"].as_array().unwrap();
    assert_eq!(anchors.len(), 1);
    assert_eq!(anchors[0]["comment"], "render the form");
}

#[test]
fn test_epic_completions() {
    let project = sample_project();
    let output = anchors(&project, &["epics", "--next"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "epic=Login,seq=2");
}

#[test]
fn test_epic_completions_as_json() {
    let project = sample_project();
    let completions = json(&anchors(&project, &["epics", "--next", "--format", "json"]));
    assert_eq!(
        completions,
        serde_json::json!([{ "epic": "Login", "next_seq": 2 }])
    );
}

#[test]
fn test_file_folds() {
    let project = sample_project();
    let path = project.root().join("src/login.rs");
    let output = anchors(&project, &["file", path.to_str().unwrap(), "--folds"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1-3");

    let folds = json(&anchors(
        &project,
        &["file", path.to_str().unwrap(), "--folds", "--format", "json"],
    ));
    assert_eq!(folds[0]["start_line"], 1);
    assert_eq!(folds[0]["end_line"], 3);
}

#[test]
fn test_tag_completions() {
    let project = Project::new();
    let items = json(&anchors(&project, &["tags", "--completions", "--format", "json"]));
    let inserts: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["insert"].as_str().unwrap())
        .collect();
    assert!(inserts.contains(&"TODO "));
    assert!(inserts.contains(&"!SECTION "));
}

#[test]
fn test_find_by_id() {
    let project = sample_project();
    let found = json(&anchors(&project, &["find", "login-form", "--format", "json"]));
    assert_eq!(found["line"], 4);
    assert!(found["document"].as_str().unwrap().ends_with("login.rs"));
}

#[test]
fn test_find_suggests_similar_id() {
    let project = sample_project();
    let output = anchors(&project, &["find", "login-from"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Did you mean \"login-form\""), "{}", stderr);
}

#[test]
fn test_file_listing_flat() {
    let project = sample_project();
    let path = project.root().join("src/login.rs");
    let nodes = json(&anchors(
        &project,
        &["file", path.to_str().unwrap(), "--flat", "--format", "json"],
    ));
    let tags: Vec<&str> = nodes
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["tag"].as_str().unwrap())
        .collect();
    assert_eq!(tags, ["SECTION", "TODO", "FIXME"]);
}

#[test]
fn test_invalid_config_is_reported() {
    let project = sample_project();
    project.config("workspace: [\n");
    let output = anchors(&project, &["tags"]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("has errors"), "{}", stderr);
}
