//! Scanning a directory tree through the filesystem sources

use anchors_core::{
    DocumentEnumerator, FsSource, ParseOptions, Parser, ScanStatus, TagRegistry, WalkSources,
    Workspace,
};
use indoc::indoc;
use std::fs;
use std::path::Path;

fn parser() -> Parser {
    Parser::new(
        TagRegistry::with_defaults(),
        &[" - ".into(), ": ".into(), " ".into()],
        "!",
        false,
        ParseOptions::default(),
    )
    .unwrap()
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_walk_and_scan_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "src/auth.rs",
        indoc! {"
            // SECTION: login
            // TODO[epic=Auth,seq=2]: check the password
            // !SECTION
            // FIXME[epic=Auth,seq=1]: hash passwords
        "},
    );
    write(root, "src/auth.ts", "// TODO[epic=Auth,seq=3]: port the client\n");
    write(root, "target/debug/build.rs", "// TODO: generated\n");

    let walker = WalkSources::new(root)
        .include(["**/*.rs"])
        .exclude(["**/target/**"]);
    let documents = walker.enumerate().unwrap();
    assert_eq!(documents, vec![root.join("src/auth.rs")]);

    let mut workspace = Workspace::new();
    workspace.scan_from(&parser(), &FsSource, documents, 50);
    assert_eq!(workspace.status(), ScanStatus::Loaded);

    let index = workspace.get(&root.join("src/auth.rs")).unwrap();
    assert_eq!(index.len(), 3);
    assert_eq!(index.fold_ranges(), vec![(1, 3)]);

    let epics = workspace.group_by_epic();
    let auth: Vec<&str> = epics["Auth"].iter().map(|a| a.comment.as_str()).collect();
    assert_eq!(auth, ["hash passwords"]);
}

#[test]
fn test_unreadable_documents_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "a.rs", "// TODO: present\n");

    let mut workspace = Workspace::new();
    workspace.scan_from(
        &parser(),
        &FsSource,
        vec![root.join("a.rs"), root.join("gone.rs")],
        50,
    );

    assert_eq!(workspace.len(), 1);
    assert!(workspace.contains(&root.join("a.rs")));
}

#[test]
fn test_walking_a_missing_root_fails() {
    let dir = tempfile::tempdir().unwrap();
    let walker = WalkSources::new(dir.path().join("missing"));
    assert!(walker.enumerate().is_err());
}
