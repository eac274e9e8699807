use std::fs;
use std::path::Path;

use quarry_app::App;
use quarry_core::layout::CacheLayout;

fn app_in(temp: &Path) -> App {
    App::new(CacheLayout::at(temp.join("cache")))
}

#[test]
fn prepare_resolves_relative_directory_and_placeholder() {
    let temp = tempfile::tempdir().expect("temp dir");
    let app = app_in(temp.path());

    let plan = app
        .new_prepare(temp.path(), Some(Path::new("demo-app")), None)
        .expect("prepare");

    assert_eq!(plan.project_dir, temp.path().join("demo-app"));
    assert_eq!(plan.name_placeholder, "demo-app");
    assert_eq!(plan.name_flag, None);
    assert!(app.layout().sources_dir().is_dir());
    assert!(app.layout().pg_dir().is_dir());
}

#[test]
fn prepare_aborts_when_the_descriptor_already_exists() {
    let temp = tempfile::tempdir().expect("temp dir");
    let app = app_in(temp.path());

    let project_dir = temp.path().join("taken");
    fs::create_dir_all(&project_dir).expect("project dir");
    fs::write(project_dir.join("quarry.toml"), "name = \"taken\"\n").expect("seed descriptor");

    let error = app
        .new_prepare(temp.path(), Some(Path::new("taken")), None)
        .expect_err("prepare should fail");

    assert!(error.to_string().contains("already exists"));
}

#[test]
fn finish_writes_descriptor_and_ignore_artifact_once() {
    let temp = tempfile::tempdir().expect("temp dir");
    let app = app_in(temp.path());

    let plan = app
        .new_prepare(temp.path(), Some(Path::new("demo")), None)
        .expect("prepare");
    app.new_finish(&plan, "demo", "0cc8d8c").expect("finish");

    let descriptor =
        fs::read_to_string(plan.project_dir.join("quarry.toml")).expect("read descriptor");
    assert!(descriptor.contains("name = \"demo\""));
    assert!(descriptor.contains("revision = \"0cc8d8c\""));
    assert_eq!(
        fs::read_to_string(plan.project_dir.join(".gitignore")).expect("read ignore"),
        ".quarry\n"
    );

    let error = app
        .new_finish(&plan, "demo", "0cc8d8c")
        .expect_err("second finish should fail");
    assert!(error.to_string().contains("failed to create project"));
}

#[test]
fn record_built_revision_persists_into_the_manifest() {
    let temp = tempfile::tempdir().expect("temp dir");
    let app = app_in(temp.path());

    app.record_built_revision("0cc8d8c").expect("record");
    app.record_built_revision("0cc8d8c").expect("record again");

    let manifest = app.load_manifest().expect("load manifest");
    assert_eq!(manifest.revisions, vec!["0cc8d8c"]);
    assert!(manifest.contains("0cc8d8c"));
}
