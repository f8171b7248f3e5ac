//! End-to-end staleness scenarios across several build sessions
//!
//! Every test lays out real module trees in a temporary directory, pins
//! modification times with `filetime`, and runs the engine the way a build
//! tool would: one fresh registry per session, modules in dependency order.

use filetime::{set_file_mtime, FileTime};
use incbuild_core::scan::DirectoryScanner;
use incbuild_core::{
    EngineConfig, EngineError, Evaluation, ModuleIdentifier, ModuleRegistry, ModuleSpec,
    ResourceSetStore, StaleReason, StalenessEngine, TimestampStore, Verdict,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DESCRIPTOR_TIME: i64 = 1_000;
const SOURCE_TIME: i64 = 2_000;
const BUILD_TIME: i64 = 3_000;

fn id(name: &str) -> ModuleIdentifier {
    ModuleIdentifier::new("org.example", name, "1.0")
}

fn write_at(path: &Path, secs: i64) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
    set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}

struct Project {
    _temp: TempDir,
    root: PathBuf,
}

impl Project {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    /// A module with a descriptor, one source file and the given resources
    fn module(&self, name: &str, resources: &[&str]) -> ModuleSpec {
        let module = ModuleSpec::with_layout(id(name), &self.root.join(name));
        write_at(&module.descriptor, DESCRIPTOR_TIME);
        write_at(&module.source_directory.join("A.txt"), SOURCE_TIME);
        for resource in resources {
            write_at(&module.resources[0].directory.join(resource), SOURCE_TIME);
        }
        module
    }
}

/// Stand-in for the build itself: compile outputs and copy resources
fn build(module: &ModuleSpec, secs: i64) {
    write_at(&module.output_directory.join("A.class"), secs);
    for group in &module.resources {
        if !group.directory.is_dir() {
            continue;
        }
        let target = group.target_directory(&module.output_directory);
        for file in DirectoryScanner::new(&group.directory).scan().unwrap() {
            write_at(&target.join(file), secs);
        }
    }
}

fn evaluate_in_new_session(engine: &StalenessEngine, module: &ModuleSpec) -> Evaluation {
    let mut registry = ModuleRegistry::new();
    engine.evaluate(module, &mut registry).unwrap()
}

/// Run the first build of a module so that the next evaluation starts clean
fn bootstrap(engine: &StalenessEngine, module: &ModuleSpec) {
    let first = evaluate_in_new_session(engine, module);
    assert!(first.is_stale());
    build(module, BUILD_TIME);
}

#[test]
fn fresh_module_without_outputs_is_stale() {
    let project = Project::new();
    let module = project.module("core", &[]);
    let engine = StalenessEngine::new(EngineConfig::default());

    let evaluation = evaluate_in_new_session(&engine, &module);

    assert_eq!(
        evaluation.verdict,
        Verdict::Stale(StaleReason::DescriptorChanged {
            descriptor: module.descriptor.clone()
        })
    );
    assert_eq!(evaluation.cleaned, vec![module.build_directory.clone()]);

    let timestamps =
        TimestampStore::load(&module.build_directory, &engine.config().timestamps_file).unwrap();
    assert_eq!(
        timestamps.get(&module.descriptor.to_string_lossy()),
        Some(DESCRIPTOR_TIME as u64 * 1_000)
    );
}

#[test]
fn unchanged_module_is_fresh_across_sessions() {
    let project = Project::new();
    let module = project.module("core", &["app.properties", "i18n/en.properties"]);
    let engine = StalenessEngine::new(EngineConfig::default());
    bootstrap(&engine, &module);

    for _ in 0..3 {
        let evaluation = evaluate_in_new_session(&engine, &module);
        assert_eq!(evaluation.verdict, Verdict::Fresh);
        assert!(evaluation.cleaned.is_empty());
        assert!(module.output_directory.join("A.class").exists());
    }

    let resources =
        ResourceSetStore::load(&module.build_directory, &engine.config().resources_file).unwrap();
    let tracked: Vec<_> = resources.iter().collect();
    assert_eq!(tracked, vec!["app.properties", "i18n/en.properties"]);
}

#[test]
fn touched_descriptor_is_stale_and_recorded() {
    let project = Project::new();
    let module = project.module("core", &[]);
    let engine = StalenessEngine::new(EngineConfig::default());
    bootstrap(&engine, &module);

    write_at(&module.descriptor, 4_000);
    let evaluation = evaluate_in_new_session(&engine, &module);

    assert!(matches!(
        evaluation.verdict,
        Verdict::Stale(StaleReason::DescriptorChanged { .. })
    ));
    assert!(!module.output_directory.exists());

    let timestamps =
        TimestampStore::load(&module.build_directory, &engine.config().timestamps_file).unwrap();
    assert_eq!(
        timestamps.get(&module.descriptor.to_string_lossy()),
        Some(4_000_000)
    );
}

#[test]
fn descriptor_moved_back_in_time_is_not_stale() {
    let project = Project::new();
    let module = project.module("core", &[]);
    let engine = StalenessEngine::new(EngineConfig::default());
    bootstrap(&engine, &module);

    write_at(&module.descriptor, DESCRIPTOR_TIME - 500);
    let evaluation = evaluate_in_new_session(&engine, &module);
    assert_eq!(evaluation.verdict, Verdict::Fresh);
}

#[test]
fn newer_source_is_stale() {
    let project = Project::new();
    let module = project.module("core", &[]);
    let engine = StalenessEngine::new(EngineConfig::default());
    bootstrap(&engine, &module);

    write_at(&module.source_directory.join("pkg/B.txt"), BUILD_TIME + 10);
    let evaluation = evaluate_in_new_session(&engine, &module);

    assert_eq!(
        evaluation.verdict,
        Verdict::Stale(StaleReason::SourcesNewer {
            source_millis: (BUILD_TIME as u64 + 10) * 1_000,
            output_millis: BUILD_TIME as u64 * 1_000,
        })
    );
    assert!(!module.build_directory.join("classes").exists());
}

#[test]
fn modified_resource_is_stale() {
    let project = Project::new();
    let module = project.module("core", &["app.properties"]);
    let engine = StalenessEngine::new(EngineConfig::default());
    bootstrap(&engine, &module);
    assert!(!evaluate_in_new_session(&engine, &module).is_stale());

    let source = module.resources[0].directory.join("app.properties");
    write_at(&source, BUILD_TIME + 1);
    let evaluation = evaluate_in_new_session(&engine, &module);

    assert_eq!(
        evaluation.verdict,
        Verdict::Stale(StaleReason::ResourceOutOfDate {
            source,
            target: module.output_directory.join("app.properties"),
        })
    );
}

#[test]
fn deleted_resource_is_stale_and_set_not_rewritten() {
    let project = Project::new();
    let module = project.module("core", &["A", "B", "C"]);
    let engine = StalenessEngine::new(EngineConfig::default());
    bootstrap(&engine, &module);
    assert!(!evaluate_in_new_session(&engine, &module).is_stale());

    fs::remove_file(module.resources[0].directory.join("C")).unwrap();
    let evaluation = evaluate_in_new_session(&engine, &module);

    assert_eq!(
        evaluation.verdict,
        Verdict::Stale(StaleReason::ResourcesDeleted {
            paths: vec!["C".to_string()]
        })
    );

    // The deletion short-circuits before the current set {A, B} is saved,
    // and the cleanup then removes the old snapshot with the build directory.
    let resources =
        ResourceSetStore::load(&module.build_directory, &engine.config().resources_file).unwrap();
    assert!(resources.is_empty());
}

#[test]
fn resource_without_copy_short_circuits_source_check() {
    let project = Project::new();
    let module = project.module("core", &["app.properties"]);
    let engine = StalenessEngine::new(EngineConfig::default());
    bootstrap(&engine, &module);

    // Both a new uncopied resource and a newer source exist; only the
    // resource check runs.
    write_at(&module.resources[0].directory.join("new.properties"), 100);
    write_at(&module.source_directory.join("B.txt"), BUILD_TIME + 100);

    let evaluation = evaluate_in_new_session(&engine, &module);
    assert!(matches!(
        evaluation.verdict,
        Verdict::Stale(StaleReason::ResourceOutOfDate { ref target, .. })
            if target.ends_with("new.properties")
    ));
}

#[test]
fn stale_dependency_propagates() {
    let project = Project::new();
    let core = project.module("core", &[]);
    let app = project.module("app", &[]).with_dependency(core.id.clone());
    let engine = StalenessEngine::new(EngineConfig::default());
    bootstrap(&engine, &app);

    let mut registry = ModuleRegistry::new();
    registry
        .record(
            core.id.clone(),
            Verdict::Stale(StaleReason::DescriptorChanged {
                descriptor: core.descriptor.clone(),
            }),
        )
        .unwrap();

    let evaluation = engine.evaluate(&app, &mut registry).unwrap();
    assert_eq!(
        evaluation.verdict,
        Verdict::Stale(StaleReason::DependencyStale {
            dependency: core.id.clone()
        })
    );
    assert!(registry.lookup(&app.id).unwrap().is_stale());
}

#[test]
fn fresh_or_unevaluated_dependency_does_not_propagate() {
    let project = Project::new();
    let core = project.module("core", &[]);
    let app = project
        .module("app", &[])
        .with_dependency(core.id.clone())
        .with_dependency(id("external"));
    let engine = StalenessEngine::new(EngineConfig::default());
    bootstrap(&engine, &core);
    bootstrap(&engine, &app);

    let mut registry = ModuleRegistry::new();
    let core_eval = engine.evaluate(&core, &mut registry).unwrap();
    assert!(!core_eval.is_stale());

    let app_eval = engine.evaluate(&app, &mut registry).unwrap();
    assert_eq!(app_eval.verdict, Verdict::Fresh);
}

#[test]
fn staleness_chains_through_a_session() {
    let project = Project::new();
    let core = project.module("core", &[]);
    let util = project.module("util", &[]).with_dependency(core.id.clone());
    let app = project.module("app", &[]).with_dependency(util.id.clone());
    let engine = StalenessEngine::new(EngineConfig::default());
    for module in [&core, &util, &app] {
        bootstrap(&engine, module);
    }

    write_at(&core.source_directory.join("A.txt"), BUILD_TIME + 1);

    let mut registry = ModuleRegistry::new();
    let verdicts: Vec<bool> = [&core, &util, &app]
        .iter()
        .map(|module| engine.evaluate(module, &mut registry).unwrap().is_stale())
        .collect();

    assert_eq!(verdicts, vec![true, true, true]);
    assert_eq!(registry.stale_modules().count(), 3);
}

#[test]
fn dependency_check_skips_later_checks() {
    let project = Project::new();
    let core = project.module("core", &[]);
    let app = project.module("app", &["app.properties"]).with_dependency(core.id.clone());
    let engine = StalenessEngine::new(EngineConfig::default());
    bootstrap(&engine, &app);
    assert!(!evaluate_in_new_session(&engine, &app).is_stale());

    // An unreadable resource snapshot would make the resource check fire,
    // but the dependency check comes first.
    fs::write(
        app.build_directory.join(&engine.config().resources_file),
        [0xff, 0xff],
    )
    .unwrap();

    let mut registry = ModuleRegistry::new();
    registry
        .record(
            core.id.clone(),
            Verdict::Stale(StaleReason::OutputMissing {
                directory: core.output_directory.clone(),
            }),
        )
        .unwrap();

    let evaluation = engine.evaluate(&app, &mut registry).unwrap();
    assert!(matches!(
        evaluation.verdict,
        Verdict::Stale(StaleReason::DependencyStale { .. })
    ));
}

#[test]
fn corrupted_timestamps_abort_evaluation() {
    let project = Project::new();
    let module = project.module("core", &[]);
    let engine = StalenessEngine::new(EngineConfig::default());
    fs::create_dir_all(&module.build_directory).unwrap();
    fs::write(
        module.build_directory.join(&engine.config().timestamps_file),
        b"garbage",
    )
    .unwrap();

    let mut registry = ModuleRegistry::new();
    let err = engine.evaluate(&module, &mut registry).unwrap_err();

    assert!(matches!(err, EngineError::TimestampLoad { .. }));
    assert_eq!(err.module(), &module.id);
    assert!(registry.lookup(&module.id).is_none());
}

#[test]
fn failed_cleanup_aborts_with_path() {
    let project = Project::new();
    let mut module = project.module("core", &[]);
    module.output_directory = project.root.join("core/bin");
    fs::write(&module.output_directory, "not a directory").unwrap();
    let engine = StalenessEngine::new(EngineConfig::default());

    let mut registry = ModuleRegistry::new();
    let err = engine.evaluate(&module, &mut registry).unwrap_err();

    match &err {
        EngineError::Cleanup {
            module: failed,
            path,
            ..
        } => {
            assert_eq!(failed, &module.id);
            assert_eq!(path, &module.output_directory);
        }
        other => panic!("expected a cleanup failure, got {other:?}"),
    }
    assert!(registry.lookup(&module.id).unwrap().is_stale());
}

#[test]
fn failed_resource_state_save_aborts() {
    let project = Project::new();
    let module = project.module("core", &["app.properties"]);
    let engine = StalenessEngine::new(EngineConfig::default());
    bootstrap(&engine, &module);

    // A directory where the store writes its temporary file
    let temp_file = module
        .build_directory
        .join(Path::new(&engine.config().resources_file).with_extension("tmp"));
    fs::create_dir_all(&temp_file).unwrap();

    let mut registry = ModuleRegistry::new();
    let err = engine.evaluate(&module, &mut registry).unwrap_err();

    assert!(matches!(err, EngineError::StateSave { .. }));
    assert_eq!(err.module(), &module.id);
    assert!(registry.lookup(&module.id).is_none());
    assert!(module.output_directory.join("A.class").exists());
}

#[test]
fn module_without_sources_or_resources_settles() {
    let project = Project::new();
    let module = ModuleSpec::with_layout(id("pom-only"), &project.root.join("pom-only"));
    write_at(&module.descriptor, DESCRIPTOR_TIME);
    let engine = StalenessEngine::new(EngineConfig::default());

    assert!(evaluate_in_new_session(&engine, &module).is_stale());
    assert_eq!(
        evaluate_in_new_session(&engine, &module).verdict,
        Verdict::Fresh
    );
}
