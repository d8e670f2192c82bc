//! End-to-end generation + diff + impact, exercising C1-C8 together against
//! a real temporary git repository (§8's end-to-end scenarios, adapted to
//! go through the public service surface rather than individual
//! components).

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use callgraph_core::config::CoreConfig;
use callgraph_core::model::project::{ExcludePatterns, Project};
use callgraph_core::model::task::TaskStatus;
use callgraph_core::project_store::InMemoryProjectStore;
use callgraph_core::GenerationService;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git").arg("-C").arg(dir).args(args).status().unwrap();
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "test"]);
}

const COMMIT1_MAIN_GO: &str = r#"package main

func helper() {
	println("hello")
}

func main() {
	helper()
}
"#;

const COMMIT2_MAIN_GO: &str = r#"package main

func helper() {
	println("hello")
	println("world")
}

func main() {
	helper()
}
"#;

async fn wait_for_terminal(
    service: &GenerationService,
    task_id: uuid::Uuid,
) -> callgraph_core::model::task::GenerationTask {
    for _ in 0..200 {
        let task = service.get_task_progress(task_id).await.unwrap();
        if task.status.is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("task {task_id} did not reach a terminal state in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generates_a_graph_then_answers_diff_and_impact_queries() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    std::fs::write(repo.path().join("go.mod"), "module example.com/demo\n\ngo 1.22\n").unwrap();

    std::fs::write(repo.path().join("main.go"), COMMIT1_MAIN_GO).unwrap();
    git(repo.path(), &["add", "."]);
    git(repo.path(), &["commit", "-q", "-m", "first"]);

    std::fs::write(repo.path().join("main.go"), COMMIT2_MAIN_GO).unwrap();
    git(repo.path(), &["add", "."]);
    git(repo.path(), &["commit", "-q", "-m", "second"]);

    let data_root = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        data_root: data_root.path().to_path_buf(),
        ..CoreConfig::default()
    };
    let projects = Arc::new(InMemoryProjectStore::new());
    let project = Project {
        id: "demo".to_string(),
        name: "demo".to_string(),
        remote_url: None,
        local_paths: vec![repo.path().display().to_string()],
        entry_points: vec!["main.go:main".to_string()],
        exclude: ExcludePatterns::default(),
        algorithm: Default::default(),
        integration_test_dir: None,
        integration_test_tag: None,
    };
    projects.save(&project).await.unwrap();

    let service = GenerationService::new(config, projects);

    let (task_id, status) = service.generate_async(repo.path(), "HEAD").await.unwrap();
    assert_eq!(status, TaskStatus::Pending);

    let finished = wait_for_terminal(&service, task_id).await;
    assert_eq!(finished.status, TaskStatus::Completed, "task failed: {:?}", finished.error);
    let result = finished.result.expect("completed task carries a result");
    assert_eq!(result.func_count, 2);
    assert_eq!(result.edge_count, 1);
    assert!(!result.fallback);

    // CheckStatus reflects the freshly generated, up-to-date graph.
    let status = service.check_status(repo.path(), "").await.unwrap();
    assert!(status.exists);
    assert!(status.up_to_date);
    assert_eq!(status.func_count, Some(2));

    // Diff + impact: `helper`'s body changed between the two commits, and
    // `main` is its one caller.
    let full = service.full_analysis(repo.path(), "HEAD~1..HEAD", 3).await.unwrap();
    assert_eq!(full.diff.changed_functions.len(), 1);
    let changed = &full.diff.changed_functions[0];
    assert_eq!(changed.name, "helper");
    assert!(changed.lines_added > 0);

    assert_eq!(full.impact.summary.functions_analyzed, 1);
    assert_eq!(full.impact.impacts[0].total_callers, 1);
    assert_eq!(full.impact.impacts[0].callers[0].display_name, "main.main");
    assert_eq!(full.impact.summary.total_affected, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_with_config_registers_an_unregistered_project() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    std::fs::write(repo.path().join("go.mod"), "module example.com/demo2\n\ngo 1.22\n").unwrap();
    std::fs::write(repo.path().join("main.go"), COMMIT1_MAIN_GO).unwrap();
    git(repo.path(), &["add", "."]);
    git(repo.path(), &["commit", "-q", "-m", "first"]);

    let data_root = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        data_root: data_root.path().to_path_buf(),
        ..CoreConfig::default()
    };
    let projects = Arc::new(InMemoryProjectStore::new());
    let service = GenerationService::new(config, projects.clone());

    assert!(projects.find_by_path(&repo.path().display().to_string()).await.unwrap().is_none());

    let (task_id, _) = service
        .generate_with_config_async(
            repo.path(),
            vec!["main.go:main".to_string()],
            None,
            None,
            "HEAD",
            None,
            None,
        )
        .await
        .unwrap();

    let finished = wait_for_terminal(&service, task_id).await;
    assert_eq!(finished.status, TaskStatus::Completed, "task failed: {:?}", finished.error);

    let registered = projects.find_by_path(&repo.path().display().to_string()).await.unwrap();
    assert!(registered.is_some(), "project should be registered after a successful generation");
}

#[tokio::test]
async fn generate_sync_requires_prior_registration() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    std::fs::write(repo.path().join("go.mod"), "module example.com/demo3\n").unwrap();
    std::fs::write(repo.path().join("main.go"), COMMIT1_MAIN_GO).unwrap();
    git(repo.path(), &["add", "."]);
    git(repo.path(), &["commit", "-q", "-m", "first"]);

    let data_root = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        data_root: data_root.path().to_path_buf(),
        ..CoreConfig::default()
    };
    let service = GenerationService::new(config, Arc::new(InMemoryProjectStore::new()));

    let err = service.generate(repo.path(), "HEAD").await.unwrap_err();
    assert!(matches!(err, callgraph_core::CoreError::ProjectNotRegistered(_)));
}
