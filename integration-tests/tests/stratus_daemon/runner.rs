use crate::new_workdir;
use integration_tests::Workdir;
use std::{sync::Arc, time::Duration};
use stratus_core::{
    job::BackupJob,
    output::{OutputFormat, Stats},
    restic::Restic,
};
use stratus_daemon::{
    metrics::Metrics,
    runner::{Hook, Outcome, RunError, Runner},
    state::RunStatus,
};

const JSON_OUTPUT: &str = concat!(
    r#"{"message_type":"status","percent_done":0.5,"total_files":58,"files_done":29}"#,
    "\n",
    r#"{"message_type":"error","error":{"message":"permission denied"},"during":"archival","item":"/home/user/secret"}"#,
    "\n",
    r#"{"message_type":"summary","files_new":56,"files_changed":2,"files_unmodified":2,"dirs_new":0,"dirs_changed":0,"dirs_unmodified":0,"data_blobs":35,"tree_blobs":1,"data_added":169009,"total_files_processed":58,"total_bytes_processed":102624133120,"total_duration":1.5,"snapshot_id":"3a2b1c"}"#,
    "\n",
);

const LEGACY_OUTPUT: &str = "\
using parent snapshot 3a2b1c4d

Files:          56 new,     2 changed,     2 unmodified
Dirs:            0 new,     0 changed,     0 unmodified
Added to the repo: 169.009 KiB

processed 58 files, 97.870 MiB in 0:01
snapshot 5e6f7a8b saved
";

fn summary_stats() -> Stats {
    Stats {
        files_new: 56,
        files_changed: 2,
        files_unmodified: 2,
        files_processed: 58,
        bytes_added: 169009,
        bytes_processed: 102_624_133_120,
    }
}

fn runner(engine: &Workdir, job: BackupJob) -> Runner {
    Runner::new(
        job,
        Arc::new(Restic::new(engine.test_binary())),
        Arc::new(Metrics::new().unwrap()),
    )
}

fn job() -> BackupJob {
    let mut job = BackupJob::new("local:/srv/repo", "repo-password");
    job.args = "/home".to_owned();
    job
}

#[tokio::test]
async fn should_record_statistics_of_successful_backup() {
    let engine = new_workdir().with_stdout(JSON_OUTPUT);
    let runner = runner(&engine, job());

    let outcome = runner.run().await;

    match outcome {
        Outcome::Succeeded(stats) => assert_eq!(stats, summary_stats()),
        other => panic!("unexpected outcome: {:?}", other),
    }
    let metrics = runner.metrics();
    assert_eq!(metrics.runs_total(), 1);
    assert_eq!(metrics.runs_successful(), 1);
    assert_eq!(metrics.runs_failed(), 0);
    assert_eq!(metrics.status(), 0);
    assert!(metrics.last_success_timestamp() > 0.0);
    assert_eq!(runner.state().status(), RunStatus::Idle);
    assert!(!runner.state().is_running());
    let text = metrics.encode_text().unwrap();
    assert!(text.contains("backup_backup_files_new_sum 56"));
    assert!(text.contains("backup_backup_processed_bytes_sum 102624133120"));
}

#[tokio::test]
async fn should_parse_legacy_output() {
    let engine = new_workdir().with_stdout(LEGACY_OUTPUT);
    let mut job = job();
    job.output_format = OutputFormat::Legacy;
    let runner = runner(&engine, job);

    let outcome = runner.run().await;

    match outcome {
        Outcome::Succeeded(stats) => assert_eq!(
            stats,
            Stats {
                bytes_added: 173_065_216,
                ..summary_stats()
            }
        ),
        other => panic!("unexpected outcome: {:?}", other),
    }
    engine.args().assert_args(&["backup", "/home"]);
}

#[tokio::test]
async fn should_succeed_with_partial_stats_if_output_is_unparseable() {
    let engine = new_workdir().with_stdout("this is not JSON\n");
    let runner = runner(&engine, job());

    let outcome = runner.run().await;

    match outcome {
        Outcome::Succeeded(stats) => assert_eq!(stats, Stats::default()),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(runner.metrics().runs_successful(), 1);
    assert_eq!(runner.state().status(), RunStatus::Idle);
}

#[tokio::test]
async fn should_fail_if_restic_fails() {
    let engine = new_workdir()
        .with_stderr("Fatal: wrong password or no key found\n")
        .with_exit_status(1);
    let runner = runner(&engine, job());

    let outcome = runner.run().await;

    match outcome {
        Outcome::Failed(RunError::Engine { output, .. }) => {
            assert_eq!(output, "Fatal: wrong password or no key found\n")
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(runner.metrics().runs_total(), 1);
    assert_eq!(runner.metrics().runs_failed(), 1);
    assert_eq!(runner.metrics().status(), -1);
    assert_eq!(runner.state().status(), RunStatus::Failed);
    assert_eq!(runner.metrics().last_success_timestamp(), 0.0);
}

#[tokio::test]
async fn should_not_run_restic_if_pre_command_fails() {
    let engine = new_workdir().with_stdout(JSON_OUTPUT);
    let pre = new_workdir().with_exit_status(2);
    let post = new_workdir();
    let mut job = job();
    job.pre_command = Some(pre.command_line(&["prepare"]));
    job.post_command = Some(post.command_line(&[]));
    let runner = runner(&engine, job);

    let outcome = runner.run().await;

    assert!(matches!(
        outcome,
        Outcome::Failed(RunError::Hook(Hook::Pre, _))
    ));
    assert_eq!(pre.invocations(), 1);
    assert_eq!(engine.invocations(), 0);
    assert_eq!(post.invocations(), 0);
    assert_eq!(runner.metrics().runs_failed(), 1);
    assert_eq!(runner.state().status(), RunStatus::Failed);
}

#[tokio::test]
async fn should_run_hooks_around_restic() {
    let engine = new_workdir().with_stdout(JSON_OUTPUT);
    let pre = new_workdir();
    let post = new_workdir();
    let mut job = job();
    job.pre_command = Some(pre.command_line(&["lock"]));
    job.post_command = Some(post.command_line(&["unlock"]));
    let runner = runner(&engine, job);

    let outcome = runner.run().await;

    assert!(outcome.is_success());
    pre.args().assert_args(&["lock"]);
    post.args().assert_args(&["unlock"]);
    assert_eq!(engine.invocations(), 1);
}

#[tokio::test]
async fn should_fail_run_if_post_command_fails_after_successful_backup() {
    let engine = new_workdir().with_stdout(JSON_OUTPUT);
    let post = new_workdir().with_exit_status(1);
    let mut job = job();
    job.post_command = Some(post.command_line(&[]));
    let runner = runner(&engine, job);

    let outcome = runner.run().await;

    assert!(matches!(
        outcome,
        Outcome::Failed(RunError::Hook(Hook::Post, _))
    ));
    assert_eq!(engine.invocations(), 1);
    assert_eq!(runner.metrics().runs_failed(), 1);
    assert_eq!(runner.metrics().runs_successful(), 0);
    assert_eq!(runner.metrics().status(), -1);
    assert_eq!(runner.state().status(), RunStatus::Failed);
}

#[tokio::test]
async fn should_run_error_command_if_restic_fails() {
    let engine = new_workdir().with_exit_status(1);
    let on_error = new_workdir();
    let mut job = job();
    job.error_command = Some(on_error.command_line(&["notify"]));
    let runner = runner(&engine, job);

    runner.run().await;

    assert_eq!(on_error.invocations(), 1);
    on_error.args().assert_args(&["notify"]);
}

#[tokio::test]
async fn should_run_error_command_if_pre_command_fails() {
    let engine = new_workdir();
    let pre = new_workdir().with_exit_status(1);
    let on_error = new_workdir();
    let mut job = job();
    job.pre_command = Some(pre.command_line(&[]));
    job.error_command = Some(on_error.command_line(&[]));
    let runner = runner(&engine, job);

    runner.run().await;

    assert_eq!(on_error.invocations(), 1);
}

#[tokio::test]
async fn should_not_run_error_command_after_successful_backup() {
    let engine = new_workdir().with_stdout(JSON_OUTPUT);
    let on_error = new_workdir();
    let mut job = job();
    job.error_command = Some(on_error.command_line(&[]));
    let runner = runner(&engine, job);

    runner.run().await;

    assert_eq!(on_error.invocations(), 0);
}

#[tokio::test]
async fn should_keep_run_failed_if_error_command_fails() {
    let engine = new_workdir().with_exit_status(1);
    let on_error = new_workdir().with_exit_status(1);
    let mut job = job();
    job.error_command = Some(on_error.command_line(&[]));
    let runner = runner(&engine, job);

    let outcome = runner.run().await;

    assert!(matches!(outcome, Outcome::Failed(RunError::Engine { .. })));
    assert_eq!(runner.metrics().runs_total(), 1);
    assert_eq!(runner.metrics().runs_failed(), 1);
}

#[tokio::test]
async fn should_clear_failed_status_on_next_successful_run() {
    let engine = new_workdir().with_exit_status(1);
    let runner = runner(&engine, job());

    runner.run().await;
    assert_eq!(runner.state().status(), RunStatus::Failed);

    let engine = engine.with_exit_status(0).with_stdout(JSON_OUTPUT);
    let outcome = runner.run().await;

    assert!(outcome.is_success());
    assert_eq!(runner.state().status(), RunStatus::Idle);
    assert_eq!(runner.metrics().status(), 0);
    assert_eq!(runner.metrics().runs_total(), 2);
    assert_eq!(runner.metrics().runs_failed(), 1);
    assert_eq!(runner.metrics().runs_successful(), 1);
    assert_eq!(engine.invocations(), 2);
}

#[tokio::test]
async fn should_run_restic_only_once_for_overlapping_runs() {
    let engine = new_workdir()
        .with_stdout(JSON_OUTPUT)
        .with_sleep(Duration::from_millis(500));
    let runner = runner(&engine, job());

    let (first, second) = tokio::join!(runner.run(), runner.run());

    assert!(first.is_success());
    assert!(matches!(second, Outcome::Skipped));
    assert_eq!(engine.invocations(), 1);
    assert_eq!(runner.metrics().runs_total(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_run_restic_only_once_for_concurrent_triggers() {
    let engine = new_workdir()
        .with_stdout(JSON_OUTPUT)
        .with_sleep(Duration::from_millis(1000));
    let runner = Arc::new(runner(&engine, job()));

    let handles = (0..4)
        .map(|_| {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run().await })
        })
        .collect::<Vec<_>>();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Skipped))
            .count(),
        3
    );
    assert_eq!(engine.invocations(), 1);
    assert_eq!(runner.metrics().runs_total(), 1);
}
