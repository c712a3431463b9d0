use crate::new_workdir;
use stratus_core::{
    command::ExitStatus,
    job::BackupJob,
    output::OutputFormat,
    restic::{Ensured, Error, InitError, Options, Restic},
};

fn job() -> BackupJob {
    BackupJob::new("local:/srv/repo", "repo-password")
}

#[tokio::test]
async fn should_run_specified_restic_binary_with_explicit_arguments() {
    let workdir = new_workdir();
    let restic = Restic::new(workdir.test_binary());

    restic
        .run(None, &["arg1", "arg2", "arg3", "arg4"], &Options::default())
        .unwrap()
        .wait()
        .await
        .unwrap();

    workdir
        .args()
        .assert_args(&["arg1", "arg2", "arg3", "arg4"]);
}

#[tokio::test]
async fn check_wait_should_return_error_if_process_exits_with_unsuccessful_status_code() {
    let workdir = new_workdir().with_exit_status(1);
    let restic = Restic::new(workdir.test_binary());

    let result = restic
        .run(None, &["snapshots"], &Options::default())
        .unwrap()
        .check_wait()
        .await;

    assert!(matches!(
        result,
        Err(Error::ResticError(ExitStatus::Failed(Some(1))))
    ));
}

#[tokio::test]
async fn should_run_backup_with_tokenized_arguments_and_repository_env() {
    let workdir = new_workdir();
    let restic = Restic::new(workdir.test_binary());
    let mut job = job();
    job.args = r#"/home --exclude "/home/user/My Cache" --tag nightly"#.to_owned();

    restic.backup(&job).await.unwrap();

    workdir.args().assert_args(&[
        "backup",
        "--json",
        "/home",
        "--exclude",
        "/home/user/My Cache",
        "--tag",
        "nightly",
    ]);
    workdir
        .env()
        .assert_var("RESTIC_REPOSITORY", "local:/srv/repo")
        .assert_var("RESTIC_PASSWORD", "repo-password");
}

#[tokio::test]
async fn should_run_legacy_backup_without_json_flag() {
    let workdir = new_workdir();
    let restic = Restic::new(workdir.test_binary());
    let mut job = job();
    job.args = "/data".to_owned();
    job.output_format = OutputFormat::Legacy;

    restic.backup(&job).await.unwrap();

    workdir.args().assert_args(&["backup", "/data"]);
}

#[tokio::test]
async fn should_capture_stdout_and_stderr_separately() {
    let workdir = new_workdir()
        .with_stdout("stdout1\nstdout2\nstdout3")
        .with_stderr("stderr1\nstderr2\n")
        .with_exit_status(3);
    let restic = Restic::new(workdir.test_binary());

    let captured = restic.backup(&job()).await.unwrap();

    assert_eq!(captured.status, ExitStatus::Failed(Some(3)));
    assert_eq!(captured.stdout, b"stdout1\nstdout2\nstdout3");
    assert_eq!(captured.stderr_lossy(), "stderr1\nstderr2\n");
}

#[tokio::test]
async fn should_create_repository() {
    let workdir = new_workdir().with_stdout("created restic repository 1e2c3f at /srv/repo\n");
    let restic = Restic::new(workdir.test_binary());

    let result = restic.ensure_repository(&job()).await.unwrap();

    assert_eq!(result, Ensured::Created);
    workdir.args().assert_args(&["init"]);
    workdir
        .env()
        .assert_var("RESTIC_REPOSITORY", "local:/srv/repo");
}

#[tokio::test]
async fn should_accept_existing_repository() {
    let workdir = new_workdir()
        .with_stderr("Fatal: create key in repository at local:/srv/repo failed: repository master key and config already initialized\n")
        .with_exit_status(1);
    let restic = Restic::new(workdir.test_binary());

    let result = restic.ensure_repository(&job()).await.unwrap();

    assert_eq!(result, Ensured::AlreadyExists);
}

#[tokio::test]
async fn should_fail_to_initialize_repository_with_other_error() {
    let workdir = new_workdir()
        .with_stderr("Fatal: create repository at /srv/repo failed: permission denied\n")
        .with_exit_status(1);
    let restic = Restic::new(workdir.test_binary());

    let error = restic.ensure_repository(&job()).await.unwrap_err();

    match error {
        InitError::Failed { status, output } => {
            assert_eq!(status, ExitStatus::Failed(Some(1)));
            assert!(output.contains("permission denied"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn should_get_restic_version() {
    let workdir =
        new_workdir().with_stdout("restic 0.16.4 compiled with go1.22.2 on linux/amd64\n");
    let restic = Restic::new(workdir.test_binary());

    let version = restic.version_string().await.unwrap();

    assert_eq!(
        version,
        "restic 0.16.4 compiled with go1.22.2 on linux/amd64"
    );
    workdir.args().assert_args(&["version"]);
}
