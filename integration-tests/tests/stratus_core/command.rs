use crate::new_workdir;
use stratus_core::command::{self, ExitStatus, Failure};

#[tokio::test]
async fn should_return_combined_stdout_and_stderr() {
    let workdir = new_workdir()
        .with_stdout("stdout1\nstdout2\n")
        .with_stderr("stderr1\n");

    let output = command::run(&workdir.command_line(&["dump", "--all"]))
        .await
        .unwrap();

    let mut lines = output.lines().collect::<Vec<_>>();
    lines.sort_unstable();
    assert_eq!(lines, vec!["stderr1", "stdout1", "stdout2"]);
    workdir.args().assert_args(&["dump", "--all"]);
}

#[tokio::test]
async fn should_fail_with_exit_status_and_captured_output() {
    let workdir = new_workdir()
        .with_stderr("Fatal: database is locked\n")
        .with_exit_status(3);
    let command_line = workdir.command_line(&["dump"]);

    let error = command::run(&command_line).await.unwrap_err();

    assert_eq!(error.command, command_line);
    assert!(matches!(
        error.reason,
        Failure::Exit(ExitStatus::Failed(Some(3)))
    ));
    assert_eq!(error.output, "Fatal: database is locked");
}

#[tokio::test]
async fn should_pass_quotes_through_literally() {
    let workdir = new_workdir();

    command::run(&workdir.command_line(&["\"a", "b\""]))
        .await
        .unwrap();

    workdir.args().assert_args(&["\"a", "b\""]);
}

#[tokio::test]
async fn should_trim_command_line() {
    let workdir = new_workdir();

    command::run(&format!("  {} sync \n", workdir.command_line(&[])))
        .await
        .unwrap();

    workdir.args().assert_args(&["sync"]);
}
