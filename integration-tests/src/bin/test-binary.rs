//! Stands in for restic and hook commands in the integration tests.
//!
//! Everything it does is controlled by files in the directory it was invoked from, so each test
//! links it into its own temporary directory.

use std::{
    error::Error,
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

fn workdir() -> Option<PathBuf> {
    // argv[0] still points at the link inside the work directory
    let invoked_as = PathBuf::from(std::env::args_os().next()?);
    invoked_as.parent().map(Path::to_owned)
}

fn append_invocation(workdir: &Path) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(workdir.join("invocations"))?;
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    writeln!(file, "{}", args.join(" "))
}

fn write_args(workdir: &Path) -> std::io::Result<()> {
    let mut file = File::create(workdir.join("args"))?;
    for arg in std::env::args().skip(1) {
        file.write_all(arg.as_bytes())?;
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn write_env(workdir: &Path) -> std::io::Result<()> {
    let mut file = File::create(workdir.join("env"))?;
    for (key, value) in std::env::vars() {
        file.write_all(key.as_bytes())?;
        file.write_all(b"=")?;
        file.write_all(value.as_bytes())?;
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn read_number<T>(workdir: &Path, name: &str) -> Result<T, Box<dyn Error>>
where
    T: std::str::FromStr,
    T::Err: Error + 'static,
{
    let number = std::fs::read_to_string(workdir.join(name))?.trim().parse()?;
    Ok(number)
}

fn copy_stdout(workdir: &Path) -> std::io::Result<()> {
    let mut file = File::open(workdir.join("stdout"))?;
    std::io::copy(&mut file, &mut std::io::stdout())?;
    Ok(())
}

fn copy_stderr(workdir: &Path) -> std::io::Result<()> {
    let mut file = File::open(workdir.join("stderr"))?;
    std::io::copy(&mut file, &mut std::io::stderr())?;
    Ok(())
}

fn main() {
    let Some(workdir) = workdir() else {
        std::process::exit(101);
    };
    let _ = append_invocation(&workdir);
    let _ = write_args(&workdir);
    let _ = write_env(&workdir);
    if let Ok(millis) = read_number::<u64>(&workdir, "sleep-ms") {
        std::thread::sleep(Duration::from_millis(millis));
    }
    let _ = copy_stdout(&workdir);
    let _ = copy_stderr(&workdir);

    let exit_status = read_number::<i32>(&workdir, "exit-status").unwrap_or(0);
    std::process::exit(exit_status);
}
