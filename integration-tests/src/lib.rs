use std::{
    path::{Path, PathBuf},
    time::Duration,
};

fn exe_name(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}

fn link_or_copy(src: &Path, dest: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(src, dest)
    }

    #[cfg(not(unix))]
    {
        std::fs::copy(src, dest).map(|_| ())
    }
}

/// A temporary directory holding a link to the test binary and the files that control it.
pub struct Workdir {
    dir: tempfile::TempDir,
}

impl Workdir {
    const TARGET_BINARY_NAME: &'static str = "test-binary";

    pub fn new(test_binary: impl AsRef<Path>) -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        link_or_copy(
            test_binary.as_ref(),
            &dir.path().join(exe_name(Self::TARGET_BINARY_NAME)),
        )
        .unwrap();
        Self { dir }
    }

    pub fn with_exit_status(self, exit_status: i32) -> Self {
        self.with_file("exit-status", exit_status.to_string())
    }

    pub fn with_stdout(self, stdout: impl AsRef<[u8]>) -> Self {
        self.with_file("stdout", stdout)
    }

    pub fn with_stderr(self, stderr: impl AsRef<[u8]>) -> Self {
        self.with_file("stderr", stderr)
    }

    pub fn with_sleep(self, duration: Duration) -> Self {
        self.with_file("sleep-ms", duration.as_millis().to_string())
    }

    pub fn with_file(self, name: &str, contents: impl AsRef<[u8]>) -> Self {
        std::fs::write(self.path().join(name), contents.as_ref()).unwrap();
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn test_binary(&self) -> PathBuf {
        self.dir.path().join(exe_name(Self::TARGET_BINARY_NAME))
    }

    /// The test binary as a command line for hook commands.
    pub fn command_line(&self, args: &[&str]) -> String {
        let mut parts = vec![self.test_binary().to_string_lossy().into_owned()];
        parts.extend(args.iter().map(|&arg| arg.to_owned()));
        parts.join(" ")
    }

    pub fn args(&self) -> Args {
        Args::new(&self.path().join("args")).unwrap()
    }

    pub fn env(&self) -> Env {
        Env::new(&self.path().join("env")).unwrap()
    }

    /// How often the test binary has been run from this directory.
    pub fn invocations(&self) -> usize {
        std::fs::read_to_string(self.path().join("invocations"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }
}

pub struct Args {
    args: Vec<String>,
}

impl Args {
    fn new(args_file: &Path) -> std::io::Result<Args> {
        let args = std::fs::read_to_string(args_file)?
            .lines()
            .map(|s| s.to_owned())
            .collect();
        Ok(Args { args })
    }

    pub fn assert_args(&self, args: &[impl AsRef<str>]) -> &Self {
        let args = args.iter().map(|s| s.as_ref()).collect::<Vec<_>>();
        assert_eq!(&self.args, &args);
        self
    }
}

pub struct Env {
    env: Vec<(String, String)>,
}

impl Env {
    fn new(env_file: &Path) -> std::io::Result<Self> {
        let env = std::fs::read_to_string(env_file)?
            .lines()
            .filter_map(|s| s.split_once('='))
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect();
        Ok(Env { env })
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn assert_var(&self, key: impl AsRef<str>, value: impl AsRef<str>) -> &Self {
        assert_eq!(self.var(key.as_ref()), Some(value.as_ref()));
        self
    }
}
