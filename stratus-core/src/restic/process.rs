use super::Error;
use crate::command::ExitStatus;
use tokio::{
    io::{AsyncRead, AsyncReadExt as _},
    process::{Child, ChildStdout},
};

/// Everything a finished restic process printed, plus its exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// stdout followed by stderr, for error diagnostics.
    pub fn combined_lossy(&self) -> String {
        let mut combined = String::from_utf8_lossy(&self.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&self.stderr));
        combined
    }
}

async fn read_all(pipe: Option<&mut (impl AsyncRead + Unpin)>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[derive(Debug)]
pub struct ResticProcess(pub(crate) Child);

impl ResticProcess {
    pub fn stdout(&mut self) -> &mut Option<ChildStdout> {
        &mut self.0.stdout
    }

    pub async fn wait(&mut self) -> Result<ExitStatus, Error> {
        self.0
            .wait()
            .await
            .map(ExitStatus::from)
            .map_err(Error::SubprocessStatusError)
    }

    pub async fn check_wait(&mut self) -> Result<(), Error> {
        match self.wait().await? {
            ExitStatus::Successful => Ok(()),
            status => Err(Error::ResticError(status)),
        }
    }

    /// Reads stdout and stderr to the end, then waits for the process to exit.
    ///
    /// Both pipes are drained concurrently so a process filling one of them can't block.
    pub async fn capture(mut self) -> Result<CapturedOutput, Error> {
        let (stdout, stderr) = {
            let child = &mut self.0;
            tokio::try_join!(
                read_all(child.stdout.as_mut()),
                read_all(child.stderr.as_mut())
            )
            .map_err(Error::SubprocessIoError)?
        };
        let status = self.wait().await?;
        Ok(CapturedOutput {
            status,
            stdout,
            stderr,
        })
    }
}
