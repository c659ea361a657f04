use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::app::{Result, TrackerError};
use crate::consumer::ConsumeAction;
use crate::domain::TrackedEntry;

/// Runs an external program per entry, passing the entry id as the last
/// argument and the retry count in `FEEDTRACK_RETRIES`.
#[derive(Debug, Clone)]
pub struct CommandAction {
    program: String,
    args: Vec<String>,
}

impl CommandAction {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits `program args...` as given on the command line.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| TrackerError::Config("no consume command given".into()))?;
        Ok(Self::new(program.clone(), args.to_vec()))
    }
}

#[async_trait]
impl ConsumeAction for CommandAction {
    async fn consume(&self, entry: &TrackedEntry) -> Result<()> {
        debug!("Running {} for {}", self.program, entry.id);

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(entry.id.as_str())
            .env("FEEDTRACK_RETRIES", entry.retries.to_string())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(TrackerError::Other(format!(
                "{} exited with {} for {}",
                self.program, status, entry.id
            )))
        }
    }
}
