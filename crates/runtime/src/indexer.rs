//! Post-write re-index trigger.
//!
//! The journal usually lives inside a synced folder (Nextcloud, Syncthing …)
//! whose index must be refreshed after the file changes on disk.  The trigger
//! is fire-and-forget: its outcome is logged and never reaches the caller.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, info, warn};

use daybook_config::IndexerConfig;

/// Placeholder replaced by the written file's path in command arguments.
pub const PATH_PLACEHOLDER: &str = "{path}";

pub trait Indexer: Send + Sync {
    fn notify(&self, path: &Path);
}

/// Does nothing; used when no command is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndexer;

impl Indexer for NoopIndexer {
    fn notify(&self, path: &Path) {
        debug!(path = %path.display(), "no indexer configured");
    }
}

/// Spawns an external command after each write.
#[derive(Debug, Clone)]
pub struct CommandIndexer {
    argv: Vec<String>,
}

impl CommandIndexer {
    /// `None` when `argv` is empty.
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.first().is_none_or(|program| program.trim().is_empty()) {
            return None;
        }
        Some(Self { argv })
    }

    fn command_for(&self, path: &Path) -> Command {
        let path = path.display().to_string();
        let mut argv = self
            .argv
            .iter()
            .map(|arg| arg.replace(PATH_PLACEHOLDER, &path));
        // `new` guarantees a program.
        let mut command = Command::new(argv.next().unwrap_or_default());
        command
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command
    }
}

impl Indexer for CommandIndexer {
    fn notify(&self, path: &Path) {
        let program = self.argv[0].clone();
        let child = match self.command_for(path).spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(%program, ?err, "failed to spawn indexer");
                return;
            }
        };
        info!(%program, pid = child.id(), "indexer started");

        // Reap the child off the async executor so it never becomes a zombie.
        let reap = move || match child.wait_with_output() {
            Ok(output) if output.status.success() => debug!(%program, "indexer finished"),
            Ok(output) => warn!(
                %program,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "indexer exited with failure"
            ),
            Err(err) => warn!(%program, ?err, "failed to wait for indexer"),
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(reap);
            }
            Err(_) => {
                std::thread::spawn(reap);
            }
        }
    }
}

pub fn indexer_from_config(config: &IndexerConfig) -> Arc<dyn Indexer> {
    match CommandIndexer::new(config.command.clone()) {
        Some(indexer) => Arc::new(indexer),
        None => Arc::new(NoopIndexer),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn empty_command_is_not_an_indexer() {
        assert!(CommandIndexer::new(vec![]).is_none());
        assert!(CommandIndexer::new(vec!["  ".to_string()]).is_none());
        assert!(CommandIndexer::new(vec!["true".to_string()]).is_some());
    }

    #[test]
    fn path_placeholder_is_substituted() {
        let indexer = CommandIndexer::new(vec![
            "occ".to_string(),
            "files:scan".to_string(),
            "--path={path}".to_string(),
        ])
        .unwrap();
        let command = indexer.command_for(Path::new("/srv/Journal/journal.org"));
        assert_eq!(command.get_program(), "occ");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, ["files:scan", "--path=/srv/Journal/journal.org"]);
    }

    #[test]
    fn missing_program_does_not_panic() {
        let indexer =
            CommandIndexer::new(vec!["daybook-test-no-such-binary-xyz".to_string()]).unwrap();
        indexer.notify(Path::new("journal.org"));
    }
}
