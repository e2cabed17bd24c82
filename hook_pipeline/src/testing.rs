//! Scripted shell for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::shell::{ShellError, ShellRunner};

/// Answers commands from a script. The last response for a command repeats.
#[derive(Default)]
pub struct ScriptedShell {
    script: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Err(output)` simulates a non-zero exit that printed `output`.
    pub fn respond(self, command: &str, response: Result<&str, &str>) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .push_back(response.map(str::to_string).map_err(str::to_string));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShellRunner for ScriptedShell {
    async fn run(
        &self,
        command: &str,
        dir: &Path,
        _timeout: Option<Duration>,
    ) -> Result<String, ShellError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), dir.to_path_buf()));

        let mut script = self.script.lock().unwrap();
        let response = match script.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match response {
            Some(Ok(output)) => Ok(output),
            Some(Err(output)) => Err(ShellError::Exit {
                command: command.to_string(),
                code: Some(1),
                output,
            }),
            None => Err(ShellError::Spawn {
                command: command.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "unscripted command"),
            }),
        }
    }
}
