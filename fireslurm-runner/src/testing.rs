//! Test doubles for the host shell

use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;

use crate::shell::{CommandOutput, ConsoleExit, HostCommand, HostShell, ShellError};

/// Records every command instead of running it
pub(crate) struct RecordingShell {
    commands: Mutex<Vec<HostCommand>>,
    fail_program: Option<String>,
    console_exit: ConsoleExit,
    console_output: String,
    console_files: Vec<(String, String)>,
}

impl RecordingShell {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            fail_program: None,
            console_exit: ConsoleExit::Exited(0),
            console_output: "boot\nok\n".to_string(),
            console_files: Vec::new(),
        }
    }

    /// Makes every invocation of `program` exit with status 1
    pub fn failing(mut self, program: &str) -> Self {
        self.fail_program = Some(program.to_string());
        self
    }

    pub fn console_exit(mut self, exit: ConsoleExit) -> Self {
        self.console_exit = exit;
        self
    }

    /// Files the fake simulator writes next to its transcript
    pub fn console_file(mut self, name: &str, content: &str) -> Self {
        self.console_files
            .push((name.to_string(), content.to_string()));
        self
    }

    pub fn commands(&self) -> Vec<HostCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.commands().into_iter().map(|c| c.program).collect()
    }
}

#[async_trait]
impl HostShell for RecordingShell {
    async fn run(&self, command: &HostCommand) -> Result<CommandOutput, ShellError> {
        self.commands.lock().unwrap().push(command.clone());
        let failed = self.fail_program.as_deref() == Some(command.program.as_str());
        Ok(CommandOutput {
            code: Some(if failed { 1 } else { 0 }),
            stdout: String::new(),
            stderr: if failed { "boom".to_string() } else { String::new() },
        })
    }

    async fn run_console(
        &self,
        command: &HostCommand,
        transcript: &Path,
    ) -> Result<ConsoleExit, ShellError> {
        self.commands.lock().unwrap().push(command.clone());
        let io = |source| ShellError::Io {
            command: command.program.clone(),
            source,
        };
        std::fs::write(transcript, &self.console_output).map_err(io)?;
        if let Some(dir) = transcript.parent() {
            for (name, content) in &self.console_files {
                std::fs::write(dir.join(name), content).map_err(io)?;
            }
        }
        Ok(self.console_exit)
    }
}
