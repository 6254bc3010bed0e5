//! Child process implementation of the engine launcher.

use super::{
    CancellationToken, EngineCompletion, EngineInvocation, EngineLauncher, OUTPUT_TAIL,
    PROJECT_ENV, SETTINGS_ENV,
};
use crate::error::EngineError;
use crate::events::{EngineEvent, Event, EventSender};
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often a quiet engine is checked for timeout or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for launching the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Executable to run
    pub program: PathBuf,
    /// Arguments passed before anything else
    pub args: Vec<String>,
    /// Give up and stop the engine after this long (None = wait forever)
    pub timeout: Option<Duration>,
}

impl EngineConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs the engine as a child process
pub struct ProcessEngine {
    config: EngineConfig,
    cancel: CancellationToken,
}

impl ProcessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a token shared with whoever may want to stop the run
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn name(&self) -> String {
        self.config
            .program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.config.program.display().to_string())
    }

    /// Why the run has to stop now, if it does
    fn interruption(&self, started: Instant) -> Option<EngineError> {
        if self.cancel.is_cancelled() {
            return Some(EngineError::Cancelled);
        }
        match self.config.timeout {
            Some(after) if started.elapsed() >= after => Some(EngineError::TimedOut { after }),
            _ => None,
        }
    }

    fn stop(&self, child: &mut Child, reason: &EngineError) {
        warn!(engine = %self.name(), pid = child.id(), %reason, "Stopping engine");
        kill_process_tree(child);
        let _ = child.wait();
    }
}

impl EngineLauncher for ProcessEngine {
    fn launch(
        &self,
        invocation: &EngineInvocation,
        events: &EventSender,
    ) -> Result<EngineCompletion, EngineError> {
        let engine = self.name();

        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .current_dir(&invocation.project_path)
            .env(PROJECT_ENV, &invocation.project_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        match &invocation.overrides_path {
            Some(path) => {
                debug!(path = %path.display(), "Override settings file");
                command.env(SETTINGS_ENV, path);
            }
            None => {
                command.env_remove(SETTINGS_ENV);
            }
        }

        info!(engine = %engine, project = %invocation.project_path.display(), "Starting engine");
        let mut child = command.spawn().map_err(|source| EngineError::Launch {
            program: self.config.program.clone(),
            source,
        })?;
        events.send(Event::Engine(EngineEvent::Started {
            program: self.config.program.clone(),
            project: invocation.project_path.clone(),
        }));

        let started = Instant::now();
        let (line_tx, line_rx) = unbounded();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, line_tx.clone()));
        }
        drop(line_tx);

        // Drain until both streams close, checking for a stop in between
        let mut tail = VecDeque::with_capacity(OUTPUT_TAIL);
        loop {
            match line_rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    debug!(engine = %engine, "{}", line);
                    events.send(Event::Engine(EngineEvent::Output { line: line.clone() }));
                    if tail.len() == OUTPUT_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if let Some(reason) = self.interruption(started) {
                self.stop(&mut child, &reason);
                return Err(reason);
            }
        }
        for reader in readers {
            let _ = reader.join();
        }

        // Output is closed; the process is exiting or has detached its streams
        let status = loop {
            if let Some(status) = child.try_wait().map_err(EngineError::Wait)? {
                break status;
            }
            if let Some(reason) = self.interruption(started) {
                self.stop(&mut child, &reason);
                return Err(reason);
            }
            thread::sleep(POLL_INTERVAL);
        };

        let exit_code = exit_code(status);
        info!(engine = %engine, exit_code, elapsed = ?started.elapsed(), "Engine finished");
        events.send(Event::Engine(EngineEvent::Finished { exit_code }));

        Ok(EngineCompletion {
            exit_code,
            tail: tail.into(),
        })
    }
}

/// Forward every line of `stream` until it closes
fn spawn_reader<R: Read + Send + 'static>(stream: R, lines: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                    if lines.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Ignoring engine output error");
                    break;
                }
            }
        }
    })
}

/// Kill the engine and every process in its group
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    // SAFETY: kill(2) takes no pointers; a negative pid addresses the group
    // the engine was spawned into
    if unsafe { libc::kill(-pid, libc::SIGKILL) } != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::events::{null_sender, EventChannel};
    use std::fs;
    use tempfile::TempDir;

    /// Run a shell snippet as the engine
    fn shell_engine(dir: &TempDir, script: &str) -> EngineConfig {
        let path = dir.path().join("engine.sh");
        fs::write(&path, script).unwrap();
        EngineConfig::new("/bin/sh").args([path.display().to_string()])
    }

    fn invocation(dir: &TempDir) -> EngineInvocation {
        EngineInvocation {
            project_path: dir.path().to_path_buf(),
            overrides_path: None,
        }
    }

    #[test]
    fn exit_code_and_output_are_captured() {
        let dir = TempDir::new().unwrap();
        let config = shell_engine(&dir, "echo starting\necho oops >&2\nexit 3\n");

        let done = ProcessEngine::new(config)
            .launch(&invocation(&dir), &null_sender())
            .unwrap();

        assert_eq!(done.exit_code, 3);
        assert!(done.tail.contains(&"starting".to_string()));
        assert!(done.tail.contains(&"oops".to_string()));
    }

    #[test]
    fn environment_carries_project_and_settings() {
        let dir = TempDir::new().unwrap();
        let config = shell_engine(&dir, "echo \"project=$ODM_PROJECT\"\necho \"settings=$ODM_SETTINGS\"\npwd\n");
        let settings = dir.path().join("odm_overrides.yaml");

        let done = ProcessEngine::new(config)
            .launch(
                &EngineInvocation {
                    project_path: dir.path().to_path_buf(),
                    overrides_path: Some(settings.clone()),
                },
                &null_sender(),
            )
            .unwrap();

        assert!(done.tail.contains(&format!("project={}", dir.path().display())));
        assert!(done.tail.contains(&format!("settings={}", settings.display())));
    }

    #[test]
    fn settings_variable_is_unset_without_overrides() {
        let dir = TempDir::new().unwrap();
        let config = shell_engine(&dir, "echo \"settings=${ODM_SETTINGS-unset}\"\n");

        let done = ProcessEngine::new(config)
            .launch(&invocation(&dir), &null_sender())
            .unwrap();

        assert_eq!(done.tail, vec!["settings=unset".to_string()]);
    }

    #[test]
    fn large_output_keeps_only_the_tail() {
        let dir = TempDir::new().unwrap();
        let config = shell_engine(
            &dir,
            "i=0\nwhile [ $i -lt 5000 ]; do echo \"line $i with some padding to fill the pipe\"; i=$((i+1)); done\n",
        );

        let done = ProcessEngine::new(config)
            .launch(&invocation(&dir), &null_sender())
            .unwrap();

        assert_eq!(done.exit_code, 0);
        assert_eq!(done.tail.len(), OUTPUT_TAIL);
        assert_eq!(
            done.tail.last().map(String::as_str),
            Some("line 4999 with some padding to fill the pipe")
        );
        assert_eq!(
            done.tail.first().map(String::as_str),
            Some("line 4950 with some padding to fill the pipe")
        );
    }

    #[test]
    fn missing_executable_is_a_launch_error() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path().join("no-such-engine"));

        let err = ProcessEngine::new(config)
            .launch(&invocation(&dir), &null_sender())
            .unwrap_err();

        assert!(matches!(err, EngineError::Launch { .. }));
    }

    #[test]
    fn timeout_stops_the_engine() {
        let dir = TempDir::new().unwrap();
        let config = shell_engine(&dir, "echo waiting\nsleep 30\n")
            .timeout(Some(Duration::from_millis(300)));

        let started = Instant::now();
        let err = ProcessEngine::new(config)
            .launch(&invocation(&dir), &null_sender())
            .unwrap_err();

        assert!(matches!(err, EngineError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    /// Whether `pid` is a live (not zombie) process
    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        match fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map_or(false, |rest| !rest.trim_start().starts_with('Z')),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn timeout_stops_processes_the_engine_started() {
        let dir = TempDir::new().unwrap();
        let config = shell_engine(&dir, "sleep 30 &\necho $! > worker.pid\nwait\n")
            .timeout(Some(Duration::from_millis(500)));

        let err = ProcessEngine::new(config)
            .launch(&invocation(&dir), &null_sender())
            .unwrap_err();
        assert!(matches!(err, EngineError::TimedOut { .. }));

        let pid = fs::read_to_string(dir.path().join("worker.pid")).unwrap();
        let pid = pid.trim();
        let deadline = Instant::now() + Duration::from_secs(5);
        while is_running(pid) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }
        assert!(!is_running(pid), "process {} outlived the engine", pid);
    }

    #[test]
    fn cancelled_token_stops_the_engine() {
        let dir = TempDir::new().unwrap();
        let config = shell_engine(&dir, "sleep 30\n");
        let token = CancellationToken::new();
        token.cancel();

        let err = ProcessEngine::new(config)
            .with_cancellation(token)
            .launch(&invocation(&dir), &null_sender())
            .unwrap_err();

        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn output_is_streamed_as_events() {
        let dir = TempDir::new().unwrap();
        let config = shell_engine(&dir, "echo one\necho two\n");
        let (sender, receiver) = EventChannel::new();

        ProcessEngine::new(config)
            .launch(&invocation(&dir), &sender)
            .unwrap();
        drop(sender);

        let lines: Vec<String> = receiver
            .iter()
            .filter_map(|event| match event {
                Event::Engine(EngineEvent::Output { line }) => Some(line),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }
}
