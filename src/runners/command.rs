//! # CommandRunner: a local shell command driven by refresh polls.
//!
//! The command runs under `sh -c` (`cmd /C` on Windows). Two reader tasks stream
//! stdout/stderr lines into a channel; every poll drains that channel into an
//! [`UpdateBuffer`] and checks whether the process has exited.
//!
//! ```text
//! start()       ─► spawn child ─► reader(stdout) ─┐
//!                               └► reader(stderr) ─┴─► lines channel
//! run_refresh() ─► drain lines ─► try_wait ─► Update { output, exit_status? }
//! kill()        ─► start_kill (SIGKILL)
//! close()       ─► kill + reap if still running
//! ```
//!
//! ## Rules
//! - The exit status is reported only once both streams are closed, so no output
//!   line is delivered after the terminal update. If a stray grandchild keeps a
//!   stream open, the status is reported on the poll after the exit was seen.
//! - A process killed by a signal reports exit code `-1`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{Instrument, Span, debug};

use crate::error::RunnerError;
use crate::runners::{Runner, RunnerId};
use crate::updates::{ExitStatus, OutputKind, Update, UpdateBuffer};

type Line = (OutputKind, String);

/// Runs a shell command on the local machine.
///
/// ## Example
/// ```no_run
/// use std::time::Duration;
/// use runvisor::{ChannelAction, CommandRunner, Dispatcher, DispatcherConfig};
///
/// # async fn demo() {
/// let dispatcher = Dispatcher::new(DispatcherConfig::default());
/// let (action, mut updates) = ChannelAction::channel();
/// let runner = CommandRunner::new("echo hello")
///     .with_refresh_interval(Duration::from_millis(100));
/// dispatcher.start(action, Box::new(runner));
/// while let Some(update) = updates.recv().await {
///     if update.is_terminal() { break; }
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct CommandRunner {
    id: RunnerId,
    command: String,
    refresh_interval: Option<Duration>,
    span: Span,
    child: Option<Child>,
    lines: Option<mpsc::UnboundedReceiver<Line>>,
    streams_closed: bool,
    exit: Option<ExitStatus>,
    exit_seen_polls: u8,
    buffer: UpdateBuffer,
}

impl CommandRunner {
    /// Creates a runner for `command` with a generated id.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            id: RunnerId::generate(),
            command: command.into(),
            refresh_interval: None,
            span: Span::none(),
            child: None,
            lines: None,
            streams_closed: false,
            exit: None,
            exit_seen_polls: 0,
            buffer: UpdateBuffer::new(),
        }
    }

    /// Uses an explicit runner id.
    pub fn with_id(mut self, id: impl Into<RunnerId>) -> Self {
        self.id = id.into();
        self
    }

    /// Polls this runner at `interval` instead of the dispatcher default.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// The command line.
    pub fn command(&self) -> &str {
        &self.command
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            c
        }
    }

    fn spawn_reader<R>(&self, reader: R, kind: OutputKind, tx: mpsc::UnboundedSender<Line>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(
            async move {
                let mut lines = BufReader::new(reader).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if tx.send((kind, line)).is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            debug!(stream = %kind, error = %e, "output stream read failed");
                            break;
                        }
                    }
                }
            }
            .instrument(self.span.clone()),
        );
    }

    fn drain_lines(&mut self) {
        let Some(rx) = self.lines.as_mut() else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok((kind, line)) => self.buffer.publish_data(line, kind),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.streams_closed = true;
                    break;
                }
            }
        }
    }

    fn observe_exit(&mut self) -> Result<(), RunnerError> {
        if self.exit.is_some() {
            self.exit_seen_polls = self.exit_seen_polls.saturating_add(1);
            return Ok(());
        }
        let child = self.child.as_mut().ok_or(RunnerError::NotStarted)?;
        if let Some(status) = child.try_wait()? {
            let code = status.code().unwrap_or(-1);
            debug!(exit_code = code, success = status.success(), "command exited");
            self.exit = Some(ExitStatus::Code(code));
        }
        Ok(())
    }
}

#[async_trait]
impl Runner for CommandRunner {
    fn id(&self) -> &RunnerId {
        &self.id
    }

    fn attach_span(&mut self, span: Span) {
        self.span = span;
    }

    fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval
    }

    async fn start(&mut self) -> Result<(), RunnerError> {
        if self.child.is_some() {
            return Err(RunnerError::fail("command already started"));
        }

        let mut cmd = self.shell();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd.spawn()?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            self.spawn_reader(stdout, OutputKind::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            self.spawn_reader(stderr, OutputKind::Stderr, tx);
        }

        debug!(pid = ?child.id(), cmd = %self.command, "command spawned");
        self.child = Some(child);
        self.lines = Some(rx);
        Ok(())
    }

    async fn run_refresh(&mut self) -> Result<Option<Update>, RunnerError> {
        if self.child.is_none() {
            return Err(RunnerError::NotStarted);
        }
        self.drain_lines();
        self.observe_exit()?;

        if let Some(status) = self.exit {
            if self.streams_closed || self.exit_seen_polls > 0 {
                self.buffer.publish_exit_status(status);
            }
        }
        Ok(self.buffer.take_update())
    }

    async fn kill(&mut self) -> Result<(), RunnerError> {
        if self.exit.is_some() {
            return Ok(());
        }
        let child = self.child.as_mut().ok_or(RunnerError::NotStarted)?;
        debug!(pid = ?child.id(), "killing command");
        child.start_kill()?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RunnerError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if child.try_wait()?.is_none() {
            debug!(pid = ?child.id(), "closing running command");
            child.start_kill()?;
            child.wait().await?;
        }
        self.lines = None;
        Ok(())
    }
}
