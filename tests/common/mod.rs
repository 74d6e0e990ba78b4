#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use runvisor::{
    DispatcherConfig, ExitStatus, OutputKind, Runner, RunnerError, RunnerId, Update,
};
use tokio::sync::mpsc;

/// What a scripted runner returns from its next refresh poll.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Output(&'static str),
    /// Sleeps for the given milliseconds, then reports the output.
    Slow(u64, &'static str),
    Exit(i32),
    Fail(&'static str),
    Panic,
    Idle,
}

/// Calls observed by a scripted runner.
#[derive(Debug, Default)]
pub struct Stats {
    starts: AtomicUsize,
    refreshes: AtomicUsize,
    kills: AtomicUsize,
    closes: AtomicUsize,
}

impl Stats {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Runner replaying a fixed list of refresh results; idles once exhausted.
pub struct ScriptedRunner {
    id: RunnerId,
    steps: VecDeque<Step>,
    stats: Arc<Stats>,
    start_error: Option<&'static str>,
    kill_error: Option<&'static str>,
    exit_on_kill: Option<i32>,
    killed: bool,
    close_delay: Option<Duration>,
    interval_panics: bool,
}

impl ScriptedRunner {
    pub fn new(id: &str) -> Self {
        Self {
            id: RunnerId::from(id),
            steps: VecDeque::new(),
            stats: Arc::new(Stats::default()),
            start_error: None,
            kill_error: None,
            exit_on_kill: None,
            killed: false,
            close_delay: None,
            interval_panics: false,
        }
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn failing_start(mut self, msg: &'static str) -> Self {
        self.start_error = Some(msg);
        self
    }

    pub fn failing_kill(mut self, msg: &'static str) -> Self {
        self.kill_error = Some(msg);
        self
    }

    /// The poll after a successful kill reports this exit code.
    pub fn exit_on_kill(mut self, code: i32) -> Self {
        self.exit_on_kill = Some(code);
        self
    }

    pub fn slow_close(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    /// `refresh_interval` panics instead of answering.
    pub fn panicking_interval(mut self) -> Self {
        self.interval_panics = true;
        self
    }

    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }

    pub fn boxed(self) -> Box<dyn Runner> {
        Box::new(self)
    }
}

#[async_trait]
impl Runner for ScriptedRunner {
    fn id(&self) -> &RunnerId {
        &self.id
    }

    fn refresh_interval(&self) -> Option<Duration> {
        if self.interval_panics {
            panic!("scripted interval panic");
        }
        None
    }

    async fn start(&mut self) -> Result<(), RunnerError> {
        self.stats.starts.fetch_add(1, Ordering::SeqCst);
        match self.start_error {
            Some(msg) => Err(RunnerError::fail(msg)),
            None => Ok(()),
        }
    }

    async fn run_refresh(&mut self) -> Result<Option<Update>, RunnerError> {
        self.stats.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.killed {
            if let Some(code) = self.exit_on_kill {
                return Ok(Some(Update::exited(ExitStatus::Code(code))));
            }
        }
        match self.steps.pop_front().unwrap_or(Step::Idle) {
            Step::Output(text) => Ok(Some(Update::output(text, OutputKind::Stdout))),
            Step::Slow(ms, text) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(Some(Update::output(text, OutputKind::Stdout)))
            }
            Step::Exit(code) => Ok(Some(Update::exited(ExitStatus::Code(code)))),
            Step::Fail(msg) => Err(RunnerError::fail(msg)),
            Step::Panic => panic!("scripted panic"),
            Step::Idle => Ok(None),
        }
    }

    async fn kill(&mut self) -> Result<(), RunnerError> {
        self.stats.kills.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.kill_error {
            return Err(RunnerError::fail(msg));
        }
        self.killed = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RunnerError> {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn config() -> DispatcherConfig {
    DispatcherConfig::default()
        .with_refresh_interval(Duration::from_millis(100))
        .with_grace(Duration::from_secs(5))
}

/// Polls `cond` every 10ms (virtual time under a paused clock) until it holds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Collects every update already queued on `rx`.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Update>) -> Vec<Update> {
    let mut out = Vec::new();
    while let Ok(update) = rx.try_recv() {
        out.push(update);
    }
    out
}

/// Receives the next update, failing the test after five (virtual) seconds.
pub async fn next_update(rx: &mut mpsc::UnboundedReceiver<Update>) -> Update {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("update in time")
        .expect("action channel open")
}
