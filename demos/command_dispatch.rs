//! Runs a few shell commands through one dispatcher and prints their output.
//!
//! ```text
//! RUNVISOR_LOG=debug cargo run --example command_dispatch --features logging
//! ```
//!
//! - `count` prints three lines and exits 0
//! - `fails` writes to stderr and exits 2
//! - `sleeper` would run for a minute; it is killed after 300ms
//! - a second `count` is rejected because the id is taken (its caller gets a fatal error update)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use runvisor::{
    ActionRef, CommandRunner, Dispatcher, DispatcherConfig, LogWriter, OutputKind, Subscribe,
    SuspendedAction, Update,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Forwards each update tagged with the caller name.
struct Printer {
    name: &'static str,
    tx: mpsc::UnboundedSender<(&'static str, Update)>,
}

impl SuspendedAction for Printer {
    fn append(&self, update: Update) {
        let _ = self.tx.send((self.name, update));
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("RUNVISOR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();

    let cfg = DispatcherConfig::default()
        .with_refresh_interval(Duration::from_millis(100))
        .with_grace(Duration::from_secs(5));
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let dispatcher = Dispatcher::builder(cfg).with_subscribers(subs).build();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = |name: &'static str| -> ActionRef {
        Arc::new(Printer {
            name,
            tx: tx.clone(),
        })
    };

    let jobs = [
        ("count", "for i in 1 2 3; do echo line $i; sleep 0.1; done"),
        ("fails", "echo 'no such thing' 1>&2; exit 2"),
        ("sleeper", "sleep 60"),
        ("count", "echo duplicate"),
    ];
    for (id, cmd) in jobs {
        let runner = CommandRunner::new(cmd).with_id(id);
        if dispatcher.start(printer(id), Box::new(runner)).is_none() {
            println!("[{id}] rejected");
        }
    }
    drop(tx);

    tokio::time::sleep(Duration::from_millis(300)).await;
    dispatcher.kill("sleeper");

    let mut finished = 0;
    while finished < jobs.len() {
        let Some((name, update)) = rx.recv().await else {
            break;
        };
        for chunk in update.continuous_output().chunks() {
            match chunk.kind {
                OutputKind::Stdout => println!("[{name}] {}", chunk.text),
                OutputKind::Stderr => eprintln!("[{name}] {}", chunk.text),
                OutputKind::Debug => println!("[{name}] ({})", chunk.text),
            }
        }
        if let Some(status) = update.exit_status() {
            println!("[{name}] exited: {status}");
            finished += 1;
        }
    }

    dispatcher.shutdown().await?;
    Ok(())
}
