#![cfg(unix)]

use std::time::Duration;

use anyhow::{Context, Result};
use runvisor::{
    ChannelAction, CommandRunner, Dispatcher, DispatcherConfig, ExitStatus, OutputKind, Update,
};
use tokio::sync::mpsc;

fn dispatcher() -> Dispatcher {
    Dispatcher::new(DispatcherConfig::default().with_refresh_interval(Duration::from_millis(20)))
}

async fn collect_until_exit(rx: &mut mpsc::UnboundedReceiver<Update>) -> Result<Vec<Update>> {
    let mut updates = Vec::new();
    loop {
        let update = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .context("no terminal update in time")?
            .context("action channel closed")?;
        let terminal = update.is_terminal();
        updates.push(update);
        if terminal {
            return Ok(updates);
        }
    }
}

#[tokio::test]
async fn command_output_reaches_the_caller() -> Result<()> {
    let d = dispatcher();
    let (action, mut rx) = ChannelAction::channel();
    let runner = CommandRunner::new("echo one; echo two; echo err 1>&2; exit 4").with_id("cmd");
    d.start(action, Box::new(runner)).context("registered")?;

    let updates = collect_until_exit(&mut rx).await?;
    let stdout: Vec<String> = updates
        .iter()
        .flat_map(|u| u.continuous_output().of_kind(OutputKind::Stdout))
        .map(|c| c.text.clone())
        .collect();
    assert_eq!(stdout, vec!["one", "two"]);
    assert_eq!(
        updates.last().and_then(|u| u.exit_status()),
        Some(ExitStatus::Code(4))
    );

    for _ in 0..100 {
        if !d.is_active("cmd") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!d.is_active("cmd"));
    d.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn killed_command_exits() -> Result<()> {
    let d = dispatcher();
    let (action, mut rx) = ChannelAction::channel();
    let id = d
        .start(action, Box::new(CommandRunner::new("sleep 30")))
        .context("registered")?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    d.kill(id.as_str());

    let updates = collect_until_exit(&mut rx).await?;
    assert_eq!(
        updates.last().and_then(|u| u.exit_status()),
        Some(ExitStatus::Code(-1))
    );
    d.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_running_commands() -> Result<()> {
    let d = dispatcher();
    let (action, _rx) = ChannelAction::channel();
    d.start(action, Box::new(CommandRunner::new("sleep 30").with_id("long")))
        .context("registered")?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(5), d.shutdown())
        .await
        .context("shutdown in time")??;
    assert!(d.is_empty());
    Ok(())
}
