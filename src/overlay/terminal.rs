//! Interactive terminal overlay
//!
//! Redraws the current snapshot after every timer fire and every command.
//! Commands arrive as stdin lines on a reader thread:
//! - `p` toggle pause/resume
//! - `r` refresh now
//! - `s` export the current screen
//! - `q` quit (Ctrl+C also quits)

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::{export_screen, render_footer, render_json, render_text};
use crate::config::{DisplaySettings, OutputFormat};
use crate::error::Result;
use crate::refresh::{LoopCommand, Published, RefreshLoop};

/// One user command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayCommand {
    TogglePause,
    RefreshNow,
    Export,
    Quit,
}

impl OverlayCommand {
    /// Parse one input line; `None` for anything unrecognized
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" | "resume" => Some(Self::TogglePause),
            "r" | "refresh" => Some(Self::RefreshNow),
            "s" | "export" | "screenshot" => Some(Self::Export),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// How an overlay session starts and ends
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Pause the timer right after starting it
    pub start_paused: bool,
    /// Quit after this many timer fires
    pub ticks: Option<u64>,
}

/// What a finished session reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub last_index: u64,
    pub ticks: u64,
    pub exports: u64,
}

/// Read commands from stdin on a dedicated thread
///
/// The channel closes at end of input.
pub fn spawn_stdin_reader() -> Result<mpsc::Receiver<OverlayCommand>> {
    let (tx, rx) = mpsc::channel(16);

    std::thread::Builder::new()
        .name("debuginfo-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match OverlayCommand::parse(&line) {
                    Some(command) => {
                        if tx.blocking_send(command).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!(input = %line.trim(), "Unknown command (use p, r, s or q)"),
                }
            }
            debug!("Stdin closed");
        })?;

    Ok(rx)
}

/// Terminal front end for a refresh loop
pub struct Overlay<W: Write> {
    refresh: RefreshLoop,
    display: DisplaySettings,
    export_dir: PathBuf,
    out: W,
    updates: watch::Receiver<Published>,
    status: Option<String>,
    exports: u64,
}

impl<W: Write> Overlay<W> {
    pub fn new(refresh: RefreshLoop, display: DisplaySettings, export_dir: PathBuf, out: W) -> Self {
        let updates = refresh.subscribe();
        Self {
            refresh,
            display,
            export_dir,
            out,
            updates,
            status: None,
            exports: 0,
        }
    }

    /// Run until quit, Ctrl+C, or the tick limit
    pub async fn run(
        &mut self,
        mut inputs: Option<mpsc::Receiver<OverlayCommand>>,
        options: RunOptions,
    ) -> Result<RunSummary> {
        self.refresh.start()?;
        info!(
            period_ms = self.refresh.period().as_millis() as u64,
            paused = options.start_paused,
            tick_limit = ?options.ticks,
            "Overlay started"
        );
        if options.start_paused {
            self.refresh.pause()?;
        }
        self.refresh.refresh_now();
        self.draw()?;

        let shutdown_signal = tokio::signal::ctrl_c();
        tokio::pin!(shutdown_signal);

        let mut ticks = 0u64;
        loop {
            if options.ticks.is_some_and(|limit| ticks >= limit) {
                info!(ticks, "Tick limit reached");
                break;
            }

            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Shutdown signal received");
                    break;
                }

                command = next_input(&mut inputs) => match command {
                    Some(command) => {
                        self.handle(command);
                        if command == OverlayCommand::Quit {
                            break;
                        }
                    }
                    None => {
                        debug!("Input closed, timer keeps running");
                        inputs = None;
                    }
                },

                _ = self.refresh.next_trigger() => {
                    ticks += 1;
                }
            }

            self.draw()?;
        }

        self.refresh.stop();
        Ok(RunSummary {
            last_index: self.refresh.current_index(),
            ticks,
            exports: self.exports,
        })
    }

    /// The writer the overlay draws into
    pub fn output(&self) -> &W {
        &self.out
    }

    fn handle(&mut self, command: OverlayCommand) {
        debug!(?command, "Overlay command");
        match command {
            OverlayCommand::TogglePause => self.apply(LoopCommand::TogglePause),
            OverlayCommand::RefreshNow => self.apply(LoopCommand::RefreshNow),
            OverlayCommand::Export => self.export(),
            OverlayCommand::Quit => self.apply(LoopCommand::Shutdown),
        }
    }

    fn apply(&mut self, command: LoopCommand) {
        self.status = None;
        if let Err(e) = self.refresh.apply(command) {
            warn!(error = %e.format_for_log(), "Loop command rejected");
        }
    }

    fn export(&mut self) {
        let Some(snapshot) = self.refresh.current() else {
            self.status = Some("Nothing to export yet".to_string());
            return;
        };

        let screen = render_text(&snapshot);
        self.status = Some(match export_screen(&self.export_dir, &snapshot, &screen) {
            Ok(path) => {
                self.exports += 1;
                format!("Exported to {}", path.display())
            }
            Err(e) => {
                warn!(error = %e.format_for_log(), "Export failed");
                format!("Export failed: {}", e)
            }
        });
    }

    fn draw(&mut self) -> Result<()> {
        let changed = self.updates.has_changed().unwrap_or(false);
        let Some(snapshot) = self.updates.borrow_and_update().clone() else {
            return Ok(());
        };

        match self.display.format {
            OutputFormat::Text => {
                if self.display.clear_screen {
                    queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
                }
                write!(self.out, "{}", render_text(&snapshot))?;
                write!(
                    self.out,
                    "{}",
                    render_footer(self.refresh.state(), self.status.as_deref())
                )?;
            }
            OutputFormat::Json => {
                if changed {
                    writeln!(self.out, "{}", render_json(&snapshot, false)?)?;
                }
                if let Some(status) = self.status.take() {
                    info!("{}", status);
                }
            }
        }

        self.out.flush()?;
        Ok(())
    }
}

async fn next_input(inputs: &mut Option<mpsc::Receiver<OverlayCommand>>) -> Option<OverlayCommand> {
    match inputs {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::config::ProbeMode;
    use crate::host::FakeHostFacts;
    use crate::keychain::{KeychainProbe, MemorySecretStore};
    use crate::refresh::LoopState;
    use crate::sampler::Sampler;

    fn overlay(format: OutputFormat, export_dir: PathBuf) -> Overlay<Vec<u8>> {
        let sampler = Sampler::new(
            Box::new(FakeHostFacts::new()),
            KeychainProbe::new(Box::new(Arc::new(MemorySecretStore::new())), "test"),
            ProbeMode::Lazy,
        );
        let display = DisplaySettings {
            format,
            clear_screen: false,
        };
        Overlay::new(
            RefreshLoop::new(sampler, Duration::from_secs(1)),
            display,
            export_dir,
            Vec::new(),
        )
    }

    async fn commands(list: &[OverlayCommand]) -> mpsc::Receiver<OverlayCommand> {
        let (tx, rx) = mpsc::channel(list.len().max(1));
        for command in list {
            tx.send(*command).await.unwrap();
        }
        rx
    }

    fn output(overlay: &Overlay<Vec<u8>>) -> String {
        String::from_utf8(overlay.output().clone()).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(OverlayCommand::parse("p"), Some(OverlayCommand::TogglePause));
        assert_eq!(OverlayCommand::parse(" R \n"), Some(OverlayCommand::RefreshNow));
        assert_eq!(OverlayCommand::parse("screenshot"), Some(OverlayCommand::Export));
        assert_eq!(OverlayCommand::parse("q"), Some(OverlayCommand::Quit));
        assert_eq!(OverlayCommand::parse("x"), None);
        assert_eq!(OverlayCommand::parse(""), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_then_quit() {
        let temp = TempDir::new().unwrap();
        let mut overlay = overlay(OutputFormat::Text, temp.path().to_path_buf());
        let inputs = commands(&[OverlayCommand::RefreshNow, OverlayCommand::Quit]).await;

        let summary = overlay.run(Some(inputs), RunOptions::default()).await.unwrap();

        assert_eq!(summary.last_index, 2);
        assert_eq!(summary.ticks, 0);
        let text = output(&overlay);
        assert!(text.contains("Index:         1"));
        assert!(text.contains("Index:         2"));
        assert!(text.contains("(running)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_limit_without_input() {
        let temp = TempDir::new().unwrap();
        let mut overlay = overlay(OutputFormat::Text, temp.path().to_path_buf());

        let options = RunOptions {
            start_paused: false,
            ticks: Some(3),
        };
        let summary = overlay.run(None, options).await.unwrap();

        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.last_index, 4);
        assert_eq!(overlay.refresh.state(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_paused_waits_for_toggle() {
        let temp = TempDir::new().unwrap();
        let mut overlay = overlay(OutputFormat::Text, temp.path().to_path_buf());
        let inputs = commands(&[OverlayCommand::TogglePause]).await;

        let options = RunOptions {
            start_paused: true,
            ticks: Some(1),
        };
        let summary = overlay.run(Some(inputs), options).await.unwrap();

        assert_eq!(summary.last_index, 2);
        let text = output(&overlay);
        assert!(text.contains("(paused)"));
        assert!(text.contains("(running)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_writes_current_screen() {
        let temp = TempDir::new().unwrap();
        let mut overlay = overlay(OutputFormat::Text, temp.path().to_path_buf());
        let inputs = commands(&[OverlayCommand::Export, OverlayCommand::Quit]).await;

        let summary = overlay.run(Some(inputs), RunOptions::default()).await.unwrap();

        assert_eq!(summary.exports, 1);
        assert!(output(&overlay).contains("Exported to"));

        let files: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        let screen = std::fs::read_to_string(path).unwrap();
        assert!(screen.contains("Index:         1"));
        assert!(!screen.contains("[q] quit"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_json_prints_one_line_per_snapshot() {
        let temp = TempDir::new().unwrap();
        let mut overlay = overlay(OutputFormat::Json, temp.path().to_path_buf());
        let inputs = commands(&[OverlayCommand::TogglePause, OverlayCommand::TogglePause]).await;

        let options = RunOptions {
            start_paused: false,
            ticks: Some(2),
        };
        overlay.run(Some(inputs), options).await.unwrap();

        let text = output(&overlay);
        let indices: Vec<u64> = text
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["sequence_index"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }
}
