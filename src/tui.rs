use std::io::{self, Stderr};
use std::time::Duration;
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use tokio::sync::mpsc;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

const TICK_RATE: Duration = Duration::from_millis(300);

/// Everything the UI loop reacts to, in arrival order.
///
/// Terminal input and ticks come from tasks spawned in
/// [`EventHandler::new`]. The turn task spawned per send posts the last two
/// variants through [`EventHandler::sender`], so a reply is applied between
/// keystrokes, never concurrently with them.
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    /// Drives the "Thinking..." animation
    Tick,
    /// Full cleaned reply text received so far for the in-flight turn.
    /// Each one replaces the previous; none are merged.
    StreamUpdate(String),
    /// Posted exactly once per turn, after its last `StreamUpdate`
    TurnFinished(anyhow::Result<String>),
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        spawn_input_reader(tx.clone());
        spawn_ticker(tx.clone(), TICK_RATE);
        Self { rx, tx }
    }

    /// Handle for tasks that feed reply text back into the loop
    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

fn spawn_input_reader(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut reader = event::EventStream::new();
        while let Some(evt) = reader.next().await {
            let app_event = match evt {
                // Only handle key press events, not release
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
                Ok(Event::Mouse(mouse)) => Some(AppEvent::Mouse(mouse)),
                Ok(Event::Resize(w, h)) => Some(AppEvent::Resize(w, h)),
                Ok(_) => None,
                Err(e) => {
                    // A terminal that can't be read won't recover
                    tracing::error!(error = %e, "terminal input lost");
                    break;
                }
            };

            if let Some(event) = app_event {
                if tx.send(event).is_err() {
                    break;
                }
            }
        }
    });
}

fn spawn_ticker(tx: mpsc::UnboundedSender<AppEvent>, rate: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(rate);
        loop {
            interval.tick().await;
            if tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok(terminal)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), DisableMouseCapture, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}
