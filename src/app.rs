use anyhow::Result;
use ratatui::layout::Rect;
use tokio::sync::mpsc;
use crate::config::Config;
use crate::handler;
use crate::session::{ChatSession, PendingTurn, TurnState};
use crate::transport::ChatClient;
use crate::tui::{self, AppEvent, EventHandler};
use crate::ui;

pub struct App {
    pub should_quit: bool,
    pub session: ChatSession,
    pub client: ChatClient,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub messages_area: Option<Rect>,
    pub send_area: Option<Rect>,

    events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: &Config, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            session: ChatSession::new(config.max_history_tokens),
            client: ChatClient::from_config(config),
            animation_frame: 0,
            messages_area: None,
            send_area: None,
            events,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.session.state() == TurnState::AwaitingResponse
    }

    /// Send button and Enter both land here
    pub fn trigger_send(&mut self) {
        if let Some(turn) = self.session.submit() {
            self.spawn_turn(turn);
        }
    }

    fn spawn_turn(&self, turn: PendingTurn) {
        let client = self.client.clone();
        let tx = self.events.clone();

        tokio::spawn(async move {
            let result = client
                .stream_chat(&turn.messages, |text| {
                    let _ = tx.send(AppEvent::StreamUpdate(text.to_string()));
                })
                .await;
            let _ = tx.send(AppEvent::TurnFinished(result));
        });
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}

pub async fn run(config: &Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(config, events.sender());
    tracing::info!(endpoint = %app.client.endpoint(), "chat session started");

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    tracing::info!(messages = app.session.conversation().len(), "chat session ended");
    result
}
