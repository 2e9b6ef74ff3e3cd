use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Terminal was resized; the next draw picks up the new size
  Resize,
  /// Terminal window gained (`true`) or lost focus
  Focus(bool),
  /// Periodic tick for query polling and toast expiry
  Tick,
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm's poll blocks, so input gets its own thread
    tokio::task::spawn_blocking(move || loop {
      let event = match event::poll(tick_rate) {
        Ok(true) => match event::read() {
          // Windows reports releases too
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
          Ok(CrosstermEvent::Resize(_, _)) => Some(Event::Resize),
          Ok(CrosstermEvent::FocusGained) => Some(Event::Focus(true)),
          Ok(CrosstermEvent::FocusLost) => Some(Event::Focus(false)),
          Ok(_) => None,
          Err(e) => {
            warn!(error = %e, "Failed to read terminal event");
            None
          }
        },
        Ok(false) => Some(Event::Tick),
        Err(e) => {
          warn!(error = %e, "Failed to poll terminal");
          Some(Event::Tick)
        }
      };

      if let Some(event) = event {
        if tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
