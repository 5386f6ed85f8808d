// Run output: every event goes to the log file and, unless quiet, to the
// terminal in color.

use crossterm::style::{Color, Stylize};

use refsync_recon::{EventSink, SyncEvent};

use crate::logging;

pub struct Reporter {
    console: bool,
    color: bool,
}

impl Reporter {
    pub fn new(console: bool) -> Self {
        Self {
            console,
            color: atty::is(atty::Stream::Stderr) && std::env::var_os("NO_COLOR").is_none(),
        }
    }
}

fn color_for(event: &SyncEvent) -> Color {
    match event {
        SyncEvent::DocumentInserted { .. } => Color::Blue,
        SyncEvent::DocumentFound { .. } => Color::Green,
        SyncEvent::FieldInserted { .. } => Color::Magenta,
        SyncEvent::FieldFound { .. } => Color::Yellow,
        SyncEvent::RolledBack { .. } => Color::Red,
        _ => Color::Cyan,
    }
}

impl EventSink for Reporter {
    fn emit(&mut self, event: &SyncEvent) {
        if let SyncEvent::RunStarted { .. } = event {
            log::info!("{}", logging::separator());
            log::log!(event.level(), "{event}");
            log::info!("{}", logging::separator());
        } else {
            log::log!(event.level(), "{event}");
        }

        if !self.console {
            return;
        }
        let line = event.to_string();
        if matches!(event, SyncEvent::RowStarted { .. }) {
            eprintln!();
        }
        if self.color {
            eprintln!("{}", line.with(color_for(event)));
        } else {
            eprintln!("{line}");
        }
    }
}
