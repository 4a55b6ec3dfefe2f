//! Console presentation of catalog progress and status

use console::{style, Term};
use std::sync::{Mutex, MutexGuard};

use crate::core::catalog::lock_or_recover;
use crate::core::record::{CartridgeRecord, Location};
use crate::core::view::CatalogView;

/// A [`CatalogView`] that draws progress and status on one stderr line
///
/// Nothing is drawn when stderr is not a terminal. Item changes are not
/// drawn; commands print their own result on stdout.
pub struct ConsoleView {
    location: Location,
    quiet: bool,
    term: Term,
    // Whether a transient line is on screen
    line_open: Mutex<bool>,
}

impl ConsoleView {
    pub fn new(location: Location, quiet: bool) -> Self {
        Self {
            location,
            quiet,
            term: Term::stderr(),
            line_open: Mutex::new(false),
        }
    }

    fn line_open(&self) -> MutexGuard<'_, bool> {
        lock_or_recover(&self.line_open)
    }

    /// Replace the transient status line
    fn draw(&self, text: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }
        let mut open = self.line_open();
        let _ = self.term.clear_line();
        let _ = self.term.write_str(text);
        *open = true;
    }

    fn finish_line(&self) {
        let mut open = self.line_open();
        if *open {
            let _ = self.term.clear_line();
            *open = false;
        }
    }
}

impl CatalogView for ConsoleView {
    fn displayed_location(&self) -> Location {
        self.location
    }

    fn add_item(&self, record: &CartridgeRecord) {
        tracing::trace!(game = %record.display_name(), "view add");
    }

    fn remove_item(&self, record: &CartridgeRecord) {
        tracing::trace!(game = %record.display_name(), "view remove");
    }

    fn refresh_item(&self, record: &CartridgeRecord) {
        tracing::trace!(game = %record.display_name(), "view refresh");
    }

    fn clear_all(&self) {}

    fn set_progress(&self, current: usize, total: usize) {
        if total == 0 {
            return;
        }
        self.draw(&format!("{} Loading {}/{}", style("→").blue(), current, total));
        if current >= total {
            self.finish_line();
        }
    }

    fn set_status(&self, text: &str) {
        if text.is_empty() {
            self.finish_line();
            return;
        }
        tracing::debug!(status = text, "status");
        self.draw(&format!("{} {}", style("·").dim(), text));
    }
}
