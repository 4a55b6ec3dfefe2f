//! Presentation sink for catalog changes
//!
//! The catalog pushes changes to a [`CatalogView`] and only ever reads back
//! which location is currently displayed.

use crate::core::record::{CartridgeRecord, Location};

/// Receives catalog snapshots and status updates
pub trait CatalogView: Send + Sync {
    /// Location whose list is mirrored by this view
    fn displayed_location(&self) -> Location;

    fn add_item(&self, record: &CartridgeRecord);

    fn remove_item(&self, record: &CartridgeRecord);

    fn refresh_item(&self, record: &CartridgeRecord);

    fn clear_all(&self);

    fn set_progress(&self, current: usize, total: usize);

    fn set_status(&self, text: &str);
}

/// A view that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView {
    pub location: Location,
}

impl CatalogView for NullView {
    fn displayed_location(&self) -> Location {
        self.location
    }

    fn add_item(&self, _record: &CartridgeRecord) {}

    fn remove_item(&self, _record: &CartridgeRecord) {}

    fn refresh_item(&self, _record: &CartridgeRecord) {}

    fn clear_all(&self) {}

    fn set_progress(&self, _current: usize, _total: usize) {}

    fn set_status(&self, _text: &str) {}
}
