//! Navigation interception
//!
//! Runs before a top-level navigation is sent. When the cleaned URL differs
//! from the requested one, the host must redirect the tab before the
//! original request reaches the network.

use crate::storage::KeyValueStorage;
use crate::store::Store;

/// Main frame id in the browser's navigation events.
pub const MAIN_FRAME_ID: i32 = 0;

/// A navigation about to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent<'a> {
    pub url: &'a str,
    pub tab_id: i32,
    pub frame_id: i32,
}

impl NavigationEvent<'_> {
    #[inline]
    pub fn is_main_frame(&self) -> bool {
        self.frame_id == MAIN_FRAME_ID
    }
}

/// Instruction to load `url` in `tab_id` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub tab_id: i32,
    pub url: String,
}

/// Handle a navigation. Sub-frames are ignored.
pub fn on_before_navigate<S: KeyValueStorage>(
    store: &mut Store<S>,
    event: &NavigationEvent<'_>,
) -> Option<Redirect> {
    if !event.is_main_frame() {
        return None;
    }

    let cleaned = store.process_navigation(event.url)?;
    if cleaned.url == event.url {
        return None;
    }

    Some(Redirect {
        tab_id: event.tab_id,
        url: cleaned.url,
    })
}
