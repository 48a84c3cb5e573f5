//! Viewport events to stop queries.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::TransitCacheClient;
use crate::fence::Scope;
use crate::model::{Stop, Viewport};
use crate::state::{StateStore, StopsView};

/// What a viewport event produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StopsUpdate {
    /// Below the minimum zoom: no stops, show the zoom-in hint.
    ZoomIn,
    Stops(Arc<Vec<Stop>>),
    Failed(String),
    /// A later viewport event replaced this one.
    Superseded,
}

/// Turns viewport changes into fenced stop queries.
pub struct ViewportWatcher {
    store: Arc<StateStore>,
    cache: Arc<TransitCacheClient>,
    min_zoom: u8,
}

impl ViewportWatcher {
    pub fn new(store: Arc<StateStore>, cache: Arc<TransitCacheClient>, min_zoom: u8) -> Self {
        Self {
            store,
            cache,
            min_zoom,
        }
    }

    /// Zoom of the last reported viewport.
    pub fn last_zoom(&self) -> Option<u8> {
        self.store.read(|state| state.viewport_zoom)
    }

    /// Handle a viewport change.
    ///
    /// The viewport generation is bumped on every event, so a query still in
    /// flight from an earlier viewport can never repopulate the stops.
    pub async fn viewport_changed(&self, viewport: Viewport) -> StopsUpdate {
        if viewport.zoom < self.min_zoom {
            self.store.transition(&[Scope::Viewport], |state| {
                state.viewport_zoom = Some(viewport.zoom);
                state.stops = StopsView {
                    zoom_in_hint: true,
                    ..StopsView::default()
                };
            });
            debug!(zoom = viewport.zoom, min_zoom = self.min_zoom, "Zoom in to see stops");
            return StopsUpdate::ZoomIn;
        }

        let tokens = self.store.transition(&[Scope::Viewport], |state| {
            state.viewport_zoom = Some(viewport.zoom);
            state.stops.zoom_in_hint = false;
            state.stops.loading = true;
        });

        let bbox = viewport.bbox();
        debug!(key = %self.cache.bbox_key(&bbox), generation = tokens[0].value(), "Querying stops");
        let result = self.cache.stops_in_rect(&bbox).await;

        let update = self.store.apply_if_current(&tokens, |state| {
            state.stops.loading = false;
            match result {
                Ok(stops) => {
                    state.stops.stops = Arc::clone(&stops);
                    state.stops.error = None;
                    StopsUpdate::Stops(stops)
                }
                Err(e) => {
                    let message = format!("Failed to load stops: {}", e);
                    state.stops.error = Some(message.clone());
                    StopsUpdate::Failed(message)
                }
            }
        });

        match update {
            Some(StopsUpdate::Failed(message)) => {
                warn!("{}", message);
                StopsUpdate::Failed(message)
            }
            Some(update) => update,
            None => StopsUpdate::Superseded,
        }
    }
}
