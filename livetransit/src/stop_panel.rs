//! The panel shown for a clicked stop.
//!
//! Opening a stop loads the routes through it; the panel can then probe
//! which of those routes have a vehicle right now. Both results are fenced
//! by the stop scope, so only the latest opened stop is shown.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::TransitCacheClient;
use crate::error::{EngineError, EngineResult};
use crate::fence::Scope;
use crate::probe::{ActiveRouteProbe, ActiveRoutes};
use crate::state::{ActionOutcome, StateStore, StopPanelView};

pub struct StopPanel {
    store: Arc<StateStore>,
    cache: Arc<TransitCacheClient>,
    probe: ActiveRouteProbe,
}

impl StopPanel {
    pub fn new(store: Arc<StateStore>, cache: Arc<TransitCacheClient>, probe: ActiveRouteProbe) -> Self {
        Self { store, cache, probe }
    }

    /// Open the panel for `stop_id` and load its routes.
    pub async fn open_stop(&self, stop_id: &str) -> ActionOutcome {
        let tokens = self.store.transition(&[Scope::Stop], |state| {
            state.selection.stop_id = Some(stop_id.to_string());
            state.stop_panel = StopPanelView {
                stop_id: Some(stop_id.to_string()),
                loading: true,
                ..StopPanelView::default()
            };
        });
        debug!(stop_id, generation = tokens[0].value(), "Stop opened");

        let result = self.cache.routes_through_stop(stop_id).await;
        let outcome = self.store.apply_if_current(&tokens, |state| {
            state.stop_panel.loading = false;
            match result {
                Ok(routes) => {
                    state.stop_panel.routes = routes;
                    ActionOutcome::Applied
                }
                Err(e) => {
                    let message = format!("Failed to load routes for stop {}: {}", stop_id, e);
                    state.stop_panel.error = Some(message.clone());
                    ActionOutcome::Failed(message)
                }
            }
        });

        match outcome {
            Some(ActionOutcome::Failed(message)) => {
                warn!(stop_id, "{}", message);
                ActionOutcome::Failed(message)
            }
            Some(outcome) => outcome,
            None => ActionOutcome::Superseded,
        }
    }

    /// Close the panel.
    pub fn close_stop(&self) {
        self.store.transition(&[Scope::Stop], |state| {
            state.selection.stop_id = None;
            state.stop_panel = StopPanelView::default();
        });
    }

    /// Probe the open stop's routes for live vehicles.
    ///
    /// Fails with [`EngineError::StopRoutesNotLoaded`] unless `stop_id` is
    /// open and its routes have loaded.
    pub async fn probe_active_routes(
        &self,
        stop_id: &str,
        force: bool,
    ) -> EngineResult<ActionOutcome> {
        let (token, routes) = self
            .store
            .read(|state| {
                let panel = &state.stop_panel;
                let loaded = panel.stop_id.as_deref() == Some(stop_id)
                    && !panel.loading
                    && panel.error.is_none();
                loaded.then(|| {
                    (
                        self.store.fence().current(Scope::Stop),
                        Arc::clone(&panel.routes),
                    )
                })
            })
            .ok_or_else(|| EngineError::StopRoutesNotLoaded {
                stop_id: stop_id.to_string(),
            })?;

        if self
            .store
            .apply_if_current(&[token], |state| state.stop_panel.probing = true)
            .is_none()
        {
            return Ok(ActionOutcome::Superseded);
        }

        let active = self.probe.probe(stop_id, &routes, force).await;
        let applied = self.store.apply_if_current(&[token], |state| {
            state.stop_panel.probing = false;
            state.stop_panel.active_route_ids = Some(active.route_ids.clone());
        });
        Ok(match applied {
            Some(()) => ActionOutcome::Applied,
            None => ActionOutcome::Superseded,
        })
    }

    /// The stored probe result for a stop, if any.
    pub async fn cached_probe(&self, stop_id: &str) -> Option<Arc<ActiveRoutes>> {
        self.probe.cached(stop_id).await
    }
}
