mod bind;
mod controller;
mod form;
mod ping;

use std::rc::Rc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::net::{Channel, EventTable, SocketEvent};

pub use bind::{Bindings, FormKind};
pub use controller::{ChallengeConfig, ChallengeController, Navigator, SubmitOutcome};
pub use ping::{LivenessPinger, PingerStatus, PING_INTERVAL};

/// The only region of the page the controller may mutate.
pub const REGION_SELECTOR: &str = ".challenge-page";
/// Anchor injected by the server when the other party has already acted.
pub const REDIRECT_SELECTOR: &str = "#challenge-redirect";
/// Element whose presence keeps the liveness loop running.
pub const PING_MARKER_SELECTOR: &str = "#ping-challenge";
/// Push event that triggers a fragment refresh.
pub const RELOAD_EVENT: &str = "reload";

/// Composition root for one page view: initial redirect check and binding,
/// the liveness loop, and the push-event dispatch loop. Returns when the
/// event stream closes (navigation away tears the view down).
///
/// Must run inside a `tokio::task::LocalSet`: page state is not `Send`.
pub async fn run(
    controller: Rc<ChallengeController>,
    channel: Rc<dyn Channel>,
    mut events: mpsc::UnboundedReceiver<SocketEvent>,
) {
    controller.init();

    {
        let controller = Rc::clone(&controller);
        let channel = Rc::clone(&channel);
        tokio::task::spawn_local(LivenessPinger::new().run(controller, channel));
    }

    let mut table = EventTable::new();
    {
        let controller = Rc::clone(&controller);
        table.on(RELOAD_EVENT, move |_data| {
            let controller = Rc::clone(&controller);
            tokio::task::spawn_local(async move { controller.handle_reload().await });
        });
    }

    while let Some(event) = events.recv().await {
        if !table.dispatch(&event.name, event.data) {
            debug!(target: "challenge", event = %event.name, "unhandled push event");
        }
    }
}
