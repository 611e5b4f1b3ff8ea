use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};

use anyhow::{Context as _, Result};
use kuchiki::NodeRef;
use tracing::{info, trace, warn};
use url::Url;

use crate::autocomplete::AutocompleteProvider;
use crate::dom::{attr, set_attr, PageDocument};
use crate::net::{Channel, HttpClient, HttpRequest};

use super::bind::{bind_region, Bindings, FormKind};
use super::form::{enclosing_form, form_request, show_busy};
use super::ping::{PingerStatus, PING_MESSAGE};
use super::{PING_MARKER_SELECTOR, REDIRECT_SELECTOR, REGION_SELECTOR};

/// Browser navigation collaborator. Navigating is terminal for the page
/// view; the host owns what actually happens.
pub trait Navigator {
    fn navigate(&self, href: &str);
}

#[derive(Debug, Clone)]
pub struct ChallengeConfig {
    /// Endpoint serving the canonical page fragment for refreshes.
    pub xhr_url: Url,
    /// Base URL form actions are resolved against.
    pub base_url: Url,
}

/// What the host should do with a form submission it forwarded to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Let the native submission proceed (full navigation).
    Native,
    /// Default suppressed; the submission was sent asynchronously.
    Intercepted,
}

/// Per-page-view state of the challenge screen: the live document, the
/// irreversible accept guard, and the binding registry for the current
/// region. Interior mutability keeps all methods `&self` so handlers can
/// share the controller behind an `Rc` on the single-threaded page loop.
pub struct ChallengeController {
    config: ChallengeConfig,
    document: RefCell<PageDocument>,
    accepting: Cell<bool>,
    bindings: RefCell<Bindings>,
    http: Rc<dyn HttpClient>,
    navigator: Rc<dyn Navigator>,
    autocomplete: Rc<dyn AutocompleteProvider>,
    // Handed into the binder so selection callbacks can reach back here
    // without keeping the view alive.
    self_handle: Weak<ChallengeController>,
}

impl ChallengeController {
    pub fn new(
        config: ChallengeConfig,
        html: &str,
        http: Rc<dyn HttpClient>,
        navigator: Rc<dyn Navigator>,
        autocomplete: Rc<dyn AutocompleteProvider>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|handle| Self {
            config,
            document: RefCell::new(PageDocument::parse(html)),
            accepting: Cell::new(false),
            bindings: RefCell::new(Bindings::default()),
            http,
            navigator,
            autocomplete,
            self_handle: Weak::clone(handle),
        })
    }

    pub fn document(&self) -> Ref<'_, PageDocument> {
        self.document.borrow()
    }

    pub fn bindings(&self) -> Ref<'_, Bindings> {
        self.bindings.borrow()
    }

    pub fn accepting(&self) -> bool {
        self.accepting.get()
    }

    /// Run once at startup and again after every patch: redirect check
    /// first, then a fresh scan of the region's interactive elements.
    pub fn init(&self) {
        self.check_redirect();
        self.rebind();
    }

    /// Handle one `reload` push: fetch the canonical fragment, patch the
    /// region, re-run initialization against the new subtree. A failed fetch
    /// keeps the old subtree; a later push retries. Overlapping fetches are
    /// not sequence-guarded, so the later-resolving response wins.
    pub async fn handle_reload(&self) {
        let request = HttpRequest::get(self.config.xhr_url.clone());
        match self.http.request(request).await {
            Ok(body) => {
                if let Err(err) = self.apply_fragment(&body) {
                    warn!(target: "challenge", error = %err, "discarding refresh response");
                }
            }
            Err(err) => {
                warn!(target: "challenge", error = %err, "refresh fetch failed, keeping current view");
            }
        }
    }

    fn apply_fragment(&self, fragment_html: &str) -> Result<()> {
        self.document
            .borrow()
            .replace_region(REGION_SELECTOR, fragment_html)
            .context("failed to patch challenge region")?;
        self.init();
        Ok(())
    }

    /// Dispatch a form submission forwarded by the host.
    pub async fn submit(&self, form: &NodeRef) -> SubmitOutcome {
        let kind = self.bindings.borrow().kind_of(form);
        match kind {
            Some(FormKind::Accept) => {
                // Guard first: a page transition is underway, the next
                // redirect check must not preempt it.
                self.accepting.set(true);
                show_busy(form);
                SubmitOutcome::Native
            }
            Some(FormKind::Xhr) => {
                let request = form_request(form, &self.config.base_url);
                show_busy(form);
                match request {
                    Ok(request) => {
                        if let Err(err) = self.http.request(request).await {
                            warn!(target: "challenge", error = %err, "async form submission failed");
                        }
                    }
                    Err(err) => {
                        warn!(target: "challenge", error = %err, "could not build form request");
                    }
                }
                SubmitOutcome::Intercepted
            }
            None => SubmitOutcome::Native,
        }
    }

    /// Autocomplete selection callback: fill the input and submit its
    /// enclosing form. Returns `None` when the input sits outside any form.
    pub async fn friend_selected(&self, input: &NodeRef, value: &str) -> Option<SubmitOutcome> {
        set_attr(input, "value", value);
        let form = enclosing_form(input)?;
        Some(self.submit(&form).await)
    }

    /// One liveness tick: stop permanently once the marker is gone,
    /// otherwise ping and swallow any transport error.
    pub fn ping_tick(&self, channel: &dyn Channel) -> PingerStatus {
        if self
            .document
            .borrow()
            .select_first(PING_MARKER_SELECTOR)
            .is_none()
        {
            return PingerStatus::Stopped;
        }
        if let Err(err) = channel.send(PING_MESSAGE) {
            trace!(target: "challenge", error = %err, "keepalive send failed");
        }
        PingerStatus::Active
    }

    fn check_redirect(&self) {
        if self.accepting.get() {
            return;
        }
        let anchors = self.document.borrow().select_all(REDIRECT_SELECTOR);
        for anchor in anchors {
            if let Some(href) = attr(&anchor, "href") {
                info!(target: "challenge", href = %href, "following server redirect");
                self.navigator.navigate(&href);
            }
        }
    }

    fn rebind(&self) {
        let fresh = {
            let document = self.document.borrow();
            match document.select_first(REGION_SELECTOR) {
                Some(region) => {
                    bind_region(&region, self.autocomplete.as_ref(), &self.self_handle)
                }
                None => Bindings::default(),
            }
        };
        *self.bindings.borrow_mut() = fresh;
    }
}
