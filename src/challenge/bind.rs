use std::rc::{Rc, Weak};

use kuchiki::NodeRef;
use tracing::debug;

use crate::autocomplete::{AutocompleteOptions, AutocompleteProvider, OnSelect};
use crate::dom::select_all;

use super::controller::ChallengeController;

const ACCEPT_FORM_SELECTOR: &str = "form.accept";
const XHR_FORM_SELECTOR: &str = "form.xhr";
const FRIEND_INPUT_SELECTOR: &str = "input.friend-autocomplete";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    /// Accept form: sets the guard flag and submits natively.
    Accept,
    /// Generic async form: native submission suppressed, posted over HTTP.
    Xhr,
}

/// Registry of interactive elements bound inside the current challenge
/// region. Rebuilt wholesale after every patch, so a node is either bound
/// exactly once or not at all; nodes from replaced subtrees are never kept.
#[derive(Default)]
pub struct Bindings {
    accept_forms: Vec<NodeRef>,
    xhr_forms: Vec<NodeRef>,
    friend_inputs: Vec<NodeRef>,
}

impl Bindings {
    pub fn kind_of(&self, form: &NodeRef) -> Option<FormKind> {
        if self.accept_forms.iter().any(|bound| bound == form) {
            return Some(FormKind::Accept);
        }
        if self.xhr_forms.iter().any(|bound| bound == form) {
            return Some(FormKind::Xhr);
        }
        None
    }

    pub fn accept_forms(&self) -> &[NodeRef] {
        &self.accept_forms
    }

    pub fn xhr_forms(&self) -> &[NodeRef] {
        &self.xhr_forms
    }

    pub fn friend_inputs(&self) -> &[NodeRef] {
        &self.friend_inputs
    }
}

/// Scan the region and bind its interactive elements: accept forms, async
/// forms, and friend-name inputs (handed to the autocomplete collaborator
/// together with their selection callback).
pub(crate) fn bind_region(
    region: &NodeRef,
    autocomplete: &dyn AutocompleteProvider,
    controller: &Weak<ChallengeController>,
) -> Bindings {
    let accept_forms = select_all(region, ACCEPT_FORM_SELECTOR);
    let xhr_forms = select_all(region, XHR_FORM_SELECTOR);
    let friend_inputs = select_all(region, FRIEND_INPUT_SELECTOR);

    let options = AutocompleteOptions::friend_defaults();
    for input in &friend_inputs {
        autocomplete.attach(input, &options, select_handler(input, controller));
    }

    debug!(
        target: "challenge",
        accept = accept_forms.len(),
        xhr = xhr_forms.len(),
        friends = friend_inputs.len(),
        "bound challenge region"
    );

    Bindings {
        accept_forms,
        xhr_forms,
        friend_inputs,
    }
}

/// Selection callback for one friend input: fill the input and submit its
/// enclosing form. The widget calls back from sync context, so the submit is
/// spawned onto the page's task set; a controller torn down with the view
/// makes the callback a no-op.
fn select_handler(input: &NodeRef, controller: &Weak<ChallengeController>) -> OnSelect {
    let input = input.clone();
    let controller = Weak::clone(controller);
    Rc::new(move |value: &str| {
        let Some(controller) = controller.upgrade() else {
            return;
        };
        let input = input.clone();
        let value = value.to_string();
        tokio::task::spawn_local(async move {
            controller.friend_selected(&input, &value).await;
        });
    })
}
