use std::rc::Rc;

use kuchiki::NodeRef;

/// Callback the widget invokes with the chosen value once the user picks a
/// completion. Handlers spawn onto the page's task set, so providers must
/// call this from within the page's `LocalSet`.
pub type OnSelect = Rc<dyn Fn(&str)>;

/// Declarative configuration handed to the user-name autocompletion widget.
/// The selection callback travels alongside rather than inside the options
/// so these stay plain comparable data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutocompleteOptions {
    /// Focus the input once the widget is attached.
    pub focus: bool,
    /// Restrict results to the user's social contacts.
    pub friend: bool,
    /// Visual tag the widget renders results with.
    pub tag: String,
}

impl AutocompleteOptions {
    /// Options used for friend-name inputs on the challenge page.
    pub fn friend_defaults() -> Self {
        Self {
            focus: true,
            friend: true,
            tag: "span".to_string(),
        }
    }
}

/// External autocompletion collaborator. The widget implementation is out of
/// scope; the page core declares which inputs it wants completed, with what
/// options, and hands over the `on_select` callback that fills the input and
/// submits its enclosing form.
pub trait AutocompleteProvider {
    fn attach(&self, input: &NodeRef, options: &AutocompleteOptions, on_select: OnSelect);
}

/// Provider for hosts without an autocompletion widget.
pub struct NullAutocomplete;

impl AutocompleteProvider for NullAutocomplete {
    fn attach(&self, _input: &NodeRef, _options: &AutocompleteOptions, _on_select: OnSelect) {}
}
