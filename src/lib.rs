//! Client core for a challenge page: keeps the `.challenge-page` region in
//! sync with server pushes, guards the accept action against stale
//! redirects, and keeps a liveness ping running while the view is open.

pub mod autocomplete;
pub mod challenge;
pub mod dom;
pub mod net;

pub use autocomplete::{AutocompleteOptions, AutocompleteProvider, NullAutocomplete, OnSelect};
pub use challenge::{
    run, ChallengeConfig, ChallengeController, LivenessPinger, Navigator, PingerStatus,
    SubmitOutcome,
};
pub use dom::PageDocument;
pub use net::{Channel, ChannelError, HttpClient, HttpRequest, PageSocket, SocketConfig, SocketEvent};
