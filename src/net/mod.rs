mod http;
mod socket;

pub use http::{FetchError, HttpClient, HttpRequest, Method, ReqwestClient};
pub use socket::{Channel, ChannelError, EventTable, PageSocket, SocketConfig, SocketEvent};
