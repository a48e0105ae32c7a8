pub mod http;
pub mod types;

pub use http::{HttpBridge, HttpBridgeOptions};
pub use types::{
    ErrorCallback, HttpRequest, HttpResponse, HttpVerb, Method, RequestSettings, ResponseMeta,
    SuccessCallback, SyncBridge, SyncError, SyncErrorKind, SyncOptions, SyncResponse, Transport,
};
