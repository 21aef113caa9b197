mod client;
pub mod http;
mod target;

pub use client::Connection;
pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestClient, RequestBody};
pub use target::Target;
