//! Request gateway: the single chokepoint for every call to the complaint service.
//! A `Transport` moves bytes and always answers with the uniform `GatewayResponse`
//! shape; `Gateway` attaches the session credential and turns failures into `AppError`.

mod transport;
mod http;
mod scripted;
mod client;

pub use transport::{Body, GatewayResponse, Method, RequestOptions, Transport};
pub(crate) use transport::decode;
pub use http::HttpTransport;
pub use scripted::{Gate, RecordedCall, ScriptedTransport};
pub use client::Gateway;
