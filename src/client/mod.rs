//! Clients for remote JSD services
//!
//! Both variants fetch service definitions and schemas lazily, cache them
//! for the lifetime of the client, validate arguments before sending and
//! results after receiving. [`JsdClient`] blocks the calling thread;
//! [`AsyncJsdClient`] suspends at each fetch.

mod shared;
pub mod blocking;
pub mod ids;
pub mod suspending;
pub mod transport;

pub use shared::DEFAULT_TIMEOUT;
pub use blocking::JsdClient;
pub use ids::{IdGenerator, ID_WRAP};
pub use suspending::{AsyncJsdClient, CallContext, CallState};
pub use transport::{
    AsyncHttpTransport, HttpResponse, HttpTransport, ReqwestBlockingTransport, ReqwestTransport,
};
