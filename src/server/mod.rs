pub mod dispatcher;
pub mod http;

pub use dispatcher::Dispatcher;
pub use http::JsdHttpServer;
