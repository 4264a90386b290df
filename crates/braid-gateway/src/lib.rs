pub mod http;
pub mod mock;
pub mod models;
pub mod sse;

pub use http::HttpGateway;
pub use mock::{MockGateway, MockResponse};
