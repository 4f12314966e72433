//! Rate-aware client for the Unsplash statistics endpoints.

#[macro_use]
extern crate tracing;

mod client;
mod error;
mod observer;
pub mod rate_limit;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{
    ClientConfig,
    PageOptions,
    Resolution,
    UnsplashClient,
    DEFAULT_BASE_URL,
    DEFAULT_USER_AGENT,
    MAX_PER_PAGE,
};
pub use error::{
    Error,
    Result,
};
pub use observer::{
    RequestEvent,
    RequestObserver,
};
pub use rate_limit::RateLimit;
