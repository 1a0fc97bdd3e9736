//! A pooled, HTTPS-only client factory.
//!
//! Configure a [`FactoryBuilder`], build it once into a [`ClientFactory`],
//! then [`create`](ClientFactory::create) as many [`Client`] handles as
//! needed. They all share one connection pool, capped in total and per
//! route, and every request is bounded by the configured timeouts.
//! [`close`](ClientFactory::close) (or dropping the factory) releases the
//! pool.

mod builder;
mod client;
mod config;
mod error;
mod factory;
mod http;
mod pool;
mod route;
#[cfg(test)]
mod testing;

pub use builder::FactoryBuilder;
pub use client::Client;
pub use config::{ClientConfig, RequestConfig};
pub use error::{Error, Result};
pub use factory::ClientFactory;
pub use crate::http::ResponseBody;
pub use pool::PoolStats;
pub use route::{Route, Scheme};
