//! # reel
//!
//! A small movies API served by hyper, built around three guarantees:
//!
//! - **Graceful shutdown.** SIGTERM / SIGINT stop the accept loop, let
//!   in-flight requests finish within a bounded grace period, then exit.
//! - **One pipeline for every request.** Logging, metrics and panic recovery
//!   wrap every handler in a fixed, tested order.
//! - **One place for error statuses.** Handlers return [`HandlerError`]; a
//!   single [`ErrorHandler`] turns it into a status code and JSON body.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use reel::{App, Config, Router, Server, Service, health, movies, signal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), reel::Error> {
//!     let config = Config::from_env()?;
//!     let app = App::new(config.clone())?;
//!
//!     let router = movies::routes(health::routes(Router::new()));
//!     let service = Service::new(app, router);
//!
//!     let trigger = signal::listen()?;
//!     Server::bind(config.listen_addr())
//!         .await?
//!         .grace_period(config.shutdown_timeout)
//!         .serve(service, trigger)
//!         .await
//! }
//! ```
//!
//! ## Handlers
//!
//! ```rust,no_run
//! use reel::{HandlerError, HandlerResult, Request, Response};
//!
//! async fn get_movie(req: Request) -> HandlerResult {
//!     let id: u64 = req
//!         .param("id")
//!         .and_then(|id| id.parse().ok())
//!         .ok_or_else(|| HandlerError::invalid("invalid movie id"))?;
//!     match req.app().movies().get(id) {
//!         Some(movie) => Response::json(&movie),
//!         None => Err(HandlerError::not_found("movie not found")),
//!     }
//! }
//! ```

mod application;
mod binder;
mod config;
mod error;
mod handler;
mod lifecycle;
mod method;
mod normalize;
mod request;
mod response;
mod router;
mod server;
mod service;

pub mod health;
pub mod middleware;
pub mod movies;
pub mod signal;
pub mod telemetry;
pub mod tracker;

pub use application::{App, AppBuilder};
pub use binder::{Binder, DecodeError, JsonBinder, bind};
pub use config::{Config, ConfigError, LogConfig, LogFormat};
pub use error::{Error, HandlerError, HandlerResult};
pub use handler::{BoxFuture, Handler, Outcome};
pub use lifecycle::{Lifecycle, Phase};
pub use method::Method;
pub use middleware::{Middleware, Next, Pipeline};
pub use normalize::{ErrorHandler, INTERNAL_MESSAGE, JsonErrorHandler, status_for};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use service::{Service, ServiceBuilder};
