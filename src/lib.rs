//! A dead simple table-based HTTP router built on hyper.
//!
#![cfg_attr(
	feature = "server",
	doc = r##"
```no_run
use switchyard::{Request, ResponseWriter, Router, Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let mut router = Router::new();
	router
		.add_prehandler(|req: &Request, w: &mut ResponseWriter| {
			if req.headers().contains_key("x-blocked") {
				w.write_str("go away");
				return true;
			}
			false
		})
		.get("/", |_req: &Request, w: &mut ResponseWriter| {
			w.write_str("hello");
		})
		.handle_css("/site.css", "body { margin: 0 }")
		.register_prefix("/assets/", |req: &Request, w: &mut ResponseWriter| {
			w.write_str(req.uri().path());
		});

	Server::new(ServerConfig::new(([127, 0, 0, 1], 3000)), router)
		.listen_and_serve()
		.await
}
```
"##
)]
//!
//! Every request goes through the same steps. Prehandlers run first, in the order they were
//! added, and any of them can end the request by returning `true`. Then the path (query string
//! removed) is looked up in the table for the request's method, then in the method-agnostic
//! table. If neither has it, the longest registered prefix of the raw target wins.
//! Anything left over gets [`NOT_FOUND_BODY`] with the default status.
//!
//! Registration needs `&mut Router`; serving needs the router to be moved into a [`Server`] or
//! service, so routes can't change underneath in-flight requests.

mod files;

#[cfg(feature = "server")]
mod config;
#[cfg(feature = "server")]
mod http;
#[cfg(feature = "server")]
pub use config::*;
#[cfg(feature = "server")]
pub use http::*;

/// Handler types and request helpers.
pub mod route;

/// The route tables and the dispatch algorithm.
pub mod router;

/// Registration helpers for fixed content with a known Content-Type.
pub mod statics;

/// The response sink handlers write into.
pub mod writer;

pub use hyper;
pub use hyper::{body::Bytes, header, Method, StatusCode};
pub use route::*;
pub use router::*;
pub use statics::mime_type_for;
pub use writer::*;
