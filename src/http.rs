use crate::{config::ServerConfig, route, Request, ResponseWriter, Router};
use anyhow::{Context as _, Result};
use hyper::{body::Body, server::conn::Http, service::Service, StatusCode};
use std::{
	convert::Infallible,
	future::{ready, Future, Ready},
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
};
use tokio::{net::TcpListener, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Produces a [`RouterService`] per connection, so a router can be passed straight to
/// `hyper::Server::serve`.
#[derive(Debug, Clone)]
pub struct MakeRouterService {
	router: Arc<Router>,
}

impl<T> Service<T> for MakeRouterService {
	type Response = RouterService;
	type Error = Infallible;
	type Future = Ready<Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, _: &mut Context) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	fn call(&mut self, _: T) -> Self::Future {
		ready(Ok(RouterService {
			router: Arc::clone(&self.router),
		}))
	}
}

/// The per-connection service: buffers each request body, dispatches through the router and turns
/// the written [`ResponseWriter`] into the response.
#[derive(Debug, Clone)]
pub struct RouterService {
	router: Arc<Router>,
}

impl From<Router> for RouterService {
	fn from(router: Router) -> Self {
		Self {
			router: Arc::new(router),
		}
	}
}

impl From<Arc<Router>> for RouterService {
	fn from(router: Arc<Router>) -> Self {
		Self { router }
	}
}

impl Service<hyper::Request<Body>> for RouterService {
	type Response = hyper::Response<Body>;
	type Error = Infallible;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	fn call(&mut self, req: hyper::Request<Body>) -> Self::Future {
		let router = Arc::clone(&self.router);

		Box::pin(async move {
			let (parts, body) = req.into_parts();
			let body = match hyper::body::to_bytes(body).await {
				Ok(body) => body,
				Err(e) => {
					warn!(error = %e, "failed to read request body");
					let mut w = ResponseWriter::new();
					w.set_status(StatusCode::BAD_REQUEST);
					return Ok(w.into_response());
				}
			};

			let req = Request::from_parts(parts, body);
			trace!(method = %req.method(), uri = route::target(&req), "dispatching request");

			let mut w = ResponseWriter::new();
			router.dispatch(&req, &mut w);
			Ok(w.into_response())
		})
	}
}

impl Router {
	pub fn into_make_service(self) -> MakeRouterService {
		MakeRouterService {
			router: Arc::new(self),
		}
	}
}

/// Stops a running [`Server`]. Cloneable, so any task can hold one.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
	token: CancellationToken,
}

impl ShutdownHandle {
	/// Stops accepting connections and asks open ones to finish. The server's serve future
	/// resolves once they have, or once the grace period runs out and the rest are dropped.
	pub fn stop(&self) {
		self.token.cancel();
	}

	pub fn is_stopped(&self) -> bool {
		self.token.is_cancelled()
	}
}

/// Serves a [`Router`] over HTTP/1 and HTTP/2 until stopped.
#[derive(Debug)]
pub struct Server {
	config: ServerConfig,
	router: Arc<Router>,
	shutdown: CancellationToken,
}

impl Server {
	/// Takes ownership of the router: registration is over once a server exists.
	pub fn new(config: ServerConfig, router: Router) -> Self {
		Self {
			config,
			router: Arc::new(router),
			shutdown: CancellationToken::new(),
		}
	}

	pub fn config(&self) -> &ServerConfig {
		&self.config
	}

	pub fn shutdown_handle(&self) -> ShutdownHandle {
		ShutdownHandle {
			token: self.shutdown.clone(),
		}
	}

	/// Binds the configured address and serves until stopped.
	pub async fn listen_and_serve(self) -> Result<()> {
		let listener = TcpListener::bind(self.config.addr)
			.await
			.with_context(|| format!("failed to bind {}", self.config.addr))?;
		self.serve(listener).await
	}

	/// Serves connections from an already bound listener until stopped.
	pub async fn serve(self, listener: TcpListener) -> Result<()> {
		let addr = listener
			.local_addr()
			.context("failed to read listener address")?;
		info!(%addr, "listening");

		let service = RouterService::from(Arc::clone(&self.router));
		let http = Http::new();
		let mut connections = JoinSet::new();

		loop {
			tokio::select! {
				accepted = listener.accept() => {
					let (stream, peer_addr) = match accepted {
						Ok(conn) => conn,
						Err(e) => {
							warn!(error = %e, "failed to accept connection");
							continue;
						}
					};

					let conn = http.serve_connection(stream, service.clone());
					let token = self.shutdown.clone();

					connections.spawn(async move {
						tokio::pin!(conn);

						let result = tokio::select! {
							result = conn.as_mut() => result,
							() = token.cancelled() => {
								conn.as_mut().graceful_shutdown();
								conn.await
							}
						};

						if let Err(e) = result {
							debug!(%peer_addr, error = %e, "connection error");
						}
					});
				}

				Some(joined) = connections.join_next(), if !connections.is_empty() => {
					if let Err(e) = joined {
						warn!(error = %e, "connection task failed");
					}
				}

				() = self.shutdown.cancelled() => break,
			}
		}

		drop(listener);
		info!(in_flight = connections.len(), "shutting down");

		let drained = tokio::time::timeout(self.config.shutdown_grace, async {
			while connections.join_next().await.is_some() {}
		})
		.await;

		if drained.is_err() {
			warn!(
				remaining = connections.len(),
				grace = ?self.config.shutdown_grace,
				"grace period elapsed, dropping connections"
			);
			connections.shutdown().await;
		}

		info!(%addr, "stopped");
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::RouterService;
	use crate::{Request, ResponseWriter, Router, NOT_FOUND_BODY};
	use hyper::{body::Body, service::Service, Method, StatusCode};

	async fn call(service: &mut RouterService, req: hyper::Request<Body>) -> (StatusCode, String) {
		let response = service.call(req).await.unwrap();
		let status = response.status();
		let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
		(status, String::from_utf8(body.to_vec()).unwrap())
	}

	#[tokio::test]
	async fn buffers_body_for_handlers() {
		let mut router = Router::new();
		router.post("/echo", |req: &Request, w: &mut ResponseWriter| {
			w.set_status(StatusCode::ACCEPTED).write_bytes(req.body());
		});
		let mut service = RouterService::from(router);

		let req = hyper::Request::builder()
			.method(Method::POST)
			.uri("/echo?x=1")
			.body(Body::from("ping"))
			.unwrap();

		assert_eq!(call(&mut service, req).await, (StatusCode::ACCEPTED, "ping".to_owned()));
	}

	#[tokio::test]
	async fn unmatched_requests_keep_default_status() {
		let mut service = RouterService::from(Router::new());
		let req = hyper::Request::builder()
			.uri("/missing")
			.body(Body::empty())
			.unwrap();

		assert_eq!(
			call(&mut service, req).await,
			(StatusCode::OK, NOT_FOUND_BODY.to_owned())
		);
	}
}
