use anyhow::{Context, Result};
use std::time::Instant;
use switchyard::{
	header::{self, HeaderValue},
	Request, ResponseWriter, Router, Server, ServerConfig, StatusCode,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const INDEX: &str = r#"<!DOCTYPE html><html><head><link rel="stylesheet" href="/site.css"></head><body><h1>switchyard</h1><script src="/app.js"></script></body></html>"#;

fn init_tracing() -> Result<()> {
	let filter = if std::env::var("RUST_LOG").is_ok() {
		EnvFilter::from_default_env()
	} else {
		EnvFilter::try_new("info,switchyard=trace").context("invalid log filter")?
	};

	tracing_subscriber::fmt().with_env_filter(filter).init();
	Ok(())
}

fn api() -> Router {
	let mut api = Router::new();
	api.register_any("/api/health", |_req: &Request, w: &mut ResponseWriter| {
		w.set_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.write_str(r#"{"ok":true}"#);
	})
	.register_prefix("/api/echo/", |req: &Request, w: &mut ResponseWriter| {
		w.write_str(req.uri().path().trim_start_matches("/api/echo/"));
	});
	api
}

#[tokio::main]
async fn main() -> Result<()> {
	init_tracing()?;

	let started = Instant::now();
	let mut router = Router::new();
	router
		.add_prehandler(|req: &Request, w: &mut ResponseWriter| {
			if req.uri().path().starts_with("/admin") && !req.headers().contains_key(header::AUTHORIZATION) {
				w.set_status(StatusCode::UNAUTHORIZED).write_str("unauthorized");
				return true;
			}
			false
		})
		.handle_html("/", INDEX)
		.handle_css("/site.css", "body { font-family: sans-serif }")
		.handle_js("/app.js", "console.log('loaded')")
		.handle_svg("/logo.svg", r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#)
		.get("/uptime", move |_req: &Request, w: &mut ResponseWriter| {
			w.write_str(&format!("{:?}", started.elapsed()));
		})
		.handle_html_fn("/admin", |req: &Request, w: &mut ResponseWriter| {
			w.write_str("<p>welcome, ").write_str(req.uri().query().unwrap_or("admin")).write_str("</p>");
		})
		.merge_from(&api());

	let config = ServerConfig::from_env()?;
	let server = Server::new(config, router);
	let handle = server.shutdown_handle();

	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!("received shutdown signal");
			handle.stop();
		}
	});

	server.listen_and_serve().await
}
