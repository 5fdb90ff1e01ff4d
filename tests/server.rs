use hyper::{body::Body, Client, Method, StatusCode};
use std::time::Duration;
use switchyard::{
	Request, ResponseWriter, Router, Server, ServerConfig, ShutdownHandle, NOT_FOUND_BODY,
};
use tokio::{net::TcpListener, task::JoinHandle};

async fn start(router: Router) -> (String, ShutdownHandle, JoinHandle<anyhow::Result<()>>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let server = Server::new(
		ServerConfig::new(addr).with_shutdown_grace(Duration::from_millis(200)),
		router,
	);
	let handle = server.shutdown_handle();
	let task = tokio::spawn(server.serve(listener));

	(format!("http://{}", addr), handle, task)
}

async fn send(method: Method, uri: String, body: &'static str) -> (StatusCode, String) {
	let req = hyper::Request::builder()
		.method(method)
		.uri(uri)
		.body(Body::from(body))
		.unwrap();

	let response = Client::new().request(req).await.unwrap();
	let status = response.status();
	let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
	(status, String::from_utf8(body.to_vec()).unwrap())
}

fn site() -> Router {
	let mut router = Router::new();
	router
		.add_prehandler(|req: &Request, w: &mut ResponseWriter| {
			if req.headers().contains_key("x-deny") {
				w.set_status(StatusCode::FORBIDDEN).write_str("denied");
				return true;
			}
			false
		})
		.get("/hello", |_req: &Request, w: &mut ResponseWriter| {
			w.write_str("hello");
		})
		.post("/echo", |req: &Request, w: &mut ResponseWriter| {
			w.write_bytes(req.body());
		})
		.handle_js("/app.js", "console.log(1)")
		.register_prefix("/files/", |req: &Request, w: &mut ResponseWriter| {
			w.write_str("file:").write_str(req.uri().path());
		});
	router
}

#[tokio::test]
async fn serves_routes_over_tcp() {
	let (base, handle, task) = start(site()).await;

	assert_eq!(
		send(Method::GET, format!("{}/hello?lang=en", base), "").await,
		(StatusCode::OK, "hello".to_owned())
	);
	assert_eq!(
		send(Method::POST, format!("{}/echo", base), "round trip").await,
		(StatusCode::OK, "round trip".to_owned())
	);
	assert_eq!(
		send(Method::DELETE, format!("{}/app.js", base), "").await,
		(StatusCode::OK, "console.log(1)".to_owned())
	);
	assert_eq!(
		send(Method::GET, format!("{}/files/a/b.txt", base), "").await,
		(StatusCode::OK, "file:/files/a/b.txt".to_owned())
	);
	assert_eq!(
		send(Method::GET, format!("{}/nothing", base), "").await,
		(StatusCode::OK, NOT_FOUND_BODY.to_owned())
	);

	handle.stop();
	task.await.unwrap().unwrap();
}

#[tokio::test]
async fn prehandler_short_circuits_over_tcp() {
	let (base, handle, task) = start(site()).await;

	let req = hyper::Request::builder()
		.uri(format!("{}/hello", base))
		.header("x-deny", "1")
		.body(Body::empty())
		.unwrap();
	let response = Client::new().request(req).await.unwrap();
	assert_eq!(response.status(), StatusCode::FORBIDDEN);

	let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
	assert_eq!(&body[..], b"denied");

	handle.stop();
	task.await.unwrap().unwrap();
}

#[tokio::test]
async fn stop_returns_promptly_when_idle() {
	let (_base, handle, task) = start(Router::new()).await;

	handle.stop();
	assert!(handle.is_stopped());

	tokio::time::timeout(Duration::from_secs(5), task)
		.await
		.expect("server did not stop")
		.unwrap()
		.unwrap();
}

#[tokio::test]
async fn stop_waits_for_open_connections_within_grace() {
	let (base, handle, task) = start(site()).await;

	// a pooled client keeps its keep-alive connection open after this request
	let client = Client::new();
	let response = client
		.get(format!("{}/hello", base).parse().unwrap())
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	hyper::body::to_bytes(response.into_body()).await.unwrap();

	handle.stop();

	tokio::time::timeout(Duration::from_secs(5), task)
		.await
		.expect("server did not stop")
		.unwrap()
		.unwrap();
}

#[tokio::test]
async fn stop_drops_stalled_requests_after_grace() {
	use tokio::io::{AsyncReadExt, AsyncWriteExt};

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let server = Server::new(
		ServerConfig::new(addr).with_shutdown_grace(Duration::from_millis(300)),
		site(),
	);
	let grace = server.config().shutdown_grace;
	let handle = server.shutdown_handle();
	let task = tokio::spawn(server.serve(listener));

	// promises ten body bytes and sends two, so the request never completes on its own
	let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
	stream
		.write_all(b"POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 10\r\n\r\nab")
		.await
		.unwrap();
	tokio::time::sleep(Duration::from_millis(100)).await;

	let stopped_at = std::time::Instant::now();
	handle.stop();

	tokio::time::timeout(Duration::from_secs(5), task)
		.await
		.expect("server did not stop")
		.unwrap()
		.unwrap();

	let elapsed = stopped_at.elapsed();
	assert!(elapsed >= grace, "stopped after {:?}, before the grace period", elapsed);
	assert!(elapsed < Duration::from_secs(2), "stopped after {:?}", elapsed);

	// the dropped connection reads as closed, without a response
	let mut buf = [0u8; 64];
	let read = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf))
		.await
		.expect("connection left open");
	assert!(matches!(read, Ok(0) | Err(_)), "unexpected response: {:?}", read);
}
