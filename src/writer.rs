use hyper::{
	body::Body,
	header::{HeaderMap, HeaderName, HeaderValue},
	StatusCode,
};
use std::io;

/// The response sink handed to every handler and prehandler.
///
/// Handlers write headers and body bytes into it as side effects; the hosting layer turns it into
/// a response once dispatch returns. The status stays `200 OK` unless a handler changes it.
#[derive(Debug, Default)]
pub struct ResponseWriter {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
}

impl ResponseWriter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn status(&self) -> StatusCode {
		self.status
	}

	pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
		self.status = status;
		self
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	pub fn headers_mut(&mut self) -> &mut HeaderMap {
		&mut self.headers
	}

	/// Sets a header, replacing any values already present under that name.
	pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
		self.headers.insert(name, value);
		self
	}

	pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
		self.body.extend_from_slice(bytes);
		self
	}

	pub fn write_str(&mut self, text: &str) -> &mut Self {
		self.write_bytes(text.as_bytes())
	}

	pub fn body(&self) -> &[u8] {
		&self.body
	}

	pub fn into_response(self) -> hyper::Response<Body> {
		let mut response = hyper::Response::new(Body::from(self.body));
		*response.status_mut() = self.status;
		*response.headers_mut() = self.headers;
		response
	}
}

impl io::Write for ResponseWriter {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.body.extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}
