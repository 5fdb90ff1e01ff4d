use crate::writer::ResponseWriter;
use hyper::{body::Bytes, Method};
use std::{
	fmt::{self, Display, Formatter},
	sync::Arc,
};

/// A fully buffered request as seen by handlers.
pub type Request = hyper::Request<Bytes>;

/// Something that can respond to a request by writing into a [`ResponseWriter`].
///
/// Closures with the signature `Fn(&Request, &mut ResponseWriter)` implement this automatically.
/// Implement it directly for handlers that carry their own state.
pub trait Handler: Send + Sync + 'static {
	fn serve(&self, req: &Request, w: &mut ResponseWriter);
}

impl<F> Handler for F
where
	F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
{
	fn serve(&self, req: &Request, w: &mut ResponseWriter) {
		self(req, w)
	}
}

pub type BoxedHandler = Arc<dyn Handler>;

/// Runs before route lookup. Returning `true` means the request was fully handled and dispatch
/// stops; `false` continues to the route tables.
pub type Prehandler = Arc<dyn Fn(&Request, &mut ResponseWriter) -> bool + Send + Sync>;

/// The methods that get their own exact-match table.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum RouteMethod {
	Get,
	Post,
	Put,
	Delete,
	Patch,
}

impl RouteMethod {
	pub const ALL: [RouteMethod; 5] = [
		RouteMethod::Get,
		RouteMethod::Post,
		RouteMethod::Put,
		RouteMethod::Delete,
		RouteMethod::Patch,
	];

	/// Maps an HTTP method onto its table, if it has one.
	pub fn from_http(method: &Method) -> Option<Self> {
		match *method {
			Method::GET => Some(RouteMethod::Get),
			Method::POST => Some(RouteMethod::Post),
			Method::PUT => Some(RouteMethod::Put),
			Method::DELETE => Some(RouteMethod::Delete),
			Method::PATCH => Some(RouteMethod::Patch),
			_ => None,
		}
	}

	pub fn as_http(self) -> Method {
		match self {
			RouteMethod::Get => Method::GET,
			RouteMethod::Post => Method::POST,
			RouteMethod::Put => Method::PUT,
			RouteMethod::Delete => Method::DELETE,
			RouteMethod::Patch => Method::PATCH,
		}
	}

	pub(crate) fn index(self) -> usize {
		self as usize
	}
}

impl Display for RouteMethod {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_http().as_str())
	}
}

impl TryFrom<&Method> for RouteMethod {
	type Error = Method;

	fn try_from(method: &Method) -> Result<Self, Self::Error> {
		Self::from_http(method).ok_or_else(|| method.clone())
	}
}

/// The raw request target: path plus query string, exactly as received.
pub fn target(req: &Request) -> &str {
	req.uri()
		.path_and_query()
		.map(|pq| pq.as_str())
		.unwrap_or_else(|| req.uri().path())
}

/// The exact-match lookup key: the target with everything from the first `?` removed.
pub fn lookup_key(target: &str) -> &str {
	target.split_once('?').map_or(target, |(path, _)| path)
}
