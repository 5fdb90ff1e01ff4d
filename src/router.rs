use crate::{
	route::{self, BoxedHandler, Handler, Prehandler, Request, RouteMethod},
	writer::ResponseWriter,
};
use hyper::header::{self, HeaderValue};
use std::{
	collections::{BTreeMap, HashMap},
	fmt::{self, Debug, Formatter},
	sync::Arc,
};
use tracing::trace;

/// The document written when no route matches. The status code is left untouched.
pub const NOT_FOUND_BODY: &str = r#"<!DOCTYPE html><html><head><title>404</title><meta charset="utf-8"><meta name="viewpos" content="width=device-width"></head><body>404 not found</body></html>"#;

type RouteTable = HashMap<String, BoxedHandler>;

/// Prefix routes, scanned in reverse key order. Every prefix matching a given target is itself a
/// prefix of the longer matches, so reverse lexicographic order visits the longest match first.
type PrefixTable = BTreeMap<String, BoxedHandler>;

/// Maps requests onto handlers.
///
/// Lookup order for every request: prehandlers, then the table for the request's method, then
/// the method-agnostic table, then the prefix table, then the fixed 404 document.
///
/// All registration takes `&mut self`. Once the router is handed to a server it sits behind an
/// `Arc` and is only ever read, so no locking happens on the request path.
#[derive(Default)]
pub struct Router {
	prehandlers: Vec<Prehandler>,
	methods: [RouteTable; 5],
	any: RouteTable,
	prefixes: PrefixTable,
}

impl Router {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a handler for one method at one exact path, replacing any previous handler.
	pub fn register_method<F>(&mut self, method: RouteMethod, path: impl Into<String>, handler: F) -> &mut Self
	where
		F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
	{
		let path = path.into();
		trace!(%method, %path, "registering route");
		self.methods[method.index()].insert(path, Arc::new(handler));
		self
	}

	pub fn get<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
	where
		F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
	{
		self.register_method(RouteMethod::Get, path, handler)
	}

	pub fn post<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
	where
		F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
	{
		self.register_method(RouteMethod::Post, path, handler)
	}

	pub fn put<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
	where
		F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
	{
		self.register_method(RouteMethod::Put, path, handler)
	}

	pub fn delete<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
	where
		F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
	{
		self.register_method(RouteMethod::Delete, path, handler)
	}

	pub fn patch<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
	where
		F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
	{
		self.register_method(RouteMethod::Patch, path, handler)
	}

	/// Registers a handler for an exact path regardless of method.
	///
	/// Per-method routes at the same path take precedence.
	pub fn register_any<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
	where
		F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
	{
		self.handle(path, handler)
	}

	/// Like [`Router::register_any`], for handler objects instead of closures.
	pub fn handle<H: Handler>(&mut self, path: impl Into<String>, handler: H) -> &mut Self {
		let path = path.into();
		trace!(%path, "registering method-agnostic route");
		self.any.insert(path, Arc::new(handler));
		self
	}

	/// Registers a handler for every request whose raw target, query string included, starts with
	/// `prefix`. Only consulted when no exact route matches.
	pub fn register_prefix<F>(&mut self, prefix: impl Into<String>, handler: F) -> &mut Self
	where
		F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
	{
		let prefix = prefix.into();
		trace!(%prefix, "registering prefix route");
		self.prefixes.insert(prefix, Arc::new(handler));
		self
	}

	/// Appends a prehandler. Prehandlers run in registration order before any route lookup; the
	/// first one to return `true` ends dispatch for that request.
	pub fn add_prehandler<F>(&mut self, prehandler: F) -> &mut Self
	where
		F: Fn(&Request, &mut ResponseWriter) -> bool + Send + Sync + 'static,
	{
		self.prehandlers.push(Arc::new(prehandler));
		self
	}

	/// Copies the method-agnostic and prefix routes of `other` that this router doesn't already
	/// have. Existing routes are kept. Per-method routes and prehandlers are not copied.
	pub fn merge_from(&mut self, other: &Router) -> &mut Self {
		for (path, handler) in &other.any {
			self.any
				.entry(path.clone())
				.or_insert_with(|| Arc::clone(handler));
		}

		for (prefix, handler) in &other.prefixes {
			self.prefixes
				.entry(prefix.clone())
				.or_insert_with(|| Arc::clone(handler));
		}

		self
	}

	/// Runs the request through prehandlers and route tables, writing the outcome into `w`.
	pub fn dispatch(&self, req: &Request, w: &mut ResponseWriter) {
		for prehandler in &self.prehandlers {
			if prehandler(req, w) {
				return;
			}
		}

		match self.find(req) {
			Some(handler) => handler.serve(req, w),
			None => {
				w.set_header(
					header::CONTENT_TYPE,
					HeaderValue::from_static("text/html; charset=utf-8"),
				);
				w.write_str(NOT_FOUND_BODY);
			}
		}
	}

	fn find(&self, req: &Request) -> Option<&BoxedHandler> {
		let target = route::target(req);
		let key = route::lookup_key(target);

		RouteMethod::from_http(req.method())
			.and_then(|method| self.methods[method.index()].get(key))
			.or_else(|| self.any.get(key))
			.or_else(|| {
				self.prefixes
					.iter()
					.rev()
					.find(|(prefix, _)| target.starts_with(prefix.as_str()))
					.map(|(_, handler)| handler)
			})
	}
}

impl Debug for Router {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let sorted = |table: &RouteTable| {
			let mut paths: Vec<_> = table.keys().cloned().collect();
			paths.sort();
			paths
		};

		let methods: Vec<_> = RouteMethod::ALL
			.iter()
			.map(|&method| (method, sorted(&self.methods[method.index()])))
			.collect();

		f.debug_struct("Router")
			.field("prehandlers", &self.prehandlers.len())
			.field("methods", &methods)
			.field("any", &sorted(&self.any))
			.field("prefixes", &self.prefixes.keys().collect::<Vec<_>>())
			.finish()
	}
}
