use crate::{files, route::Request, router::Router, writer::ResponseWriter};
use hyper::{
	body::Bytes,
	header::{self, HeaderValue},
};
use std::path::Path;

/// Guesses a MIME type from the extension of `path`, ignoring case. `None` when the extension is
/// missing or unknown.
pub fn mime_type_for(path: &str) -> Option<&'static str> {
	mime_guess::from_path(path).first_raw()
}

fn set_content_type(w: &mut ResponseWriter, mime: &'static str) {
	w.set_header(header::CONTENT_TYPE, HeaderValue::from_static(mime));
}

/// Helpers that register fixed content into the method-agnostic table.
impl Router {
	fn serve_static(&mut self, path: impl Into<String>, mime: Option<&'static str>, bytes: Bytes) -> &mut Self {
		self.register_any(path, move |_req: &Request, w: &mut ResponseWriter| {
			if let Some(mime) = mime {
				set_content_type(w, mime);
			}
			w.write_bytes(&bytes);
		})
	}

	/// Serves `bytes` at `path` with a Content-Type guessed from the extension of `path`.
	pub fn serve_bytes(&mut self, path: impl Into<String>, bytes: impl Into<Bytes>) -> &mut Self {
		let path = path.into();
		let mime = mime_type_for(&path);
		self.serve_static(path, mime, bytes.into())
	}

	/// Serves the file at `file` for requests to `uri`, reading it on every request. Answers
	/// `If-Modified-Since` and single `Range` requests; a directory serves its `index.html`.
	pub fn serve_file(&mut self, uri: impl Into<String>, file: impl AsRef<Path>) -> &mut Self {
		let file = file.as_ref().to_path_buf();

		self.register_any(uri, move |req: &Request, w: &mut ResponseWriter| {
			files::serve_path(req, w, &file);
		})
	}

	pub fn handle_woff(&mut self, path: impl Into<String>, bytes: impl Into<Bytes>) -> &mut Self {
		self.serve_static(path, Some("font/woff"), bytes.into())
	}

	pub fn handle_html(&mut self, path: impl Into<String>, text: impl Into<Bytes>) -> &mut Self {
		self.serve_static(path, Some("text/html"), text.into())
	}

	/// Sets `text/html` before handing the request to `handler`.
	pub fn handle_html_fn<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
	where
		F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
	{
		self.register_any(path, move |req: &Request, w: &mut ResponseWriter| {
			set_content_type(w, "text/html");
			handler(req, w);
		})
	}

	pub fn handle_js(&mut self, path: impl Into<String>, text: impl Into<Bytes>) -> &mut Self {
		self.serve_static(path, Some("text/javascript"), text.into())
	}

	pub fn handle_css(&mut self, path: impl Into<String>, text: impl Into<Bytes>) -> &mut Self {
		self.serve_static(path, Some("text/css"), text.into())
	}

	pub fn handle_svg(&mut self, path: impl Into<String>, text: impl Into<Bytes>) -> &mut Self {
		self.serve_static(path, Some("image/svg+xml"), text.into())
	}
}
