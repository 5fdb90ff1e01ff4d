use crate::{route::Request, statics::mime_type_for, writer::ResponseWriter};
use chrono::{DateTime, NaiveDateTime, Utc};
use hyper::{
	header::{self, HeaderValue},
	Method, StatusCode,
};
use std::{
	fs::{self, File, Metadata},
	io::{self, Read, Seek, SeekFrom},
	path::{Path, PathBuf},
};
use tracing::warn;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const INDEX_FILE: &str = "index.html";

/// What a `Range` header asks for, resolved against the file length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteRange {
	/// No usable single range; serve everything.
	Whole,
	/// Inclusive bounds.
	Part { start: u64, end: u64 },
	Unsatisfiable,
}

/// Resolves a `Range` header value. Multi-range requests are answered with the whole file.
fn parse_range(value: &str, len: u64) -> ByteRange {
	let spec = match value.trim().strip_prefix("bytes=") {
		Some(spec) => spec.trim(),
		None => return ByteRange::Unsatisfiable,
	};

	if spec.contains(',') {
		return ByteRange::Whole;
	}

	let (first, last) = match spec.split_once('-') {
		Some(bounds) => bounds,
		None => return ByteRange::Unsatisfiable,
	};

	if first.is_empty() {
		// bytes=-N, the last N bytes
		return match last.parse::<u64>() {
			Ok(n) if n > 0 && len > 0 => ByteRange::Part {
				start: len - n.min(len),
				end: len - 1,
			},
			_ => ByteRange::Unsatisfiable,
		};
	}

	let start = match first.parse::<u64>() {
		Ok(start) if start < len => start,
		_ => return ByteRange::Unsatisfiable,
	};

	if last.is_empty() {
		return ByteRange::Part { start, end: len - 1 };
	}

	match last.parse::<u64>() {
		Ok(end) if end >= start => ByteRange::Part {
			start,
			end: end.min(len - 1),
		},
		_ => ByteRange::Unsatisfiable,
	}
}

fn format_http_date(date: DateTime<Utc>) -> String {
	date.format(HTTP_DATE).to_string()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
	if let Ok(date) = DateTime::parse_from_rfc2822(value) {
		return Some(date.with_timezone(&Utc));
	}

	NaiveDateTime::parse_from_str(value, HTTP_DATE)
		.ok()
		.map(|date| date.and_utc())
}

fn not_modified(req: &Request, modified: DateTime<Utc>) -> bool {
	if req.method() != Method::GET && req.method() != Method::HEAD {
		return false;
	}

	req.headers()
		.get(header::IF_MODIFIED_SINCE)
		.and_then(|value| value.to_str().ok())
		.and_then(parse_http_date)
		.map_or(false, |since| modified.timestamp() <= since.timestamp())
}

/// Opens `path`, or the index file inside it when it names a directory.
fn open(path: &Path) -> io::Result<(File, PathBuf, Metadata)> {
	let mut path = path.to_path_buf();
	let mut meta = fs::metadata(&path)?;

	if meta.is_dir() {
		path.push(INDEX_FILE);
		meta = fs::metadata(&path)?;
	}

	if !meta.is_file() {
		return Err(io::Error::from(io::ErrorKind::NotFound));
	}

	let file = File::open(&path)?;
	Ok((file, path, meta))
}

fn respond(req: &Request, w: &mut ResponseWriter, mut file: File, path: &Path, meta: &Metadata) -> io::Result<()> {
	let len = meta.len();
	let headers = w.headers_mut();
	headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

	if let Some(mime) = path.to_str().and_then(mime_type_for) {
		headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
	}

	if let Ok(modified) = meta.modified().map(DateTime::<Utc>::from) {
		if let Ok(value) = HeaderValue::from_str(&format_http_date(modified)) {
			headers.insert(header::LAST_MODIFIED, value);
		}

		if not_modified(req, modified) {
			headers.remove(header::CONTENT_TYPE);
			w.set_status(StatusCode::NOT_MODIFIED);
			return Ok(());
		}
	}

	let range = req
		.headers()
		.get(header::RANGE)
		.and_then(|value| value.to_str().ok())
		.map_or(ByteRange::Whole, |value| parse_range(value, len));

	match range {
		ByteRange::Whole => {
			let mut body = Vec::with_capacity(len as usize);
			file.read_to_end(&mut body)?;
			w.write_bytes(&body);
		}
		ByteRange::Part { start, end } => {
			let mut body = Vec::with_capacity((end - start + 1) as usize);
			file.seek(SeekFrom::Start(start))?;
			file.take(end - start + 1).read_to_end(&mut body)?;

			let content_range = format!("bytes {}-{}/{}", start, end, len);
			if let Ok(value) = HeaderValue::from_str(&content_range) {
				w.set_header(header::CONTENT_RANGE, value);
			}
			w.set_status(StatusCode::PARTIAL_CONTENT).write_bytes(&body);
		}
		ByteRange::Unsatisfiable => {
			if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", len)) {
				w.set_header(header::CONTENT_RANGE, value);
			}
			plain_error(w, StatusCode::RANGE_NOT_SATISFIABLE, "416 requested range not satisfiable\n");
		}
	}

	Ok(())
}

fn plain_error(w: &mut ResponseWriter, status: StatusCode, text: &str) {
	w.set_status(status)
		.set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
		.write_str(text);
}

/// Runs file I/O without stalling the async workers: on a multi-threaded tokio runtime the
/// closure runs through `block_in_place`, anywhere else it runs inline.
#[cfg(feature = "server")]
fn blocking<T>(f: impl FnOnce() -> T) -> T {
	use tokio::runtime::{Handle, RuntimeFlavor};

	match Handle::try_current() {
		Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => tokio::task::block_in_place(f),
		_ => f(),
	}
}

#[cfg(not(feature = "server"))]
fn blocking<T>(f: impl FnOnce() -> T) -> T {
	f()
}

/// Serves the file at `path` the way a static file server would: conditional GET through
/// `Last-Modified`/`If-Modified-Since`, single byte ranges, and `index.html` for directories.
pub(crate) fn serve_path(req: &Request, w: &mut ResponseWriter, path: &Path) {
	blocking(|| {
		let result = open(path).and_then(|(file, resolved, meta)| respond(req, w, file, &resolved, &meta));

		match result {
			Ok(()) => {}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				plain_error(w, StatusCode::NOT_FOUND, "404 page not found\n");
			}
			Err(e) => {
				warn!(file = %path.display(), error = %e, "failed to serve static file");
				*w = ResponseWriter::new();
				plain_error(w, StatusCode::INTERNAL_SERVER_ERROR, "500 internal server error\n");
			}
		}
	})
}
