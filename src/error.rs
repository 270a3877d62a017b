use err_derive::Error;

/// The error type used throughout this crate.
///
/// Variants map to the error kinds from the error-handling design: usage
/// errors and configuration faults abort the run before any work starts,
/// store errors are split into transient (retried upstream) and permanent
/// (fatal), and a prefix mismatch fails only the one record it occurred on.
#[derive(Debug, Error)]
pub enum Error {
	#[error(display = "{}", _0)]
	Message(String),

	#[error(display = "Usage error: {}", _0)]
	Usage(String),

	#[error(display = "Configuration error: {}", _0)]
	Configuration(String),

	#[error(display = "Key {:?} does not start with declared source prefix {:?}", key, prefix)]
	PrefixMismatch { key: String, prefix: String },

	#[error(display = "Transient object store error: {}", _0)]
	Transient(String),

	#[error(display = "Permanent object store error: {}", _0)]
	Permanent(String),

	#[error(display = "I/O error: {}", _0)]
	Io(#[error(source)] std::io::Error),

	#[error(display = "JSON error: {}", _0)]
	Json(#[error(source)] serde_json::Error),

	#[error(display = "MessagePack encode error: {}", _0)]
	MsgPackEncode(#[error(source)] rmp_serde::encode::Error),

	#[error(display = "MessagePack decode error: {}", _0)]
	MsgPackDecode(#[error(source)] rmp_serde::decode::Error),

	#[error(display = "Invalid timestamp: {}", _0)]
	Timestamp(#[error(source)] chrono::ParseError),
}

impl Error {
	/// Exit code this error should produce when surfaced at the top level.
	pub fn exit_code(&self) -> i32 {
		match self {
			Error::Usage(_) => 2,
			_ => 1,
		}
	}

	/// True if this error indicates a systemic fault (credentials, permissions)
	/// rather than a problem confined to a single record.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Error::Permanent(_) | Error::Configuration(_) | Error::Usage(_))
	}
}

impl From<&str> for Error {
	fn from(v: &str) -> Error {
		Error::Message(v.into())
	}
}

impl From<String> for Error {
	fn from(v: String) -> Error {
		Error::Message(v)
	}
}

/// Attach human-readable context to a `Result`'s error without losing the
/// underlying cause, for use at fallible call sites in the CLI layer.
pub trait ResultExt<T> {
	fn err_context<M: Into<String>>(self, message: M) -> Result<T, Error>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
	E: std::fmt::Display,
{
	fn err_context<M: Into<String>>(self, message: M) -> Result<T, Error> {
		self.map_err(|e| Error::Message(format!("{}: {}", message.into(), e)))
	}
}

/// Turn an `Option` into a `Result`, attaching a message when it was `None`.
pub trait OkOrMessage<T> {
	fn ok_or_message<M: Into<String>>(self, message: M) -> Result<T, Error>;
}

impl<T> OkOrMessage<T> for Option<T> {
	fn ok_or_message<M: Into<String>>(self, message: M) -> Result<T, Error> {
		self.ok_or_else(|| Error::Message(message.into()))
	}
}
