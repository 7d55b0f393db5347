//! URI utilities.

use camino::Utf8Path;
use http::Uri;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;
use url::Url;

/// Characters escaped in a single path segment. `/` is handled by [`encode_path`].
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The provided URL cannot be a base URL,
/// and so is not valid as the base part of an API URL.
#[derive(Debug, Error)]
#[error("cannot be a base URL: {0}")]
pub struct CannotBeABase(url::Url);

/// Errors that can occur when parsing a URI.
#[derive(Debug, Error)]
pub enum ParseUriError {
    /// An error occurred while parsing the URI.
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// The provided URL cannot be a base URL,
    #[error(transparent)]
    CannotBeABase(#[from] CannotBeABase),

    /// The URI is invalid, but URL parsing succeded.
    #[error("invalid URI: {0}")]
    Invalid(http::uri::InvalidUri),
}

/// Convert a value into a URI.
pub trait IntoUri {
    /// Convert the value into a URI.
    fn into_uri(self) -> Result<Uri, ParseUriError>;
}

impl IntoUri for Url {
    fn into_uri(self) -> Result<Uri, ParseUriError> {
        if self.cannot_be_a_base() {
            return Err(CannotBeABase(self).into());
        }

        match self.as_str().parse() {
            Ok(uri) => Ok(uri),
            Err(e) => Err(ParseUriError::Invalid(e)),
        }
    }
}

impl IntoUri for Uri {
    fn into_uri(self) -> Result<Uri, ParseUriError> {
        Ok(self)
    }
}

impl IntoUri for &str {
    fn into_uri(self) -> Result<Uri, ParseUriError> {
        let url: Url = self.parse()?;
        url.into_uri()
    }
}

/// Percent-encode each `/`-separated segment of a relative path.
///
/// Separators are kept, so `library/alpine` stays a two segment path.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Extension trait for URIs.
pub trait UriExtension {
    /// Join a path to a URI.
    ///
    /// The path always extends the URI path. Leading `/` are dropped so that
    /// a joined path can never climb out of the base.
    fn join<P: AsRef<str>>(self, path: P) -> Result<Uri, http::Error>;
}

impl UriExtension for Uri {
    fn join<P: AsRef<str>>(self, path: P) -> Result<Uri, http::Error> {
        let mut parts = self.into_parts();

        let base = parts
            .path_and_query
            .as_ref()
            .map(|pq| pq.path())
            .unwrap_or("/");
        let joined = Utf8Path::new(base).join(path.as_ref().trim_start_matches('/'));
        parts.path_and_query = Some(http::uri::PathAndQuery::from_maybe_shared(
            joined.to_string(),
        )?);

        Ok(Uri::from_parts(parts)?)
    }
}
