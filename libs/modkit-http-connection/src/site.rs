//! Logical endpoint identity.
//!
//! A [`Site`] names where requests go (scheme, host, port) independently of
//! any open socket. Pools key their transports by site and TLS trust is bound
//! to it, so redirects are followed site by site.

use crate::error::HttpError;
use http::Uri;
use std::fmt;

/// URL scheme supported by a [`Site`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Scheme name as it appears in a URL
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Port implied when a URL carries none
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    fn parse(scheme: &str) -> Option<Self> {
        if scheme.eq_ignore_ascii_case("https") {
            Some(Scheme::Https)
        } else if scheme.eq_ignore_ascii_case("http") {
            Some(Scheme::Http)
        } else {
            None
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable endpoint identity: equal sites share pooled transports.
///
/// Hosts are stored lowercase, so equality is case-insensitive on the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Site {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Site {
    /// Create a site from its parts
    #[must_use]
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into().to_ascii_lowercase(),
            port,
        }
    }

    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether connections to this site are made over TLS
    #[must_use]
    pub fn use_ssl(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// `scheme://host:port`, used in diagnostics
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Site a redirect to `location` lands on.
    ///
    /// A location without an authority is relative and stays on this site.
    /// A location without an explicit port uses its scheme's default port.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidRedirectLocation`] if the location names a
    /// scheme other than `http`/`https`.
    pub fn move_to(&self, location: &Uri) -> Result<Site, HttpError> {
        let Some(host) = location.host() else {
            return Ok(self.clone());
        };

        let scheme = match location.scheme_str() {
            Some(s) => Scheme::parse(s).ok_or_else(|| HttpError::InvalidRedirectLocation {
                location: location.to_string(),
                reason: format!("unsupported scheme '{s}'"),
            })?,
            None => self.scheme,
        };
        let port = location.port_u16().unwrap_or_else(|| scheme.default_port());

        Ok(Site::new(scheme, host, port))
    }

    /// Resolve a `Location` reference against `base_path` on this site.
    ///
    /// Follows RFC 3986 section 5.2: a network-path reference (`//host/x`)
    /// keeps this site's scheme, a relative path merges with the directory of
    /// `base_path`, dot segments are removed and any fragment is dropped.
    /// Returns the target site and its origin-form path.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidRedirectLocation`] if the reference cannot
    /// be parsed, has no host where one is required, or names a scheme other
    /// than `http`/`https`.
    pub fn resolve(&self, base_path: &str, location: &str) -> Result<(Site, String), HttpError> {
        let invalid = |reason: String| HttpError::InvalidRedirectLocation {
            location: location.to_owned(),
            reason,
        };
        let reference = location.split_once('#').map_or(location, |(r, _)| r);

        let scheme = reference_scheme(reference);
        if scheme.is_some() || reference.starts_with("//") {
            if let Some(name) = scheme
                && Scheme::parse(name).is_none()
            {
                return Err(invalid(format!("unsupported scheme '{name}'")));
            }
            let absolute = if scheme.is_some() {
                reference.to_owned()
            } else {
                format!("{}:{reference}", self.scheme)
            };
            let uri = absolute
                .parse::<Uri>()
                .map_err(|e| invalid(e.to_string()))?;
            if uri.host().is_none_or(str::is_empty) {
                return Err(invalid("missing host".to_owned()));
            }
            let site = self.move_to(&uri)?;
            let (path, query) = split_query(
                uri.path_and_query()
                    .map_or("/", http::uri::PathAndQuery::as_str),
            );
            let path = if path.is_empty() {
                "/".to_owned()
            } else {
                remove_dot_segments(path)
            };
            return Ok((site, join_query(path, query)));
        }

        let (base_path, base_query) = split_query(base_path);
        let (path, query) = split_query(reference);
        let (path, query) = if path.is_empty() {
            (base_path.to_owned(), query.or(base_query))
        } else if path.starts_with('/') {
            (remove_dot_segments(path), query)
        } else {
            let directory = base_path.rfind('/').map_or("/", |i| &base_path[..=i]);
            (remove_dot_segments(&format!("{directory}{path}")), query)
        };
        let path = if path.is_empty() { "/".to_owned() } else { path };

        let target = join_query(path, query);
        target
            .parse::<http::uri::PathAndQuery>()
            .map_err(|e| invalid(e.to_string()))?;
        Ok((self.clone(), target))
    }
}

/// Scheme of an absolute reference, per RFC 3986 section 3.1
fn reference_scheme(reference: &str) -> Option<&str> {
    let end = reference.find([':', '/', '?'])?;
    let scheme = &reference[..end];
    let valid = reference[end..].starts_with(':')
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

fn split_query(target: &str) -> (&str, Option<&str>) {
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

fn join_query(path: String, query: Option<&str>) -> String {
    match query {
        Some(query) => format!("{path}?{query}"),
        None => path,
    }
}

/// RFC 3986 section 5.2.4 on an absolute path
fn remove_dot_segments(path: &str) -> String {
    let mut output: Vec<&str> = Vec::new();
    let mut trailing_slash = false;

    for segment in path.strip_prefix('/').unwrap_or(path).split('/') {
        match segment {
            "." => trailing_slash = true,
            ".." => {
                output.pop();
                trailing_slash = true;
            }
            other => {
                output.push(other);
                trailing_slash = false;
            }
        }
    }

    let mut resolved = format!("/{}", output.join("/"));
    if trailing_slash && !output.is_empty() {
        resolved.push('/');
    }
    resolved
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
