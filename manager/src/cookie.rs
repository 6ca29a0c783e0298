//! The slice of HTTP the Manager needs: read one named cookie from a request
//! and set one cookie on a response.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use cookie::time::Duration;
use cookie::Cookie;
use http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use sessionkit_core::{ManagerOptions, SameSite};
use tracing::warn;

/// Something a cookie can be read from, typically request headers
pub trait CookieSource {
    /// Raw value of the first cookie called `name`
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Something a cookie can be written to, typically response headers
pub trait CookieSink {
    fn set_cookie(&mut self, cookie: SessionCookie);
}

/// A `Set-Cookie` carrying a session id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    /// Percent-escaped session id
    pub value: String,
    pub path: String,
    /// Seconds; zero omits the attribute, negative asks the client to drop
    /// the cookie now
    pub max_age: i64,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl SessionCookie {
    /// Cookie binding `session_id` under the configured attributes
    pub fn for_session(options: &ManagerOptions, session_id: &str) -> Self {
        Self {
            name: options.cookie_name.clone(),
            value: escape(session_id),
            path: options.path.clone(),
            max_age: options.max_age_seconds,
            http_only: true,
            same_site: options.same_site,
        }
    }

    /// The session id carried by this cookie, if the value is well formed
    pub fn session_id(&self) -> Option<String> {
        unescape(&self.value)
    }

    /// Build the cookie sent in `Set-Cookie`
    pub fn to_cookie(&self) -> Cookie<'static> {
        let mut builder =
            Cookie::build((self.name.clone(), self.value.clone())).http_only(self.http_only);
        if !self.path.is_empty() {
            builder = builder.path(self.path.clone());
        }
        if let Some(max_age) = max_age_attribute(self.max_age) {
            builder = builder.max_age(max_age);
        }
        if let Some(same_site) = same_site_attribute(self.same_site) {
            builder = builder.same_site(same_site);
        }
        builder.build()
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_cookie(), f)
    }
}

/// `Max-Age` for a configured lifetime: omitted at zero, clamped to zero
/// when negative.
fn max_age_attribute(seconds: i64) -> Option<Duration> {
    match seconds {
        0 => None,
        s if s < 0 => Some(Duration::ZERO),
        s => Some(Duration::seconds(s)),
    }
}

fn same_site_attribute(same_site: SameSite) -> Option<cookie::SameSite> {
    match same_site {
        SameSite::Default => None,
        SameSite::Lax => Some(cookie::SameSite::Lax),
        SameSite::Strict => Some(cookie::SameSite::Strict),
        SameSite::None => Some(cookie::SameSite::None),
    }
}

/// Percent-escape a session id for use as a cookie value
pub fn escape(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

/// Reverse [`escape`]. Malformed `%` sequences and non UTF-8 results yield
/// `None`.
pub fn unescape(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !well_formed {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    urlencoding::decode(value).ok().map(Cow::into_owned)
}

/// Find `name` in `Cookie` header values of the form `a=1; b=2`.
fn find_cookie<'a>(headers: impl Iterator<Item = &'a str>, name: &str) -> Option<String> {
    headers
        .flat_map(|header| Cookie::split_parse(header))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value_trimmed().to_string())
}

impl CookieSource for HeaderMap {
    fn cookie(&self, name: &str) -> Option<String> {
        find_cookie(
            self.get_all(COOKIE).iter().filter_map(|v| v.to_str().ok()),
            name,
        )
    }
}

impl CookieSink for HeaderMap {
    fn set_cookie(&mut self, cookie: SessionCookie) {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                self.append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Dropping session cookie {} with invalid characters", cookie.name),
        }
    }
}

impl<B> CookieSource for http::Request<B> {
    fn cookie(&self, name: &str) -> Option<String> {
        self.headers().cookie(name)
    }
}

impl<B> CookieSink for http::Response<B> {
    fn set_cookie(&mut self, cookie: SessionCookie) {
        self.headers_mut().set_cookie(cookie);
    }
}

/// Plain name → value lookup
impl CookieSource for HashMap<String, String> {
    fn cookie(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Records cookies instead of sending them
impl CookieSink for Vec<SessionCookie> {
    fn set_cookie(&mut self, cookie: SessionCookie) {
        self.push(cookie);
    }
}
