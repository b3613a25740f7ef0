//! Upload and build endpoint selection.
//!
//! The host is chosen from an explicit override, else from the API key
//! prefix. A port is spliced into the authority unless the URL already
//! names one. URLs are kept as text because `url::Url` drops default ports
//! and `https://host:443` must stay as written.

use crate::error::{AppError, Result, TransportError};
use std::fmt;

/// API keys with this prefix belong to the secondary hub
pub const HUB_PREFIX: &str = "00000";

const PRIMARY_UPLOAD: &str = "https://upload.bugsnag.com";
const PRIMARY_BUILD: &str = "https://build.bugsnag.com";
const SECONDARY_UPLOAD: &str = "https://upload.insighthub.smartbear.com";
const SECONDARY_BUILD: &str = "https://build.insighthub.smartbear.com";

/// Which backend service a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Symbol / mapping uploads
    Upload,
    /// Build information
    Build,
}

/// Per-kind path appended to the upload base URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `/dsym`
    Dsym,
    /// `/ndk-symbol`
    NdkSymbol,
    /// `/android-proguard`
    AndroidProguard,
    /// `/react-native-source-map`
    ReactNativeSourceMap,
    /// `/breakpad-symbol`
    BreakpadSymbol,
    /// `/unity-line-mappings`
    UnityLineMappings,
    /// `/linux`
    Linux,
    /// `/dart-symbol`
    DartSymbol,
    /// `/sourcemap`
    SourceMap,
    /// No suffix
    Base,
}

impl Route {
    /// Path suffix, including the leading slash
    pub fn suffix(&self) -> &'static str {
        match self {
            Route::Dsym => "/dsym",
            Route::NdkSymbol => "/ndk-symbol",
            Route::AndroidProguard => "/android-proguard",
            Route::ReactNativeSourceMap => "/react-native-source-map",
            Route::BreakpadSymbol => "/breakpad-symbol",
            Route::UnityLineMappings => "/unity-line-mappings",
            Route::Linux => "/linux",
            Route::DartSymbol => "/dart-symbol",
            Route::SourceMap => "/sourcemap",
            Route::Base => "",
        }
    }

    /// Versioned routes that older servers only serve at the base path
    pub fn falls_back_to_base(&self) -> bool {
        matches!(self, Route::Dsym | Route::AndroidProguard)
    }
}

/// A resolved base URL (scheme, authority and optional path prefix)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
}

impl Endpoint {
    /// Resolve the base URL for a service.
    ///
    /// `port == 0` means unspecified.
    pub fn resolve(
        api_key: Option<&str>,
        custom_host: Option<&str>,
        port: u16,
        service: Service,
    ) -> Result<Self> {
        let host = select_host(api_key, custom_host, service);
        Ok(Self {
            base: build_endpoint_url(&host, port)?,
        })
    }

    /// Base URL without any route
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Full URL for a route
    pub fn url(&self, route: Route) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), route.suffix())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

/// Pick the host: override, then API key prefix, then primary
pub fn select_host(api_key: Option<&str>, custom_host: Option<&str>, service: Service) -> String {
    if let Some(host) = custom_host.filter(|h| !h.trim().is_empty()) {
        return host.trim().to_string();
    }
    let secondary = api_key.is_some_and(|k| k.starts_with(HUB_PREFIX));
    match (service, secondary) {
        (Service::Upload, false) => PRIMARY_UPLOAD,
        (Service::Upload, true) => SECONDARY_UPLOAD,
        (Service::Build, false) => PRIMARY_BUILD,
        (Service::Build, true) => SECONDARY_BUILD,
    }
    .to_string()
}

/// Splice `port` into `uri` unless it already carries one.
///
/// Fails with `BadEndpoint` when `uri` is not an absolute URL.
pub fn build_endpoint_url(uri: &str, port: u16) -> Result<String> {
    let parsed = url::Url::parse(uri).map_err(|e| bad_endpoint(uri, e.to_string()))?;
    if parsed.host_str().is_none() {
        return Err(bad_endpoint(uri, "missing host".to_string()));
    }

    let (prefix, rest) = uri
        .split_once("://")
        .ok_or_else(|| bad_endpoint(uri, "missing scheme".to_string()))?;
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    if has_explicit_port(authority) || port == 0 {
        return Ok(uri.to_string());
    }

    Ok(format!("{prefix}://{authority}:{port}{tail}"))
}

fn has_explicit_port(authority: &str) -> bool {
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    // IPv6 literals carry colons inside brackets
    let after_host = match host_port.rfind(']') {
        Some(idx) => &host_port[idx + 1..],
        None => host_port,
    };
    after_host
        .rsplit_once(':')
        .is_some_and(|(_, p)| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

fn bad_endpoint(url: &str, reason: String) -> AppError {
    AppError::Transport(TransportError::BadEndpoint {
        url: url.to_string(),
        reason,
    })
}
