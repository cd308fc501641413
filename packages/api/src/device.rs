//! Device metadata recorded with each session.

use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use store::NewSession;
use uuid::Uuid;

/// Device, browser and OS names read from a `User-Agent` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub device: String,
    pub browser: String,
    pub os: String,
}

const UNKNOWN: &str = "Unknown";

impl Device {
    pub fn parse(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();

        // Order matters: Edge and Opera also claim Chrome, Chrome claims Safari.
        let browser = if ua.contains("edg/") {
            "Edge"
        } else if ua.contains("opr/") || ua.contains("opera") {
            "Opera"
        } else if ua.contains("firefox/") || ua.contains("fxios/") {
            "Firefox"
        } else if ua.contains("chrome/") || ua.contains("crios/") {
            "Chrome"
        } else if ua.contains("safari/") {
            "Safari"
        } else if ua.contains("curl/") {
            "curl"
        } else {
            UNKNOWN
        };

        let os = if ua.contains("android") {
            "Android"
        } else if ua.contains("iphone") || ua.contains("ipad") {
            "iOS"
        } else if ua.contains("windows") {
            "Windows"
        } else if ua.contains("mac os") || ua.contains("macintosh") {
            "macOS"
        } else if ua.contains("cros ") {
            "ChromeOS"
        } else if ua.contains("linux") {
            "Linux"
        } else {
            UNKNOWN
        };

        let device = if ua.contains("ipad") || ua.contains("tablet") {
            "Tablet"
        } else if ua.contains("mobile") || ua.contains("iphone") || ua.contains("android") {
            "Mobile"
        } else if os == UNKNOWN {
            UNKNOWN
        } else {
            "Desktop"
        };

        Self {
            device: device.into(),
            browser: browser.into(),
            os: os.into(),
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ua = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Self::parse(ua)
    }

    pub fn into_session(self, user_id: Uuid, ip: Option<String>) -> NewSession {
        NewSession {
            user_id,
            device: self.device,
            browser: self.browser,
            os: self.os,
            ip,
        }
    }
}

/// Client address as reported by a reverse proxy.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());
    let real = headers.get("x-real-ip").and_then(|v| v.to_str().ok());

    forwarded
        .or(real)
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}
