use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;

/// Coarse client description stored with each session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgent {
    pub browser: Option<String>,
    pub os: Option<String>,
    pub platform: Option<String>,
}

impl UserAgent {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|agent| !agent.is_empty())
            .map(Self::parse)
            .unwrap_or_default()
    }

    pub fn parse(agent: &str) -> Self {
        Self {
            browser: detect_browser(agent).map(String::from),
            os: detect_os(agent).map(String::from),
            platform: detect_platform(agent).map(String::from),
        }
    }
}

// Order matters: Edge and Opera also claim to be Chrome, Chrome claims to be Safari
fn detect_browser(agent: &str) -> Option<&'static str> {
    const BROWSERS: &[(&str, &str)] = &[
        ("Edg/", "Edge"),
        ("OPR/", "Opera"),
        ("Firefox/", "Firefox"),
        ("FxiOS/", "Firefox"),
        ("CriOS/", "Chrome"),
        ("Chrome/", "Chrome"),
        ("Safari/", "Safari"),
        ("curl/", "curl"),
    ];
    BROWSERS
        .iter()
        .find(|(needle, _)| agent.contains(needle))
        .map(|(_, name)| *name)
}

fn detect_os(agent: &str) -> Option<&'static str> {
    const SYSTEMS: &[(&str, &str)] = &[
        ("Windows", "Windows"),
        ("iPhone", "iOS"),
        ("iPad", "iOS"),
        ("Android", "Android"),
        ("Mac OS X", "macOS"),
        ("CrOS", "Chrome OS"),
        ("Linux", "Linux"),
    ];
    SYSTEMS
        .iter()
        .find(|(needle, _)| agent.contains(needle))
        .map(|(_, name)| *name)
}

fn detect_platform(agent: &str) -> Option<&'static str> {
    if agent.contains("iPad") || agent.contains("Tablet") {
        Some("Tablet")
    } else if agent.contains("Mobile") || agent.contains("iPhone") {
        Some("Mobile")
    } else if agent.contains("Windows")
        || agent.contains("Macintosh")
        || agent.contains("X11")
        || agent.contains("CrOS")
    {
        Some("Desktop")
    } else {
        None
    }
}
