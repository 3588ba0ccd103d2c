//! Browser and device classification from the user-agent string.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Navigator vendor string Chrome reports.
const GOOGLE_VENDOR: &str = "Google Inc.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrowserFamily {
    Chrome,
    Firefox,
    Other,
}

/// Mobile operating system. `None` means the desktop path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobileOs {
    Ios,
    Android,
    None,
}

impl MobileOs {
    /// Key used in an element's `mobile` map.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::None => "",
        }
    }
}

impl fmt::Display for MobileOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Who is looking at the page. Computed once at setup and immutable after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    pub browser: BrowserFamily,
    pub mobile_os: MobileOs,
    pub is_mobile: bool,
    pub user_agent: String,
    /// Page the visitor came from, reported alongside repeat conversions.
    pub referrer: String,
    /// Current page URL, reported alongside repeat conversions.
    pub url: String,
}

impl ClientContext {
    /// Classify a visitor from its user agent and navigator vendor.
    ///
    /// Chrome needs both a `Chrome` token and Google as vendor, which keeps
    /// Chromium forks that still say `Chrome` in their UA out of the
    /// extension path.
    #[must_use]
    pub fn detect(user_agent: &str, vendor: Option<&str>) -> Self {
        let browser = if user_agent.contains("Chrome") && vendor == Some(GOOGLE_VENDOR) {
            BrowserFamily::Chrome
        } else if user_agent.contains("Firefox") {
            BrowserFamily::Firefox
        } else {
            BrowserFamily::Other
        };

        let is_mobile = user_agent.contains("Mobile");
        let mobile_os = if !is_mobile {
            MobileOs::None
        } else if user_agent.contains("Mac OS") {
            MobileOs::Ios
        } else if user_agent.contains("Android") {
            MobileOs::Android
        } else {
            MobileOs::None
        };

        Self {
            browser,
            mobile_os,
            is_mobile,
            user_agent: user_agent.to_string(),
            referrer: String::new(),
            url: String::new(),
        }
    }

    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, referrer: impl Into<String>) -> Self {
        self.url = url.into();
        self.referrer = referrer.into();
        self
    }

    /// Desktop-only rules apply whenever no mobile OS was recognised.
    #[must_use]
    pub fn is_desktop_path(&self) -> bool {
        self.mobile_os == MobileOs::None
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    const CHROME_DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
    const FIREFOX_DESKTOP: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const SAFARI_DESKTOP: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1";
    const CHROME_ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Mobile Safari/537.36";

    #[rstest]
    #[case(CHROME_DESKTOP, Some("Google Inc."), BrowserFamily::Chrome)]
    #[case(CHROME_DESKTOP, None, BrowserFamily::Other)]
    #[case(CHROME_DESKTOP, Some("Brave Software"), BrowserFamily::Other)]
    #[case(FIREFOX_DESKTOP, Some(""), BrowserFamily::Firefox)]
    #[case(SAFARI_DESKTOP, Some("Apple Computer, Inc."), BrowserFamily::Other)]
    fn browser_family(
        #[case] ua: &str,
        #[case] vendor: Option<&str>,
        #[case] expected: BrowserFamily,
    ) {
        assert_eq!(ClientContext::detect(ua, vendor).browser, expected);
    }

    #[rstest]
    #[case(SAFARI_IPHONE, true, MobileOs::Ios)]
    #[case(CHROME_ANDROID, true, MobileOs::Android)]
    #[case(SAFARI_DESKTOP, false, MobileOs::None)]
    #[case("Mozilla/5.0 (Mobile; rv:48.0) Gecko/48.0 Firefox/48.0", true, MobileOs::None)]
    fn device(#[case] ua: &str, #[case] mobile: bool, #[case] os: MobileOs) {
        let client = ClientContext::detect(ua, None);
        assert_eq!(client.is_mobile, mobile);
        assert_eq!(client.mobile_os, os);
    }

    #[test]
    fn desktop_mac_is_not_ios() {
        // "Mac OS" alone without "Mobile" stays on the desktop path.
        let client = ClientContext::detect(SAFARI_DESKTOP, None);
        assert!(client.is_desktop_path());
    }

    #[test]
    fn with_page_sets_diagnostic_fields() {
        let client = ClientContext::detect(FIREFOX_DESKTOP, None)
            .with_page("https://example.com/games", "https://search.example");
        assert_eq!(client.url, "https://example.com/games");
        assert_eq!(client.referrer, "https://search.example");
    }
}
