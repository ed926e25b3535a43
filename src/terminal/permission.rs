//! Desktop notification permission.
//!
//! The terminal asks for permission explicitly. A denied or unsupported state is answered with
//! instructions for the staff member's platform instead of failing silently.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Not asked yet.
    #[default]
    Default,
    Granted,
    Denied,
    /// No notification API, or the page is not served from a secure context.
    Unsupported,
}

impl PermissionState {
    /// Effective state given what the browser reported and whether the page is secure.
    pub fn resolve(reported: Option<PermissionState>, secure_context: bool) -> Self {
        match reported {
            _ if !secure_context => PermissionState::Unsupported,
            None => PermissionState::Unsupported,
            Some(state) => state,
        }
    }

    /// Whether the terminal should show the "enable notifications" button.
    pub fn can_request(&self) -> bool {
        matches!(self, PermissionState::Default)
    }
}

impl FromStr for PermissionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "prompt" => Ok(PermissionState::Default),
            "granted" => Ok(PermissionState::Granted),
            "denied" => Ok(PermissionState::Denied),
            "unsupported" => Ok(PermissionState::Unsupported),
            other => Err(format!("Unknown permission state: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Android,
    Ios,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Chrome,
    Edge,
    Firefox,
    Safari,
    Other,
}

impl Platform {
    pub fn from_user_agent(ua: &str) -> Self {
        let ua = ua.to_ascii_lowercase();
        // iPadOS and iOS also contain "mac os x"
        if ua.contains("iphone") || ua.contains("ipad") {
            Platform::Ios
        } else if ua.contains("android") {
            Platform::Android
        } else if ua.contains("windows") {
            Platform::Windows
        } else if ua.contains("mac os") || ua.contains("macintosh") {
            Platform::MacOs
        } else if ua.contains("linux") || ua.contains("x11") {
            Platform::Linux
        } else {
            Platform::Unknown
        }
    }
}

impl Browser {
    pub fn from_user_agent(ua: &str) -> Self {
        let ua = ua.to_ascii_lowercase();
        if ua.contains("edg/") {
            Browser::Edge
        } else if ua.contains("firefox/") {
            Browser::Firefox
        } else if ua.contains("chrome/") || ua.contains("crios/") {
            Browser::Chrome
        } else if ua.contains("safari/") {
            Browser::Safari
        } else {
            Browser::Other
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
            Platform::Android => "Android",
            Platform::Ios => "iOS",
            Platform::Unknown => "okänd plattform",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PermissionAdvice {
    pub state: PermissionState,
    pub platform: Platform,
    pub browser: Browser,
    pub can_request: bool,
    pub summary: String,
    pub steps: Vec<String>,
}

/// What to tell the staff member about desktop notifications.
pub fn advise(state: PermissionState, user_agent: &str) -> PermissionAdvice {
    let platform = Platform::from_user_agent(user_agent);
    let browser = Browser::from_user_agent(user_agent);

    let (summary, steps) = match state {
        PermissionState::Granted => ("Skrivbordsnotiser är aktiverade.".to_string(), Vec::new()),
        PermissionState::Default => (
            "Klicka på \"Aktivera notiser\" för att få skrivbordsnotiser om nya beställningar."
                .to_string(),
            Vec::new(),
        ),
        PermissionState::Denied => (
            format!("Notiser är blockerade i {browser:?} på {platform}."),
            denied_steps(platform, browser),
        ),
        PermissionState::Unsupported => (
            "Den här sidan kan inte visa skrivbordsnotiser.".to_string(),
            unsupported_steps(platform),
        ),
    };

    PermissionAdvice {
        state,
        platform,
        browser,
        can_request: state.can_request(),
        summary,
        steps,
    }
}

fn denied_steps(platform: Platform, browser: Browser) -> Vec<String> {
    let mut steps: Vec<String> = match browser {
        Browser::Chrome | Browser::Edge => vec![
            "Klicka på hänglåset till vänster om adressfältet.".into(),
            "Välj Webbplatsinställningar och sätt Aviseringar till Tillåt.".into(),
        ],
        Browser::Firefox => vec![
            "Klicka på hänglåset i adressfältet.".into(),
            "Ta bort blockeringen under Behörigheter > Skicka aviseringar.".into(),
        ],
        Browser::Safari => vec![
            "Öppna Safari > Inställningar > Webbplatser > Notiser.".into(),
            "Välj Tillåt för den här webbplatsen.".into(),
        ],
        Browser::Other => vec!["Tillåt aviseringar för den här webbplatsen i webbläsarens inställningar.".into()],
    };

    match platform {
        Platform::Windows => steps.push(
            "Kontrollera att aviseringar för webbläsaren är på under Inställningar > System > Meddelanden."
                .into(),
        ),
        Platform::MacOs => steps.push(
            "Kontrollera att webbläsaren får visa notiser under Systeminställningar > Notiser.".into(),
        ),
        Platform::Android => steps.push(
            "Öppna Inställningar > Appar > webbläsaren > Aviseringar och slå på dem.".into(),
        ),
        Platform::Ios => steps.push(
            "Lägg till sidan på hemskärmen och öppna den därifrån för att kunna ta emot notiser."
                .into(),
        ),
        Platform::Linux | Platform::Unknown => {}
    }

    steps.push("Ladda om sidan efteråt.".into());
    steps
}

fn unsupported_steps(platform: Platform) -> Vec<String> {
    let mut steps = vec!["Öppna terminalen via https, notiser kräver en säker anslutning.".to_string()];
    if platform == Platform::Ios {
        steps.push("På iOS fungerar notiser bara för webbappar som lagts till på hemskärmen.".into());
    }
    steps.push("Nya beställningar visas och hörs fortfarande i terminalen.".into());
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1";

    #[test]
    fn insecure_context_is_unsupported() {
        assert_eq!(
            PermissionState::resolve(Some(PermissionState::Granted), false),
            PermissionState::Unsupported
        );
        assert_eq!(PermissionState::resolve(None, true), PermissionState::Unsupported);
        assert_eq!(
            PermissionState::resolve(Some(PermissionState::Denied), true),
            PermissionState::Denied
        );
    }

    #[test]
    fn detects_platform_and_browser() {
        assert_eq!(Platform::from_user_agent(CHROME_WINDOWS), Platform::Windows);
        assert_eq!(Browser::from_user_agent(CHROME_WINDOWS), Browser::Chrome);
        assert_eq!(Platform::from_user_agent(SAFARI_IPHONE), Platform::Ios);
        assert_eq!(Browser::from_user_agent(SAFARI_IPHONE), Browser::Safari);
    }

    #[test]
    fn denied_gives_platform_specific_steps() {
        let advice = advise(PermissionState::Denied, CHROME_WINDOWS);
        assert!(!advice.can_request);
        assert!(advice.steps.iter().any(|s| s.contains("hänglåset")));
        assert!(advice.steps.iter().any(|s| s.contains("System > Meddelanden")));
    }

    #[test]
    fn only_default_can_be_requested() {
        assert!(advise(PermissionState::Default, CHROME_WINDOWS).can_request);
        assert!(advise(PermissionState::Granted, CHROME_WINDOWS).steps.is_empty());
        let unsupported = advise(PermissionState::Unsupported, SAFARI_IPHONE);
        assert!(unsupported.steps.iter().any(|s| s.contains("hemskärmen")));
    }
}
