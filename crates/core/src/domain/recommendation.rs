use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade call attached to a recommendation or a logged prediction row.
///
/// Unknown action text is kept verbatim in `Other` so a log rewrite never
/// alters what an earlier run wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Action {
    Buy,
    Sell,
    Hold,
    /// Marks a synthetic evaluation row.
    Summary,
    Other(String),
}

impl Action {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Action::Buy,
            "SELL" => Action::Sell,
            "HOLD" => Action::Hold,
            "SUMMARY" => Action::Summary,
            _ => Action::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
            Action::Summary => "SUMMARY",
            Action::Other(s) => s,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Action::parse(&s)
    }
}

impl From<Action> for String {
    fn from(a: Action) -> Self {
        a.as_str().to_string()
    }
}

/// One `{ticker, action, reason}` triple from the recommendation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub ticker: String,
    pub action: Action,
    pub reason: String,
    /// Free-form; the recorder fills `n/a` when the engine leaves it out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_actions_case_insensitively() {
        assert_eq!(Action::parse(" buy "), Action::Buy);
        assert_eq!(Action::parse("Sell"), Action::Sell);
        assert_eq!(Action::parse("HOLD"), Action::Hold);
        assert_eq!(Action::parse("summary"), Action::Summary);
    }

    #[test]
    fn keeps_unknown_action_text() {
        let a = Action::parse("Strong Buy");
        assert_eq!(a, Action::Other("Strong Buy".to_string()));
        assert_eq!(a.to_string(), "Strong Buy");
    }

    #[test]
    fn unknown_action_keeps_surrounding_whitespace() {
        let raw = " Strong Buy ";
        let a = Action::parse(raw);
        assert_eq!(a.as_str(), raw);
        assert_eq!(String::from(a), raw);
    }
}
