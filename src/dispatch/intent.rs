//! Intent rules
//!
//! An ordered list of matchers over normalized command text. The first rule
//! that matches wins; the order is a priority, so `"read the time"` is a
//! read and `"what time is it, goodbye"` reports the time.

/// A recognized command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Open a file by name, or launch an application
    Open(String),
    /// Search for files and open the first match
    Search(String),
    /// Read a file aloud
    Read(String),
    /// Report the local time
    Time,
    /// Say hello
    Greeting,
    /// Say goodbye and stop the agent
    Shutdown,
    /// Anything else, passed through untouched
    Fallback(String),
}

/// One entry in the rule table
pub struct IntentRule {
    /// Name used in logs
    pub name: &'static str,
    matcher: fn(&str) -> Option<Intent>,
}

impl IntentRule {
    /// Try this rule against normalized text
    #[must_use]
    pub fn apply(&self, normalized: &str) -> Option<Intent> {
        (self.matcher)(normalized)
    }
}

/// Rules in priority order
pub const RULES: &[IntentRule] = &[
    IntentRule {
        name: "open",
        matcher: match_open,
    },
    IntentRule {
        name: "search",
        matcher: match_search,
    },
    IntentRule {
        name: "read",
        matcher: match_read,
    },
    IntentRule {
        name: "time",
        matcher: match_time,
    },
    IntentRule {
        name: "greeting",
        matcher: match_greeting,
    },
    IntentRule {
        name: "shutdown",
        matcher: match_shutdown,
    },
];

/// Lowercase, trim, and drop trailing sentence punctuation
#[must_use]
pub fn normalize(command: &str) -> String {
    command
        .trim()
        .to_lowercase()
        .trim_end_matches(['.', '!', '?', ','])
        .trim()
        .to_string()
}

/// Classify a command; exactly one intent is returned
#[must_use]
pub fn classify(command: &str) -> Intent {
    let normalized = normalize(command);
    RULES
        .iter()
        .find_map(|rule| {
            rule.apply(&normalized).inspect(|_| {
                tracing::debug!(rule = rule.name, command = %normalized, "intent matched");
            })
        })
        .unwrap_or_else(|| Intent::Fallback(command.trim().to_string()))
}

fn match_open(text: &str) -> Option<Intent> {
    text.strip_prefix("open ")
        .map(|query| Intent::Open(query.trim().to_string()))
}

fn match_search(text: &str) -> Option<Intent> {
    text.strip_prefix("search for ")
        .map(|query| Intent::Search(query.trim().to_string()))
}

fn match_read(text: &str) -> Option<Intent> {
    let query = text
        .strip_prefix("read file ")
        .or_else(|| text.strip_prefix("read "))
        .or_else(|| text.find("read file").map(|at| &text[at + "read file".len()..]))?;
    Some(Intent::Read(query.trim().to_string()))
}

fn match_time(text: &str) -> Option<Intent> {
    text.contains("time").then_some(Intent::Time)
}

fn match_greeting(text: &str) -> Option<Intent> {
    (text.contains("hello") || text.contains("hi")).then_some(Intent::Greeting)
}

fn match_shutdown(text: &str) -> Option<Intent> {
    ["shutdown", "stop listening", "goodbye"]
        .iter()
        .any(|phrase| text.contains(phrase))
        .then_some(Intent::Shutdown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_rules() {
        assert_eq!(classify("Open Notes."), Intent::Open("notes".to_string()));
        assert_eq!(
            classify("search for budget spreadsheet"),
            Intent::Search("budget spreadsheet".to_string())
        );
        assert_eq!(classify("read notes"), Intent::Read("notes".to_string()));
    }

    #[test]
    fn test_read_file_forms() {
        assert_eq!(classify("read file notes"), Intent::Read("notes".to_string()));
        assert_eq!(
            classify("please read file todo list"),
            Intent::Read("todo list".to_string())
        );
    }

    #[test]
    fn test_priority_order() {
        // "read" outranks "time"
        assert_eq!(classify("read timesheet"), Intent::Read("timesheet".to_string()));
        // "time" outranks "goodbye"
        assert_eq!(classify("what time is it goodbye"), Intent::Time);
        // "open" outranks "hello"
        assert_eq!(classify("open hello world"), Intent::Open("hello world".to_string()));
    }

    #[test]
    fn test_greeting_is_substring_match() {
        assert_eq!(classify("hi"), Intent::Greeting);
        assert_eq!(classify("hello there"), Intent::Greeting);
        assert_eq!(classify("hi, jarvis"), Intent::Greeting);
        assert_eq!(classify("what is this"), Intent::Greeting);
        assert_eq!(classify("which file"), Intent::Greeting);
    }

    #[test]
    fn test_shutdown_phrases() {
        assert_eq!(classify("shutdown"), Intent::Shutdown);
        assert_eq!(classify("please stop listening"), Intent::Shutdown);
        assert_eq!(classify("Goodbye!"), Intent::Shutdown);
    }

    #[test]
    fn test_fallback_keeps_raw_text() {
        assert_eq!(
            classify("  Tell me a joke "),
            Intent::Fallback("Tell me a joke".to_string())
        );
    }

    #[test]
    fn test_bare_verbs_fall_through() {
        assert!(matches!(classify("open"), Intent::Fallback(_)));
        assert!(matches!(classify("search"), Intent::Fallback(_)));
    }
}
