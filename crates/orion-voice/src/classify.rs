/// Verbs that signal the user wants something done rather than a chat reply.
///
/// Covers retrieval, creation, mutation, deletion, computation,
/// communication and scheduling.
pub const DEFAULT_ACTION_KEYWORDS: &[&str] = &[
    "search", "find", "look up", "get", "fetch", "retrieve",
    "create", "generate", "make", "build", "add", "save",
    "update", "modify", "change", "edit", "delete", "remove",
    "calculate", "compute", "execute", "run", "perform",
    "send", "email", "message", "notify", "alert",
    "book", "schedule", "remind", "set", "configure",
];

/// Case-insensitive substring test against an action lexicon.
///
/// Coarse on purpose: "get" also matches "forget". There is no confidence
/// score and no correction path.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    keywords: Vec<String>,
}

impl IntentClassifier {
    /// Build from a keyword list. Blank entries are ignored.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// Whether `text` contains any action keyword.
    pub fn requires_tool(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Number of keywords in the lexicon.
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Whether the lexicon is empty.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_KEYWORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_phrases() {
        let c = IntentClassifier::default();
        assert!(c.requires_tool("search for nearby cafes"));
        assert!(c.requires_tool("Please SCHEDULE a call for Monday"));
        assert!(c.requires_tool("can you look up the weather"));
        assert!(c.requires_tool("Remind me at five"));
    }

    #[test]
    fn test_small_talk() {
        let c = IntentClassifier::default();
        assert!(!c.requires_tool("hello, how are you?"));
        assert!(!c.requires_tool("thanks, that was helpful"));
    }

    #[test]
    fn test_substring_false_positive_is_accepted() {
        // "forget" contains "get".
        assert!(IntentClassifier::default().requires_tool("forget it"));
    }

    #[test]
    fn test_custom_lexicon() {
        let c = IntentClassifier::new(["  Order ", "", "PAY"]);
        assert_eq!(c.len(), 2);
        assert!(c.requires_tool("order a pizza"));
        assert!(c.requires_tool("pay the bill"));
        assert!(!c.requires_tool("search for cafes"));
        assert!(IntentClassifier::new(Vec::<String>::new()).is_empty());
    }
}
