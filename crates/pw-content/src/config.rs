//! Loader configuration.

/// Default file name of the reserved game-rules document.
pub const DEFAULT_RULES_FILE: &str = "rules.json";

/// Load-priority conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityRules {
    /// Convention tokens and their priority, lower loads first.
    pub tiers: Vec<(String, i32)>,
    /// Priority of documents matching no token.
    pub default_tier: i32,
    /// Added to documents that only declare relationships.
    pub relationship_penalty: i32,
}

impl Default for PriorityRules {
    fn default() -> Self {
        Self {
            tiers: vec![
                ("core".to_string(), 0),
                ("base".to_string(), 100),
                ("expansion".to_string(), 200),
                ("generated".to_string(), 300),
            ],
            default_tier: 100,
            relationship_penalty: 50,
        }
    }
}

impl PriorityRules {
    /// Priority of a convention token, matched case-insensitively.
    pub fn tier_of(&self, token: &str) -> Option<i32> {
        self.tiers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, priority)| *priority)
    }
}

/// Configuration for [`ContentLoader`](crate::ContentLoader).
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Abort on the first document error instead of skipping the document.
    pub strict: bool,
    /// Run structural validation after loading.
    pub validate: bool,
    /// File name of the reserved rules document.
    pub rules_file: String,
    /// Load-priority conventions.
    pub priorities: PriorityRules,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            strict: false,
            validate: true,
            rules_file: DEFAULT_RULES_FILE.to_string(),
            priorities: PriorityRules::default(),
        }
    }
}

impl LoaderConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Enable or disable structural validation.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Set the rules document file name.
    pub fn with_rules_file(mut self, name: impl Into<String>) -> Self {
        self.rules_file = name.into();
        self
    }

    /// Add or override a convention token.
    pub fn with_tier(mut self, token: impl Into<String>, priority: i32) -> Self {
        let token = token.into();
        match self
            .priorities
            .tiers
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(&token))
        {
            Some(entry) => entry.1 = priority,
            None => self.priorities.tiers.push((token, priority)),
        }
        self
    }

    /// Set the priority of documents matching no token.
    pub fn with_default_tier(mut self, priority: i32) -> Self {
        self.priorities.default_tier = priority;
        self
    }

    /// Set the relationship-only penalty.
    pub fn with_relationship_penalty(mut self, penalty: i32) -> Self {
        self.priorities.relationship_penalty = penalty;
        self
    }
}
