use serde::{Deserialize, Serialize};

/// Host-facing completion behavior switches.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionConfig {
    /// Compute unimported-namespace candidates in the background.
    #[serde(default = "default_true")]
    pub expansion_enabled: bool,
    /// Never block an interactive update on the expansion computation; leave
    /// it pending and fold it in on a later refresh instead.
    #[serde(default = "default_true")]
    pub responsive_mode: bool,
    /// Case-sensitive matching for non-language candidate sets.
    #[serde(default)]
    pub case_sensitive_non_language: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            expansion_enabled: true,
            responsive_mode: true,
            case_sensitive_non_language: false,
        }
    }
}
