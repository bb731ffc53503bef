//! The per-session candidate record and its character rule sets.

/// Provider-assigned identity of a candidate, unique within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

/// Semantic tags attached to a candidate by the provider. Tags drive the
/// filter-bucket membership of the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemTag {
    Namespace,
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
    Method,
    ExtensionMethod,
    Property,
    Field,
    Local,
    Parameter,
    Constant,
    Event,
    Keyword,
    Snippet,
    Operator,
    TypeParameter,
}

/// Ordinal preselection strength. Higher values are preselected more eagerly.
pub mod match_priority {
    /// No preselection preference.
    pub const DEFAULT: i32 = 0;
    /// Items at or above this value are preselected over ordinary matches.
    pub const PRESELECT: i32 = i32::MAX / 2;
}

/// How strongly the item wants to be selected when it becomes the best match
/// with no filter text typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionBehavior {
    #[default]
    Default,
    SoftSelection,
    HardSelection,
}

/// One entry of an ordered character rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterRule {
    /// Membership admits the character.
    Add(Vec<char>),
    /// Membership rejects the character.
    Remove(Vec<char>),
    /// Membership decides unconditionally; evaluation stops here.
    Replace(Vec<char>),
}

/// Ordered rule list overriding a language-level default character set.
///
/// Rules are evaluated in order and the first rule mentioning the character
/// wins; a `Replace` rule always terminates evaluation. Falling through the
/// whole list defers to the default set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterRules {
    rules: Vec<CharacterRule>,
}

impl CharacterRules {
    pub fn new(rules: Vec<CharacterRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn admits(&self, ch: char, default_set: &[char]) -> bool {
        for rule in &self.rules {
            match rule {
                CharacterRule::Add(chars) => {
                    if chars.contains(&ch) {
                        return true;
                    }
                }
                CharacterRule::Remove(chars) => {
                    if chars.contains(&ch) {
                        return false;
                    }
                }
                CharacterRule::Replace(chars) => return chars.contains(&ch),
            }
        }
        default_set.contains(&ch)
    }

    /// Characters this rule list can admit regardless of the default set.
    pub(crate) fn explicitly_admitted(&self) -> impl Iterator<Item = char> + '_ {
        self.rules.iter().flat_map(|rule| {
            let chars: &[char] = match rule {
                CharacterRule::Add(chars) | CharacterRule::Replace(chars) => chars,
                CharacterRule::Remove(_) => &[],
            };
            chars.iter().copied()
        })
    }
}

/// One completion suggestion surfaced by the provider for this session.
///
/// Immutable once created; the session owns the list and discards it when the
/// session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionItem {
    pub id: ItemId,
    pub display_text: String,
    pub display_text_prefix: String,
    pub display_text_suffix: String,
    /// Text the pattern matcher runs against; defaults to the display text.
    pub filter_text: String,
    pub additional_filter_texts: Vec<String>,
    pub sort_text: String,
    pub tags: Vec<ItemTag>,
    pub commit_rules: CharacterRules,
    pub filter_rules: CharacterRules,
    pub match_priority: i32,
    pub selection_behavior: SelectionBehavior,
    /// Produced by the expanded (unimported) provider pass.
    pub is_expanded: bool,
    /// Starred by an external ranking service.
    pub is_preferred: bool,
}

impl CompletionItem {
    pub fn new(id: ItemId, display_text: impl Into<String>) -> Self {
        let display_text = display_text.into();
        Self {
            id,
            filter_text: display_text.clone(),
            sort_text: display_text.clone(),
            display_text,
            display_text_prefix: String::new(),
            display_text_suffix: String::new(),
            additional_filter_texts: Vec::new(),
            tags: Vec::new(),
            commit_rules: CharacterRules::default(),
            filter_rules: CharacterRules::default(),
            match_priority: match_priority::DEFAULT,
            selection_behavior: SelectionBehavior::Default,
            is_expanded: false,
            is_preferred: false,
        }
    }

    pub fn with_tags(mut self, tags: Vec<ItemTag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_filter_text(mut self, filter_text: impl Into<String>) -> Self {
        self.filter_text = filter_text.into();
        self
    }

    pub fn with_additional_filter_texts(mut self, texts: Vec<String>) -> Self {
        self.additional_filter_texts = texts;
        self
    }

    pub fn with_commit_rules(mut self, rules: CharacterRules) -> Self {
        self.commit_rules = rules;
        self
    }

    pub fn with_filter_rules(mut self, rules: CharacterRules) -> Self {
        self.filter_rules = rules;
        self
    }

    pub fn with_match_priority(mut self, priority: i32) -> Self {
        self.match_priority = priority;
        self
    }

    pub fn with_selection_behavior(mut self, behavior: SelectionBehavior) -> Self {
        self.selection_behavior = behavior;
        self
    }

    pub fn expanded(mut self) -> Self {
        self.is_expanded = true;
        self
    }

    pub fn preferred(mut self) -> Self {
        self.is_preferred = true;
        self
    }

    /// Key under which commits of this item are remembered across sessions.
    pub fn mru_key(&self) -> &str {
        if self.filter_text.is_empty() {
            &self.display_text
        } else {
            &self.filter_text
        }
    }

    pub fn full_display_text(&self) -> String {
        let mut out = String::with_capacity(
            self.display_text_prefix.len() + self.display_text.len() + self.display_text_suffix.len(),
        );
        out.push_str(&self.display_text_prefix);
        out.push_str(&self.display_text);
        out.push_str(&self.display_text_suffix);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rule_admits_before_default() {
        let rules = CharacterRules::new(vec![CharacterRule::Add(vec!['('])]);
        assert!(rules.admits('(', &[]));
        assert!(rules.admits('.', &['.']));
        assert!(!rules.admits(';', &[]));
    }

    #[test]
    fn remove_rule_wins_over_default_set() {
        let rules = CharacterRules::new(vec![
            CharacterRule::Remove(vec!['.']),
            CharacterRule::Add(vec!['(']),
        ]);
        // Remove('.') beats the default set containing '.'.
        assert!(!rules.admits('.', &['.']));
        assert!(rules.admits('(', &['.']));
    }

    #[test]
    fn replace_rule_stops_evaluation() {
        let rules = CharacterRules::new(vec![
            CharacterRule::Replace(vec!['!']),
            CharacterRule::Add(vec!['?']),
        ]);
        assert!(rules.admits('!', &[]));
        // The Add after Replace is unreachable, and the default set is ignored.
        assert!(!rules.admits('?', &['?']));
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = CharacterRules::new(vec![
            CharacterRule::Add(vec![',']),
            CharacterRule::Remove(vec![',']),
        ]);
        assert!(rules.admits(',', &[]));
    }

    #[test]
    fn mru_key_prefers_filter_text() {
        let item = CompletionItem::new(ItemId(1), "★ Console").with_filter_text("Console");
        assert_eq!(item.mru_key(), "Console");
    }
}
