//! Choice router: resolves a free-text reply against a fixed option list.

use serde::{Deserialize, Serialize};

use crate::error::DialogError;

/// One selectable option: a canonical value plus accepted phrasings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl Choice {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            synonyms: Vec::new(),
        }
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms.extend(synonyms.into_iter().map(Into::into));
        self
    }

    /// Text shown to the user: the first synonym, else the value.
    pub fn label(&self) -> &str {
        self.synonyms.first().map(String::as_str).unwrap_or(&self.value)
    }

    fn matches(&self, normalized: &str) -> bool {
        self.value.to_lowercase() == normalized
            || self.synonyms.iter().any(|s| s.to_lowercase() == normalized)
    }
}

/// The result of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundChoice {
    /// Canonical value of the matched choice.
    pub value: String,
    /// Position of the matched choice in its set.
    pub index: usize,
}

/// An ordered set of choices with unique values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Choice>", into = "Vec<Choice>")]
pub struct ChoiceSet {
    choices: Vec<Choice>,
}

impl ChoiceSet {
    /// Build a set. Values are compared case-insensitively for duplicates.
    pub fn new(choices: Vec<Choice>) -> Result<Self, DialogError> {
        for (i, choice) in choices.iter().enumerate() {
            let value = choice.value.to_lowercase();
            if choices[..i].iter().any(|c| c.value.to_lowercase() == value) {
                return Err(DialogError::DuplicateChoice {
                    value: choice.value.clone(),
                });
            }
        }
        Ok(Self { choices })
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Resolve an utterance. Matching is exact after trimming and
    /// lowercasing, against the value, any synonym, or the 1-based position
    /// shown in the rendered list. Declaration order breaks ties.
    pub fn resolve(&self, utterance: &str) -> Option<FoundChoice> {
        let normalized = utterance.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        let by_text = self
            .choices
            .iter()
            .position(|c| c.matches(&normalized));

        let index = by_text.or_else(|| {
            normalized
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=self.choices.len()).contains(n))
                .map(|n| n - 1)
        })?;

        Some(FoundChoice {
            value: self.choices[index].value.clone(),
            index,
        })
    }

    /// Render a prompt line followed by a numbered option list.
    pub fn render(&self, prompt: &str) -> String {
        let mut out = prompt.to_string();
        for (i, choice) in self.choices.iter().enumerate() {
            out.push_str(&format!("\n{}. {}", i + 1, choice.label()));
        }
        out
    }
}

impl TryFrom<Vec<Choice>> for ChoiceSet {
    type Error = DialogError;

    fn try_from(choices: Vec<Choice>) -> Result<Self, Self::Error> {
        Self::new(choices)
    }
}

impl From<ChoiceSet> for Vec<Choice> {
    fn from(set: ChoiceSet) -> Self {
        set.choices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer_choices() -> ChoiceSet {
        ChoiceSet::new(vec![
            Choice::new("done").with_synonyms(["All good"]),
            Choice::new("formal").with_synonyms(["make it formal"]),
            Choice::new("friendly").with_synonyms(["make it friendly"]),
            Choice::new("tryagain").with_synonyms(["Try again"]),
        ])
        .unwrap()
    }

    #[test]
    fn resolves_value_case_insensitively() {
        let set = composer_choices();
        let found = set.resolve("FORMAL").unwrap();
        assert_eq!(found.value, "formal");
        assert_eq!(found.index, 1);
    }

    #[test]
    fn resolves_synonym() {
        let set = composer_choices();
        assert_eq!(set.resolve("all good").unwrap().value, "done");
        assert_eq!(set.resolve("  Try again ").unwrap().value, "tryagain");
    }

    #[test]
    fn resolves_ordinal() {
        let set = composer_choices();
        assert_eq!(set.resolve("3").unwrap().value, "friendly");
        assert!(set.resolve("0").is_none());
        assert!(set.resolve("5").is_none());
    }

    #[test]
    fn partial_text_does_not_match() {
        let set = composer_choices();
        assert!(set.resolve("make it").is_none());
        assert!(set.resolve("good").is_none());
        assert!(set.resolve("").is_none());
    }

    #[test]
    fn resolution_is_idempotent() {
        let set = composer_choices();
        for utterance in ["All good", "make it friendly", "2", "nope"] {
            assert_eq!(set.resolve(utterance), set.resolve(utterance));
        }
    }

    #[test]
    fn first_declared_wins_on_synonym_collision() {
        let set = ChoiceSet::new(vec![
            Choice::new("a").with_synonyms(["shared"]),
            Choice::new("b").with_synonyms(["shared"]),
        ])
        .unwrap();
        assert_eq!(set.resolve("shared").unwrap().value, "a");
    }

    #[test]
    fn value_text_beats_ordinal() {
        let set = ChoiceSet::new(vec![Choice::new("x"), Choice::new("1")]).unwrap();
        assert_eq!(set.resolve("1").unwrap().value, "1");
    }

    #[test]
    fn duplicate_values_rejected() {
        let err = ChoiceSet::new(vec![Choice::new("email"), Choice::new("Email")]).unwrap_err();
        assert!(matches!(err, DialogError::DuplicateChoice { value } if value == "Email"));
    }

    #[test]
    fn render_lists_labels() {
        let set = ChoiceSet::new(vec![
            Choice::new("email").with_synonyms(["email helper"]),
            Choice::new("web"),
        ])
        .unwrap();
        assert_eq!(
            set.render("What do you want to do?"),
            "What do you want to do?\n1. email helper\n2. web"
        );
    }

    #[test]
    fn deserialize_rejects_duplicates() {
        let json = serde_json::json!([{"value": "a"}, {"value": "a"}]);
        assert!(serde_json::from_value::<ChoiceSet>(json).is_err());
    }
}
