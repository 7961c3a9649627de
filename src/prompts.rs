//! Named instruction templates sent to the LLM.
//!
//! Templates use `{name}` placeholders. Keeping the wording here, away from
//! the dialog code, lets it be changed or localized without touching control
//! flow.

use crate::error::TemplateError;

/// A named template with `{variable}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub text: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, text: &'static str) -> Self {
        Self { name, text }
    }

    /// Names of the placeholders in declaration order (duplicates removed).
    pub fn variables(&self) -> Vec<&'static str> {
        let mut vars = Vec::new();
        for segment in segments(self.text) {
            if let Segment::Var(name) = segment
                && !vars.contains(&name)
            {
                vars.push(name);
            }
        }
        vars
    }

    /// Substitute every placeholder in a single pass, so braces inside the
    /// substituted values are never expanded. Extra values are ignored.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.text.len());
        for segment in segments(self.text) {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(name) => {
                    let value = values
                        .iter()
                        .find(|(k, _)| *k == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| TemplateError::MissingVariable {
                            template: self.name.to_string(),
                            variable: name.to_string(),
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Var(&'a str),
}

/// Split a template into literal text and `{identifier}` placeholders.
/// Braces that do not enclose an identifier stay literal.
fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_identifier(&after[..close]) => {
                if open > 0 {
                    out.push(Segment::Literal(&rest[..open]));
                }
                out.push(Segment::Var(&after[..close]));
                rest = &after[close + 1..];
            }
            _ => {
                out.push(Segment::Literal(&rest[..=open]));
                rest = after;
            }
        }
    }
    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    out
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// System instruction for the email rewrite.
pub const EMAIL_REWRITE_SYSTEM: PromptTemplate = PromptTemplate::new(
    "email_rewrite_system",
    "You are an expert email writer who guarantees that all emails are precise, \
grammatically correct, and easy to understand. The user will provide the type of \
formality and the email text to be corrected; your work is to analyze and fix the \
provided email.",
);

/// Per-request part of the email rewrite.
pub const EMAIL_REWRITE_USER: PromptTemplate =
    PromptTemplate::new("email_rewrite_user", "Formality: {formality}, email: {email}");

/// Retrieval-augmented answer over page chunks.
pub const WEB_ANSWER: PromptTemplate = PromptTemplate::new(
    "web_answer",
    "Answer the following question based only on the provided context:

<context>
{context}
</context>

Question: {input}",
);
