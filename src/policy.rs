//! Command policy for version-control invocations.
//!
//! Sub-commands are split into words with POSIX shell quoting rules and only
//! the leading word is checked against an allow-list. Arguments after an
//! allowed verb pass through untouched, so the exposure is bounded by what
//! the allowed verbs themselves can do.

use std::collections::BTreeSet;

use crate::error::PolicyViolation;

/// Version-control sub-commands permitted by default.
pub const DEFAULT_ALLOWED_VCS_COMMANDS: &[&str] =
    &["status", "add", "commit", "push", "pull", "log", "diff"];

/// Allow-list of leading verbs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPolicy {
    allowed: BTreeSet<String>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_VCS_COMMANDS.iter().copied())
    }
}

impl CommandPolicy {
    /// Creates a policy allowing exactly the given verbs.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns whether `verb` is on the allow-list.
    pub fn is_allowed(&self, verb: &str) -> bool {
        self.allowed.contains(verb)
    }

    /// Returns the allowed verbs in sorted order.
    pub fn allowed(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }

    /// Splits `raw` into shell words and checks the leading one.
    ///
    /// Nothing is executed here; the caller gets back the parsed command or
    /// the reason it was rejected.
    pub fn check(&self, raw: &str) -> Result<AllowedCommand, PolicyViolation> {
        let mut words = shell_words::split(raw)
            .map_err(|e| PolicyViolation::Unparseable(e.to_string()))?
            .into_iter();

        let verb = words.next().ok_or(PolicyViolation::Empty)?;
        if !self.is_allowed(&verb) {
            return Err(PolicyViolation::NotAllowed(verb));
        }

        Ok(AllowedCommand {
            verb,
            args: words.collect(),
        })
    }
}

/// A sub-command that passed the policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedCommand {
    verb: String,
    args: Vec<String>,
}

impl AllowedCommand {
    /// The allowed leading word.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Arguments following the verb.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Verb followed by its arguments, ready to pass to the program.
    pub fn into_words(self) -> Vec<String> {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.verb);
        words.extend(self.args);
        words
    }
}
