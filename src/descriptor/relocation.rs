//! Symbol-prefix relocation rules attached to descriptors.

use std::fmt;

/// Escape token that declarations use in place of the `.` separator.
pub(crate) const SEPARATOR_ESCAPE: &str = "{}";

/// A `(pattern, replacement)` symbol-prefix rewrite rule.
///
/// Both halves accept the `{}` escape token, which is normalised to `.` so
/// that declarations survive tools that rewrite dotted literals.
///
/// # Examples
///
/// ```
/// use hoist::descriptor::Relocation;
///
/// let rule = Relocation::new("net{}kyori", "kyori");
/// assert_eq!(rule.pattern(), "net.kyori");
/// assert_eq!(rule.replacement(), "kyori");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Relocation {
    pattern: String,
    replacement: String,
}

impl Relocation {
    /// Create a rule, normalising the separator escape in both halves.
    #[must_use]
    pub fn new(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.replace(SEPARATOR_ESCAPE, "."),
            replacement: replacement.replace(SEPARATOR_ESCAPE, "."),
        }
    }

    /// The symbol prefix to rewrite.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The prefix written in place of [`Self::pattern`].
    #[must_use]
    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

impl fmt::Display for Relocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.pattern, self.replacement)
    }
}
