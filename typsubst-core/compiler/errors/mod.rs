use crate::compiler::analysis::variance::Variance;
use std::fmt;

/// No sound substitution exists for a type under a map.
///
/// Raised when an `in` position would have to accept a replacement that only
/// carries `out` (read-only) information and the slot declares no variance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarianceConflict {
    pub parameter: String,
    pub use_site: Variance,
    pub replacement: Variance,
}

impl VarianceConflict {
    pub fn new(parameter: impl Into<String>, use_site: Variance, replacement: Variance) -> Self {
        Self {
            parameter: parameter.into(),
            use_site,
            replacement,
        }
    }
}

impl fmt::Display for VarianceConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot substitute '{}' projection for {} in '{}' position",
            self.replacement, self.parameter, self.use_site
        )
    }
}

impl std::error::Error for VarianceConflict {}

/// Violations of type model invariants, reported by checked constructors
/// and by name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    ArityMismatch { class: String, expected: usize, found: usize },
    UnknownClass { name: String, suggestions: Vec<String> },
    UnknownParameter { name: String, suggestions: Vec<String> },
    DuplicateDeclaration { name: String },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArityMismatch { class, expected, found } => {
                write!(f, "{} expects {} type argument(s), found {}", class, expected, found)
            }
            Self::UnknownClass { name, suggestions } => {
                write!(f, "Unresolved type: {}", name)?;
                write_suggestions(f, suggestions)
            }
            Self::UnknownParameter { name, suggestions } => {
                write!(f, "Unresolved type parameter: {}", name)?;
                write_suggestions(f, suggestions)
            }
            Self::DuplicateDeclaration { name } => {
                write!(f, "{} is already declared", name)
            }
        }
    }
}

fn write_suggestions(f: &mut fmt::Formatter<'_>, suggestions: &[String]) -> fmt::Result {
    if let Some(first) = suggestions.first() {
        write!(f, " (did you mean '{}'?)", first)?;
    }
    Ok(())
}

impl std::error::Error for ModelError {}

/// Errors from the type notation reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Syntax { line: usize, column: usize, message: String },
    Model { line: usize, error: ModelError },
}

impl ParseError {
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax { line, column, message: message.into() }
    }

    pub fn line(&self) -> usize {
        match self {
            Self::Syntax { line, .. } | Self::Model { line, .. } => *line,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { line, column, message } => write!(f, "{}:{}: {}", line, column, message),
            Self::Model { line, error } => write!(f, "{}: {}", line, error),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Model { error, .. } => Some(error),
            Self::Syntax { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(e) => write!(f, "Failed to read config: {}", e),
            Self::Parse(e) => write!(f, "Failed to parse config: {}", e),
            Self::Serialize(e) => write!(f, "Failed to serialize config: {}", e),
            Self::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Serialize(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Read(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Serialize(e)
    }
}

/// Edit distance, used for "did you mean" suggestions.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != *cb);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(diagonal + 1);
        }
    }

    row[b_chars.len()]
}

/// Candidates within `max_distance` edits of `target`, closest first.
pub fn find_similar_names(target: &str, candidates: &[String], max_distance: usize) -> Vec<String> {
    let mut results: Vec<(usize, &String)> = candidates
        .iter()
        .map(|c| (levenshtein_distance(target, c), c))
        .filter(|(dist, _)| *dist <= max_distance && *dist > 0)
        .collect();

    results.sort();
    results.into_iter().take(3).map(|(_, name)| name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("Out", "Out"), 0);
    }

    #[test]
    fn test_similar_names() {
        let names = vec!["String".to_string(), "Int".to_string(), "Strong".to_string()];
        assert_eq!(find_similar_names("Strin", &names, 2), vec!["String", "Strong"]);
        assert!(find_similar_names("Int", &names, 2).is_empty());
    }

    #[test]
    fn test_conflict_message() {
        let conflict = VarianceConflict::new("T", Variance::In, Variance::Out);
        assert_eq!(conflict.to_string(), "cannot substitute 'out' projection for T in 'in' position");
    }
}
