//! Source positions attached to tokens, expression nodes and errors.

use std::fmt;

/// A 1-based line/column position in an EL source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileLocation {
    pub line: usize,
    pub column: usize,
}

impl FileLocation {
    pub fn new(line: usize, column: usize) -> Self {
        FileLocation { line, column }
    }
}

impl Default for FileLocation {
    fn default() -> Self {
        FileLocation { line: 1, column: 1 }
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(FileLocation::new(12, 3).to_string(), "line 12, column 3");
    }

    #[test]
    fn default_is_first_column_of_first_line() {
        assert_eq!(FileLocation::default(), FileLocation::new(1, 1));
    }
}
