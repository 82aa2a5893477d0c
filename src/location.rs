use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// A position in a hikefile, used to anchor error messages and arise
/// references back to the text the user wrote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub path: Rc<PathBuf>,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(path: Rc<PathBuf>, line: u32, column: u32) -> Self {
        Self { path, line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}
