use std::fmt::{Display, Formatter};

/// Where an item element, or one of its metadata elements, was declared.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ElementLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl ElementLocation {
    pub fn new<S: Into<String>>(file: S, line: u32, column: u32) -> Self {
        ElementLocation {
            file: file.into(),
            line,
            column,
        }
    }
}

impl Display for ElementLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({},{})", self.file, self.line, self.column)
    }
}
