//! Comment delimiter catalog.
//!
//! Maps a format name (usually a language) to the pair of tokens that wrap
//! every line of a signature block. The right-hand token is written even for
//! languages whose comments run to end of line, so that every line of a block
//! has the same width.

/// Pseudo-format producing comma-padded delimiters for CSV files.
pub const CSV_FORMAT: &str = "csv";

/// Format used when none is configured.
pub const DEFAULT_FORMAT: &str = "oberon";

/// `(name, left, right)` for every supported format.
pub const COMMENT_STYLES: &[(&str, &str, &str)] = &[
    ("ada", "--", "--"),
    ("actionscript", "//", "//"),
    ("applescript", "--", "--"),
    ("assembly", "# ", " #"),
    ("bash", "# ", " #"),
    ("c", "/*", "*/"),
    ("c#", "# ", " #"),
    ("c++", "//", "//"),
    ("clojure", "; ", " ;"),
    ("coffeescript", "# ", " #"),
    ("css", "/*", "*/"),
    ("delphi", "//", "//"),
    ("erlang", "% ", "  "),
    ("f90", "! ", " !"),
    ("fortran", "C ", " C"),
    ("go", "//", "//"),
    ("haskell", "--", "--"),
    ("haskellb", "  ", "  "),
    ("html", "<!--", " -->"),
    ("ios", "! ", "  "),
    ("java", "//", "//"),
    ("javascript", "//", "//"),
    ("lua", "--", "--"),
    ("matlab", "% ", " %"),
    ("shell", "# ", " #"),
    ("modula2", "(*", "*)"),
    ("oberon", "(*", "*)"),
    ("objectivec", "/*", "*/"),
    ("ocaml", "(*", "*)"),
    ("pascal", "(*", "*)"),
    ("perl", "# ", " #"),
    ("php", "//", "//"),
    ("powershell", "# ", " #"),
    ("python", "# ", " #"),
    ("ruby", "# ", " #"),
    ("sql", "--", "--"),
    ("scala", "//", "//"),
    ("swift", "//", "//"),
    ("tpascal", "{ ", " }"),
    ("vb", "' ", " '"),
    ("xml", "<!--", " -->"),
];

/// Alternate spellings accepted for catalogued names.
const ALIASES: &[(&str, &str)] = &[("FORTRAN", "fortran")];

/// The tokens bracketing every line of a signature block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

impl Delimiters {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// True for the degenerate pair returned for unknown formats.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

/// Look up the delimiters for `name`, or `None` if the format is unknown.
#[must_use]
pub fn find(name: &str) -> Option<Delimiters> {
    if name == CSV_FORMAT {
        return Some(Delimiters::new(" ,", ", "));
    }

    let name = ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canonical)| *canonical);

    COMMENT_STYLES
        .iter()
        .find(|(style, _, _)| *style == name)
        .map(|(_, left, right)| Delimiters::new(*left, *right))
}

/// Look up the delimiters for `name`; unknown names yield empty delimiters.
#[must_use]
pub fn lookup(name: &str) -> Delimiters {
    find(name).unwrap_or_default()
}

/// Whether `name` is a catalogued format (including `csv`).
#[must_use]
pub fn is_known(name: &str) -> bool {
    find(name).is_some()
}

/// Every accepted format name, catalog order, `csv` last.
pub fn names() -> impl Iterator<Item = &'static str> {
    COMMENT_STYLES
        .iter()
        .map(|(name, _, _)| *name)
        .chain(std::iter::once(CSV_FORMAT))
}
