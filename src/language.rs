use std::{fmt, str::FromStr};

use crate::error::Error;

/// Source languages the normalizer knows how to canonicalize.
///
/// Anything else is passed through untouched and never indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    C,
    Cpp,
    Java,
    JavaScript,
    Python,
    Xml,
    Html,
}

/// How comments are written in a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `/* block */` and `// line`.
    CFamily,
    /// `# line`, with triple-quoted strings used as docstrings.
    Script,
    /// `<!-- markup -->`.
    Markup,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::C,
        Language::Cpp,
        Language::Java,
        Language::JavaScript,
        Language::Python,
        Language::Xml,
        Language::Html,
    ];

    /// Map a file extension (with or without the leading dot, any case).
    ///
    /// # Examples
    ///
    /// ```
    /// use codevec::language::Language;
    ///
    /// assert_eq!(Language::from_extension(".CC"), Some(Language::Cpp));
    /// assert_eq!(Language::from_extension("h"), Some(Language::C));
    /// assert_eq!(Language::from_extension(".rs"), None);
    /// ```
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "c" | "h" => Some(Self::C),
            "cc" | "cpp" => Some(Self::Cpp),
            "java" => Some(Self::Java),
            "js" => Some(Self::JavaScript),
            "py" => Some(Self::Python),
            "xml" => Some(Self::Xml),
            "html" => Some(Self::Html),
            _ => None,
        }
    }

    pub fn comment_style(self) -> CommentStyle {
        match self {
            Self::C | Self::Cpp | Self::Java | Self::JavaScript => {
                CommentStyle::CFamily
            }
            Self::Python => CommentStyle::Script,
            Self::Xml | Self::Html => CommentStyle::Markup,
        }
    }

    /// Curly-brace languages whose string literals are masked.
    pub fn masks_strings(self) -> bool {
        self.comment_style() == CommentStyle::CFamily
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Xml => "xml",
            Self::Html => "html",
        }
    }
}

/// Accepts a language name (`python`) or an extension (`.py`, `py`).
impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.tag() == lowered)
            .or_else(|| Language::from_extension(&lowered))
            .ok_or_else(|| Error::Config(format!("unknown language: {s}")))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
