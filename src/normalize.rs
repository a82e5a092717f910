//! Language-aware canonicalization of source text.
//!
//! The steps run in a fixed order:
//!
//! 1. comment removal, chosen by the language's [`CommentStyle`]
//! 2. whitespace normalization
//! 3. boilerplate removal (includes, imports, document scaffolding)
//! 4. string-literal masking for curly-brace languages
//! 5. script extraction for HTML
//!
//! A final whitespace pass tidies lines emptied by steps 3 to 5. Removing one
//! construct can expose another (`#include #include <a.h> <b.h>`), so the
//! whole sequence repeats until the text stops changing.

use std::{borrow::Cow, sync::LazyLock};

use regex::{Captures, Regex};

use crate::{
    language::{CommentStyle, Language},
    script_comments,
    text_util::normalize_whitespace,
};

/// Placeholder substituted for every masked string literal.
pub const STRING_PLACEHOLDER: &str = "STRING";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("normalizer patterns are valid")
}

/// String literals (kept) or comments (dropped) in C-family code. Matching
/// both in one pass keeps `"http://x"` and `"/*"` intact.
static C_COMMENT_OR_STRING: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r#"(?s)"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'|/\*.*?\*/|//[^\n]*"#,
    )
});

static STRING_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    compile(r#"(?s)"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'"#)
});

static TRIPLE_DOUBLE: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(?s)""".*?""""#));

static TRIPLE_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?s)'''.*?'''"));

static MARKUP_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?s)<!--.*?-->"));

static C_INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"#include[ \t]*[<"][\w./]+[>"]"#));

static JAVA_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\bimport[ \t]+(?:static[ \t]+)?[\w.*]+[ \t]*;")
});

static PYTHON_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    compile(concat!(
        r"\bfrom[ \t]+[\w.]+[ \t]+import[ \t]+",
        r"(?:\*|\w+(?:[ \t]+as[ \t]+\w+)?(?:[ \t]*,[ \t]*\w+(?:[ \t]+as[ \t]+\w+)?)*)",
        r"|\bimport[ \t]+[\w.]+(?:[ \t]+as[ \t]+\w+)?",
        r"(?:[ \t]*,[ \t]*[\w.]+(?:[ \t]+as[ \t]+\w+)?)*",
    ))
});

static HTML_SCAFFOLD: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)<!DOCTYPE[^>]*>|</?html(?:\s[^>]*)?>|</?body(?:\s[^>]*)?>")
});

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?is)<script[^>]*>(.*?)</script>"));

/// Produce the canonical text for `code` written in `language`.
///
/// # Examples
///
/// ```
/// use codevec::{language::Language, normalize::normalize};
///
/// let code = "int x = 1; /* block */\n// line\nputs(\"hi\");";
/// assert_eq!(normalize(code, Language::C), "int x = 1;\nputs(STRING);");
/// ```
pub fn normalize(code: &str, language: Language) -> String {
    // A pass that changes the text removes bytes, quote characters or
    // non-space whitespace, so this reaches a fixed point.
    let mut text = normalize_once(code, language);
    loop {
        let next = normalize_once(&text, language);
        if next == text {
            return text;
        }
        text = next;
    }
}

/// Normalize a free-text query the way corpus files of `language` are, or
/// only collapse whitespace when no language is given.
pub fn normalize_query(text: &str, language: Option<Language>) -> String {
    match language {
        Some(language) => normalize(text, language),
        None => normalize_whitespace(text),
    }
}

fn normalize_once(code: &str, language: Language) -> String {
    let without_comments = remove_comments(code, language);
    let collapsed = normalize_whitespace(&without_comments);
    let mut text = remove_boilerplate(&collapsed, language).into_owned();

    if language.masks_strings() {
        text = mask_strings(&text).into_owned();
    }
    if language == Language::Html {
        text = extract_scripts(&text).into_owned();
    }

    normalize_whitespace(&text)
}

/// Normalize by file extension. Unsupported extensions pass through
/// unchanged.
pub fn normalize_for_extension(code: &str, extension: &str) -> String {
    match Language::from_extension(extension) {
        Some(language) => normalize(code, language),
        None => code.to_string(),
    }
}

/// Strip comments according to the language's comment style.
pub fn remove_comments(code: &str, language: Language) -> String {
    match language.comment_style() {
        CommentStyle::CFamily => remove_c_comments(code).into_owned(),
        CommentStyle::Script => remove_script_comments(code),
        CommentStyle::Markup => {
            MARKUP_COMMENT.replace_all(code, "").into_owned()
        }
    }
}

fn remove_c_comments(code: &str) -> Cow<'_, str> {
    C_COMMENT_OR_STRING.replace_all(code, |caps: &Captures| {
        let matched = &caps[0];
        if matched.starts_with("/*") {
            " ".to_string()
        } else if matched.starts_with("//") {
            String::new()
        } else {
            matched.to_string()
        }
    })
}

/// Triple-quoted spans go first since they may contain `#`.
fn remove_script_comments(code: &str) -> String {
    let code = TRIPLE_DOUBLE.replace_all(code, "");
    let code = TRIPLE_SINGLE.replace_all(&code, "");
    script_comments::remove_hash_comments(&code)
}

/// Remove include/import statements and document scaffolding.
pub fn remove_boilerplate(code: &str, language: Language) -> Cow<'_, str> {
    match language {
        Language::C | Language::Cpp => C_INCLUDE.replace_all(code, ""),
        Language::Java => JAVA_IMPORT.replace_all(code, ""),
        Language::Python => PYTHON_IMPORT.replace_all(code, ""),
        Language::Html => HTML_SCAFFOLD.replace_all(code, ""),
        Language::JavaScript | Language::Xml => Cow::Borrowed(code),
    }
}

/// Replace every single- or double-quoted literal with [`STRING_PLACEHOLDER`].
pub fn mask_strings(code: &str) -> Cow<'_, str> {
    STRING_LITERAL.replace_all(code, STRING_PLACEHOLDER)
}

/// Contents of all `<script>` blocks joined by newlines, or the document
/// itself when there are none.
pub fn extract_scripts(code: &str) -> Cow<'_, str> {
    let blocks: Vec<&str> = SCRIPT_BLOCK
        .captures_iter(code)
        .map(|caps| caps.get(1).map_or("", |m| m.as_str()))
        .collect();

    if blocks.is_empty() {
        Cow::Borrowed(code)
    } else {
        Cow::Owned(blocks.join("\n"))
    }
}
