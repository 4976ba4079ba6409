//! Pulls exactly one SQL statement out of free-form model output.
//!
//! Models wrap statements in code fences, lead with prose, or trail explanations after the
//! statement. The parser accepts all of those shapes and fails with [`GenerationError`]
//! instead of passing anything that does not start with a SQL keyword to the database.

use regex::Regex;
use std::error::Error;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Keywords a statement may begin with.
const STATEMENT_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "VALUES", "FROM", "SHOW", "DESCRIBE", "EXPLAIN", "SUMMARIZE", "PRAGMA",
    "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP",
];

/// Keywords that start a statement when found at the head of a prose line. `FROM` is left
/// out because it opens too many English sentences.
const LINE_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "VALUES", "SHOW", "DESCRIBE", "EXPLAIN", "INSERT", "UPDATE", "DELETE",
    "CREATE", "ALTER", "DROP",
];

const EXCERPT_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    EmptyResponse,
    NoStatement { response: String },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::EmptyResponse => write!(f, "The model returned an empty response"),
            GenerationError::NoStatement { response } => write!(
                f,
                "No SQL statement found in the model response: {}",
                excerpt(response)
            ),
        }
    }
}

impl Error for GenerationError {}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?is)```[ \t]*(?:sqlite|sql|duckdb|postgresql|postgres|mysql)?[ \t]*\r?\n?(.*?)(?:```|\z)")
            .expect("fence pattern is valid")
    })
}

// Uppercase keywords are trusted anywhere; a lowercase `select` only when a `from` follows it.
fn inline_regex() -> &'static Regex {
    static INLINE: OnceLock<Regex> = OnceLock::new();
    INLINE.get_or_init(|| {
        Regex::new(r"\b(?:SELECT|WITH)\s|(?i:\bselect\s[^;]*?\bfrom\s)")
            .expect("inline pattern is valid")
    })
}

fn cte_line_regex() -> &'static Regex {
    static CTE: OnceLock<Regex> = OnceLock::new();
    CTE.get_or_init(|| {
        Regex::new(r#"(?i)^\s*with\s*$|^\s*with\s+(?:recursive\s+)?"?\w+"?(?:\s*\([^)]*\))?\s+as\s*(?:not\s+)?(?:materialized\s+)?\("#)
            .expect("cte pattern is valid")
    })
}

/// Extracts the first SQL statement from `content`, without its terminating semicolon.
pub fn extract_sql(content: &str) -> Result<String, GenerationError> {
    if content.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let candidate = from_fenced_block(content)
        .or_else(|| from_keyword_lines(content))
        .or_else(|| from_inline_keyword(content));

    match candidate.map(|c| first_statement(&c)) {
        Some(sql) if starts_with_statement_keyword(&sql) => {
            debug!("Extracted SQL: {}", sql);
            Ok(sql)
        }
        _ => Err(GenerationError::NoStatement {
            response: content.to_string(),
        }),
    }
}

/// The first keyword of `sql`, uppercased, skipping whitespace, comments and opening parens.
pub fn leading_keyword(sql: &str) -> Option<String> {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = trimmed.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            rest = trimmed;
            break;
        }
    }

    let word: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic() || *c == '_')
        .collect();
    if word.is_empty() {
        None
    } else {
        Some(word.to_ascii_uppercase())
    }
}

fn starts_with_statement_keyword(sql: &str) -> bool {
    leading_keyword(sql).is_some_and(|kw| STATEMENT_KEYWORDS.contains(&kw.as_str()))
}

fn from_fenced_block(content: &str) -> Option<String> {
    fence_regex()
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|body| body.as_str().trim().to_string())
        .find(|body| starts_with_statement_keyword(body))
}

// A keyword line counts only when the keyword is written in one case throughout, so
// "SELECT" and "select" qualify while prose such as "With that in mind" does not.
fn is_keyword_line(line: &str) -> bool {
    let word: String = line
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let single_case = word == word.to_ascii_uppercase() || word == word.to_ascii_lowercase();
    let keyword = word.to_ascii_uppercase();
    if !single_case || !LINE_KEYWORDS.contains(&keyword.as_str()) {
        return false;
    }
    // "with" also opens ordinary sentences; only a common table expression counts.
    keyword != "WITH" || cte_line_regex().is_match(line)
}

/// Words that may follow a capitalized identifier inside a statement.
const CLAUSE_WORDS: &[&str] = &["as", "and", "or", "asc", "desc"];

// Continuation lines stop at the first line that reads like a sentence: one ending in
// sentence punctuation, or one that opens with a capitalized word followed by a lowercase one.
fn is_prose_line(line: &str) -> bool {
    let line = line.trim();
    if line.ends_with(['.', '!']) {
        return true;
    }

    let mut words = line.split_whitespace();
    let (Some(first), Some(second)) = (words.next(), words.next()) else {
        return false;
    };
    let mut first_chars = first.chars();
    let title_case = first_chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && first_chars.clone().any(|c| c.is_ascii_lowercase())
        && first_chars.all(|c| c.is_ascii_alphabetic() || c == '\'');
    let lowercase_word = second.chars().all(|c| c.is_ascii_lowercase())
        && !CLAUSE_WORDS.contains(&second);
    title_case && lowercase_word
}

fn from_keyword_lines(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.iter().position(|line| is_keyword_line(line))?;

    let mut sql = lines[start].trim().to_string();
    if !sql.ends_with(';') {
        for next_line in &lines[start + 1..] {
            let next_line = next_line.trim_end();
            if next_line.trim().is_empty()
                || next_line.trim_start().starts_with("```")
                || is_prose_line(next_line)
            {
                break;
            }
            sql.push('\n');
            sql.push_str(next_line);
            if next_line.ends_with(';') {
                break;
            }
        }
    }
    Some(sql)
}

fn from_inline_keyword(content: &str) -> Option<String> {
    let found = inline_regex().find(content)?;
    Some(content[found.start()..].to_string())
}

/// Cuts `sql` at the first semicolon that is not inside a string, identifier or comment.
fn first_statement(sql: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Code,
        Single,
        Double,
        LineComment,
        BlockComment,
    }

    let mut mode = Mode::Code;
    let mut chars = sql.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match mode {
            Mode::Code => match c {
                ';' => return sql[..idx].trim().to_string(),
                '\'' => mode = Mode::Single,
                '"' => mode = Mode::Double,
                '-' if chars.peek().map(|(_, n)| *n) == Some('-') => {
                    chars.next();
                    mode = Mode::LineComment;
                }
                '/' if chars.peek().map(|(_, n)| *n) == Some('*') => {
                    chars.next();
                    mode = Mode::BlockComment;
                }
                _ => {}
            },
            Mode::Single if c == '\'' => mode = Mode::Code,
            Mode::Double if c == '"' => mode = Mode::Code,
            Mode::LineComment if c == '\n' => mode = Mode::Code,
            Mode::BlockComment if c == '*' && chars.peek().map(|(_, n)| *n) == Some('/') => {
                chars.next();
                mode = Mode::Code;
            }
            _ => {}
        }
    }
    sql.trim().to_string()
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= EXCERPT_LEN {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(EXCERPT_LEN).collect::<String>())
    }
}
