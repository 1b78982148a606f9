//! Tokenizer for command parameters.
//!
//! Handles both parameter styles found on a g-code command line:
//! - Classic words: `S100`, `R`, `cube.gcode`
//! - Extended key=value pairs: `FILENAME=cube.gcode`, `PART="left clip"`
//!
//! Quoted values may contain whitespace and escape sequences.

use std::collections::HashMap;

/// A token parsed from command parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A plain word (unquoted or quoted argument).
    Word(String),
    /// A key=value pair. Keys are upper-cased.
    KeyValue { key: String, value: String },
}

impl Token {
    /// Returns the token as a word if it is one.
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the key-value pair if this is a KeyValue token.
    pub fn as_key_value(&self) -> Option<(&str, &str)> {
        match self {
            Token::KeyValue { key, value } => Some((key, value)),
            _ => None,
        }
    }
}

/// Tokenizes a parameter string.
///
/// - Whitespace-separated tokens
/// - Double or single quoted strings: `"hello world"` → `hello world`
/// - Escape sequences in quotes: `"say \"hi\""` → `say "hi"`
/// - Key=value pairs: `count=3` → KeyValue { key: "COUNT", value: "3" }
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let word = collect_word_or_quoted(&mut chars);
        if word.is_empty() {
            continue;
        }

        match word.find('=') {
            Some(eq_pos) if eq_pos > 0 => tokens.push(Token::KeyValue {
                key: word[..eq_pos].to_uppercase(),
                value: word[eq_pos + 1..].to_string(),
            }),
            _ => tokens.push(Token::Word(word)),
        }
    }

    tokens
}

/// Collects a word, handling quoted strings.
fn collect_word_or_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut result = String::new();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            break;
        }

        if c == '"' || c == '\'' {
            chars.next();
            let quoted = collect_quoted(chars, c);
            result.push_str(&quoted);
            continue;
        }

        chars.next();
        result.push(c);
    }

    result
}

/// Collects characters inside quotes, handling escape sequences.
fn collect_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, quote: char) -> String {
    let mut result = String::new();
    let mut escaped = false;

    for c in chars.by_ref() {
        if escaped {
            match c {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                '\\' => result.push('\\'),
                '"' => result.push('"'),
                '\'' => result.push('\''),
                _ => {
                    // Unknown escape, keep as-is
                    result.push('\\');
                    result.push(c);
                }
            }
            escaped = false;
            continue;
        }

        if c == '\\' {
            escaped = true;
            continue;
        }

        if c == quote {
            break;
        }

        result.push(c);
    }

    result
}

/// Parameters of one command, split into positional words and named values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    words: Vec<String>,
    named: HashMap<String, String>,
}

impl Params {
    pub fn parse(input: &str) -> Self {
        let mut params = Self::default();
        for token in tokenize(input) {
            match token {
                Token::Word(word) => params.words.push(word),
                Token::KeyValue { key, value } => {
                    params.named.insert(key, value);
                }
            }
        }
        params
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Returns a named value. Lookup is case-insensitive.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.named.get(&key.to_uppercase()).map(String::as_str)
    }

    /// Returns true if a classic word starts with `letter` (e.g. `R`).
    pub fn has_letter(&self, letter: char) -> bool {
        self.words
            .iter()
            .any(|w| w.chars().next().is_some_and(|c| c.eq_ignore_ascii_case(&letter)))
    }

    /// Returns the value of a classic letter word: `S100` gives `100`.
    pub fn letter_value(&self, letter: char) -> Option<&str> {
        self.words.iter().find_map(|w| {
            let mut chars = w.chars();
            let first = chars.next()?;
            first
                .eq_ignore_ascii_case(&letter)
                .then(|| chars.as_str())
        })
    }
}

/// Parse error with context for helpful error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The command that failed to parse.
    pub command: String,
    /// Error message describing what went wrong.
    pub message: String,
    /// Optional hint for how to fix the error.
    pub hint: Option<String>,
}

impl ParseError {
    /// Creates a new parse error.
    pub fn new(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Adds a hint to the error.
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        Self {
            hint: Some(hint.into()),
            ..self
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (Hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}
