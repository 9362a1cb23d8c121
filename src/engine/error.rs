// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Structured evaluation errors.
//!
//! Engines report failures as [`EvalError`]. Engines that only have a raw
//! message can use [`EvalError::from_engine_message`], which sorts the text
//! into the error taxonomy and pulls out a line/column when present.

use std::fmt;

/// Position of an error inside a block body (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    /// Line number
    pub line: u32,
    /// Column number, when the engine supplies one
    pub column: Option<u32>,
}

impl SourceLocation {
    /// Create a location with line and column
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line,
            column: Some(column),
        }
    }

    /// Create a location with only a line
    pub fn line(line: u32) -> Self {
        Self { line, column: None }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "line {}, column {}", self.line, column),
            None => write!(f, "line {}", self.line),
        }
    }
}

fn location_suffix(location: &Option<SourceLocation>) -> String {
    match location {
        Some(loc) => format!(" ({})", loc),
        None => String::new(),
    }
}

/// Error kinds, for display and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalErrorKind {
    Compile,
    Runtime,
    UndefinedReference,
    AudioEnvironment,
    Unknown,
}

impl EvalErrorKind {
    /// Name shown to users
    pub fn label(&self) -> &'static str {
        match self {
            EvalErrorKind::Compile => "CompileError",
            EvalErrorKind::Runtime => "RuntimeError",
            EvalErrorKind::UndefinedReference => "UndefinedReferenceError",
            EvalErrorKind::AudioEnvironment => "AudioEnvironmentError",
            EvalErrorKind::Unknown => "UnknownError",
        }
    }
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Evaluation failure reported by the pattern engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// Syntax or parse failure
    #[error("compile error: {message}{}", location_suffix(.location))]
    Compile {
        message: String,
        location: Option<SourceLocation>,
    },

    /// The pattern threw while running
    #[error("runtime error: {message}{}", location_suffix(.location))]
    Runtime {
        message: String,
        location: Option<SourceLocation>,
    },

    /// A name was not found in the shared namespace
    #[error("undefined reference: {name}")]
    UndefinedReference { name: String },

    /// The engine or its audio context failed
    #[error("audio environment error: {message}")]
    AudioEnvironment { message: String },

    /// Anything else
    #[error("unknown error: {message}")]
    Unknown { message: String },
}

const COMPILE_MARKERS: &[&str] = &[
    "syntaxerror",
    "unexpected token",
    "unexpected end of input",
    "parse error",
    "unterminated",
];

const AUDIO_MARKERS: &[&str] = &[
    "audiocontext",
    "audio context",
    "audioworklet",
    "not allowed to start",
    "no audio output",
];

impl EvalError {
    /// Create a compile error
    pub fn compile(message: impl Into<String>) -> Self {
        EvalError::Compile {
            message: message.into(),
            location: None,
        }
    }

    /// Create a runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        EvalError::Runtime {
            message: message.into(),
            location: None,
        }
    }

    /// Create an audio environment error
    pub fn audio(message: impl Into<String>) -> Self {
        EvalError::AudioEnvironment {
            message: message.into(),
        }
    }

    /// Attach a location (ignored by kinds that carry none)
    pub fn at(self, location: SourceLocation) -> Self {
        match self {
            EvalError::Compile { message, .. } => EvalError::Compile {
                message,
                location: Some(location),
            },
            EvalError::Runtime { message, .. } => EvalError::Runtime {
                message,
                location: Some(location),
            },
            other => other,
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> EvalErrorKind {
        match self {
            EvalError::Compile { .. } => EvalErrorKind::Compile,
            EvalError::Runtime { .. } => EvalErrorKind::Runtime,
            EvalError::UndefinedReference { .. } => EvalErrorKind::UndefinedReference,
            EvalError::AudioEnvironment { .. } => EvalErrorKind::AudioEnvironment,
            EvalError::Unknown { .. } => EvalErrorKind::Unknown,
        }
    }

    /// Get the location, if known
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            EvalError::Compile { location, .. } | EvalError::Runtime { location, .. } => *location,
            _ => None,
        }
    }

    /// Classify a raw engine message
    pub fn from_engine_message(raw: &str) -> Self {
        let message = raw.trim().to_string();
        let lower = message.to_ascii_lowercase();

        if let Some(name) = undefined_name(&message) {
            return EvalError::UndefinedReference { name };
        }

        let location = parse_location(&message);

        if COMPILE_MARKERS.iter().any(|m| lower.contains(m)) {
            EvalError::Compile { message, location }
        } else if AUDIO_MARKERS.iter().any(|m| lower.contains(m)) {
            EvalError::AudioEnvironment { message }
        } else if lower.contains("error") || lower.contains("exception") {
            EvalError::Runtime { message, location }
        } else {
            EvalError::Unknown { message }
        }
    }
}

/// Extract `name` from "... name is not defined"
fn undefined_name(message: &str) -> Option<String> {
    let idx = message.find(" is not defined")?;
    let name = message[..idx]
        .rsplit(|c: char| c.is_whitespace() || c == ':')
        .next()?
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`');

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Split trailing ASCII digits off a string
fn split_trailing_number(s: &str) -> Option<(&str, u32)> {
    let digits = s.len() - s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let (rest, number) = s.split_at(s.len() - digits);
    number.parse().ok().map(|n| (rest, n))
}

/// Number following a keyword, e.g. "line 3"
fn keyword_number(lower: &str, keyword: &str) -> Option<u32> {
    let start = lower.find(keyword)? + keyword.len();
    let digits: String = lower[start..]
        .chars()
        .skip_while(|c| *c == ' ')
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Find "line N[, column M]" or a trailing "N:M" / "(N:M)"
fn parse_location(message: &str) -> Option<SourceLocation> {
    let lower = message.to_ascii_lowercase();
    if let Some(line) = keyword_number(&lower, "line") {
        let column = keyword_number(&lower, "column").or_else(|| keyword_number(&lower, "col"));
        return Some(SourceLocation { line, column });
    }

    let trimmed = message.trim_end().trim_end_matches(')');
    let (rest, column) = split_trailing_number(trimmed)?;
    let (_, line) = split_trailing_number(rest.strip_suffix(':')?)?;
    Some(SourceLocation::new(line, column))
}
