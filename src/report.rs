// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Diagnostics and source-context reporting shared by all pipeline stages.

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Categories of compiler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Semantic,
    Link,
    Runtime,
    Io,
    Cli,
}

fn default_diagnostic_code(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Lex => "ml101",
        ErrorKind::Parse => "ml201",
        ErrorKind::Semantic => "ml301",
        ErrorKind::Link => "ml401",
        ErrorKind::Runtime => "ml501",
        ErrorKind::Io => "ml601",
        ErrorKind::Cli => "ml701",
    }
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    line: u32,
    column: Option<usize>,
    code: String,
    severity: Severity,
    message: String,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            code: default_diagnostic_code(kind).to_string(),
            severity,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn format(&self) -> String {
        let sev = severity_name(self.severity);
        format!("{}: {} [{}] - {}", self.line, sev, self.code, self.message)
    }

    /// Render with a source excerpt and caret when the position is known.
    pub fn format_with_context(&self, lines: Option<&[String]>, use_color: bool) -> String {
        let sev = severity_name(self.severity);
        if self.line == 0 {
            return format!("{sev} [{}]: {}", self.code, self.message);
        }

        let header = match self.column {
            Some(col) => format!("{}:{col}: {sev} [{}]", self.line, self.code),
            None => format!("{}: {sev} [{}]", self.line, self.code),
        };

        let mut out = String::new();
        out.push_str(&header);
        out.push('\n');
        for line in build_context_lines(self.line, self.column, lines, use_color) {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(&format!("{sev}: {}", self.message));
        out
    }
}

fn severity_name(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "WARNING",
        Severity::Error => "ERROR",
    }
}

/// Build the excerpt and caret rows for an error display.
pub fn build_context_lines(
    line_num: u32,
    column: Option<usize>,
    lines: Option<&[String]>,
    use_color: bool,
) -> Vec<String> {
    let mut out = Vec::new();
    let line_idx = line_num.saturating_sub(1) as usize;

    let lines = match lines {
        Some(lines) if !lines.is_empty() => lines,
        _ => {
            out.push(format!("{:>5} | <source unavailable>", line_num));
            return out;
        }
    };

    if line_idx >= lines.len() {
        out.push(format!("{:>5} | <source unavailable>", line_num));
        return out;
    }

    let line = &lines[line_idx];
    out.push(format!("{:>5} | {}", line_num, line));
    if let Some(caret) = caret_row(line, column, use_color) {
        out.push(caret);
    }
    out
}

/// Row of spaces with a caret under the offending column, or None when the
/// column is unknown.
pub fn caret_row(line: &str, column: Option<usize>, use_color: bool) -> Option<String> {
    let col = match column {
        Some(col) if col > 0 => col,
        _ => return None,
    };
    let pad: String = line
        .chars()
        .take(col - 1)
        .map(|ch| if ch == '\t' { '\t' } else { ' ' })
        .collect();
    let caret = if use_color { "\x1b[31m^\x1b[0m" } else { "^" };
    Some(format!("{:>5} | {pad}{caret}", ""))
}
