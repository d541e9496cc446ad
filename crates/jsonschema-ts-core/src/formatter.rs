//! Pretty printer for generated declaration text.
//!
//! Works line by line: every line is re-indented from the stack of
//! delimiters that are open when it starts, and members and type aliases are
//! terminated with `;` when the style asks for it. Block comments are
//! re-indented but never scanned for delimiters.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::StyleOptions;
use crate::error::CompileError;

static ENUM_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(export\s+)?(declare\s+)?(const\s+)?enum\s").unwrap());

/// Re-indent `text` and apply `style`. Fails on unbalanced delimiters.
pub fn format(text: &str, style: &StyleOptions) -> Result<String, CompileError> {
    let mut formatter = Formatter::new(style);
    for (index, line) in text.lines().enumerate() {
        formatter.line(index + 1, line.trim())?;
    }
    formatter.finish()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameKind {
    Object,
    Enum,
    Paren,
    Bracket,
}

impl FrameKind {
    fn closer(self) -> char {
        match self {
            FrameKind::Object | FrameKind::Enum => '}',
            FrameKind::Paren => ')',
            FrameKind::Bracket => ']',
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    kind: FrameKind,
    /// Line that opened the frame. Several frames opened on one line share
    /// one indentation level.
    line: usize,
}

struct Formatter<'a> {
    style: &'a StyleOptions,
    stack: Vec<Frame>,
    in_comment: bool,
    statement_is_alias: bool,
    last_line: usize,
    out: Vec<String>,
}

impl<'a> Formatter<'a> {
    fn new(style: &'a StyleOptions) -> Self {
        Self {
            style,
            stack: Vec::new(),
            in_comment: false,
            statement_is_alias: false,
            last_line: 0,
            out: Vec::new(),
        }
    }

    fn line(&mut self, line_no: usize, line: &str) -> Result<(), CompileError> {
        self.last_line = line_no;

        if line.is_empty() {
            if matches!(self.out.last(), Some(previous) if !previous.is_empty()) {
                self.out.push(String::new());
            }
            return Ok(());
        }

        if line.starts_with("//") && !self.in_comment {
            self.emit(self.depth(), line.to_string());
            return Ok(());
        }

        if self.in_comment || line.starts_with("/*") {
            let text = if line.starts_with('*') {
                format!(" {line}")
            } else {
                line.to_string()
            };
            self.emit(self.depth(), text);
            self.in_comment = !line.contains("*/");
            return Ok(());
        }

        if self.stack.is_empty() {
            self.statement_is_alias = line.starts_with("export type ") || line.starts_with("type ");
        }

        let mut indent = None;
        let mut quote: Option<char> = None;
        let mut escaped = false;
        for c in line.chars() {
            if indent.is_none() && !matches!(c, '}' | ')' | ']') {
                indent = Some(self.depth());
            }
            if let Some(open) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == open {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' | '`' => quote = Some(c),
                '{' => {
                    let kind = if self.stack.is_empty() && ENUM_HEAD.is_match(line) {
                        FrameKind::Enum
                    } else {
                        FrameKind::Object
                    };
                    self.stack.push(Frame { kind, line: line_no });
                }
                '(' => self.stack.push(Frame {
                    kind: FrameKind::Paren,
                    line: line_no,
                }),
                '[' => self.stack.push(Frame {
                    kind: FrameKind::Bracket,
                    line: line_no,
                }),
                '}' | ')' | ']' => self.close(c, line_no)?,
                _ => {}
            }
        }
        if let Some(open) = quote {
            return Err(CompileError::Format {
                line: line_no,
                message: format!("unterminated string literal opened with `{open}`"),
            });
        }

        let indent = indent.unwrap_or_else(|| self.depth());
        let mut text = line.to_string();
        if self.style.semi && self.needs_semicolon(line) {
            text.push(';');
        }
        self.emit(indent, text);
        Ok(())
    }

    fn close(&mut self, closer: char, line: usize) -> Result<(), CompileError> {
        match self.stack.pop() {
            Some(frame) if frame.kind.closer() == closer => Ok(()),
            Some(frame) => Err(CompileError::Format {
                line,
                message: format!(
                    "expected `{}` to close line {} but found `{closer}`",
                    frame.kind.closer(),
                    frame.line
                ),
            }),
            None => Err(CompileError::Format {
                line,
                message: format!("unexpected `{closer}`"),
            }),
        }
    }

    fn needs_semicolon(&self, line: &str) -> bool {
        if line.ends_with(['{', '(', '[', ',', ';']) {
            return false;
        }
        match self.stack.last() {
            Some(frame) => frame.kind == FrameKind::Object,
            None => self.statement_is_alias,
        }
    }

    /// Indentation level: one per distinct line holding an open delimiter.
    fn depth(&self) -> usize {
        let mut lines: Vec<usize> = self.stack.iter().map(|frame| frame.line).collect();
        lines.dedup();
        lines.len()
    }

    fn emit(&mut self, depth: usize, text: String) {
        let unit = if self.style.use_tabs {
            "\t".to_string()
        } else {
            " ".repeat(self.style.indent_width)
        };
        self.out.push(format!("{}{text}", unit.repeat(depth)));
    }

    fn finish(mut self) -> Result<String, CompileError> {
        if let Some(frame) = self.stack.last() {
            return Err(CompileError::Format {
                line: self.last_line,
                message: format!(
                    "`{}` expected to close line {} before end of input",
                    frame.kind.closer(),
                    frame.line
                ),
            });
        }
        while matches!(self.out.last(), Some(line) if line.is_empty()) {
            self.out.pop();
        }
        tracing::debug!(lines = self.out.len(), "formatted declarations");

        let mut output = self.out.join("\n");
        output.push('\n');
        Ok(output)
    }
}
