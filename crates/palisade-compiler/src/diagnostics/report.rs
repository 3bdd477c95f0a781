//! Remapped per-compile error reports.
//!
//! After diagnostics are remapped to the original expression text, each one
//! becomes an [`ErrorEntry`]: the source-line text, a 1-based column, and
//! the message. This is the stable host-facing error shape.

/// One remapped diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    /// The full text of the source line the error points into.
    pub line: String,
    /// 1-based column within that line.
    pub column: usize,
    pub message: String,
}

impl ErrorEntry {
    /// Build an entry from a byte offset into `source`.
    pub fn at_offset(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(source.len());
        let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
        let line_end = source[offset..]
            .find('\n')
            .map_or(source.len(), |i| offset + i);
        let column = source[line_start..offset].chars().count() + 1;
        Self {
            line: source[line_start..line_end].to_owned(),
            column,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        writeln!(f, "  {}", self.line)?;
        write!(f, "  {}^", " ".repeat(self.column.saturating_sub(1)))
    }
}

/// All remapped diagnostics of one failed compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticReport {
    pub entries: Vec<ErrorEntry>,
}

impl DiagnosticReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Do any messages contain the given fragment? Convenience for hosts
    /// and tests.
    pub fn mentions(&self, fragment: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(fragment))
    }
}

impl std::fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}
