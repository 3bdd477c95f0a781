//! Signature records and the `.sig` text format.
//!
//! A compiled artifact records, for every external symbol it references, the
//! fully-qualified name plus the *typed* signature (compiler type printer)
//! and the *erased* signature (runtime view). The on-disk cache re-resolves
//! these before reusing an artifact.
//!
//! File format:
//!
//! ```text
//! SIGNATURES:
//! <typed-1>
//! <erased-1>
//!
//! <typed-2>
//! <erased-2>
//! ```

const SIG_HEADER: &str = "SIGNATURES:";

/// The recorded identity of one referenced symbol.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SignatureRecord {
    pub fq: String,
    pub typed: String,
    pub erased: String,
}

impl SignatureRecord {
    pub fn new(fq: impl Into<String>, typed: impl Into<String>, erased: impl Into<String>) -> Self {
        Self {
            fq: fq.into(),
            typed: typed.into(),
            erased: erased.into(),
        }
    }

    /// Recover the fully-qualified name from a typed signature: everything
    /// before the parameter list or the result ascription.
    pub fn fq_of_typed(typed: &str) -> &str {
        let end = typed
            .find('(')
            .or_else(|| typed.find(':'))
            .unwrap_or(typed.len());
        typed[..end].trim_end()
    }

    pub fn from_pair(typed: &str, erased: &str) -> Self {
        Self {
            fq: Self::fq_of_typed(typed).to_owned(),
            typed: typed.to_owned(),
            erased: erased.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigFileError {
    #[error("missing SIGNATURES: header")]
    MissingHeader,
    #[error("dangling typed signature `{0}` without an erased line")]
    DanglingTyped(String),
}

/// Render records into the `.sig` text format.
pub fn render_sig_file(records: &[SignatureRecord]) -> String {
    let mut out = String::from(SIG_HEADER);
    out.push('\n');
    for record in records {
        out.push_str(&record.typed);
        out.push('\n');
        out.push_str(&record.erased);
        out.push('\n');
        out.push('\n');
    }
    out
}

/// Parse a `.sig` file back into records. Blank lines between pairs are
/// tolerated in any quantity.
pub fn parse_sig_file(text: &str) -> Result<Vec<SignatureRecord>, SigFileError> {
    let mut lines = text.lines();
    match lines.next() {
        Some(line) if line.trim() == SIG_HEADER => {}
        _ => return Err(SigFileError::MissingHeader),
    }

    let mut records = Vec::new();
    let mut pending: Option<String> = None;
    for line in lines {
        let line = line.trim_end();
        if line.is_empty() {
            if let Some(typed) = pending.take() {
                return Err(SigFileError::DanglingTyped(typed));
            }
            continue;
        }
        match pending.take() {
            None => pending = Some(line.to_owned()),
            Some(typed) => records.push(SignatureRecord::from_pair(&typed, line)),
        }
    }
    if let Some(typed) = pending {
        return Err(SigFileError::DanglingTyped(typed));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fq_extraction() {
        assert_eq!(
            SignatureRecord::fq_of_typed("Str.char_at(Int): Str"),
            "Str.char_at"
        );
        assert_eq!(SignatureRecord::fq_of_typed("User.name: Str"), "User.name");
        assert_eq!(SignatureRecord::fq_of_typed("math"), "math");
    }

    #[test]
    fn render_and_parse_round_trip() {
        let records = vec![
            SignatureRecord::new("Str.len", "Str.len(): Int", "Str()i64"),
            SignatureRecord::new("User.name", "User.name: Str", "User.name:str"),
        ];
        let text = render_sig_file(&records);
        assert!(text.starts_with("SIGNATURES:\n"));
        assert_eq!(parse_sig_file(&text).unwrap(), records);
    }

    #[test]
    fn parse_rejects_missing_header() {
        assert_eq!(
            parse_sig_file("Str.len(): Int\nStr()i64\n"),
            Err(SigFileError::MissingHeader)
        );
    }

    #[test]
    fn parse_rejects_odd_pair() {
        let text = "SIGNATURES:\nStr.len(): Int\n";
        assert!(matches!(
            parse_sig_file(text),
            Err(SigFileError::DanglingTyped(_))
        ));
    }

    #[test]
    fn empty_file_is_empty_records() {
        assert_eq!(parse_sig_file("SIGNATURES:\n").unwrap(), Vec::new());
    }
}
