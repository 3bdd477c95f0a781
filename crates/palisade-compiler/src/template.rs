//! Template preprocessing.
//!
//! Template-mode input is a string literal with `${…}` expression holes.
//! Preprocessing emits one equivalent expression - literal chunks and
//! parenthesized holes joined by the `++` concatenation operator - plus a
//! [`PosMap`] from processed offsets back to the original text, used to
//! remap downstream diagnostics and completion cursors.

/// One alignment point: offsets at and after `processed` (up to the next
/// segment) map linearly onto the original text starting at `original`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    processed: u32,
    original: u32,
}

/// Monotonic offset mapping between processed and original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosMap {
    segments: Vec<Segment>,
}

impl PosMap {
    /// The mapping for expression-mode input: processed == original.
    pub fn identity() -> Self {
        Self {
            segments: vec![Segment {
                processed: 0,
                original: 0,
            }],
        }
    }

    fn push(&mut self, processed: u32, original: u32) {
        self.segments.push(Segment {
            processed,
            original,
        });
    }

    /// Map a processed offset back to the original text.
    pub fn to_original(&self, processed: u32) -> u32 {
        let idx = self
            .segments
            .partition_point(|s| s.processed <= processed)
            .saturating_sub(1);
        let seg = self.segments[idx];
        seg.original + processed.saturating_sub(seg.processed)
    }

    /// Map an original offset into the processed text (cursor math for the
    /// completer). Offsets inside literal chunks land on the chunk start.
    pub fn to_processed(&self, original: u32) -> u32 {
        let idx = self
            .segments
            .partition_point(|s| s.original <= original)
            .saturating_sub(1);
        let seg = self.segments[idx];
        seg.processed + original.saturating_sub(seg.original)
    }
}

impl Default for PosMap {
    fn default() -> Self {
        Self::identity()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unbalanced `${{` at offset {offset}")]
    UnbalancedHole { offset: usize },

    #[error("a setter template must be exactly one `${{…}}` hole")]
    SetterRequiresSingleHole,
}

/// The outcome of template preprocessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    pub text: String,
    pub map: PosMap,
    /// Number of `${…}` holes found.
    pub holes: usize,
    /// True when the whole input was a single hole with no literal text.
    pub pure_hole: bool,
}

enum Piece {
    Literal(String),
    /// Hole body plus its offset in the original input.
    Hole { body: String, original: u32 },
}

/// Split template input into literal chunks and holes, and emit the
/// equivalent single expression.
pub fn preprocess_template(input: &str) -> Result<Preprocessed, TemplateError> {
    let pieces = scan(input)?;
    let holes = pieces
        .iter()
        .filter(|p| matches!(p, Piece::Hole { .. }))
        .count();

    // A template that is exactly one hole passes its expression through.
    if holes == 1 && pieces.len() == 1 {
        let Some(Piece::Hole { body, original }) = pieces.into_iter().next() else {
            unreachable!("single-piece hole checked above");
        };
        let mut map = PosMap { segments: vec![] };
        map.push(0, original);
        return Ok(Preprocessed {
            text: body,
            map,
            holes: 1,
            pure_hole: true,
        });
    }

    let mut text = String::with_capacity(input.len() + 8);
    let mut map = PosMap { segments: vec![] };
    map.push(0, 0);

    let mut first = true;
    for piece in &pieces {
        if !first {
            text.push_str(" ++ ");
        }
        first = false;
        match piece {
            Piece::Literal(chunk) => {
                text.push('"');
                crate::escape::escape_into(chunk, &mut text);
                text.push('"');
            }
            Piece::Hole { body, original } => {
                text.push('(');
                map.push(text.len() as u32, *original);
                text.push_str(body);
                text.push(')');
                map.push(text.len() as u32, original + body.len() as u32);
            }
        }
    }

    // A template with no holes is a single literal expression.
    if pieces.is_empty() {
        text.push_str("\"\"");
    }

    Ok(Preprocessed {
        text,
        map,
        holes,
        pure_hole: false,
    })
}

fn scan(input: &str) -> Result<Vec<Piece>, TemplateError> {
    let bytes = input.as_bytes();
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1) == Some(&b'$') => {
                literal.push('$');
                i += 2;
            }
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                let open = i;
                let body_start = i + 2;
                let body_end = find_hole_end(bytes, body_start)
                    .ok_or(TemplateError::UnbalancedHole { offset: open })?;
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(Piece::Hole {
                    body: input[body_start..body_end].to_owned(),
                    original: body_start as u32,
                });
                i = body_end + 1;
            }
            _ => {
                let c = input[i..].chars().next().expect("index on char boundary");
                literal.push(c);
                i += c.len_utf8();
            }
        }
    }

    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    Ok(pieces)
}

/// Find the offset of the `}` closing a hole body that starts at `start`.
/// Tracks nested braces and skips string literals.
fn find_hole_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            b'"' => {
                i += 1;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => i += 1,
                        b'"' => break,
                        _ => {}
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_becomes_a_literal() {
        let res = preprocess_template("hello").unwrap();
        assert_eq!(res.text, "\"hello\"");
        assert_eq!(res.holes, 0);
        assert!(!res.pure_hole);
    }

    #[test]
    fn empty_template() {
        let res = preprocess_template("").unwrap();
        assert_eq!(res.text, "\"\"");
    }

    #[test]
    fn holes_and_literals_concatenate() {
        let res = preprocess_template("x=${1+2}, y=${3*4}").unwrap();
        assert_eq!(res.text, "\"x=\" ++ (1+2) ++ \", y=\" ++ (3*4)");
        assert_eq!(res.holes, 2);
    }

    #[test]
    fn single_hole_passes_through() {
        let res = preprocess_template("${user.name}").unwrap();
        assert_eq!(res.text, "user.name");
        assert!(res.pure_hole);
        // Offsets map straight into the hole body.
        assert_eq!(res.map.to_original(0), 2);
        assert_eq!(res.map.to_original(5), 7);
    }

    #[test]
    fn escaped_dollar_is_literal() {
        let res = preprocess_template(r"cost: \${1}").unwrap();
        assert_eq!(res.text, "\"cost: ${1}\"");
        assert_eq!(res.holes, 0);
    }

    #[test]
    fn unbalanced_hole_reports_open_offset() {
        let err = preprocess_template("ab ${1 + 2").unwrap_err();
        assert_eq!(err, TemplateError::UnbalancedHole { offset: 3 });
    }

    #[test]
    fn nested_braces_inside_hole() {
        let res = preprocess_template("${ { 1; 2 } }").unwrap();
        assert_eq!(res.text, " { 1; 2 } ");
        assert!(res.pure_hole);
    }

    #[test]
    fn string_with_brace_inside_hole() {
        let res = preprocess_template(r#"v=${"}" ++ "x"}"#).unwrap();
        assert_eq!(res.text, r#""v=" ++ ("}" ++ "x")"#);
    }

    #[test]
    fn mapping_round_trips_into_holes() {
        let input = "x=${1+2}, y=${3*4}";
        let res = preprocess_template(input).unwrap();
        // Processed `(1+2)` starts after `"x=" ++ `, body at +1.
        let body_processed = res.text.find("1+2").unwrap() as u32;
        let body_original = input.find("1+2").unwrap() as u32;
        assert_eq!(res.map.to_original(body_processed), body_original);
        assert_eq!(res.map.to_original(body_processed + 2), body_original + 2);
        assert_eq!(res.map.to_processed(body_original), body_processed);

        let second_processed = res.text.find("3*4").unwrap() as u32;
        let second_original = input.find("3*4").unwrap() as u32;
        assert_eq!(res.map.to_original(second_processed), second_original);
    }

    #[test]
    fn quotes_in_literals_are_escaped() {
        let res = preprocess_template(r#"say "${1}" now"#).unwrap();
        assert_eq!(res.text, r#""say \"" ++ (1) ++ "\" now""#);
    }
}
