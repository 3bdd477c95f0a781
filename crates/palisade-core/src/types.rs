//! Nominal type representations.
//!
//! `TypeRep` is the textual-type bridge between the host and the compiler:
//! hosts describe context/result/variable types as strings (`Vec[Str]`),
//! the compiler works with the parsed form. Rendering via `Display` is the
//! canonical type printer used by typed signatures and diagnostics.

use std::fmt;

/// A nominal type, possibly applied to type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TypeRep {
    pub name: String,
    pub args: Vec<TypeRep>,
}

/// Errors from [`TypeRep::parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeParseError {
    #[error("unexpected character at offset {0}")]
    UnexpectedChar(usize),
    #[error("unexpected end of type")]
    UnexpectedEnd,
    #[error("trailing input at offset {0}")]
    TrailingInput(usize),
}

impl TypeRep {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(name: impl Into<String>, args: Vec<TypeRep>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn int() -> Self {
        Self::named("Int")
    }

    pub fn float() -> Self {
        Self::named("Float")
    }

    pub fn str() -> Self {
        Self::named("Str")
    }

    pub fn bool() -> Self {
        Self::named("Bool")
    }

    pub fn unit() -> Self {
        Self::named("Unit")
    }

    pub fn any() -> Self {
        Self::named("Any")
    }

    pub fn is_any(&self) -> bool {
        self.name == "Any" && self.args.is_empty()
    }

    pub fn is_unit(&self) -> bool {
        self.name == "Unit" && self.args.is_empty()
    }

    /// Parse the textual form: `Name` or `Name[A, B[C]]`.
    pub fn parse(text: &str) -> Result<Self, TypeParseError> {
        let mut p = TypeParser {
            text: text.as_bytes(),
            pos: 0,
        };
        p.skip_ws();
        let rep = p.parse_type()?;
        p.skip_ws();
        if p.pos < p.text.len() {
            return Err(TypeParseError::TrailingInput(p.pos));
        }
        Ok(rep)
    }
}

impl fmt::Display for TypeRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("[")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

struct TypeParser<'t> {
    text: &'t [u8],
    pos: usize,
}

impl TypeParser<'_> {
    fn skip_ws(&mut self) {
        while self.pos < self.text.len() && self.text[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn parse_type(&mut self) -> Result<TypeRep, TypeParseError> {
        let name = self.parse_name()?;
        self.skip_ws();

        let mut args = Vec::new();
        if self.pos < self.text.len() && self.text[self.pos] == b'[' {
            self.pos += 1;
            loop {
                self.skip_ws();
                args.push(self.parse_type()?);
                self.skip_ws();
                match self.text.get(self.pos) {
                    Some(b',') => self.pos += 1,
                    Some(b']') => {
                        self.pos += 1;
                        break;
                    }
                    Some(_) => return Err(TypeParseError::UnexpectedChar(self.pos)),
                    None => return Err(TypeParseError::UnexpectedEnd),
                }
            }
        }

        Ok(TypeRep { name, args })
    }

    fn parse_name(&mut self) -> Result<String, TypeParseError> {
        let start = self.pos;
        match self.text.get(self.pos) {
            Some(c) if c.is_ascii_alphabetic() || *c == b'_' => self.pos += 1,
            Some(_) => return Err(TypeParseError::UnexpectedChar(self.pos)),
            None => return Err(TypeParseError::UnexpectedEnd),
        }
        while let Some(c) = self.text.get(self.pos) {
            if c.is_ascii_alphanumeric() || *c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&self.text[start..self.pos]).into_owned())
    }
}
