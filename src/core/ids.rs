//! Validated identifier newtypes.

use std::fmt;

use super::error::CoreError;

/// Maximum length of a seat id, matching the bound real seat names stay well under.
const SEAT_ID_MAX_LEN: usize = 64;

/// A seat identifier, validated against the seat-name grammar (spec §4.2): leading letter,
/// remaining characters alphanumeric or `-`, bounded length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeatId(String);

impl SeatId {
    /// The seat every daemon instance implicitly understands, even before any device arrives.
    pub fn default_seat() -> Self {
        SeatId("seat0".to_string())
    }

    /// Validate and wrap a candidate seat id.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s.is_empty() || s.len() > SEAT_ID_MAX_LEN {
            return Err(CoreError::InvalidArgument(format!(
                "seat id {s:?} has invalid length"
            )));
        }
        let mut chars = s.chars();
        let first = chars.next().expect("non-empty checked above");
        if !first.is_ascii_alphabetic() {
            return Err(CoreError::InvalidArgument(format!(
                "seat id {s:?} must start with a letter"
            )));
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(CoreError::InvalidArgument(format!(
                "seat id {s:?} contains invalid characters"
            )));
        }
        Ok(SeatId(s.to_string()))
    }

    /// Resolve an `ID_SEAT` udev property value: empty or absent means `seat0`.
    pub fn from_property(value: Option<&str>) -> Result<Self, CoreError> {
        match value {
            None => Ok(Self::default_seat()),
            Some("") => Ok(Self::default_seat()),
            Some(s) => Self::parse(s),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for SeatId {
    fn default() -> Self {
        SeatId::default_seat()
    }
}

/// An opaque session identifier, assigned by the external authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(s: impl Into<String>) -> Self {
        SessionId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert!(SeatId::parse("seat0").is_ok());
        assert!(SeatId::parse("seat1").is_ok());
        assert!(SeatId::parse("a").is_ok());
    }

    #[test]
    fn rejects_non_letter_start() {
        assert!(SeatId::parse("0seat").is_err());
        assert!(SeatId::parse("-seat").is_err());
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(SeatId::parse("../etc").is_err());
    }

    #[test]
    fn rejects_empty_and_overlong() {
        assert!(SeatId::parse("").is_err());
        let long = format!("s{}", "a".repeat(SEAT_ID_MAX_LEN));
        assert!(SeatId::parse(&long).is_err());
    }

    #[test]
    fn property_default() {
        assert_eq!(SeatId::from_property(None).unwrap(), SeatId::default_seat());
        assert_eq!(
            SeatId::from_property(Some("")).unwrap(),
            SeatId::default_seat()
        );
        assert_eq!(
            SeatId::from_property(Some("seat1")).unwrap().as_str(),
            "seat1"
        );
    }
}
