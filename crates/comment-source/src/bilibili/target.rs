use crate::error::{Result, SourceError};

/// A video reference as accepted from users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetId {
    Bvid(String),
    Aid(u64),
}

impl TargetId {
    /// Parse `BV1xx411c7mD`, `av170001`, `170001`, or a video URL containing either.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let path = trimmed.split(['?', '#']).next().unwrap_or_default();
        let segment = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();

        let prefix = segment.get(..2).filter(|_| segment.len() > 2);

        if prefix.is_some_and(|p| p.eq_ignore_ascii_case("bv")) {
            return Ok(Self::Bvid(format!("BV{}", &segment[2..])));
        }

        let digits = if prefix.is_some_and(|p| p.eq_ignore_ascii_case("av")) {
            &segment[2..]
        } else {
            segment
        };
        digits
            .parse::<u64>()
            .ok()
            .filter(|aid| *aid > 0)
            .map(Self::Aid)
            .ok_or_else(|| SourceError::InvalidTarget(input.to_string()))
    }
}
