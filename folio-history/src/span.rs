use folio_errors::FolioError;

/// A half-open range of epoch milliseconds: `[start, end)`. The engine
/// always reasons about history spans in this form; callers translate
/// from whatever date/time range the host actually asked for before
/// reaching this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: i64,
    pub end: i64,
}

impl Span {
    pub fn new(start: i64, end: i64) -> Result<Self, FolioError> {
        if start > end {
            return Err(FolioError::commit(format!(
                "history span start {start} is after end {end}"
            )));
        }
        Ok(Span { start, end })
    }

    pub fn everything() -> Self {
        Span {
            start: i64::MIN,
            end: i64::MAX,
        }
    }
}
