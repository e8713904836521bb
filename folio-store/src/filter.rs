use folio_types::{Dict, Value, Word};

/// A tag-predicate, the engine's own typed surface over whatever expression
/// language the host hands in. `RecordStore` never parses host syntax
/// itself; something upstream of this crate is expected to build a
/// `Predicate` tree (or just a bare `Predicate::Has`, the common case).
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// True if the record carries `tag` at all (any value, including
    /// non-marker values; `has(tag)` is existence, not truthiness).
    Has(Word),
    Eq(Word, Value),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn has(tag: impl Into<Word>) -> Self {
        Predicate::Has(tag.into())
    }

    pub fn eq(tag: impl Into<Word>, val: Value) -> Self {
        Predicate::Eq(tag.into(), val)
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    pub fn eval(&self, dict: &Dict) -> bool {
        match self {
            Predicate::Has(tag) => dict.has(tag),
            Predicate::Eq(tag, val) => dict.get(tag) == Some(val),
            Predicate::And(a, b) => a.eval(dict) && b.eval(dict),
            Predicate::Or(a, b) => a.eval(dict) || b.eval(dict),
            Predicate::Not(p) => !p.eval(dict),
        }
    }

    /// Detects the "simple has(tag)" shape the query planner can answer
    /// straight from a tag index, without touching every cached record.
    /// Anything more complex (conjunctions, equality, negation) falls back
    /// to a full scan evaluated through [`Self::eval`].
    pub fn as_simple_has(&self) -> Option<&Word> {
        match self {
            Predicate::Has(tag) => Some(tag),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::reserved;

    #[test]
    fn simple_has_is_detected() {
        let p = Predicate::has(Word::new_unchecked("site"));
        assert_eq!(p.as_simple_has().map(|w| w.as_str()), Some("site"));
    }

    #[test]
    fn conjunction_is_not_simple() {
        let p = Predicate::has(Word::new_unchecked("site")).and(Predicate::has(reserved::point()));
        assert!(p.as_simple_has().is_none());
    }

    #[test]
    fn eval_walks_the_tree() {
        let mut dict = Dict::new();
        dict.set(Word::new_unchecked("site"), Value::Marker);
        let p = Predicate::has(Word::new_unchecked("site")).and(Predicate::has(reserved::point()));
        assert!(!p.eval(&dict));
        dict.set(reserved::point(), Value::Marker);
        assert!(p.eval(&dict));
    }
}
