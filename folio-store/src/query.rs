use folio_types::Dict;

use crate::cache::Cache;
use crate::filter::Predicate;

/// Chooses between an index-backed lookup and a full scan, depending on
/// the shape `Predicate` presents (§4.3 "query planner").
pub fn run(cache: &Cache, predicate: &Predicate) -> Vec<Dict> {
    if let Some(tag) = predicate.as_simple_has() {
        return cache
            .ids_with_tag(tag)
            .into_iter()
            .filter_map(|id| cache.get(&id))
            .collect();
    }
    cache
        .all_ids()
        .into_iter()
        .filter_map(|id| cache.get(&id))
        .filter(|dict| predicate.eval(dict))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{reserved, Value, Word};

    #[test]
    fn simple_has_uses_the_tag_index() {
        let cache = Cache::new();
        let mut a = Dict::new();
        a.set(Word::new_unchecked("site"), Value::Marker);
        cache.put("a", a);
        let mut b = Dict::new();
        b.set(reserved::point(), Value::Marker);
        cache.put("b", b);

        let found = run(&cache, &Predicate::has(Word::new_unchecked("site")));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn conjunction_falls_back_to_a_full_scan() {
        let cache = Cache::new();
        let mut a = Dict::new();
        a.set(Word::new_unchecked("site"), Value::Marker);
        a.set(reserved::point(), Value::Marker);
        cache.put("a", a);
        cache.put("b", Dict::new());

        let p = Predicate::has(Word::new_unchecked("site")).and(Predicate::has(reserved::point()));
        assert_eq!(run(&cache, &p).len(), 1);
    }
}
