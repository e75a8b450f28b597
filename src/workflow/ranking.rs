use std::cmp::Ordering;

use crate::domain::Suggestion;

// Both orderings use a stable sort, so suggestions that compare equal keep
// their submission order in either direction.

fn directed(ordering: Ordering, ascending: bool) -> Ordering {
    if ascending {
        ordering
    } else {
        ordering.reverse()
    }
}

pub fn by_price(mut suggestions: Vec<Suggestion>, ascending: bool) -> Vec<Suggestion> {
    suggestions.sort_by(|a, b| directed(a.suggested_price.cmp(&b.suggested_price), ascending));
    suggestions
}

/// Orders suggestions by the score of the technician behind each one.
pub fn by_technician_score(mut scored: Vec<(Suggestion, f64)>, ascending: bool) -> Vec<Suggestion> {
    scored.sort_by(|(_, a), (_, b)| directed(a.total_cmp(b), ascending));
    scored.into_iter().map(|(suggestion, _)| suggestion).collect()
}
