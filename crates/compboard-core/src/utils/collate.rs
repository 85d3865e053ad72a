//! Thai dictionary ordering for school and competition names.

use std::cmp::Ordering;

use icu_collator::{Collator, CollatorOptions, Strength};
use icu_locid::locale;
use tracing::warn;

use super::format::cmp_ignore_case;

thread_local! {
    static THAI_COLLATOR: Option<Collator> = thai_collator();
}

fn thai_collator() -> Option<Collator> {
    let mut options = CollatorOptions::new();
    // Secondary strength ignores case but keeps tone marks
    options.strength = Some(Strength::Secondary);
    match Collator::try_new(&locale!("th").into(), options) {
        Ok(collator) => Some(collator),
        Err(e) => {
            warn!(error = ?e, "Thai collation unavailable, falling back to case-insensitive order");
            None
        }
    }
}

/// Compare names in Thai dictionary order, ignoring case.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    THAI_COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => cmp_ignore_case(a, b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_vowels_sort_by_consonant() {
        assert_eq!(compare_names("เกษตร", "ขอนแก่น"), Ordering::Less);
        assert_eq!(compare_names("ไทรงาม", "กรุงเทพ"), Ordering::Greater);
    }

    #[test]
    fn test_case_is_ignored() {
        assert_eq!(compare_names("Alpha School", "alpha school"), Ordering::Equal);
        assert_eq!(compare_names("alpha", "Beta"), Ordering::Less);
    }
}
