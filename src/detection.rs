//! New-item detection over a newest-first listing feed.

use crate::listing::{Listing, ListingId};

/// Collect listings from the newest end until the first already-seen id.
///
/// Everything at or after that id is assumed seen and is never inspected, so a
/// single out-of-place seen id hides any unseen items behind it. The result
/// keeps scan order (newest first).
pub fn new_listings<'a, F>(listings: &'a [Listing], mut is_seen: F) -> Vec<&'a Listing>
where
    F: FnMut(&ListingId) -> bool,
{
    let mut fresh = Vec::new();
    for listing in listings {
        if is_seen(&listing.id) {
            break;
        }
        fresh.push(listing);
    }
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn feed(ids: &[&str]) -> Vec<Listing> {
        ids.iter()
            .map(|id| Listing::new(*id, format!("https://example.com/items/{id}-x")))
            .collect()
    }

    fn ids<'a>(listings: &[&'a Listing]) -> Vec<&'a str> {
        listings.iter().map(|listing| listing.id.as_str()).collect()
    }

    #[test]
    fn stops_at_first_seen_without_inspecting_the_rest() {
        let listings = feed(&["a", "b", "c", "d"]);
        let seen: HashSet<ListingId> = [ListingId::from("c")].into_iter().collect();
        let mut inspected = Vec::new();

        let fresh = new_listings(&listings, |id| {
            inspected.push(id.to_string());
            seen.contains(id)
        });

        assert_eq!(ids(&fresh), vec!["a", "b"]);
        assert_eq!(inspected, vec!["a", "b", "c"]);
    }

    #[test]
    fn all_unseen_are_new() {
        let listings = feed(&["3", "2", "1"]);
        let fresh = new_listings(&listings, |_| false);
        assert_eq!(ids(&fresh), vec!["3", "2", "1"]);
    }

    #[test]
    fn newest_seen_means_nothing_new() {
        let listings = feed(&["3", "2", "1"]);
        let fresh = new_listings(&listings, |id| id.as_str() == "3");
        assert!(fresh.is_empty());
    }

    #[test]
    fn seen_id_masks_unseen_items_behind_it() {
        let listings = feed(&["9", "5", "8"]);
        let fresh = new_listings(&listings, |id| id.as_str() == "5");
        assert_eq!(ids(&fresh), vec!["9"]);
    }
}
