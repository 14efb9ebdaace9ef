//! Correlation of the direct and interception feeds.
//!
//! With interception enabled the browser reports each request twice:
//! `requestWillBeSent` (carrying a requestId) and `requestIntercepted`
//! (carrying an interceptionId). The two feeds are not ordered relative to
//! each other, so whichever event arrives first is parked under a content
//! hash of the request until its counterpart arrives.
//!
//! # Hash Input
//!
//! | Field | Normalization |
//! |-------|---------------|
//! | `url` | percent-decoded |
//! | `method` | as sent |
//! | `postData` | as sent |
//! | `headers` | names lower-cased, sorted, case-duplicates merged; `accept`, `referer` and the devtools client-id header dropped; empty for `data:` URLs |

// ============================================================================
// Imports
// ============================================================================

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use rustc_hash::FxHashMap;
use serde_json::json;

use crate::protocol::network::RequestPayload;

// ============================================================================
// Constants
// ============================================================================

/// Headers that differ between the two feeds for the same request.
const IGNORED_HEADERS: [&str; 3] = [
    "accept",
    "referer",
    "x-devtools-emulate-network-conditions-client-id",
];

// ============================================================================
// RequestHash
// ============================================================================

/// Content hash identifying one logical request across both feeds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestHash(String);

impl RequestHash {
    /// Computes the hash of a request description.
    #[must_use]
    pub fn of(request: &RequestPayload) -> Self {
        let url = urlencoding::decode(&request.url)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| request.url.clone());

        let mut values: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        if !request.url.starts_with("data:") {
            for (name, value) in &request.headers {
                let name = name.to_ascii_lowercase();
                if !IGNORED_HEADERS.contains(&name.as_str()) {
                    values.entry(name).or_default().push(value.as_str());
                }
            }
        }

        // Names equal up to case are merged with their values sorted.
        let headers: BTreeMap<String, String> = values
            .into_iter()
            .map(|(name, mut values)| {
                values.sort_unstable();
                (name, values.join(", "))
            })
            .collect();

        let input = json!({
            "url": url,
            "method": request.method,
            "postData": request.post_data,
            "headers": headers,
        });
        Self(input.to_string())
    }

    /// Returns the canonical hash input.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Multimap
// ============================================================================

/// Hash → FIFO of values.
#[derive(Debug)]
pub struct Multimap<V> {
    map: FxHashMap<RequestHash, VecDeque<V>>,
}

impl<V> Default for Multimap<V> {
    fn default() -> Self {
        Self {
            map: FxHashMap::default(),
        }
    }
}

impl<V> Multimap<V> {
    /// Creates an empty multimap.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value under `key`.
    pub fn set(&mut self, key: RequestHash, value: V) {
        self.map.entry(key).or_default().push_back(value);
    }

    /// Returns the oldest value under `key`.
    #[must_use]
    pub fn first_value(&self, key: &RequestHash) -> Option<&V> {
        self.map.get(key).and_then(VecDeque::front)
    }

    /// Removes and returns the oldest value under `key`.
    pub fn take_first(&mut self, key: &RequestHash) -> Option<V> {
        let values = self.map.get_mut(key)?;
        let value = values.pop_front();
        if values.is_empty() {
            self.map.remove(key);
        }
        value
    }

    /// Removes one occurrence of `value` under `key`.
    pub fn delete(&mut self, key: &RequestHash, value: &V) -> bool
    where
        V: PartialEq,
    {
        let Some(values) = self.map.get_mut(key) else {
            return false;
        };
        let Some(position) = values.iter().position(|v| v == value) else {
            return false;
        };

        values.remove(position);
        if values.is_empty() {
            self.map.remove(key);
        }
        true
    }

    /// Removes the first value (under any key) matching `predicate`.
    pub fn remove_value<F>(&mut self, mut predicate: F) -> Option<V>
    where
        F: FnMut(&V) -> bool,
    {
        let (key, position) = self.map.iter().find_map(|(key, values)| {
            values
                .iter()
                .position(&mut predicate)
                .map(|position| (key.clone(), position))
        })?;

        let values = self.map.get_mut(&key)?;
        let value = values.remove(position);
        if values.is_empty() {
            self.map.remove(&key);
        }
        value
    }

    /// Returns `true` if any value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &RequestHash) -> bool {
        self.map.contains_key(key)
    }

    /// Returns the total number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.values().map(VecDeque::len).sum()
    }

    /// Returns `true` if no value is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Removes and returns every value.
    pub fn drain(&mut self) -> Vec<V> {
        self.map.drain().flat_map(|(_, values)| values).collect()
    }
}

// ============================================================================
// CorrelationIndex
// ============================================================================

/// Waiting area for the first-arriving half of each request.
///
/// `R` is a parked direct-feed event, `I` a parked interception event. At
/// most one side holds entries for a given hash: an arrival first tries to
/// take its counterpart and only parks itself when none is waiting.
#[derive(Debug)]
pub struct CorrelationIndex<R, I> {
    requests: Multimap<R>,
    interceptions: Multimap<I>,
}

impl<R, I> Default for CorrelationIndex<R, I> {
    fn default() -> Self {
        Self {
            requests: Multimap::new(),
            interceptions: Multimap::new(),
        }
    }
}

impl<R, I> CorrelationIndex<R, I> {
    /// Creates an empty index.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a direct-feed event.
    pub fn park_request(&mut self, hash: RequestHash, request: R) {
        debug_assert!(!self.interceptions.contains_key(&hash));
        self.requests.set(hash, request);
    }

    /// Parks an interception event.
    pub fn park_interception(&mut self, hash: RequestHash, interception: I) {
        debug_assert!(!self.requests.contains_key(&hash));
        self.interceptions.set(hash, interception);
    }

    /// Takes the oldest parked direct-feed event for `hash`.
    pub fn take_request(&mut self, hash: &RequestHash) -> Option<R> {
        self.requests.take_first(hash)
    }

    /// Takes the oldest parked interception event for `hash`.
    pub fn take_interception(&mut self, hash: &RequestHash) -> Option<I> {
        self.interceptions.take_first(hash)
    }

    /// Discards the first parked direct-feed event matching `predicate`.
    pub fn discard_request<F>(&mut self, predicate: F) -> Option<R>
    where
        F: FnMut(&R) -> bool,
    {
        self.requests.remove_value(predicate)
    }

    /// Removes every parked direct-feed event.
    pub fn drain_requests(&mut self) -> Vec<R> {
        self.requests.drain()
    }

    /// Removes every parked interception event.
    pub fn drain_interceptions(&mut self) -> Vec<I> {
        self.interceptions.drain()
    }

    /// Returns the number of parked direct-feed events.
    #[must_use]
    pub fn parked_requests(&self) -> usize {
        self.requests.len()
    }

    /// Returns the number of parked interception events.
    #[must_use]
    pub fn parked_interceptions(&self) -> usize {
        self.interceptions.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::protocol::network::Headers;

    fn payload(url: &str, headers: &[(&str, &str)]) -> RequestPayload {
        RequestPayload {
            url: url.to_string(),
            url_fragment: None,
            method: "GET".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Headers>(),
            post_data: None,
        }
    }

    #[test]
    fn test_hash_ignores_volatile_headers_and_case() {
        let direct = payload(
            "https://a.test/x",
            &[("Accept", "*/*"), ("Referer", "https://a.test/"), ("X-Custom", "1")],
        );
        let intercepted = payload(
            "https://a.test/x",
            &[
                ("x-custom", "1"),
                ("X-DevTools-Emulate-Network-Conditions-Client-Id", "abc"),
            ],
        );
        assert_eq!(RequestHash::of(&direct), RequestHash::of(&intercepted));
    }

    #[test]
    fn test_hash_percent_decodes_url() {
        let encoded = payload("https://a.test/a%20b", &[]);
        let decoded = payload("https://a.test/a b", &[]);
        assert_eq!(RequestHash::of(&encoded), RequestHash::of(&decoded));
    }

    #[test]
    fn test_hash_distinguishes_method_and_body() {
        let get = payload("https://a.test/", &[]);
        let mut post = get.clone();
        post.method = "POST".to_string();
        assert_ne!(RequestHash::of(&get), RequestHash::of(&post));

        let mut with_body = post.clone();
        with_body.post_data = Some("a=1".to_string());
        assert_ne!(RequestHash::of(&post), RequestHash::of(&with_body));
    }

    #[test]
    fn test_data_urls_ignore_headers() {
        let a = payload("data:text/plain,hi", &[("X-One", "1")]);
        let b = payload("data:text/plain,hi", &[("X-Two", "2")]);
        assert_eq!(RequestHash::of(&a), RequestHash::of(&b));
    }

    #[test]
    fn test_case_duplicate_headers_merge_deterministically() {
        let merged = payload("https://a.test/", &[("x-a", "1, 2")]);
        for _ in 0..16 {
            let forward = payload("https://a.test/", &[("X-A", "1"), ("x-a", "2")]);
            let backward = payload("https://a.test/", &[("x-a", "2"), ("X-A", "1")]);
            assert_eq!(RequestHash::of(&forward), RequestHash::of(&merged));
            assert_eq!(RequestHash::of(&backward), RequestHash::of(&merged));
        }
    }

    #[test]
    fn test_multimap_fifo() {
        let key = RequestHash::of(&payload("https://a.test/", &[]));
        let mut map = Multimap::new();
        map.set(key.clone(), 1);
        map.set(key.clone(), 2);

        assert_eq!(map.first_value(&key), Some(&1));
        assert_eq!(map.take_first(&key), Some(1));
        assert_eq!(map.take_first(&key), Some(2));
        assert_eq!(map.take_first(&key), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_multimap_delete_and_remove_value() {
        let a = RequestHash::of(&payload("https://a.test/", &[]));
        let b = RequestHash::of(&payload("https://b.test/", &[]));
        let mut map = Multimap::new();
        map.set(a.clone(), "r1");
        map.set(b.clone(), "r2");

        assert!(map.delete(&a, &"r1"));
        assert!(!map.delete(&a, &"r1"));
        assert_eq!(map.remove_value(|v| *v == "r2"), Some("r2"));
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_index_takes_counterpart() {
        let hash = RequestHash::of(&payload("https://a.test/", &[]));
        let mut index: CorrelationIndex<&str, &str> = CorrelationIndex::new();

        assert_eq!(index.take_interception(&hash), None);
        index.park_request(hash.clone(), "R1");
        assert_eq!(index.take_request(&hash), Some("R1"));
        assert_eq!(index.parked_requests(), 0);
    }

    proptest! {
        #[test]
        fn prop_header_order_and_case_do_not_matter(
            headers in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..6),
            upper in any::<bool>(),
        ) {
            let forward: Vec<(String, String)> = headers.iter()
                .map(|(k, v)| (if upper { k.to_ascii_uppercase() } else { k.clone() }, v.clone()))
                .collect();

            let mut a = payload("https://a.test/p", &[]);
            a.headers = forward.iter().cloned().collect();
            let mut b = payload("https://a.test/p", &[]);
            b.headers = forward.into_iter().rev().collect();

            prop_assert_eq!(RequestHash::of(&a), RequestHash::of(&b));
        }
    }
}
