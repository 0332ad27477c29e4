//! [`HeaderMap`]: an ordered, case-insensitive, multi-valued header
//! container preserving original casing and insertion order (spec §4.1).

/// An ordered sequence of `(name, value)` pairs with a secondary
/// case-insensitive index.
///
/// Invariants maintained by every method on this type:
/// - (I1) iteration order equals insertion order;
/// - (I2) lookup is case-insensitive;
/// - (I3) a name may appear multiple times;
/// - (I4) removing all values for a name removes every matching position
///   from both the entry list and the index.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
    // lowercase(name) -> positions into `entries`, in insertion order.
    index: Vec<(String, Vec<usize>)>,
}

impl HeaderMap {
    pub fn new() -> HeaderMap {
        HeaderMap { entries: Vec::new(), index: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> HeaderMap {
        HeaderMap { entries: Vec::with_capacity(cap), index: Vec::new() }
    }

    fn find_slot(&self, lower: &str) -> Option<usize> {
        self.index.iter().position(|&(ref k, _)| k == lower)
    }

    /// Append a `(name, value)` pair, preserving original casing and
    /// insertion order.
    pub fn append<N, V>(&mut self, name: N, value: V)
        where N: Into<String>, V: Into<String>
    {
        let name = name.into();
        let lower = name.to_ascii_lowercase();
        let pos = self.entries.len();
        self.entries.push((name, value.into()));
        match self.find_slot(&lower) {
            Some(slot) => self.index[slot].1.push(pos),
            None => self.index.push((lower, vec![pos])),
        }
    }

    /// All values for `name`, case-insensitively, in insertion order.
    /// Empty if the header is absent.
    pub fn get(&self, name: &str) -> Vec<&str> {
        let lower = name.to_ascii_lowercase();
        match self.find_slot(&lower) {
            Some(slot) => self.index[slot].1.iter()
                .map(|&i| self.entries[i].1.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// The first value for `name`, if present.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get(name).into_iter().next()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find_slot(&name.to_ascii_lowercase()).is_some()
    }

    /// Remove every existing value for `name` (case-insensitive) and append
    /// the given values in order. Equivalent to a case-insensitive
    /// replace-or-insert.
    pub fn set<N, V>(&mut self, name: N, values: Vec<V>)
        where N: Into<String>, V: Into<String>
    {
        let name = name.into();
        self.remove(&name);
        for v in values {
            self.append(name.clone(), v);
        }
    }

    /// Remove every value for `name` (case-insensitive). Returns the
    /// removed values in their original order.
    pub fn remove(&mut self, name: &str) -> Vec<String> {
        let lower = name.to_ascii_lowercase();
        let slot = match self.find_slot(&lower) {
            Some(s) => s,
            None => return Vec::new(),
        };
        let (_, mut positions) = self.index.remove(slot);
        positions.sort_unstable();
        let mut removed = Vec::with_capacity(positions.len());
        for &pos in positions.iter().rev() {
            removed.push(self.entries.remove(pos).1);
        }
        removed.reverse();
        // Recompute the whole index: header maps are small (a handful of
        // entries per request) so this stays cheap and is obviously correct
        // after positions have shifted.
        self.reindex();
        removed
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (pos, &(ref name, _)) in self.entries.iter().enumerate() {
            let lower = name.to_ascii_lowercase();
            match self.index.iter().position(|&(ref k, _)| *k == lower) {
                Some(slot) => self.index[slot].1.push(pos),
                None => self.index.push((lower, vec![pos])),
            }
        }
    }

    /// Iterate entries in insertion order, with original casing preserved.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|&(ref n, ref v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

// Header-value predicates: case-insensitive comparison ignoring leading and
// trailing optional whitespace (RFC 7230 §3.2.3 `OWS`), reused by the wire
// parser and the connection driver for framing decisions. Generalizes the
// teacher's `is_chunked`/`is_close`/`is_continue` (each hand-rolled a
// byte-at-a-time scanner for one literal) into a single trimmed-comparison
// helper.

fn trimmed_eq_ignore_ascii_case(val: &[u8], target: &str) -> bool {
    let is_ws = |b: &u8| matches!(*b, b'\r' | b'\n' | b' ' | b'\t');
    let start = val.iter().position(|b| !is_ws(b));
    let end = val.iter().rposition(|b| !is_ws(b));
    match (start, end) {
        (Some(s), Some(e)) => val[s..=e].eq_ignore_ascii_case(target.as_bytes()),
        _ => false,
    }
}

pub fn is_close(val: &[u8]) -> bool {
    trimmed_eq_ignore_ascii_case(val, "close")
}

pub fn is_chunked(val: &[u8]) -> bool {
    trimmed_eq_ignore_ascii_case(val, "chunked")
}

pub fn is_continue(val: &[u8]) -> bool {
    trimmed_eq_ignore_ascii_case(val, "100-continue")
}

pub fn is_keep_alive(val: &[u8]) -> bool {
    trimmed_eq_ignore_ascii_case(val, "keep-alive")
}

pub fn is_upgrade(val: &[u8]) -> bool {
    trimmed_eq_ignore_ascii_case(val, "upgrade")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn case_insensitive_lookup_case_preserving_iteration() {
        // (P2)
        let mut h = HeaderMap::new();
        h.append("X-Foo", "bar");
        assert_eq!(h.get("x-foo"), vec!["bar"]);
        assert_eq!(h.iter().collect::<Vec<_>>(), vec![("X-Foo", "bar")]);
    }

    #[test]
    fn multi_value_preservation() {
        // (P3)
        let mut h = HeaderMap::new();
        h.append("H", "v1");
        h.append("H", "v2");
        assert_eq!(h.get("H"), vec!["v1", "v2"]);
    }

    #[test]
    fn multi_value_mixed_case() {
        // scenario 6
        let mut h = HeaderMap::new();
        h.append("X-Foo", "a");
        h.append("x-foo", "b");
        assert_eq!(h.get("X-Foo"), vec!["a", "b"]);
        assert_eq!(h.iter().collect::<Vec<_>>(),
            vec![("X-Foo", "a"), ("x-foo", "b")]);
    }

    #[test]
    fn set_replaces_all_values() {
        let mut h = HeaderMap::new();
        h.append("H", "v1");
        h.append("h", "v2");
        h.set("H", vec!["v3"]);
        assert_eq!(h.get("H"), vec!["v3"]);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn remove_clears_index_and_entries() {
        // (I4)
        let mut h = HeaderMap::new();
        h.append("A", "1");
        h.append("B", "2");
        h.append("a", "3");
        let removed = h.remove("a");
        assert_eq!(removed, vec!["1", "3"]);
        assert_eq!(h.get("A"), Vec::<&str>::new());
        assert_eq!(h.iter().collect::<Vec<_>>(), vec![("B", "2")]);
    }

    #[test]
    fn get_absent_is_empty() {
        let h = HeaderMap::new();
        assert!(h.get("Nope").is_empty());
        assert!(!h.contains("Nope"));
    }

    #[test]
    fn value_predicates() {
        assert!(is_chunked(b"chunked"));
        assert!(is_chunked(b"  Chunked  "));
        assert!(!is_chunked(b"chunked 1"));
        assert!(is_close(b"Close"));
        assert!(!is_close(b"xclose"));
        assert!(is_continue(b"100-continue"));
        assert!(is_keep_alive(b"Keep-Alive"));
        assert!(is_upgrade(b"Upgrade"));
    }
}
