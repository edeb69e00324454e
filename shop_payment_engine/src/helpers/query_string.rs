/// Renders `(key, value)` pairs as an `application/x-www-form-urlencoded` query string, percent-encoding
/// everything outside the RFC 3986 unreserved set. Pair order is preserved, since the signed payload travels in
/// the query string and the provider displays it as sent.
pub fn encode_query<'a, I>(pairs: I) -> String
where I: IntoIterator<Item = (&'a str, &'a str)> {
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encodes_reserved_characters() {
        let query = encode_query([("order_id", "ORD-2025-0001"), ("callback_url", "https://shop.example/cb?x=1")]);
        assert_eq!(query, "order_id=ORD-2025-0001&callback_url=https%3A%2F%2Fshop.example%2Fcb%3Fx%3D1");
    }

    #[test]
    fn preserves_pair_order() {
        let query = encode_query([("b", "2"), ("a", "1")]);
        assert_eq!(query, "b=2&a=1");
    }
}
