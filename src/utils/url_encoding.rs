use std::collections::HashMap;

/// Parse a form-urlencoded body, keeping every value of repeated keys.
pub fn parse_urlencoded_body(body: &[u8]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    let raw = String::from_utf8_lossy(body);
    for pair in raw.split('&') {
        if pair.is_empty() { continue; }
        let mut parts = pair.splitn(2, '=');
        let key = decode_component(parts.next().unwrap_or(""));
        let val = decode_component(parts.next().unwrap_or(""));
        map.entry(key).or_default().push(val);
    }
    map
}

/// First non-empty trimmed value of `key`.
pub fn first_value<'a>(form: &'a HashMap<String, Vec<String>>, key: &str) -> Option<&'a str> {
    form.get(key)?
        .iter()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_are_collected() {
        let form = parse_urlencoded_body(b"ip=10.0.0.5&selected_users=alice&selected_users=bob+smith");
        assert_eq!(form["selected_users"], vec!["alice", "bob smith"]);
        assert_eq!(first_value(&form, "ip"), Some("10.0.0.5"));
    }

    #[test]
    fn percent_escapes_decode() {
        let form = parse_urlencoded_body(b"root_password=p%40ss%2Bw&empty=");
        assert_eq!(first_value(&form, "root_password"), Some("p@ss+w"));
        assert_eq!(first_value(&form, "empty"), None);
        assert_eq!(first_value(&form, "missing"), None);
    }
}
