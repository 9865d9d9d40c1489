/// Dotted/indexed paths into a JSON payload, e.g. `main.temp` or
/// `place.location[0]`.
///
/// Resolution never fails hard: a missing key, an out-of-range index, a
/// type mismatch on the way down, or a JSON `null` all resolve to `None`.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Splits a path into key and index segments.
///
/// Returns `None` for syntactically broken paths (`a..b`, `a[x]`, `a[0`).
fn parse(path: &str) -> Option<Vec<Segment<'_>>> {
    let mut segments = Vec::new();

    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if key.is_empty() {
            return None;
        }
        segments.push(Segment::Key(key));

        while !rest.is_empty() {
            let close = rest.find(']')?;
            if !rest.starts_with('[') {
                return None;
            }
            let index: usize = rest[1..close].parse().ok()?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
        }
    }

    Some(segments)
}

/// Returns `true` if `path` is well formed. Used to validate field maps.
pub fn is_valid(path: &str) -> bool {
    parse(path).is_some()
}

/// Walks `path` into `data`.
pub fn resolve<'v>(data: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = data;
    for segment in parse(path)? {
        current = match segment {
            Segment::Key(key) => current.get(key)?,
            Segment::Index(index) => current.get(index)?,
        };
    }
    if current.is_null() { None } else { Some(current) }
}
