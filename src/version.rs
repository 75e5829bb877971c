//! Maven generic version ordering.
//!
//! Versions are split into numeric and qualifier items at `.`, `-` and digit/letter
//! transitions. A `-` or a transition opens a nested list. Trailing "null" items (`0`,
//! `ga`, `final`, `release`, empty) are dropped, so `1.0` equals `1` and `1.0-final`.
//!
//! Known qualifiers order as `alpha < beta < milestone < rc < snapshot < release < sp`.
//! Unknown qualifiers sort after `sp`, lexically among themselves.

use std::cmp::Ordering;
use std::fmt;

const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];
const RELEASE_INDEX: &str = "5";

#[derive(Debug, Clone)]
enum Item {
    /// Decimal digits with leading zeros removed; empty for zero.
    Int(String),
    Str(String),
    List(Vec<Item>),
}

impl Item {
    fn parse(is_digit: bool, text: &str) -> Item {
        if is_digit {
            Item::Int(text.trim_start_matches('0').to_string())
        } else {
            Item::string(text, false)
        }
    }

    fn string(text: &str, followed_by_digit: bool) -> Item {
        let value = match text {
            "a" if followed_by_digit => "alpha",
            "b" if followed_by_digit => "beta",
            "m" if followed_by_digit => "milestone",
            "ga" | "final" | "release" => "",
            "cr" => "rc",
            other => other,
        };
        Item::Str(value.to_string())
    }

    fn is_null(&self) -> bool {
        match self {
            Item::Int(digits) => digits.is_empty(),
            Item::Str(value) => value.is_empty(),
            Item::List(items) => items.is_empty(),
        }
    }

    /// Compares against a missing item on the other side.
    fn compare_to_none(&self) -> Ordering {
        match self {
            Item::Int(digits) => {
                if digits.is_empty() {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                }
            }
            Item::Str(value) => comparable_qualifier(value).as_str().cmp(RELEASE_INDEX),
            Item::List(items) => items
                .first()
                .map(Item::compare_to_none)
                .unwrap_or(Ordering::Equal),
        }
    }

    fn compare(&self, other: Option<&Item>) -> Ordering {
        let Some(other) = other else {
            return self.compare_to_none();
        };
        match (self, other) {
            (Item::Int(a), Item::Int(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Item::Int(_), _) => Ordering::Greater,
            (Item::Str(_), Item::Int(_)) => Ordering::Less,
            (Item::Str(a), Item::Str(b)) => comparable_qualifier(a).cmp(&comparable_qualifier(b)),
            (Item::Str(_), Item::List(_)) => Ordering::Less,
            (Item::List(_), Item::Int(_)) => Ordering::Less,
            (Item::List(_), Item::Str(_)) => Ordering::Greater,
            (Item::List(a), Item::List(b)) => compare_lists(a, b),
        }
    }
}

fn comparable_qualifier(value: &str) -> String {
    match QUALIFIERS.iter().position(|q| *q == value) {
        Some(index) => index.to_string(),
        None => format!("{}-{}", QUALIFIERS.len(), value),
    }
}

fn compare_lists(left: &[Item], right: &[Item]) -> Ordering {
    let length = left.len().max(right.len());
    for i in 0..length {
        let result = match (left.get(i), right.get(i)) {
            (None, None) => Ordering::Equal,
            (None, Some(r)) => r.compare(None).reverse(),
            (Some(l), r) => l.compare(r),
        };
        if result != Ordering::Equal {
            return result;
        }
    }
    Ordering::Equal
}

fn normalize(items: &mut Vec<Item>) {
    let mut i = items.len();
    while i > 0 {
        i -= 1;
        if items[i].is_null() {
            items.remove(i);
        } else if !matches!(items[i], Item::List(_)) {
            break;
        }
    }
}

/// A version string with Maven's ordering.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    items: Vec<Item>,
}

impl Version {
    pub fn parse(version: &str) -> Self {
        let lower = version.to_lowercase();
        // Each new list is nested in the previous one, so open lists form a chain.
        let mut parents: Vec<Vec<Item>> = Vec::new();
        let mut current: Vec<Item> = Vec::new();
        let mut is_digit = false;
        let mut start = 0;

        for (i, c) in lower.char_indices() {
            if c == '.' || c == '-' {
                if i == start {
                    current.push(Item::Int(String::new()));
                } else {
                    current.push(Item::parse(is_digit, &lower[start..i]));
                }
                start = i + 1;
                if c == '-' {
                    parents.push(std::mem::take(&mut current));
                }
            } else if c.is_ascii_digit() {
                if !is_digit && i > start {
                    current.push(Item::string(&lower[start..i], true));
                    start = i;
                    parents.push(std::mem::take(&mut current));
                }
                is_digit = true;
            } else {
                if is_digit && i > start {
                    current.push(Item::parse(true, &lower[start..i]));
                    start = i;
                    parents.push(std::mem::take(&mut current));
                }
                is_digit = false;
            }
        }
        if lower.len() > start {
            current.push(Item::parse(is_digit, &lower[start..]));
        }

        while let Some(mut parent) = parents.pop() {
            normalize(&mut current);
            parent.push(Item::List(current));
            current = parent;
        }
        normalize(&mut current);

        Self {
            original: version.to_string(),
            items: current,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_lists(&self.items, &other.items)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Compares two version strings with Maven ordering.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    Version::parse(a).cmp(&Version::parse(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_ordered(versions: &[&str]) {
        for pair in versions.windows(2) {
            assert_eq!(
                compare_versions(pair[0], pair[1]),
                Ordering::Less,
                "{} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn numeric_ordering() {
        assert_ordered(&["1", "1.1", "1.2", "1.10", "2.0", "10.0.1"]);
        assert_eq!(compare_versions("1.0", "1"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.0", "1"), Ordering::Equal);
        assert_eq!(compare_versions("01.2", "1.2"), Ordering::Equal);
    }

    #[test]
    fn qualifier_ordering() {
        assert_ordered(&[
            "1.0-alpha1",
            "1.0-beta1",
            "1.0-m1",
            "1.0-rc1",
            "1.0-SNAPSHOT",
            "1.0",
            "1.0-sp1",
            "1.0-zzz",
            "1.0.1",
        ]);
        assert_eq!(compare_versions("1.0-final", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0-ga", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0-cr1", "1.0-rc1"), Ordering::Equal);
        assert_eq!(compare_versions("1.0a1", "1.0-alpha-1"), Ordering::Equal);
    }

    #[test]
    fn real_world_versions() {
        assert_ordered(&["31.1-android", "31.1-jre", "32.0.0-jre"]);
        assert_ordered(&["1.9", "1.10.0"]);
        assert_ordered(&["2.0.0-RC1", "2.0.0"]);
    }
}
