use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};

/// Synthetic binding tag that follows the newest weekly tag.
pub const CURRENT_TAG: &str = "current";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagClass {
    Release,
    Weekly,
    Daily,
}

impl TagClass {
    pub const ALL: [TagClass; 3] = [Self::Release, Self::Weekly, Self::Daily];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Weekly => "weekly",
            Self::Daily => "daily",
        }
    }

    pub fn prefix(self) -> char {
        match self {
            Self::Release => 'v',
            Self::Weekly => 'w',
            Self::Daily => 'd',
        }
    }

    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'v' => Some(Self::Release),
            'w' => Some(Self::Weekly),
            'd' => Some(Self::Daily),
            _ => None,
        }
    }

    /// Name of the `<class>_latest` pointer, for classes that carry one.
    pub fn latest_pointer(self) -> Option<&'static str> {
        match self {
            Self::Release => None,
            Self::Weekly => Some("w_latest"),
            Self::Daily => Some("d_latest"),
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "release" | "v" => Some(Self::Release),
            "weekly" | "w" => Some(Self::Weekly),
            "daily" | "d" => Some(Self::Daily),
            _ => None,
        }
    }
}

impl fmt::Display for TagClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published build identifier such as `w_2024_10`, `d_2024_05_01` or
/// `v27_0_0_rc2`.
///
/// Ordering groups tags by class and then by recency, so within one class
/// a later tag always compares greater regardless of zero padding in the
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    id: String,
    class: TagClass,
    numbers: Vec<u32>,
    release_candidate: Option<u32>,
}

impl Tag {
    pub fn parse(input: &str) -> Result<Self> {
        let id = input.trim();
        let mut chars = id.chars();
        let Some(prefix) = chars.next() else {
            bail!("tag identifier must not be empty");
        };
        let class = TagClass::from_prefix(prefix)
            .ok_or_else(|| anyhow!("unknown tag class prefix '{prefix}' in '{id}'"))?;
        let rest = chars.as_str();

        let (numbers, release_candidate) = match class {
            TagClass::Weekly => (dated_components(id, rest, 2)?, None),
            TagClass::Daily => (dated_components(id, rest, 3)?, None),
            TagClass::Release => release_components(id, rest)?,
        };

        Ok(Self {
            id: id.to_string(),
            class,
            numbers,
            release_candidate,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn class(&self) -> TagClass {
        self.class
    }

    pub fn is_release_candidate(&self) -> bool {
        self.release_candidate.is_some()
    }

    /// Chronological comparison within one class. A final release sorts
    /// after all of its release candidates.
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        self.numbers.cmp(&other.numbers).then_with(|| {
            candidate_rank(self.release_candidate).cmp(&candidate_rank(other.release_candidate))
        })
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.class
            .cmp(&other.class)
            .then_with(|| self.recency_cmp(other))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl FromStr for Tag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Sorts by class, most recent first inside each class.
pub fn sort_most_recent_first(tags: &mut [Tag]) {
    tags.sort_by(|left, right| {
        left.class
            .cmp(&right.class)
            .then_with(|| right.recency_cmp(left))
            .then_with(|| right.id.cmp(&left.id))
    });
}

fn candidate_rank(release_candidate: Option<u32>) -> (u8, u32) {
    match release_candidate {
        Some(number) => (0, number),
        None => (1, 0),
    }
}

fn dated_components(id: &str, rest: &str, expected: usize) -> Result<Vec<u32>> {
    let Some(body) = rest.strip_prefix('_') else {
        bail!("tag '{id}' must separate its class prefix with '_'");
    };
    let numbers = numeric_fields(id, body)?;
    if numbers.len() != expected {
        bail!(
            "tag '{id}' must have {expected} numeric fields, found {}",
            numbers.len()
        );
    }
    Ok(numbers)
}

fn release_components(id: &str, rest: &str) -> Result<(Vec<u32>, Option<u32>)> {
    let (body, release_candidate) = match rest.rfind("rc") {
        Some(index) => {
            let digits = &rest[index + 2..];
            if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
                bail!("tag '{id}' has an invalid release candidate suffix");
            }
            let number = digits
                .parse::<u32>()
                .map_err(|_| anyhow!("tag '{id}' release candidate number is out of range"))?;
            let body = &rest[..index];
            (body.strip_suffix('_').unwrap_or(body), Some(number))
        }
        None => (rest, None),
    };
    Ok((numeric_fields(id, body)?, release_candidate))
}

fn numeric_fields(id: &str, body: &str) -> Result<Vec<u32>> {
    if body.is_empty() {
        bail!("tag '{id}' has no numeric component");
    }
    body.split('_')
        .map(|field| {
            if field.is_empty() || !field.chars().all(|ch| ch.is_ascii_digit()) {
                bail!("tag '{id}' has a malformed numeric field '{field}'");
            }
            field
                .parse::<u32>()
                .map_err(|_| anyhow!("tag '{id}' numeric field '{field}' is out of range"))
        })
        .collect()
}
