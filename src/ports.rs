use crate::entropy;
use crate::error::{PortSpecError, Result};
use rand::seq::SliceRandom;
use std::collections::BTreeSet;

/// Deduplicated set of ports parsed from a specification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet(BTreeSet<u32>);

/// Randomly ordered ports, fed one by one to the workers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSequence(Vec<u32>);

/// Parse a comma-separated list of ports and inclusive ranges, e.g. `22,80,8000-8010`.
///
/// - empty tokens (`,,`, leading or trailing commas) are skipped
/// - a range needs exactly one hyphen and two non-empty bounds
/// - bounds are not checked against 1-65535; a reversed range adds nothing
pub fn parse_port_spec(spec: &str) -> std::result::Result<PortSet, PortSpecError> {
    let mut set = BTreeSet::new();

    for token in spec.split(',') {
        if token.is_empty() {
            continue;
        }

        if !token.contains('-') {
            set.insert(parse_bound(token)?);
            continue;
        }

        let bounds: Vec<&str> = token.split('-').collect();
        let [lower, upper] = bounds.as_slice() else {
            return Err(PortSpecError::TooManyHyphens {
                token: token.to_string(),
            });
        };
        if lower.is_empty() {
            return Err(PortSpecError::MissingLowerBound {
                token: token.to_string(),
            });
        }
        let start = parse_bound(lower)?;
        if upper.is_empty() {
            return Err(PortSpecError::MissingUpperBound {
                token: token.to_string(),
            });
        }
        let end = parse_bound(upper)?;
        set.extend(start..=end);
    }

    Ok(PortSet(set))
}

/// Parse the specification and shuffle it into scanning order.
pub fn port_list(spec: &str) -> Result<PortSequence> {
    parse_port_spec(spec)?.shuffle()
}

/// Join a host and port into a dialable target, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: u32) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn parse_bound(s: &str) -> std::result::Result<u32, PortSpecError> {
    s.parse::<u32>().map_err(|source| PortSpecError::InvalidNumber {
        value: s.to_string(),
        source,
    })
}

impl PortSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, port: u32) -> bool {
        self.0.contains(&port)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// Materialize the set and apply an unbiased Fisher-Yates shuffle driven by an
    /// OS-seeded CSPRNG. Without entropy there is no order to scan in, so failure is fatal.
    pub fn shuffle(self) -> Result<PortSequence> {
        let mut ports: Vec<u32> = self.0.into_iter().collect();
        let mut rng = entropy::secure_rng()?;
        ports.shuffle(&mut rng);
        Ok(PortSequence(ports))
    }
}

impl FromIterator<u32> for PortSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        PortSet(iter.into_iter().collect())
    }
}

impl PortSequence {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl IntoIterator for PortSequence {
    type Item = u32;
    type IntoIter = std::vec::IntoIter<u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<u32>> for PortSequence {
    /// Use the given order as is, without shuffling.
    fn from(ports: Vec<u32>) -> Self {
        PortSequence(ports)
    }
}
