// src/version/mod.rs

//! Version handling for RPM-style units
//!
//! Provides the epoch:version-release triple (`Evr`) and the total ordering
//! used everywhere a "newest" unit has to be picked. Comparison follows the
//! rpmvercmp segment rules:
//!
//! - strings split into maximal runs of ASCII digits or ASCII letters,
//!   every other character is a separator
//! - numeric segments compare numerically (leading zeros ignored) and are
//!   newer than alphabetic segments
//! - alphabetic segments compare lexically
//! - `~` sorts before anything, even the end of the string (pre-releases)
//! - `^` sorts after the end of the string but before any further segment

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Compare two version (or release) strings with rpmvercmp semantics
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    loop {
        one = skip_separators(one);
        two = skip_separators(two);

        // Tilde: sorts before everything else
        let one_tilde = one.first() == Some(&b'~');
        let two_tilde = two.first() == Some(&b'~');
        if one_tilde || two_tilde {
            if !one_tilde {
                return Ordering::Greater;
            }
            if !two_tilde {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        // Caret: like end of string, but newer than an actual end
        let one_caret = one.first() == Some(&b'^');
        let two_caret = two.first() == Some(&b'^');
        if one_caret || two_caret {
            if one.is_empty() {
                return Ordering::Less;
            }
            if two.is_empty() {
                return Ordering::Greater;
            }
            if !one_caret {
                return Ordering::Greater;
            }
            if !two_caret {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one[0].is_ascii_digit();
        let (seg1, rest1) = take_segment(one, numeric);
        let (seg2, rest2) = take_segment(two, numeric);
        one = rest1;
        two = rest2;

        // Segments of different types: numeric is newer
        if seg2.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            let seg1 = strip_leading_zeros(seg1);
            let seg2 = strip_leading_zeros(seg2);
            seg1.len().cmp(&seg2.len()).then_with(|| seg1.cmp(seg2))
        } else {
            seg1.cmp(seg2)
        };

        if ord != Ordering::Equal {
            return ord;
        }
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (false, _) => Ordering::Greater,
        (_, false) => Ordering::Less,
    }
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|&c| c.is_ascii_alphanumeric() || c == b'~' || c == b'^')
        .unwrap_or(s.len());
    &s[start..]
}

fn take_segment(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let end = s
        .iter()
        .position(|c| {
            if numeric {
                !c.is_ascii_digit()
            } else {
                !c.is_ascii_alphabetic()
            }
        })
        .unwrap_or(s.len());
    s.split_at(end)
}

fn strip_leading_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&c| c != b'0').unwrap_or(s.len());
    &s[start..]
}

/// An epoch:version-release triple
///
/// Ordering is the rpmvercmp ordering and is total, but it is coarser than
/// string equality: `1.0` and `1.00` compare `Equal` while being different
/// strings. Use `PartialEq` when identity matters and `compare` when
/// ordering matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evr {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl Evr {
    pub fn new(epoch: u64, version: impl Into<String>, release: Option<String>) -> Self {
        Self {
            epoch,
            version: version.into(),
            release: release.filter(|r| !r.is_empty()),
        }
    }

    /// Parse an EVR string
    ///
    /// Format: [epoch:]version[-release]
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "2:1.2.3-4.el8" → epoch=2, version="1.2.3", release=Some("4.el8")
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        let (epoch_str, rest) = match s.split_once(':') {
            Some((e, r)) => (e, r),
            None => ("", s),
        };

        let epoch = parse_epoch(epoch_str)
            .map_err(|reason| Error::malformed(s, reason))?;

        // The release is everything after the last dash
        let (version, release) = match rest.rsplit_once('-') {
            Some((v, r)) => (v, Some(r.to_string())),
            None => (rest, None),
        };

        if version.is_empty() {
            return Err(Error::malformed(s, "empty version"));
        }

        Ok(Self::new(epoch, version, release))
    }

    /// Compare two EVRs: epoch, then version, then release
    pub fn compare(&self, other: &Evr) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| match (&self.release, &other.release) {
                (Some(a), Some(b)) => rpmvercmp(a, b),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
            })
    }

    /// Compare two EVRs, ignoring the release unless both sides have one
    ///
    /// This is how a versioned requirement such as `foo >= 1.2` is checked
    /// against a provide of `foo = 1.2-3`.
    pub fn compare_against(&self, other: &Evr) -> Ordering {
        if self.release.is_none() || other.release.is_none() {
            self.epoch
                .cmp(&other.epoch)
                .then_with(|| rpmvercmp(&self.version, &other.version))
        } else {
            self.compare(other)
        }
    }
}

/// Parse an epoch field; an empty string is epoch 0
pub fn parse_epoch(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }
    s.parse::<u64>()
        .map_err(|e| format!("invalid epoch '{}': {}", s, e))
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}
