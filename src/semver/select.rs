//! Version selection: given a range expression and candidate versions,
//! tags and branches, pick the greatest satisfying candidate.

use crate::error::{Error, Result};

use super::{Range, Version};

/// A selected candidate and the bucket it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub version: String,
    pub source: &'static str,
}

/// Select the best candidate for `range`:
///
/// 1. when `range` parses, the greatest matching entry of `versions`, then
///    of `tags` (candidates are `try`-parsed, so loose entries like `1.2`
///    participate);
/// 2. otherwise, or when nothing matches, a branch textually equal to the
///    range expression;
/// 3. otherwise an error naming the range.
pub fn select(
    range: &str,
    versions: &[String],
    tags: &[String],
    branches: &[String],
) -> Result<Selection> {
    let parsed_range = Range::parse(range).ok();
    if let Some(parsed_range) = &parsed_range {
        for (bucket, source) in [(versions, "versions"), (tags, "tags")] {
            let mut best: Option<(Version, &String)> = None;
            for candidate in bucket {
                let version = match Version::try_parse(candidate) {
                    Ok(version) => version,
                    Err(_) => continue,
                };
                if !parsed_range.matches(&version) {
                    continue;
                }
                if best.as_ref().map_or(true, |(b, _)| version > *b) {
                    best = Some((version, candidate));
                }
            }
            if let Some((_, candidate)) = best {
                return Ok(Selection {
                    version: candidate.clone(),
                    source,
                });
            }
        }
    }
    if let Some(branch) = branches.iter().find(|branch| branch.as_str() == range) {
        return Ok(Selection {
            version: branch.clone(),
            source: "branches",
        });
    }
    if parsed_range.is_none() {
        return Err(Error::SemverParse(format!(
            "unable to parse semver range '{}'",
            range
        )));
    }
    Err(Error::SemverParse(format!(
        "unable to select version for range '{}'",
        range
    )))
}
