//! Comparator chains and range expressions.
//!
//! A range is an OR of comparator lists; each list ANDs its comparators.
//! Shorthands (`*`, partials, `~`, `^`, hyphen ranges) are lowered to
//! plain comparators once, at parse time, so matching is a pure
//! total-order evaluation.

use crate::error::{Error, Result};
use core::cmp::Ordering;
use core::fmt;

use super::{Parser, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Op::Eq => Ok(()),
            Op::Lt => f.write_str("<"),
            Op::Le => f.write_str("<="),
            Op::Gt => f.write_str(">"),
            Op::Ge => f.write_str(">="),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    pub fn new(op: Op, version: Version) -> Comparator {
        Comparator { op, version }
    }

    pub fn matches(&self, version: &Version) -> bool {
        let ordering = version.cmp(&self.version);
        match self.op {
            Op::Eq => ordering == Ordering::Equal,
            Op::Lt => ordering == Ordering::Less,
            Op::Le => ordering != Ordering::Greater,
            Op::Gt => ordering == Ordering::Greater,
            Op::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.op, self.version)
    }
}

/// An OR of AND-lists of comparators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub clauses: Vec<Vec<Comparator>>,
}

impl Range {
    /// Parse a range expression: comparator lists joined by `||`
    pub fn parse(input: &str) -> Result<Range> {
        let mut clauses = Vec::new();
        for clause in input.split("||") {
            clauses.push(parse_comp_list(clause.trim())?);
        }
        Ok(Range { clauses })
    }

    /// `∃ clause. ∀ comparator. comparator.matches(v)`
    pub fn matches(&self, version: &Version) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.iter().all(|c| c.matches(version)))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" || ")?;
            }
            for (j, comparator) in clause.iter().enumerate() {
                if j > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{}", comparator)?;
            }
        }
        Ok(())
    }
}

/// A version fragment as written in a range: wildcard or missing minor and
/// patch are remembered so the shorthand lowering can widen correctly
#[derive(Debug, Clone)]
struct Partial {
    major: u64,
    minor: Option<u64>,
    patch: Option<u64>,
    prerelease: Vec<super::Id>,
    build: Vec<super::Id>,
}

impl Partial {
    /// The partial with missing components zeroed
    fn floor(&self) -> Version {
        Version {
            major: self.major,
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            prerelease: self.prerelease.clone(),
            build: self.build.clone(),
        }
    }
}

/// `'v'? num ('.' (num|x|X|*))? ('.' (num|x|X|*))? prerel? build?`; the
/// whole token must be consumed
fn parse_partial(token: &str) -> Result<Partial> {
    let mut p = Parser::new(token);
    p.eat(b'v');
    let major = p.number()?;
    let minor = parse_partial_component(&mut p)?;
    let patch = if minor.is_some() {
        parse_partial_component(&mut p)?
    } else {
        None
    };
    let mut partial = Partial {
        major,
        minor,
        patch,
        prerelease: Vec::new(),
        build: Vec::new(),
    };
    if p.eat(b'-') {
        partial.prerelease = p.ids(true)?;
    }
    if p.eat(b'+') {
        partial.build = p.ids(true)?;
    }
    if !p.at_end() {
        return Err(Error::SemverParse(token.to_string()));
    }
    Ok(partial)
}

/// `.N`, `.x`, `.X` or `.*`; absent separators mean a missing component
fn parse_partial_component(p: &mut Parser) -> Result<Option<u64>> {
    if !p.eat(b'.') {
        return Ok(None);
    }
    match p.peek() {
        Some(b'x') | Some(b'X') | Some(b'*') => {
            p.eat(p.peek().unwrap());
            Ok(None)
        }
        _ => p.number().map(Some),
    }
}

/// Lower one comparator token into plain comparators
fn parse_comparator(token: &str) -> Result<Vec<Comparator>> {
    let (op, rest) = if let Some(rest) = token.strip_prefix(">=") {
        (Some(Op::Ge), rest)
    } else if let Some(rest) = token.strip_prefix("<=") {
        (Some(Op::Le), rest)
    } else if let Some(rest) = token.strip_prefix('>') {
        (Some(Op::Gt), rest)
    } else if let Some(rest) = token.strip_prefix('<') {
        (Some(Op::Lt), rest)
    } else if let Some(rest) = token.strip_prefix('=') {
        (Some(Op::Eq), rest)
    } else if let Some(rest) = token.strip_prefix('~') {
        (None, rest)
    } else if let Some(rest) = token.strip_prefix('^') {
        (None, rest)
    } else {
        (None, token)
    };
    let partial = parse_partial(rest)?;
    if let Some(op) = op {
        // an explicit operator pads the partial with zeros, no widening
        return Ok(vec![Comparator::new(op, partial.floor())]);
    }
    if token.starts_with('~') {
        return Ok(lower_tilde(&partial));
    }
    if token.starts_with('^') {
        return Ok(lower_caret(&partial));
    }
    Ok(lower_plain(&partial))
}

/// `N` and `N.M` widen to the containing release range; a full version is
/// an exact match
fn lower_plain(partial: &Partial) -> Vec<Comparator> {
    match (partial.minor, partial.patch) {
        (Some(_), Some(_)) => vec![Comparator::new(Op::Eq, partial.floor())],
        (Some(minor), None) => vec![
            Comparator::new(Op::Ge, partial.floor()),
            Comparator::new(Op::Lt, Version::new(partial.major, minor + 1, 0)),
        ],
        (None, _) => vec![
            Comparator::new(Op::Ge, partial.floor()),
            Comparator::new(Op::Lt, Version::new(partial.major + 1, 0, 0)),
        ],
    }
}

/// `~N.M.P`/`~N.M` allow patch-level movement, `~N` minor-level
fn lower_tilde(partial: &Partial) -> Vec<Comparator> {
    let upper = match partial.minor {
        Some(minor) => Version::new(partial.major, minor + 1, 0),
        None => Version::new(partial.major + 1, 0, 0),
    };
    vec![
        Comparator::new(Op::Ge, partial.floor()),
        Comparator::new(Op::Lt, upper),
    ]
}

/// `^` allows movement below the leftmost non-zero component
fn lower_caret(partial: &Partial) -> Vec<Comparator> {
    let floor = partial.floor();
    let upper = if floor.major > 0 {
        Version::new(floor.major + 1, 0, 0)
    } else if floor.minor > 0 {
        Version::new(0, floor.minor + 1, 0)
    } else {
        Version::new(0, 0, floor.patch + 1)
    };
    vec![
        Comparator::new(Op::Ge, floor),
        Comparator::new(Op::Lt, upper),
    ]
}

/// `A - B`: inclusive of a zero-padded `A`, bounded above by `B` padded to
/// its ceiling when partial
fn lower_hyphen(lower: &Partial, upper: &Partial) -> Vec<Comparator> {
    let high = match (upper.minor, upper.patch) {
        (Some(_), Some(_)) => Comparator::new(Op::Le, upper.floor()),
        (Some(minor), None) => Comparator::new(Op::Lt, Version::new(upper.major, minor + 1, 0)),
        (None, _) => Comparator::new(Op::Lt, Version::new(upper.major + 1, 0, 0)),
    };
    vec![Comparator::new(Op::Ge, lower.floor()), high]
}

/// One `||`-free clause: `*`/empty, a hyphen range, or whitespace-joined
/// comparators
fn parse_comp_list(clause: &str) -> Result<Vec<Comparator>> {
    if clause.is_empty() || clause == "*" {
        return Ok(vec![Comparator::new(Op::Ge, Version::new(0, 0, 0))]);
    }
    let tokens: Vec<&str> = clause.split_whitespace().collect();
    if tokens.len() == 3 && tokens[1] == "-" {
        return Ok(lower_hyphen(&parse_partial(tokens[0])?, &parse_partial(tokens[2])?));
    }
    if tokens.iter().any(|t| *t == "-") {
        return Err(Error::SemverParse(clause.to_string()));
    }
    let mut comparators = Vec::new();
    for token in tokens {
        comparators.extend(parse_comparator(token)?);
    }
    Ok(comparators)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lowered(input: &str) -> String {
        Range::parse(input).unwrap().to_string()
    }

    #[test]
    fn shorthands_lower_to_comparator_pairs() {
        assert_eq!(lowered("*"), ">=0.0.0");
        assert_eq!(lowered(""), ">=0.0.0");
        assert_eq!(lowered("1"), ">=1.0.0 <2.0.0");
        assert_eq!(lowered("1.x"), ">=1.0.0 <2.0.0");
        assert_eq!(lowered("1.2"), ">=1.2.0 <1.3.0");
        assert_eq!(lowered("1.2.x"), ">=1.2.0 <1.3.0");
        assert_eq!(lowered("1.2.3"), "1.2.3");
        assert_eq!(lowered("~1.2.3"), ">=1.2.3 <1.3.0");
        assert_eq!(lowered("~1.2"), ">=1.2.0 <1.3.0");
        assert_eq!(lowered("~1"), ">=1.0.0 <2.0.0");
        assert_eq!(lowered("~0.2.3"), ">=0.2.3 <0.3.0");
        assert_eq!(lowered("~0"), ">=0.0.0 <1.0.0");
        assert_eq!(lowered("^1.2.3"), ">=1.2.3 <2.0.0");
        assert_eq!(lowered("^0.2.3"), ">=0.2.3 <0.3.0");
        assert_eq!(lowered("^0.0.3"), ">=0.0.3 <0.0.4");
        assert_eq!(lowered("=0.0.3"), "0.0.3");
        assert_eq!(lowered("=9"), "9.0.0");
        assert_eq!(lowered(">0.0.3"), ">0.0.3");
        assert_eq!(lowered(">=1.2.3 <2.0"), ">=1.2.3 <2.0.0");
    }

    #[test]
    fn hyphen_ranges_pad_their_bounds() {
        assert_eq!(lowered("1.2.3 - 2.3.4"), ">=1.2.3 <=2.3.4");
        assert_eq!(lowered("1.2 - 2.3.4"), ">=1.2.0 <=2.3.4");
        assert_eq!(lowered("1.2.3 - 2.3"), ">=1.2.3 <2.4.0");
        assert_eq!(lowered("1.2.3 - 2"), ">=1.2.3 <3.0.0");
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        for bad in ["abc", ">", "<=", "~", "^", "=", ">a", "~1.a", "1.2.3 -", "1.2.3 - a", "a.2.3"] {
            assert!(Range::parse(bad).is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn matching_applies_the_total_order() {
        let range = Range::parse("~1.2").unwrap();
        assert!(range.matches(&Version::parse("1.2.3").unwrap()));
        assert!(!range.matches(&Version::parse("1.3.0").unwrap()));
        let range = Range::parse(">=1.0 <2.0").unwrap();
        assert!(range.matches(&Version::parse("1.5.0").unwrap()));
        assert!(!range.matches(&Version::parse("2.0.0").unwrap()));
    }

    #[test]
    fn or_clauses_union() {
        let range = Range::parse("^0.2 || ^1.1").unwrap();
        assert!(range.matches(&Version::parse("0.2.9").unwrap()));
        assert!(range.matches(&Version::parse("1.4.0").unwrap()));
        assert!(!range.matches(&Version::parse("1.0.0").unwrap()));
        assert_eq!(range.to_string(), ">=0.2.0 <0.3.0 || >=1.1.0 <2.0.0");
    }

    #[test]
    fn prereleases_sit_below_their_release() {
        let range = Range::parse("* 1.2.3-alpha").unwrap();
        assert_eq!(range.to_string(), ">=0.0.0 1.2.3-alpha");
        assert!(range.matches(&Version::parse("1.2.3-alpha").unwrap()));
        assert!(!range.matches(&Version::parse("1.2.3").unwrap()));
    }

    #[test]
    fn shorthand_and_lowered_pairs_match_the_same_sets() {
        let samples: Vec<Version> = [
            "0.0.3", "0.0.4", "0.2.0", "0.2.3", "0.3.0", "1.0.0", "1.2.0", "1.2.3", "1.2.9",
            "1.3.0", "2.0.0", "2.3.4", "2.4.0", "3.0.0", "1.2.3-alpha",
        ]
        .iter()
        .map(|s| Version::parse(s).unwrap())
        .collect();
        for (shorthand, pair) in [
            ("1", ">=1.0.0 <2.0.0"),
            ("1.2", ">=1.2.0 <1.3.0"),
            ("~1.2.3", ">=1.2.3 <1.3.0"),
            ("^0.2.3", ">=0.2.3 <0.3.0"),
            ("^0.0.3", ">=0.0.3 <0.0.4"),
            ("^1.2.3", ">=1.2.3 <2.0.0"),
            ("1.2.3 - 2.3.4", ">=1.2.3 <=2.3.4"),
        ] {
            let a = Range::parse(shorthand).unwrap();
            let b = Range::parse(pair).unwrap();
            for v in &samples {
                assert_eq!(a.matches(v), b.matches(v), "{} vs {} on {}", shorthand, pair, v);
            }
        }
    }
}
