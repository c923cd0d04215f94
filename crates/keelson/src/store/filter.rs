//! Include/exclude filters and their comma-separated string encoding.
//!
//! Filter strings look like `"a,b,!c"`: a comma-joined list of tokens where a
//! leading `!` marks an exclusion. Mixed include/exclude tokens are allowed
//! in the same string.

use crate::domain::{Priority, Status};

/// An include/exclude filter over [`Status`] values. An empty filter (both
/// lists empty) is unconstrained and matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusFilter {
    /// Statuses that must match.
    pub include: Vec<Status>,
    /// Statuses that must not match.
    pub exclude: Vec<Status>,
}

impl StatusFilter {
    /// Parse a filter string of the form `"a,b,!c"`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for token in s.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if let Some(rest) = token.strip_prefix('!') {
                exclude.push(Status::new(rest));
            } else {
                include.push(Status::new(token));
            }
        }
        Self { include, exclude }
    }

    /// Render back to the `"a,!b,c"` string form.
    #[must_use]
    pub fn to_filter_string(&self) -> String {
        let mut parts: Vec<String> = self.include.iter().map(ToString::to_string).collect();
        parts.extend(self.exclude.iter().map(|s| format!("!{s}")));
        parts.join(",")
    }

    /// True if this filter has no constraints.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Evaluate the filter against a status.
    #[must_use]
    pub fn matches(&self, status: &Status) -> bool {
        if !self.exclude.is_empty() && self.exclude.contains(status) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.contains(status)
    }
}

/// An include/exclude filter over [`Priority`] values, identical in shape and
/// semantics to [`StatusFilter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityFilter {
    /// Priorities that must match.
    pub include: Vec<Priority>,
    /// Priorities that must not match.
    pub exclude: Vec<Priority>,
}

impl PriorityFilter {
    /// Parse a filter string of the form `"high,!low"`. Unrecognized tokens
    /// are silently skipped, matching the permissive parsing the tool
    /// dispatch surface uses for free-form filter arguments.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for token in s.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (negate, body) = match token.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, token),
            };
            if let Some(priority) = parse_priority(body) {
                if negate {
                    exclude.push(priority);
                } else {
                    include.push(priority);
                }
            }
        }
        Self { include, exclude }
    }

    /// True if this filter has no constraints.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Evaluate the filter against a priority.
    #[must_use]
    pub fn matches(&self, priority: Priority) -> bool {
        if !self.exclude.is_empty() && self.exclude.contains(&priority) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.contains(&priority)
    }
}

fn parse_priority(s: &str) -> Option<Priority> {
    match s.to_ascii_lowercase().as_str() {
        "high" => Some(Priority::High),
        "medium" => Some(Priority::Medium),
        "low" => Some(Priority::Low),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parse_mixed_include_exclude() {
        let f = StatusFilter::parse("a,!b,c");
        assert_eq!(f.include, vec![Status::new("a"), Status::new("c")]);
        assert_eq!(f.exclude, vec![Status::new("b")]);
    }

    #[test]
    fn parse_emit_round_trip() {
        let f = StatusFilter::parse("a,!b,c");
        let emitted = f.to_filter_string();
        assert_eq!(StatusFilter::parse(&emitted), f);
    }

    #[test]
    fn empty_filter_is_unconstrained_and_matches_everything() {
        let f = StatusFilter::default();
        assert!(f.is_unconstrained());
        assert!(f.matches(&Status::new("anything")));
    }

    #[rstest]
    #[case::include_only("open", true, false)]
    #[case::exclude_only("!open", false, true)]
    fn single_token_parses_correctly(
        #[case] token: &str,
        #[case] expect_include: bool,
        #[case] expect_exclude: bool,
    ) {
        let f = StatusFilter::parse(token);
        assert_eq!(!f.include.is_empty(), expect_include);
        assert_eq!(!f.exclude.is_empty(), expect_exclude);
    }

    #[test]
    fn exclude_takes_precedence_over_include() {
        // A status that is both included and excluded should not match;
        // exclude is checked first per the filter's documented semantics.
        let f = StatusFilter {
            include: vec![Status::new("a")],
            exclude: vec![Status::new("a")],
        };
        assert!(!f.matches(&Status::new("a")));
    }

    #[test]
    fn priority_filter_parses_case_insensitively() {
        let f = PriorityFilter::parse("HIGH,!low");
        assert_eq!(f.include, vec![Priority::High]);
        assert_eq!(f.exclude, vec![Priority::Low]);
    }

    #[test]
    fn priority_filter_unconstrained_matches_everything() {
        let f = PriorityFilter::default();
        assert!(f.matches(Priority::High));
        assert!(f.matches(Priority::Low));
    }
}
