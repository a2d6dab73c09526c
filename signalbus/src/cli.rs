/*
 *   Copyright (c) 2026 signalbus contributors
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Raw `argv` scanning for the three flags the core itself recognizes: `-h`, `-jN`, and
//! `-v`/`-v<label>`.
//!
//! This is deliberately not built on a declarative argument parser. `-v<label>` matches
//! an open-ended, forward-compatible set of labels by prefix; a declarative parser would
//! need every label spelled out ahead of time. Unrecognized arguments are never an
//! error — they belong to collaborators this crate doesn't know about.

/// An immutable view over the process arguments (`argv[1..]`; `argv[0]` is the program
/// name and is never inspected).
#[derive(Debug, Clone, Copy)]
pub struct CliParameters<'a> {
    args: &'a [String],
}

impl<'a> CliParameters<'a> {
    #[must_use]
    pub fn new(args: &'a [String]) -> Self {
        Self { args }
    }

    /// True iff some argument equals `flag` exactly.
    #[must_use]
    pub fn has_param(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// The remainder of the first argument starting with `prefix`, or `None` if no
    /// argument carries that prefix.
    #[must_use]
    pub fn get_param(&self, prefix: &str) -> Option<&'a str> {
        self.args.iter().find_map(|a| a.strip_prefix(prefix))
    }

    /// [`Self::get_param`] followed by decimal parsing. `None` both when the prefix is
    /// absent and when the suffix fails to parse as an integer.
    #[must_use]
    pub fn get_num_param(&self, prefix: &str) -> Option<i64> {
        self.get_param(prefix)?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    #[test_case("-j0", Some(0))]
    #[test_case("-j1", Some(1))]
    #[test_case("-j4", Some(4))]
    #[test_case("-j128", Some(128))]
    #[test_case("-jNaN", None)]
    #[test_case("-j-3", Some(-3))]
    fn worker_count_flag_parses_across_suffixes(flag: &str, expected: Option<i64>) {
        let owned = args(&["prog", flag]);
        assert_eq!(CliParameters::new(&owned).get_num_param("-j"), expected);
    }

    #[test]
    fn absent_worker_count_flag_yields_none() {
        let owned = args(&["prog"]);
        assert_eq!(CliParameters::new(&owned).get_num_param("-j"), None);
    }

    #[test]
    fn global_and_labeled_verbose_flags_are_independent() {
        let owned = args(&["prog", "-v", "-vScheduler"]);
        let cli = CliParameters::new(&owned);
        assert!(cli.has_param("-v"));
        assert_eq!(cli.get_param("-vScheduler"), Some(""));

        // A process launched with only the labeled flag must not trip the global one:
        // `has_param` is an exact match, so `-vScheduler` never satisfies `-v`.
        let labeled_only = args(&["prog", "-vScheduler"]);
        let cli = CliParameters::new(&labeled_only);
        assert!(!cli.has_param("-v"));
        assert_eq!(cli.get_param("-vScheduler"), Some(""));
    }

    #[test]
    fn unknown_flags_are_ignored_not_errors() {
        let owned = args(&["prog", "--some-collaborator-flag=1"]);
        let cli = CliParameters::new(&owned);
        assert!(!cli.has_param("-h"));
        assert_eq!(cli.get_num_param("-j"), None);
    }

    #[test]
    fn help_flag_detected() {
        let owned = args(&["prog", "-h"]);
        assert!(CliParameters::new(&owned).has_param("-h"));
    }
}
