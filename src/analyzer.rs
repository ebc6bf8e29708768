// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Filename pattern analysis for tag and prefix/suffix suggestions

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Result of analyzing a set of filenames
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilenameAnalysis {
    /// Tags found in at least half of the files, in order of first appearance
    pub suggested_tags: Vec<String>,
    /// Leading tokens shared by every filename, tag tokens removed
    pub suggested_prefix: String,
    /// Trailing tokens shared by every filename, tag tokens removed
    pub suggested_suffix: String,
    /// Number of files each tag appears in at least once
    pub tag_frequency: HashMap<String, usize>,
    pub summary: AnalysisSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub total_files: usize,
    pub unique_tags_found: usize,
    pub has_common_prefix: bool,
    pub has_common_suffix: bool,
}

/// Parse filenames against a known tag vocabulary.
///
/// Pure and stateless: identical inputs always produce identical outputs.
pub struct FilenameAnalyzer {
    /// lowercase form -> catalog-canonical casing
    lookup: HashMap<String, String>,
}

impl FilenameAnalyzer {
    pub fn new(known_tags: &[String]) -> Self {
        let lookup = known_tags
            .iter()
            .map(|tag| (tag.to_lowercase(), tag.clone()))
            .collect();
        Self { lookup }
    }

    /// Split a filename's stem into tokens on runs of `_`, `-`, whitespace
    pub fn tokenize(&self, filename: &str) -> Vec<String> {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        stem.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| part.to_string())
            .collect()
    }

    /// Tokens matching a known tag, in their catalog-canonical casing.
    ///
    /// Duplicate tokens within one filename yield duplicate matches.
    pub fn matched_tags(&self, filename: &str) -> Vec<String> {
        self.tokenize(filename)
            .iter()
            .filter_map(|part| self.lookup.get(&part.to_lowercase()).cloned())
            .collect()
    }

    /// Analyze a file set for suggested tags and shared prefix/suffix.
    ///
    /// A tag is suggested when it appears in at least half of the files
    /// (inclusive). An empty input produces an all-empty result, never an
    /// error.
    pub fn analyze(&self, filenames: &[String]) -> FilenameAnalysis {
        if filenames.is_empty() {
            return FilenameAnalysis::default();
        }

        let all_parts: Vec<Vec<String>> =
            filenames.iter().map(|f| self.tokenize(f)).collect();

        // Frequency counts files, not occurrences
        let mut first_seen: Vec<String> = Vec::new();
        let mut tag_frequency: HashMap<String, usize> = HashMap::new();
        for filename in filenames {
            let mut seen_in_file = std::collections::HashSet::new();
            for tag in self.matched_tags(filename) {
                if seen_in_file.insert(tag.clone()) {
                    let count = tag_frequency.entry(tag.clone()).or_insert(0);
                    if *count == 0 {
                        first_seen.push(tag);
                    }
                    *count += 1;
                }
            }
        }

        let threshold = filenames.len() as f64 / 2.0;
        let suggested_tags: Vec<String> = first_seen
            .iter()
            .filter(|tag| tag_frequency[*tag] as f64 >= threshold)
            .cloned()
            .collect();

        let suggested_prefix = self.join_without_tags(common_prefix(&all_parts));
        let suggested_suffix = self.join_without_tags(common_suffix(&all_parts));

        let summary = AnalysisSummary {
            total_files: filenames.len(),
            unique_tags_found: tag_frequency.len(),
            has_common_prefix: !suggested_prefix.is_empty(),
            has_common_suffix: !suggested_suffix.is_empty(),
        };

        FilenameAnalysis {
            suggested_tags,
            suggested_prefix,
            suggested_suffix,
            tag_frequency,
            summary,
        }
    }

    /// Drop tokens that match a known tag, join the rest with underscores
    fn join_without_tags(&self, parts: Vec<String>) -> String {
        parts
            .into_iter()
            .filter(|part| !self.lookup.contains_key(&part.to_lowercase()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Longest leading token run equal (case-insensitively) across every list,
/// reported in the first list's original casing.
fn common_prefix(all_parts: &[Vec<String>]) -> Vec<String> {
    let min_len = match all_parts.iter().map(|parts| parts.len()).min() {
        Some(len) => len,
        None => return Vec::new(),
    };

    let mut common = Vec::new();
    for i in 0..min_len {
        let first = all_parts[0][i].to_lowercase();
        if all_parts
            .iter()
            .all(|parts| parts[i].to_lowercase() == first)
        {
            common.push(all_parts[0][i].clone());
        } else {
            break;
        }
    }
    common
}

/// Suffix counterpart: reverse, reuse the prefix logic, reverse back
fn common_suffix(all_parts: &[Vec<String>]) -> Vec<String> {
    let reversed: Vec<Vec<String>> = all_parts
        .iter()
        .map(|parts| parts.iter().rev().cloned().collect())
        .collect();

    let mut common = common_prefix(&reversed);
    common.reverse();
    common
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(tags: &[&str]) -> FilenameAnalyzer {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        FilenameAnalyzer::new(&tags)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_strips_extension_and_splits() {
        let a = analyzer(&[]);
        assert_eq!(
            a.tokenize("project_comics-001 final.jpg"),
            vec!["project", "comics", "001", "final"]
        );
        assert_eq!(a.tokenize("__a--b  c__.png"), vec!["a", "b", "c"]);
        assert!(a.tokenize(".jpg").is_empty());
    }

    #[test]
    fn test_matched_tags_canonical_casing_and_duplicates() {
        let a = analyzer(&["Comics", "nancy"]);
        assert_eq!(
            a.matched_tags("COMICS_comics_nancy_other.jpg"),
            vec!["Comics", "Comics", "nancy"]
        );
    }

    #[test]
    fn test_one_third_frequency_is_not_suggested() {
        let a = analyzer(&["comics", "nancy", "sluggo"]);
        let analysis = a.analyze(&names(&[
            "project_comics_001.jpg",
            "project_nancy_002.jpg",
            "project_sluggo_003.jpg",
        ]));

        assert_eq!(analysis.suggested_prefix, "project");
        assert_eq!(analysis.suggested_suffix, "");
        // Each tag sits at 1/3 frequency, below the half-of-files bar
        assert!(analysis.suggested_tags.is_empty());
        assert_eq!(analysis.tag_frequency["comics"], 1);
        assert_eq!(analysis.summary.total_files, 3);
        assert_eq!(analysis.summary.unique_tags_found, 3);
        assert!(analysis.summary.has_common_prefix);
        assert!(!analysis.summary.has_common_suffix);
    }

    #[test]
    fn test_two_of_three_is_suggested() {
        let a = analyzer(&["comics", "nancy"]);
        let analysis = a.analyze(&names(&[
            "trip_comics_a.jpg",
            "trip_comics_b.jpg",
            "trip_nancy_c.jpg",
        ]));

        assert_eq!(analysis.suggested_tags, vec!["comics"]);
        assert_eq!(analysis.tag_frequency["comics"], 2);
        assert_eq!(analysis.tag_frequency["nancy"], 1);
    }

    #[test]
    fn test_exactly_half_qualifies() {
        let a = analyzer(&["warhol"]);
        let analysis = a.analyze(&names(&[
            "warhol_01.jpg",
            "warhol_02.jpg",
            "other_03.jpg",
            "other_04.jpg",
        ]));
        assert_eq!(analysis.suggested_tags, vec!["warhol"]);
    }

    #[test]
    fn test_duplicate_tokens_count_one_file() {
        let a = analyzer(&["comics"]);
        let analysis = a.analyze(&names(&["comics_comics.jpg", "plain.jpg", "plain2.jpg"]));
        assert_eq!(analysis.tag_frequency["comics"], 1);
        assert!(analysis.suggested_tags.is_empty());
    }

    #[test]
    fn test_tag_tokens_filtered_from_prefix_without_breaking_run() {
        let a = analyzer(&["comics"]);
        let analysis = a.analyze(&names(&[
            "art_comics_set_1.jpg",
            "art_comics_set_2.jpg",
        ]));
        assert_eq!(analysis.suggested_prefix, "art_set");
    }

    #[test]
    fn test_common_suffix_detected() {
        let a = analyzer(&[]);
        let analysis = a.analyze(&names(&["alpha_scan_final.jpg", "beta_scan_final.jpg"]));
        assert_eq!(analysis.suggested_prefix, "");
        assert_eq!(analysis.suggested_suffix, "scan_final");
    }

    #[test]
    fn test_prefix_uses_first_filename_casing() {
        let a = analyzer(&[]);
        let analysis = a.analyze(&names(&["Project_a_1.jpg", "project_b_2.jpg"]));
        assert_eq!(analysis.suggested_prefix, "Project");
    }

    #[test]
    fn test_empty_input_yields_empty_result() {
        let a = analyzer(&["comics"]);
        let analysis = a.analyze(&[]);
        assert_eq!(analysis, FilenameAnalysis::default());
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let a = analyzer(&["comics", "nancy"]);
        let input = names(&["a_comics_x.jpg", "b_comics_x.jpg", "c_nancy_x.jpg"]);
        assert_eq!(a.analyze(&input), a.analyze(&input));
    }
}
