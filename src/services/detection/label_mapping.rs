// Label Mapping
// Resolves oracle label vocabularies into the canonical REAL/FAKE verdict

use std::collections::BTreeSet;

use crate::models::Verdict;

const FAKE_MARKERS: &[&str] = &["fake", "false", "pants"];
const REAL_MARKERS: &[&str] = &["real", "true", "authentic"];
const ANONYMOUS_HEAD: [&str; 2] = ["label_0", "label_1"];
const SENTIMENT_HEAD: [&str; 2] = ["negative", "positive"];
const SUSPICIOUS_MARKERS: &[&str] = &[
    "misinfo",
    "misinformation",
    "decept",
    "hoax",
    "rumor",
    "fabricated",
    "clickbait",
];

/// Which rule produced a verdict, in evaluation order.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MappingRule {
    FakeMarker,
    RealMarker,
    AnonymousHead,
    SentimentHead,
    SuspiciousMarker,
    Fallback,
}

fn canonical(label: &str) -> String {
    label.trim().to_lowercase()
}

fn vocabulary_is(vocabulary: &BTreeSet<String>, expected: &[&str; 2]) -> bool {
    vocabulary.len() == expected.len() && expected.iter().all(|l| vocabulary.contains(*l))
}

/// Map the winning label to a verdict.
///
/// `vocabulary` is every label seen for the document; the anonymous-head and
/// sentiment rules only apply when it is exactly one of those two-label sets.
pub fn map_label<'a, I>(winner: &str, vocabulary: I) -> (Verdict, MappingRule)
where
    I: IntoIterator<Item = &'a str>,
{
    let label = canonical(winner);

    if FAKE_MARKERS.iter().any(|m| label.contains(m)) {
        return (Verdict::Fake, MappingRule::FakeMarker);
    }
    if REAL_MARKERS.iter().any(|m| label.contains(m)) {
        return (Verdict::Real, MappingRule::RealMarker);
    }

    let vocabulary: BTreeSet<String> = vocabulary.into_iter().map(canonical).collect();
    if vocabulary_is(&vocabulary, &ANONYMOUS_HEAD) {
        let verdict = if label == "label_1" {
            Verdict::Fake
        } else {
            Verdict::Real
        };
        return (verdict, MappingRule::AnonymousHead);
    }
    if vocabulary_is(&vocabulary, &SENTIMENT_HEAD) {
        let verdict = if label == "negative" {
            Verdict::Fake
        } else {
            Verdict::Real
        };
        return (verdict, MappingRule::SentimentHead);
    }

    if SUSPICIOUS_MARKERS.iter().any(|m| label.contains(m)) {
        return (Verdict::Fake, MappingRule::SuspiciousMarker);
    }

    (Verdict::Real, MappingRule::Fallback)
}

pub fn normalize_label<'a, I>(winner: &str, vocabulary: I) -> Verdict
where
    I: IntoIterator<Item = &'a str>,
{
    map_label(winner, vocabulary).0
}
