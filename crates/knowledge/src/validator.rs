//! Citation and quality validation for generated answers.
//!
//! Validation never fails: it returns an [`AnswerValidationResult`] whose
//! issue list is empty exactly when the answer is acceptable. Rules live in
//! a fixed-order table so each one can be read and tested on its own.

use crate::config::ValidationConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*source\s*:\s*([^\]]+?)\s*(?:,\s*(?:page|pg\.?|p\.)\s*(\d+)\s*)?\]")
        .expect("citation pattern")
});

static WEB_CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*web(?:\s*source)?\s*:[^\]]*\]").expect("web citation pattern")
});

static HEDGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(generally|typically|usually|normally|in most cases|in general|it depends|may or may not|it is possible that)\b",
    )
    .expect("hedge pattern")
});

/// "According to the documents" only hedges when no citation follows it.
static VAGUE_ATTRIBUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\baccording to the (?:provided |available )?(?:documents|sources|context|materials?)\b(\s*\[)?",
    )
    .expect("attribution pattern")
});

static NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:not found|could not find|couldn't find|did not find|no information|(?:do|does) not (?:contain|address|mention|cover)|no (?:relevant )?(?:provision|reference|mention)s? (?:was|were)? ?found)\b",
    )
    .expect("not-found pattern")
});

static EXAMINED_DISCLOSURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:documents?|sources?|excerpts?|materials?)\s+(?:were\s+|was\s+)?(?:examined|reviewed|consulted|searched|analy[sz]ed)|(?:examined|reviewed|consulted|searched|analy[sz]ed)\s+(?:the\s+following\s+|these\s+|all\s+)?(?:documents?|sources?|excerpts?|materials?))\b",
    )
    .expect("disclosure pattern")
});

/// `1.` / `a)` at the start of a line, or `1)` / `(a)` anywhere. A bare
/// inline `1.` is a reference ("Article 1."), not an item.
static ENUMERATED_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^\s*\(?(\d{1,2}|[a-z])[.)]|(?:^|\s)\(?(\d{1,2}|[a-z])\))\s+\S")
        .expect("enumeration pattern")
});

static BULLET_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-*•]\s+\S").expect("bullet pattern"));

static CONJOINED_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:and|or)\s+(?:what|who|whom|whose|which|when|where|why|how)\b")
        .expect("conjunction pattern")
});

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s{0,3}(?:#{1,6}\s+\S|\*\*[^*\n]+\*\*:?\s*$)").expect("heading pattern")
});

/// Outcome of validating one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerValidationResult {
    pub valid: bool,
    pub issues: Vec<String>,
    pub citation_count: usize,
    pub section_count: usize,
    pub has_raw_chunk_copy: bool,
}

/// A `[Source: ...]` marker found in an answer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Citation {
    pub source: String,
    pub page: Option<u32>,
}

impl Citation {
    fn is_web(&self) -> bool {
        let source = self.source.to_lowercase();
        source.starts_with("http://") || source.starts_with("https://") || source.starts_with("www.")
    }
}

/// Everything the rules look at, computed once per answer.
struct AnswerFacts<'a> {
    config: &'a ValidationConfig,
    context_supplied: bool,
    citations: Vec<Citation>,
    web_citations: usize,
    hedges: Vec<String>,
    reports_not_found: bool,
    discloses_examined: bool,
    multi_part_question: bool,
    section_count: usize,
    raw_copy: bool,
}

struct Rule {
    name: &'static str,
    check: fn(&AnswerFacts<'_>) -> Option<String>,
}

const RULES: [Rule; 7] = [
    Rule {
        name: "minimum_citations",
        check: |facts| {
            let found = facts.citations.len();
            (found < facts.config.min_citations).then(|| {
                format!(
                    "Insufficient citations: found {}, required {}",
                    found, facts.config.min_citations
                )
            })
        },
    },
    Rule {
        name: "citation_completeness",
        check: |facts| {
            let partial: Vec<&str> = facts
                .citations
                .iter()
                .filter(|c| c.page.is_none())
                .map(|c| c.source.as_str())
                .collect();
            (!partial.is_empty()).then(|| {
                format!(
                    "Incomplete citations without a page number: {}",
                    partial.join(", ")
                )
            })
        },
    },
    Rule {
        name: "no_web_citations",
        check: |facts| {
            (facts.context_supplied && facts.web_citations > 0).then(|| {
                format!(
                    "Web citations are not allowed when document context is supplied ({} found)",
                    facts.web_citations
                )
            })
        },
    },
    Rule {
        name: "no_hedging",
        check: |facts| {
            (!facts.hedges.is_empty()).then(|| {
                let quoted: Vec<String> =
                    facts.hedges.iter().map(|h| format!("\"{}\"", h)).collect();
                format!("Hedging language: {}", quoted.join(", "))
            })
        },
    },
    Rule {
        name: "not_found_disclosure",
        check: |facts| {
            (facts.reports_not_found && !facts.discloses_examined).then(|| {
                "Answer reports missing information without listing the documents examined"
                    .to_string()
            })
        },
    },
    Rule {
        name: "multi_part_structure",
        check: |facts| {
            (facts.multi_part_question && facts.section_count == 0)
                .then(|| "Multi-part question answered without section headings".to_string())
        },
    },
    Rule {
        name: "no_raw_copy",
        check: |facts| {
            facts.raw_copy.then(|| {
                format!(
                    "Answer contains a raw chunk copy of at least {} characters; paraphrase the source",
                    facts.config.raw_copy_window
                )
            })
        },
    },
];

/// Validate `answer` against the citation and quality rules.
///
/// `context_chunks` are the texts supplied to the generator.
pub fn check_answer_quality<S: AsRef<str>>(
    question: &str,
    answer: &str,
    context_chunks: &[S],
    config: &ValidationConfig,
) -> AnswerValidationResult {
    let all_citations = extract_citations(answer);
    let (web, citations): (Vec<Citation>, Vec<Citation>) =
        all_citations.into_iter().partition(Citation::is_web);
    let discloses_examined = names_examined_documents(answer, &citations);

    let facts = AnswerFacts {
        config,
        context_supplied: !context_chunks.is_empty(),
        web_citations: web.len() + WEB_CITATION.find_iter(answer).count(),
        citations,
        hedges: hedging_phrases(answer),
        reports_not_found: NOT_FOUND.is_match(answer),
        discloses_examined,
        multi_part_question: is_multi_part_question(question),
        section_count: count_sections(answer),
        raw_copy: has_raw_chunk_copy(
            answer,
            context_chunks,
            config.min_raw_chunk_chars,
            config.raw_copy_window,
        ),
    };

    let issues: Vec<String> = RULES
        .iter()
        .filter_map(|rule| {
            let issue = (rule.check)(&facts);
            if let Some(issue) = &issue {
                tracing::debug!(rule = rule.name, "Validation issue: {}", issue);
            }
            issue
        })
        .collect();

    AnswerValidationResult {
        valid: issues.is_empty(),
        issues,
        citation_count: facts.citations.len(),
        section_count: facts.section_count,
        has_raw_chunk_copy: facts.raw_copy,
    }
}

/// Distinct citation markers, sorted. Source names compare case-insensitively.
pub fn extract_citations(answer: &str) -> Vec<Citation> {
    let distinct: BTreeSet<Citation> = CITATION
        .captures_iter(answer)
        .filter_map(|caps| {
            let source = caps.get(1)?.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            let page = caps.get(2).and_then(|p| p.as_str().parse().ok());
            Some(Citation {
                source: source.to_lowercase(),
                page,
            })
        })
        .collect();
    distinct.into_iter().collect()
}

fn hedging_phrases(answer: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |phrase: String| {
        if !found.contains(&phrase) {
            found.push(phrase);
        }
    };

    for m in HEDGE.find_iter(answer) {
        push(m.as_str().to_lowercase());
    }
    for caps in VAGUE_ATTRIBUTION.captures_iter(answer) {
        if caps.get(1).is_none() {
            if let Some(m) = caps.get(0) {
                push(m.as_str().trim().to_lowercase());
            }
        }
    }
    found
}

/// Whether the answer says which documents it examined and names at least
/// one of them: a list after the disclosure ("Documents reviewed: ..."), a
/// citation marker, or a cited source named in the same sentence.
fn names_examined_documents(answer: &str, citations: &[Citation]) -> bool {
    EXAMINED_DISCLOSURE.find_iter(answer).any(|m| {
        let head = &answer[..m.start()];
        let sentence_start = head
            .rfind(|c: char| matches!(c, '.' | '!' | '?' | '\n'))
            .map_or(0, |i| i + 1);
        let tail = &answer[m.end()..];
        let tail = &tail[..tail.find("\n\n").unwrap_or(tail.len())];
        let around = format!("{} {}", &head[sentence_start..], tail).to_lowercase();

        let listed = tail
            .trim_start()
            .strip_prefix(':')
            .is_some_and(|rest| rest.chars().any(char::is_alphanumeric));

        listed
            || CITATION.is_match(&around)
            || citations.iter().any(|c| around.contains(&c.source))
    })
}

/// Whether a question asks for several things at once.
///
/// True for an enumeration that starts at 1 / a and reaches 2 / b, for two
/// or more bullet lines, for more than one question mark, or for an
/// "and/or" followed by an interrogative.
pub fn is_multi_part_question(question: &str) -> bool {
    let markers: HashSet<String> = ENUMERATED_ITEM
        .captures_iter(question)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_lowercase())
        })
        .collect();
    let enumerated = (markers.contains("1") && markers.contains("2"))
        || (markers.contains("a") && markers.contains("b"));

    enumerated
        || BULLET_ITEM.find_iter(question).count() >= 2
        || question.matches('?').count() >= 2
        || CONJOINED_QUESTION.is_match(question)
}

/// Markdown (`## ...`) and bold-line headings.
pub fn count_sections(answer: &str) -> usize {
    HEADING.find_iter(answer).count()
}

/// Whether any chunk of at least `min_chunk_chars` shares a run of
/// `window` characters with the answer, after whitespace normalization.
pub fn has_raw_chunk_copy<S: AsRef<str>>(
    answer: &str,
    chunks: &[S],
    min_chunk_chars: usize,
    window: usize,
) -> bool {
    if window == 0 {
        return false;
    }

    let answer = normalize_whitespace(answer);
    let answer_windows: HashSet<&str> = char_windows(&answer, window).collect();
    if answer_windows.is_empty() {
        return false;
    }

    chunks.iter().any(|chunk| {
        let chunk = normalize_whitespace(chunk.as_ref());
        chunk.chars().count() >= min_chunk_chars
            && char_windows(&chunk, window).any(|w| answer_windows.contains(w))
    })
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every substring of exactly `window` characters.
fn char_windows(text: &str, window: usize) -> impl Iterator<Item = &str> + '_ {
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let count = bounds.len().saturating_sub(window);

    (0..count).map(move |start| &text[bounds[start]..bounds[start + window]])
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_CONTEXT: [&str; 0] = [];

    fn config() -> ValidationConfig {
        ValidationConfig::default()
    }

    fn good_answer() -> String {
        "The seller must hand over the goods at the agreed place [Source: Civil Code, page 10]. \
         Payment falls due on delivery [Source: Civil Code, page 11]. \
         Risk moves to the buyer once the goods are handed over [Source: Sales Act, page 3]."
            .to_string()
    }

    fn validate(question: &str, answer: &str) -> AnswerValidationResult {
        check_answer_quality(question, answer, &["short chunk"], &config())
    }

    #[test]
    fn test_three_page_qualified_citations_pass() {
        let result = validate("Who bears the risk?", &good_answer());
        assert!(result.valid, "{:?}", result.issues);
        assert_eq!(result.citation_count, 3);
        assert!(!result.has_raw_chunk_copy);
    }

    #[test]
    fn test_two_citations_fail() {
        let answer = "The seller delivers [Source: Civil Code, page 10]. \
                      The buyer pays [Source: Civil Code, page 11]. \
                      The buyer pays [Source: civil code, page 11].";
        let result = validate("Who pays?", answer);

        assert!(!result.valid);
        assert_eq!(result.citation_count, 2);
        assert_eq!(
            result.issues,
            vec!["Insufficient citations: found 2, required 3".to_string()]
        );
    }

    #[test]
    fn test_citation_without_page_is_incomplete() {
        let answer = format!("{} Also see [Source: Labor Act].", good_answer());
        let result = validate("Who bears the risk?", &answer);
        assert_eq!(result.citation_count, 4);
        assert_eq!(result.issues.len(), 1);
        assert!(result.issues[0].starts_with("Incomplete citations"));
        assert!(result.issues[0].contains("labor act"));
    }

    #[test]
    fn test_page_abbreviation_accepted() {
        let citations = extract_citations("[Source: Civil Code, p. 4] [source: Sales Act,  pg 9]");
        assert_eq!(
            citations,
            vec![
                Citation {
                    source: "civil code".to_string(),
                    page: Some(4)
                },
                Citation {
                    source: "sales act".to_string(),
                    page: Some(9)
                },
            ]
        );
    }

    #[test]
    fn test_web_citations_rejected_only_with_context() {
        let answer = format!(
            "{} A blog agrees [Web: Legal blog] and [Source: https://example.org/post, page 1].",
            good_answer()
        );

        let with_context = check_answer_quality("q", &answer, &["chunk"], &config());
        assert!(with_context
            .issues
            .iter()
            .any(|i| i.starts_with("Web citations") && i.contains("(2 found)")));
        assert_eq!(with_context.citation_count, 3);

        let without_context = check_answer_quality("q", &answer, &NO_CONTEXT, &config());
        assert!(!without_context
            .issues
            .iter()
            .any(|i| i.starts_with("Web citations")));
    }

    #[test]
    fn test_hedging_detected() {
        let answer = format!(
            "Generally, the seller delivers. {} According to the documents, this typically applies.",
            good_answer()
        );
        let result = validate("q", &answer);
        assert_eq!(
            result.issues,
            vec![
                "Hedging language: \"generally\", \"typically\", \"according to the documents\""
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_attribution_with_citation_is_not_hedging() {
        let answer = format!(
            "According to the documents [Source: Civil Code, page 10], delivery comes first. {}",
            good_answer()
        );
        assert!(validate("q", &answer).valid);
    }

    #[test]
    fn test_not_found_requires_disclosure() {
        let base = good_answer();
        let bare = format!("{} The rule on interest could not find support.", base);
        let result = validate("q", &bare);
        assert!(result
            .issues
            .iter()
            .any(|i| i.contains("without listing the documents examined")));

        let disclosed = format!(
            "{} Information on interest was not found. Documents examined: Civil Code, Sales Act.",
            base
        );
        assert!(validate("q", &disclosed).valid);
    }

    #[test]
    fn test_disclosure_must_name_documents() {
        let base = good_answer();
        let bare = format!(
            "{} The notice period was not found. All documents were reviewed.",
            base
        );
        let result = validate("What is the notice period?", &bare);
        assert!(!result.valid);
        assert_eq!(
            result.issues,
            vec![
                "Answer reports missing information without listing the documents examined"
                    .to_string()
            ]
        );

        let named = format!(
            "{} The notice period was not found. The documents reviewed were the Civil Code and the Sales Act.",
            base
        );
        assert!(validate("What is the notice period?", &named).valid);

        let listed = format!(
            "{} The notice period was not found.\n\nSources consulted:\n- Labor Act\n- Lease Act",
            base
        );
        assert!(validate("What is the notice period?", &listed).valid);
    }

    #[test]
    fn test_multi_part_question_needs_sections() {
        let question = "1) obligations of the seller 2) obligations of the buyer";
        assert!(is_multi_part_question(question));

        let flat = validate(question, &good_answer());
        assert_eq!(
            flat.issues,
            vec!["Multi-part question answered without section headings".to_string()]
        );

        let sectioned = "## Obligations of the seller\n\nThe seller must hand over the goods [Source: Civil Code, page 10].\n\n\
             ## Obligations of the buyer\n\nPayment falls due on delivery [Source: Civil Code, page 11], \
             and risk moves on handover [Source: Sales Act, page 3].";
        let result = validate(question, sectioned);
        assert!(result.valid, "{:?}", result.issues);
        assert_eq!(result.section_count, 2);
    }

    #[test]
    fn test_multi_part_classification() {
        assert!(is_multi_part_question("What is a lease and who may terminate it?"));
        assert!(is_multi_part_question("Is notice required? Is it written?"));
        assert!(is_multi_part_question("Explain:\n- formation\n- termination"));
        assert!(is_multi_part_question("(a) capacity (b) consent"));
        assert!(!is_multi_part_question("What does article 5) of the Civil Code say?"));
        assert!(!is_multi_part_question("Who pays the notary and the registry fees?"));
        assert!(is_multi_part_question("1. formation\n2. termination"));
        assert!(!is_multi_part_question("Does Article 1. and Article 2. apply here"));
    }

    #[test]
    fn test_raw_chunk_copy_detected() {
        let chunk = "The seller is obliged to deliver the goods, hand over any documents relating to them \
                     and transfer the property in the goods, as required by the contract.";
        assert!(chunk.len() >= 100);

        let copied = format!(
            "{} In short: the seller is obliged to deliver the goods, hand over any documents relating to   them \
             and transfer the property.",
            good_answer()
        )
        .replace("the seller is obliged", "The seller is obliged");
        let result = check_answer_quality("q", &copied, &[chunk], &config());
        assert!(result.has_raw_chunk_copy);
        assert!(result.issues.iter().any(|i| i.contains("raw chunk copy")));

        let paraphrased = check_answer_quality("q", &good_answer(), &[chunk], &config());
        assert!(!paraphrased.has_raw_chunk_copy);
    }

    #[test]
    fn test_short_chunks_are_not_checked_for_copying() {
        let chunk = "Short provision text that is copied word for word into the answer here.";
        assert!(chunk.len() < 100);
        assert!(!has_raw_chunk_copy(chunk, &[chunk], 100, 20));
        assert!(has_raw_chunk_copy(chunk, &[chunk], 10, 20));
    }

    #[test]
    fn test_char_windows_respect_multibyte() {
        let windows: Vec<&str> = char_windows("añoé", 2).collect();
        assert_eq!(windows, vec!["añ", "ño", "oé"]);
        assert_eq!(char_windows("ab", 3).count(), 0);
    }

    #[test]
    fn test_issue_order_follows_rule_table() {
        let question = "1) formation 2) termination";
        let answer = "Generally the lease ends [Source: Lease Act].";
        let result = validate(question, answer);

        assert_eq!(result.issues.len(), 4);
        assert!(result.issues[0].starts_with("Insufficient citations"));
        assert!(result.issues[1].starts_with("Incomplete citations"));
        assert!(result.issues[2].starts_with("Hedging language"));
        assert!(result.issues[3].starts_with("Multi-part question"));
        assert_eq!(RULES.len(), 7);
    }
}
