//! Document Structurer
//!
//! Splits raw contract text into ordered, titled sections. Parsing is total
//! for any non-blank input: when no heading scheme is recognized the whole
//! document becomes a single "Full Text" section.
//!
//! Heading detection tries a fixed list of numbering schemes in order and
//! adopts the first one that matches. Lines are NFKC-normalized for
//! detection only; section bodies are always the verbatim source text.

use clausecheck_utils::error::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::model::Section;

/// Title used when no heading is detected.
pub const FULL_TEXT_TITLE: &str = "Full Text";

/// Title of the text that precedes the first heading.
pub const PREAMBLE_TITLE: &str = "Preamble";

/// Section titles are cut to this many characters.
pub const MAX_TITLE_CHARS: usize = 40;

/// Longest line the standalone-line heuristic treats as a heading.
const MAX_STANDALONE_HEADING_CHARS: usize = 20;

/// The standalone-line heuristic needs at least this many candidates.
const MIN_STANDALONE_HEADINGS: usize = 2;

/// Chinese article/chapter numbering: `第一条`, `第12条`, `第三章`.
static ARTICLE_CN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^第[一二三四五六七八九十百千零〇两\d]+[条章节]").unwrap()
});

/// Article number followed by a separator or the end of the line.
static ARTICLE_CN_SEPARATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^第[一二三四五六七八九十百千零〇两\d]+[条章节](?:[\s:、.]|$)").unwrap()
});

/// English article numbering: `Article 3`, `SECTION IV`.
static ARTICLE_EN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(article|section|clause)\s+[\divxlc]+\b").unwrap());

/// Arabic numbering: `1.`, `2、` followed by text, but not `1.5` or `1.1`.
static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}[.、]\s*[^\d\s.]").unwrap());

/// Chinese enumeration: `一、`, `十二.`.
static ENUM_CN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[一二三四五六七八九十]+[、.]").unwrap());

/// Sentence-ending punctuation; lines ending in it are never bare headings.
const SENTENCE_ENDINGS: &[char] = &['。', '；', ';', '，', ',', '：', ':', '.', '!', '?', '！', '？'];

/// Caller-provided structure, overriding detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureHints {
    /// 0-based line numbers that start a section
    pub heading_lines: Vec<usize>,
}

/// Split `raw_text` into sections using the built-in heading heuristics.
///
/// # Errors
///
/// Returns `ParseError::EmptyDocument` for empty or whitespace-only input.
pub fn structure(raw_text: &str) -> Result<Vec<Section>, ParseError> {
    structure_with_hints(raw_text, &StructureHints::default())
}

/// Split `raw_text` into sections, using `hints` when it names any lines.
///
/// # Errors
///
/// Returns `ParseError::EmptyDocument` for empty or whitespace-only input and
/// `ParseError::HintOutOfRange` when a hint points past the last line.
pub fn structure_with_hints(
    raw_text: &str,
    hints: &StructureHints,
) -> Result<Vec<Section>, ParseError> {
    if raw_text.trim().is_empty() {
        return Err(ParseError::EmptyDocument);
    }

    let lines: Vec<&str> = raw_text.split_inclusive('\n').collect();

    let headings = if hints.heading_lines.is_empty() {
        detect_headings(&lines)
    } else {
        let mut headings = hints.heading_lines.clone();
        headings.sort_unstable();
        headings.dedup();
        if let Some(&line) = headings.iter().find(|&&line| line >= lines.len()) {
            return Err(ParseError::HintOutOfRange {
                line,
                line_count: lines.len(),
            });
        }
        headings
    };

    let sections = build_sections(raw_text, &lines, &headings);
    debug!(
        sections = sections.len(),
        headings = headings.len(),
        "Structured document"
    );
    Ok(sections)
}

fn build_sections(raw_text: &str, lines: &[&str], headings: &[usize]) -> Vec<Section> {
    let Some(&first_heading) = headings.first() else {
        return vec![Section {
            index: 0,
            title: FULL_TEXT_TITLE.to_string(),
            body: raw_text.to_string(),
        }];
    };

    let mut sections = Vec::with_capacity(headings.len() + 1);
    let preamble: String = lines[..first_heading].concat();

    // Blank lead-in lines are folded into the first section to keep coverage
    let mut carry = String::new();
    if preamble.trim().is_empty() {
        carry = preamble;
    } else {
        sections.push(Section {
            index: 0,
            title: PREAMBLE_TITLE.to_string(),
            body: preamble,
        });
    }

    for (i, &start) in headings.iter().enumerate() {
        let end = headings.get(i + 1).copied().unwrap_or(lines.len());
        let mut body = std::mem::take(&mut carry);
        body.push_str(&lines[start..end].concat());
        sections.push(Section {
            index: sections.len(),
            title: make_title(lines[start]),
            body,
        });
    }

    sections
}

fn make_title(line: &str) -> String {
    line.trim().chars().take(MAX_TITLE_CHARS).collect()
}

/// Line numbers of detected headings, in document order.
fn detect_headings(lines: &[&str]) -> Vec<usize> {
    let normalized: Vec<String> = lines
        .iter()
        .map(|line| line.nfkc().collect::<String>().trim().to_string())
        .collect();

    let schemes: [(&Lazy<Regex>, fn(&str) -> bool); 4] = [
        (&ARTICLE_CN, is_article_heading),
        (&ARTICLE_EN, any_line),
        (&NUMERIC, any_line),
        (&ENUM_CN, any_line),
    ];
    for (scheme, accept) in schemes {
        let matches: Vec<usize> = normalized
            .iter()
            .enumerate()
            .filter(|(_, line)| scheme.is_match(line) && accept(line))
            .map(|(i, _)| i)
            .collect();
        if !matches.is_empty() {
            debug!(pattern = scheme.as_str(), matches = matches.len(), "Heading scheme selected");
            return matches;
        }
    }

    let standalone = standalone_headings(&normalized);
    if standalone.len() >= MIN_STANDALONE_HEADINGS {
        debug!(matches = standalone.len(), "Standalone-line headings selected");
        return standalone;
    }

    Vec::new()
}

fn any_line(_: &str) -> bool {
    true
}

/// A `第X条` line is a heading when a separator follows the number, or when
/// it is a short label. Sentences that merely cite an article stay body text.
fn is_article_heading(line: &str) -> bool {
    if ARTICLE_CN_SEPARATED.is_match(line) {
        return true;
    }
    line.chars().count() <= MAX_STANDALONE_HEADING_CHARS && !line.ends_with(SENTENCE_ENDINGS)
}

/// Short lines that stand alone and are followed by a longer paragraph.
fn standalone_headings(lines: &[String]) -> Vec<usize> {
    let mut result = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let len = line.chars().count();
        if len == 0 || len > MAX_STANDALONE_HEADING_CHARS {
            continue;
        }
        if line.ends_with(SENTENCE_ENDINGS) {
            continue;
        }
        let preceded_by_break = i == 0 || lines[i - 1].is_empty();
        if !preceded_by_break {
            continue;
        }
        let next_paragraph = lines[i + 1..].iter().find(|l| !l.is_empty());
        if next_paragraph.is_some_and(|next| next.chars().count() > len) {
            result.push(i);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn titles(sections: &[Section]) -> Vec<&str> {
        sections.iter().map(|s| s.title.as_str()).collect()
    }

    fn concat(sections: &[Section]) -> String {
        sections.iter().map(|s| s.body.as_str()).collect()
    }

    #[test]
    fn test_empty_document_is_rejected() {
        assert_eq!(structure(""), Err(ParseError::EmptyDocument));
        assert_eq!(structure("  \n\t\n"), Err(ParseError::EmptyDocument));
    }

    #[test]
    fn test_chinese_articles() {
        let text = "采购合同\n甲方：某公司\n第一条 付款方式\n乙方应在收货后30日内付款。\n第二条 违约责任\n逾期付款按日万分之五计算违约金。\n";
        let sections = structure(text).unwrap();
        assert_eq!(
            titles(&sections),
            vec!["Preamble", "第一条 付款方式", "第二条 违约责任"]
        );
        assert!(sections[1].body.contains("30日内付款"));
        assert_eq!(concat(&sections), text);
    }

    #[test]
    fn test_article_cross_references_stay_in_body() {
        let text = "第一条 付款方式\n乙方应在收货后30日内付款。\n第二条 违约责任\n第一条约定的款项逾期支付的，按日万分之五计算违约金。\n";
        let sections = structure(text).unwrap();
        assert_eq!(titles(&sections), vec!["第一条 付款方式", "第二条 违约责任"]);
        assert!(sections[1].body.contains("按日万分之五"));
        assert_eq!(concat(&sections), text);
    }

    #[test]
    fn test_article_heading_forms() {
        let text = "第一条：定义\n本合同所称货物。\n第二条保密\n双方保密。\n第三条 乙方应按期交付。\n";
        let sections = structure(text).unwrap();
        assert_eq!(
            titles(&sections),
            vec!["第一条：定义", "第二条保密", "第三条 乙方应按期交付。"]
        );
    }

    #[test]
    fn test_no_headings_gives_full_text() {
        let text = "This agreement is made between the parties and covers everything.";
        let sections = structure(text).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, FULL_TEXT_TITLE);
        assert_eq!(sections[0].body, text);
    }

    #[test]
    fn test_blank_lead_in_is_folded_into_first_section() {
        let text = "\n\n第一条 定义\n本合同所称货物。\n";
        let sections = structure(text).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].index, 0);
        assert!(sections[0].body.starts_with("\n\n第一条"));
    }

    #[test]
    fn test_english_articles() {
        let text = "Article 1 Definitions\nTerms used here.\nARTICLE 2 Payment\nPay within 30 days.\n";
        let sections = structure(text).unwrap();
        assert_eq!(titles(&sections), vec!["Article 1 Definitions", "ARTICLE 2 Payment"]);
    }

    #[test]
    fn test_numeric_ignores_decimals() {
        let text = "1. 总则\n费率为1.5%。\n2、价款\n合计人民币十万元。\n";
        let sections = structure(text).unwrap();
        assert_eq!(titles(&sections), vec!["1. 总则", "2、价款"]);
    }

    #[test]
    fn test_fullwidth_digits_are_normalized_for_detection() {
        let text = "１．标的\n租赁房屋一套。\n２．租金\n每月五千元。\n";
        let sections = structure(text).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "１．标的");
        assert_eq!(concat(&sections), text);
    }

    #[test]
    fn test_chinese_enumeration() {
        let text = "一、合作内容\n双方共同开发软件。\n二、保密义务\n双方应对商业秘密保密。\n";
        assert_eq!(structure(text).unwrap().len(), 2);
    }

    #[test]
    fn test_standalone_lines() {
        let text = "Payment\nThe buyer pays the full price on delivery of the goods.\n\nTermination\nEither party may terminate with thirty days written notice.\n";
        let sections = structure(text).unwrap();
        assert_eq!(titles(&sections), vec!["Payment", "Termination"]);
    }

    #[test]
    fn test_single_standalone_line_is_body_text() {
        let text = "Payment\nThe buyer pays the full price on delivery of the goods.\n";
        assert_eq!(structure(text).unwrap()[0].title, FULL_TEXT_TITLE);
    }

    #[test]
    fn test_long_titles_are_truncated() {
        let heading = format!("第一条 {}", "很".repeat(80));
        let text = format!("{heading}\n正文。\n");
        let sections = structure(&text).unwrap();
        assert_eq!(sections[0].title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_hints_override_detection() {
        let text = "Intro\nfirst part\nsecond heading\nsecond part\n";
        let hints = StructureHints {
            heading_lines: vec![2, 0],
        };
        let sections = structure_with_hints(text, &hints).unwrap();
        assert_eq!(titles(&sections), vec!["Intro", "second heading"]);
        assert_eq!(concat(&sections), text);
    }

    #[test]
    fn test_hint_out_of_range() {
        let hints = StructureHints {
            heading_lines: vec![9],
        };
        assert_eq!(
            structure_with_hints("one\ntwo\n", &hints),
            Err(ParseError::HintOutOfRange {
                line: 9,
                line_count: 2
            })
        );
    }

    proptest! {
        #[test]
        fn prop_sections_cover_document(
            parts in proptest::collection::vec(
                prop_oneof![
                    Just("第一条 付款\n".to_string()),
                    Just("1. Scope\n".to_string()),
                    Just("\n".to_string()),
                    "[a-z 。，]{0,30}\n",
                    "[一二三]、[甲乙]{1,3}\n",
                ],
                1..20,
            )
        ) {
            let text: String = parts.concat();
            prop_assume!(!text.trim().is_empty());

            let sections = structure(&text).unwrap();
            prop_assert!(!sections.is_empty());
            for (i, section) in sections.iter().enumerate() {
                prop_assert_eq!(section.index, i);
            }
            prop_assert_eq!(concat(&sections), text);
        }
    }
}
