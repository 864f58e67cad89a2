//! Markdown to plain text, and plain text to sentences.

use regex::Regex;
use std::sync::OnceLock;

struct MarkupPatterns {
    fenced_code: Regex,
    inline_code: Regex,
    image: Regex,
    link: Regex,
    heading_marker: Regex,
    bold: Regex,
    italic: Regex,
    bullet: Regex,
    ordered: Regex,
    heading_line: Regex,
}

fn markup() -> &'static MarkupPatterns {
    static PATTERNS: OnceLock<MarkupPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| MarkupPatterns {
        fenced_code: Regex::new(r"(?s)```.*?```").expect("Invalid regex pattern"),
        inline_code: Regex::new(r"`[^`]+`").expect("Invalid regex pattern"),
        image: Regex::new(r"!\[[^\]]*\]\([^)]+\)").expect("Invalid regex pattern"),
        link: Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("Invalid regex pattern"),
        heading_marker: Regex::new(r"(?m)^#{1,6}[ \t]+").expect("Invalid regex pattern"),
        bold: Regex::new(r"\*\*([^*]+)\*\*").expect("Invalid regex pattern"),
        italic: Regex::new(r"\*([^*]+)\*").expect("Invalid regex pattern"),
        bullet: Regex::new(r"(?m)^[ \t]*[-*+][ \t]+").expect("Invalid regex pattern"),
        ordered: Regex::new(r"(?m)^[ \t]*\d+\.[ \t]+").expect("Invalid regex pattern"),
        heading_line: Regex::new(r"(?m)^#{1,6}[ \t]+(.+)$").expect("Invalid regex pattern"),
    })
}

/// Strip Markdown syntax, keeping the readable text.
///
/// Order matters: code goes first so its content is never treated as
/// markup, and images go before links so `![alt](src)` is dropped whole.
pub fn normalize_markdown(markdown: &str) -> String {
    let m = markup();
    let text = m.fenced_code.replace_all(markdown, "");
    let text = m.inline_code.replace_all(&text, "");
    let text = m.image.replace_all(&text, "");
    let text = m.link.replace_all(&text, "$1");
    let text = m.heading_marker.replace_all(&text, "");
    let text = m.bold.replace_all(&text, "$1");
    let text = m.italic.replace_all(&text, "$1");
    let text = m.bullet.replace_all(&text, "");
    let text = m.ordered.replace_all(&text, "");
    text.into_owned()
}

/// Split plain text on `。！？` and newlines, dropping fragments shorter than
/// `min_chars` characters after trimming.
pub fn split_sentences(text: &str, min_chars: usize) -> Vec<String> {
    text.split(['。', '！', '？', '\n'])
        .map(str::trim)
        .filter(|s| s.chars().count() >= min_chars)
        .map(str::to_string)
        .collect()
}

/// A document split into the two views the extractors read: heading titles
/// from the raw Markdown, and sentences from the normalized text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedText {
    pub headings: Vec<String>,
    pub sentences: Vec<String>,
}

impl PreparedText {
    pub fn new(markdown: &str, min_sentence_chars: usize) -> Self {
        Self {
            headings: heading_titles(markdown),
            sentences: split_sentences(&normalize_markdown(markdown), min_sentence_chars),
        }
    }
}

/// Titles of ATX heading lines, read from the raw Markdown.
pub fn heading_titles(markdown: &str) -> Vec<String> {
    markup()
        .heading_line
        .captures_iter(markdown)
        .map(|caps| caps[1].trim().to_string())
        .filter(|title| !title.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_markup() {
        let md = "# 第一章 板块构造\n\n**华北板块**与*扬子板块*。\n\n- 列表项目一\n2. 有序项目\n";
        let text = normalize_markdown(md);
        assert!(text.contains("第一章 板块构造"));
        assert!(!text.contains('#'));
        assert!(text.contains("华北板块与扬子板块。"));
        assert!(text.contains("\n列表项目一"));
        assert!(text.contains("\n有序项目"));
    }

    #[test]
    fn test_normalize_drops_code_and_images() {
        let md = "前文\n```\n郯庐断裂带位于华北\n```\n见`代码`与![断层图](fault.png)和[参考资料](http://x)";
        let text = normalize_markdown(md);
        assert!(!text.contains("郯庐断裂带"));
        assert!(!text.contains("代码"));
        assert!(!text.contains("断层图"));
        assert!(!text.contains("fault.png"));
        assert!(text.contains("参考资料"));
        assert!(!text.contains("http"));
    }

    #[test]
    fn test_heading_marker_only_at_line_start() {
        let text = normalize_markdown("颜色编号 #1 的区域");
        assert_eq!(text, "颜色编号 #1 的区域");
    }

    #[test]
    fn test_split_sentences_filters_short_fragments() {
        let sentences = split_sentences("短句。这是一个足够长的句子！\n岩浆\n火山活动十分频繁？", 6);
        assert_eq!(sentences, vec!["这是一个足够长的句子", "火山活动十分频繁"]);
    }

    #[test]
    fn test_split_sentences_counts_characters_not_bytes() {
        // 5 ideographs are 15 bytes but still too short
        assert!(split_sentences("郯庐断裂带", 6).is_empty());
        assert_eq!(split_sentences("郯庐断裂带东", 6).len(), 1);
    }

    #[test]
    fn test_heading_titles() {
        let titles = heading_titles("# 郯庐断裂带\n正文\n### 秦岭造山带 \n#不是标题\n");
        assert_eq!(titles, vec!["郯庐断裂带", "秦岭造山带"]);
    }

    #[test]
    fn test_prepared_text() {
        let text = PreparedText::new("# 郯庐断裂带\n郯庐断裂带位于华北板块与扬子板块之间。", 6);
        assert_eq!(text.headings, vec!["郯庐断裂带"]);
        // the heading line itself is only 5 characters once its marker is gone
        assert_eq!(text.sentences, vec!["郯庐断裂带位于华北板块与扬子板块之间"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_sentences(&normalize_markdown(""), 6).is_empty());
        assert!(split_sentences(&normalize_markdown("   \n\t\n"), 6).is_empty());
        assert!(heading_titles("").is_empty());
    }
}
