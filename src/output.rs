//! Data produced by the pipeline: the extracted text blob and the final record.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Language tag used for the signature fence in the Markdown export.
pub const SIGNATURE_FENCE_LANG: &str = "cpp";

// ── RawProblemText ───────────────────────────────────────────────────────

/// The normalised multi-section text scraped from a problem page.
///
/// Produced once per extraction and consumed by the prompt builder. It has no
/// structure beyond its textual section headers (`Description:`,
/// `Input Format:`, `Examples:` …).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProblemText(String);

impl RawProblemText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the page had no problem statement.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RawProblemText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RawProblemText {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RawProblemText {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── Difficulty ───────────────────────────────────────────────────────────

/// Difficulty label inferred by the model.
///
/// Only the exact labels `Easy`, `Medium` and `Hard` map to named variants.
/// Anything else the model returns (e.g. `"Easy/Medium"`) is kept verbatim in
/// [`Difficulty::Other`], so a record serialises back to what was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Other(String),
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Other(String::new())
    }
}

impl Difficulty {
    pub fn as_str(&self) -> &str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::Other(s) => s,
        }
    }
}

impl From<String> for Difficulty {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Easy" => Difficulty::Easy,
            "Medium" => Difficulty::Medium,
            "Hard" => Difficulty::Hard,
            _ => Difficulty::Other(s),
        }
    }
}

impl From<Difficulty> for String {
    fn from(d: Difficulty) -> Self {
        match d {
            Difficulty::Other(s) => s,
            named => named.as_str().to_string(),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ProblemRecord ────────────────────────────────────────────────────────

/// One worked example.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub explanation: String,
}

/// A LeetCode-style problem record.
///
/// Only ever built by [`crate::pipeline::parse::parse_response`] after schema
/// validation, so `title`, `description` and `function_signature` are always
/// non-empty. Serialises with the camelCase keys of the model's JSON contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemRecord {
    pub title: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub description: String,
    pub function_signature: String,
    pub constraints: Vec<String>,
    pub examples: Vec<Example>,
    #[serde(default)]
    pub test_case_format: String,
}

static RE_WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_PATH_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[/\\:*?"<>|]"#).unwrap());

impl ProblemRecord {
    /// Render the record as a Markdown document.
    pub fn to_markdown(&self) -> String {
        let mut md = String::with_capacity(
            self.description.len() + self.function_signature.len() + 256,
        );

        md.push_str(&format!("# {}\n\n", self.title));
        md.push_str(&format!("**Difficulty:** {}\n\n", self.difficulty));

        md.push_str("## Description\n");
        md.push_str(&self.description);
        md.push_str("\n\n");

        md.push_str("## Function Signature\n");
        md.push_str(&format!(
            "```{}\n{}\n```\n\n",
            SIGNATURE_FENCE_LANG, self.function_signature
        ));

        md.push_str("## Constraints\n");
        for c in &self.constraints {
            md.push_str(&format!("- {}\n", c));
        }
        md.push('\n');

        md.push_str("## Examples\n");
        for (idx, ex) in self.examples.iter().enumerate() {
            md.push_str(&format!("\n### Example {}\n", idx + 1));
            md.push_str(&format!("**Input:** {}\n", ex.input));
            md.push_str(&format!("**Output:** {}\n", ex.output));
            md.push_str(&format!("**Explanation:** {}\n", ex.explanation));
        }
        md.push('\n');

        md.push_str("## Test Case Format\n");
        md.push_str(&self.test_case_format);

        format!("{}\n", md.trim_end())
    }

    /// File name for a JSON export: whitespace runs in the title become `_`.
    ///
    /// Path separators and characters that are invalid on common file systems
    /// are replaced as well so the result is always a single path component.
    pub fn export_file_name(&self) -> String {
        let name = RE_WHITESPACE_RUN.replace_all(&self.title, "_");
        let name = RE_PATH_UNSAFE.replace_all(&name, "_");
        format!("{}_LC_Format.json", name)
    }

    /// Pretty-printed JSON using the wire keys.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ── ExportFormat ─────────────────────────────────────────────────────────

/// On-disk representation of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pretty-printed JSON with the wire keys.
    #[default]
    Json,
    /// Markdown document, as produced by [`ProblemRecord::to_markdown`].
    Markdown,
}

impl ExportFormat {
    /// `.md` / `.markdown` select Markdown; everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("md") | Some("markdown") => ExportFormat::Markdown,
            _ => ExportFormat::Json,
        }
    }

    pub fn render(&self, record: &ProblemRecord) -> Result<String, serde_json::Error> {
        match self {
            ExportFormat::Json => record.to_json_pretty(),
            ExportFormat::Markdown => Ok(record.to_markdown()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProblemRecord {
        ProblemRecord {
            title: "Sum of Two Numbers".into(),
            difficulty: Difficulty::Easy,
            description: "Return a + b.".into(),
            function_signature: "class Solution {\npublic:\n    int add(int a, int b) {\n        \n    }\n};".into(),
            constraints: vec!["1 <= a, b <= 100".into()],
            examples: vec![Example {
                input: "1 2".into(),
                output: "3".into(),
                explanation: "1 + 2 = 3".into(),
            }],
            test_case_format: "two integers per line".into(),
        }
    }

    #[test]
    fn difficulty_named_labels() {
        assert_eq!(Difficulty::from("Hard".to_string()), Difficulty::Hard);
        assert_eq!(
            Difficulty::from("hard".to_string()),
            Difficulty::Other("hard".into())
        );
        assert_eq!(String::from(Difficulty::Medium), "Medium");
        assert_eq!(String::from(Difficulty::Other("Easy/Medium".into())), "Easy/Medium");
    }

    #[test]
    fn serialises_with_camel_case_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("functionSignature").is_some());
        assert!(json.get("testCaseFormat").is_some());
        assert_eq!(json["difficulty"], "Easy");
    }

    #[test]
    fn markdown_contains_all_sections() {
        let md = sample().to_markdown();
        assert!(md.starts_with("# Sum of Two Numbers\n"));
        assert!(md.contains("**Difficulty:** Easy"));
        assert!(md.contains("## Function Signature\n```cpp\nclass Solution {"));
        assert!(md.contains("- 1 <= a, b <= 100"));
        assert!(md.contains("### Example 1\n**Input:** 1 2\n**Output:** 3\n"));
        assert!(md.ends_with("## Test Case Format\ntwo integers per line\n"));
    }

    #[test]
    fn markdown_with_no_examples_or_constraints() {
        let mut rec = sample();
        rec.constraints.clear();
        rec.examples.clear();
        let md = rec.to_markdown();
        assert!(md.contains("## Constraints\n\n## Examples\n\n## Test Case Format"));
    }

    #[test]
    fn export_file_name_replaces_whitespace() {
        let mut rec = sample();
        assert_eq!(rec.export_file_name(), "Sum_of_Two_Numbers_LC_Format.json");
        rec.title = "  A\t/ B  ".into();
        assert_eq!(rec.export_file_name(), "_A___B__LC_Format.json");
    }

    #[test]
    fn export_format_follows_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("a.md")), ExportFormat::Markdown);
        assert_eq!(ExportFormat::from_path(Path::new("a.MARKDOWN")), ExportFormat::Markdown);
        assert_eq!(ExportFormat::from_path(Path::new("a.json")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("noext")), ExportFormat::Json);

        let json = ExportFormat::Json.render(&sample()).unwrap();
        let back: ProblemRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn raw_text_emptiness() {
        assert!(RawProblemText::default().is_empty());
        assert!(!RawProblemText::from("A+B").is_empty());
        assert_eq!(RawProblemText::from("A+B").to_string(), "A+B");
    }
}
