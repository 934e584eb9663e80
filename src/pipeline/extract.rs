//! Page extraction: serialise a Codeforces problem statement into one text blob.
//!
//! The routine locates the single `.problem-statement` container and reads,
//! in fixed order: title, time limit, memory limit, the description blocks
//! that follow the header, input and output format, the sample tests, and
//! the note. Each piece is trimmed; a missing piece becomes an empty string.
//! A page with no container yields the empty string, never an error.

use crate::error::StageError;
use crate::output::RawProblemText;
use crate::pipeline::page::HostPage;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static SEL_STATEMENT: Lazy<Selector> = Lazy::new(|| selector(".problem-statement"));
static SEL_TITLE: Lazy<Selector> = Lazy::new(|| selector(".title"));
static SEL_TIME_LIMIT: Lazy<Selector> = Lazy::new(|| selector(".time-limit"));
static SEL_MEMORY_LIMIT: Lazy<Selector> = Lazy::new(|| selector(".memory-limit"));
static SEL_DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector(".header + div"));
static SEL_INPUT_SPEC: Lazy<Selector> = Lazy::new(|| selector(".input-specification"));
static SEL_OUTPUT_SPEC: Lazy<Selector> = Lazy::new(|| selector(".output-specification"));
static SEL_SAMPLE_TEST: Lazy<Selector> = Lazy::new(|| selector(".sample-test"));
static SEL_SAMPLE_INPUT: Lazy<Selector> = Lazy::new(|| selector(".input pre"));
static SEL_SAMPLE_OUTPUT: Lazy<Selector> = Lazy::new(|| selector(".output pre"));
static SEL_NOTE: Lazy<Selector> = Lazy::new(|| selector(".note"));

/// Run the extraction routine inside the host page.
pub async fn extract(page: &dyn HostPage) -> Result<RawProblemText, StageError> {
    info!("Extracting problem statement from {}", page.origin());
    let text = page.execute_in_page(extract_problem_text).await?;
    if text.is_empty() {
        info!("No problem statement found on {}", page.origin());
    } else {
        debug!("Extracted {} chars of problem text", text.len());
    }
    Ok(RawProblemText::new(text))
}

/// The extraction routine: a pure, read-only function of the document.
pub fn extract_problem_text(doc: &Html) -> String {
    let Some(statement) = doc.select(&SEL_STATEMENT).next() else {
        return String::new();
    };

    let title = first_text(statement, &SEL_TITLE);
    let time_limit = first_text(statement, &SEL_TIME_LIMIT);
    let memory_limit = first_text(statement, &SEL_MEMORY_LIMIT);

    let mut description = String::new();
    for el in statement.select(&SEL_DESCRIPTION) {
        description.push_str(&element_text(el));
        description.push_str("\n\n");
    }

    let input_format = first_text(statement, &SEL_INPUT_SPEC);
    let output_format = first_text(statement, &SEL_OUTPUT_SPEC);

    let examples = statement
        .select(&SEL_SAMPLE_TEST)
        .next()
        .map(format_examples)
        .unwrap_or_default();

    let note = first_text(statement, &SEL_NOTE);

    format!(
        "{title}\n\n{time_limit}\n{memory_limit}\n\nDescription:\n{description}\n\n\
         Input Format:\n{input_format}\n\nOutput Format:\n{output_format}\n\n\
         Examples:\n{examples}\n\nNotes:\n{note}"
    )
}

/// Pair the Nth input with the Nth output; unmatched trailing blocks are dropped.
fn format_examples(sample: ElementRef<'_>) -> String {
    let inputs = sample.select(&SEL_SAMPLE_INPUT).map(pre_text);
    let outputs = sample.select(&SEL_SAMPLE_OUTPUT).map(pre_text);

    let mut examples = String::new();
    for (idx, (input, output)) in inputs.zip(outputs).enumerate() {
        examples.push_str(&format!(
            "Example {}:\nInput:\n{}\nOutput:\n{}\n\n",
            idx + 1,
            input,
            output
        ));
    }
    examples
}

fn first_text(scope: ElementRef<'_>, sel: &Selector) -> String {
    scope.select(sel).next().map(element_text).unwrap_or_default()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Text of a `<pre>` sample block, keeping line structure.
///
/// Codeforces renders sample lines either as raw newlines, as `<br>`, or as
/// one `<div class="test-example-line">` per line.
fn pre_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_pre(el, &mut out);
    out.trim().to_string()
}

fn collect_pre(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            match child_el.value().name() {
                "br" => out.push('\n'),
                "div" | "p" => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    collect_pre(child_el, out);
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                _ => collect_pre(child_el, out),
            }
        }
    }
}
