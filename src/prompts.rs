//! Prompt template for the problem-conversion request.
//!
//! Callers can override the template via
//! [`crate::config::ConversionConfig::prompt_template`]; the constant here is
//! used only when no override is provided. Either way the extracted problem
//! text is embedded verbatim at the [`PROBLEM_PLACEHOLDER`] position.

use crate::config::PROBLEM_PLACEHOLDER;
use crate::output::RawProblemText;

/// Default conversion prompt.
///
/// The model must answer with a single JSON object and nothing else; the
/// key set here is exactly what [`crate::pipeline::parse`] validates.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are a competitive programming expert. Transform the following Codeforces problem into LeetCode-style format with an OOP function signature in C++.

The Codeforces problem is:
{problem}

IMPORTANT: Respond ONLY with valid JSON. Do not include any markdown code blocks, explanations, or additional text. The response must be a pure JSON object that starts with { and ends with }.

Return a JSON object with this exact structure:
{
  "title": "Problem Title (clean, without problem code)",
  "difficulty": "Easy/Medium/Hard",
  "description": "Clear problem description in LeetCode style",
  "functionSignature": "class Solution {\npublic:\n    ReturnType functionName(params) {\n        \n    }\n};",
  "constraints": ["constraint1", "constraint2", "..."],
  "examples": [
    {
      "input": "example input",
      "output": "example output",
      "explanation": "why this output"
    }
  ],
  "testCaseFormat": "Description of how test cases are formatted"
}

Guidelines:
- Convert the problem to use OOP style (class Solution with a member function)
- Use appropriate C++ types and STL containers
- Make the description clear and concise like LeetCode
- Infer reasonable difficulty level based on problem complexity
- Format constraints as bullet points
- Keep examples clear with explanations"#;

/// Embed the problem text into the prompt template.
///
/// Empty text is accepted; the model will then answer about nothing in
/// particular, which is why the orchestrator checks for it first.
pub fn build_prompt(problem: &RawProblemText, template: Option<&str>) -> String {
    template
        .unwrap_or(DEFAULT_PROMPT_TEMPLATE)
        .replacen(PROBLEM_PLACEHOLDER, problem.as_str(), 1)
}
