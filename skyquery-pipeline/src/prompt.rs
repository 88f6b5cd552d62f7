use std::collections::HashMap;

use regex::Regex;
use skyquery_core::SkyqueryError;

/// `{{ name }}` placeholder template. Unknown placeholders render empty.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, vars: &HashMap<&str, String>) -> Result<String, SkyqueryError> {
        let pattern = Regex::new(r"\{\{\s*(\w+)\s*\}\}")
            .map_err(|e| SkyqueryError::InvalidConfig(e.to_string()))?;
        let rendered = pattern.replace_all(&self.template, |caps: &regex::Captures| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

pub const SQL_SYSTEM_PROMPT: &str = "You are a SQL expert. Generate ONLY the SQL query with NO markdown formatting, NO ```sql tags, and NO explanations.";

pub const SQL_PROMPT: &str = r#"Given the following database schema:
{{schema}}

{{history}}
{{error}}
User request: {{query}}

Generate a SQL query that answers the user's request. ONLY return the SQL query with NO markdown formatting, NO ```sql tags, and NO explanations.
IMPORTANT RULES:
1. Do not use ROUND() function, use CAST() with decimal type instead: "CAST(number AS decimal(10,2))"
2. Always use single SQL statement only, not multiple statements
3. Never use EXTRACT() function, use date_part() instead
4. All table columns used in the query must be properly listed in the GROUP BY clause
5. Never reference time_hour directly in GROUP BY, extract parts from it first"#;

pub const SQL_ERROR_BLOCK: &str = r#"
The previous SQL query failed with the following error:
{{error}}

Please fix the SQL query to avoid this error.
"#;

pub const FOLLOW_UP_SYSTEM_PROMPT: &str =
    "You are a data analyst. Generate ONLY a JSON array of follow-up questions with NO additional text.";

pub const FOLLOW_UP_PROMPT: &str = r#"Generate 3 insightful follow-up questions based on the following user query and data:

User query: {{query}}

Available columns in the data: {{columns}}

Sample results (up to {{sample_size}} rows):
{{sample}}

{{history}}

Generate 3 follow-up questions that would:
1. Deepen the analysis of the current data
2. Explore related aspects not covered in the current query
3. Offer a different perspective or comparison

IMPORTANT RULES:
1. Questions must be different from the current query
2. Questions should be clear and specific
3. Focus on questions that can be answered with SQL queries on this flight data
4. Questions should be natural, conversational, and not too technical
5. Questions should logically follow from the current query and results
6. Return ONLY a JSON array of strings with NO additional text
7. Each question should be 2-15 words long

Return a JSON array in exactly this format:
["Question 1?", "Question 2?", "Question 3?"]"#;
