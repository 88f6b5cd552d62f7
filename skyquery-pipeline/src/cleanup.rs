//! Deterministic clean-up of model output before it reaches the database.

const FENCE: &str = "```";

/// Strips markdown fences and trailing statements, then applies
/// [`rewrite_banned_functions`]. Idempotent on clean SQL; may return "".
pub fn clean_sql(raw: &str) -> String {
    let mut sql = raw.trim();

    if sql.starts_with(FENCE) {
        sql = match sql.split_once('\n') {
            Some((first, rest)) if is_fence_line(first) => rest,
            _ => strip_opening_marker(sql),
        };
    }
    if sql.ends_with(FENCE) {
        sql = match sql.rsplit_once('\n') {
            Some((rest, last)) if last.trim() == FENCE => rest,
            _ => &sql[..sql.len() - FENCE.len()],
        };
    }

    let mut sql = sql.replace("```sql", "").replace(FENCE, "").trim().to_string();

    if let Some(position) = sql.find(';') {
        if position + 1 < sql.len() {
            sql.truncate(position + 1);
        }
    }

    rewrite_banned_functions(&sql)
}

/// Lexical substitution for functions the prompt forbids. Not SQL-aware:
/// `EXTRACT(YEAR FROM x)` becomes `date_part(YEAR FROM x)`.
pub fn rewrite_banned_functions(sql: &str) -> String {
    sql.replace("EXTRACT(", "date_part(").replace("ROUND(", "CAST(")
}

/// "```" optionally followed by a single-word language tag (`sql`, ` sql`,
/// `postgresql`, `sql-92`), with nothing else on the line.
fn is_fence_line(line: &str) -> bool {
    line.trim()
        .strip_prefix(FENCE)
        .map(|tag| !tag.trim().contains(char::is_whitespace))
        .unwrap_or(false)
}

fn strip_opening_marker(sql: &str) -> &str {
    sql.strip_prefix("```sql")
        .or_else(|| sql.strip_prefix(FENCE))
        .unwrap_or(sql)
}
