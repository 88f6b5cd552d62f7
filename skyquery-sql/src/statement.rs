use crate::ExecutionError;

/// Rejects text holding more than one statement. A single trailing `;` is
/// fine; semicolons inside quotes or comments do not count.
pub(crate) fn ensure_single_statement(sql: &str) -> Result<(), ExecutionError> {
    let body = sql.trim_end().trim_end_matches(';');
    if find_separator(body).is_some() {
        return Err(ExecutionError::Database(
            "cannot execute multiple statements in one query".to_string(),
        ));
    }
    Ok(())
}

/// Byte offset of the first `;` outside quotes and comments.
fn find_separator(sql: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            quote @ (b'\'' | b'"') => {
                index += 1;
                while index < bytes.len() && bytes[index] != quote {
                    index += 1;
                }
            }
            b'-' if bytes.get(index + 1) == Some(&b'-') => {
                while index < bytes.len() && bytes[index] != b'\n' {
                    index += 1;
                }
            }
            b'/' if bytes.get(index + 1) == Some(&b'*') => {
                index += 2;
                while index < bytes.len()
                    && !(bytes[index] == b'*' && bytes.get(index + 1) == Some(&b'/'))
                {
                    index += 1;
                }
                index += 1;
            }
            b';' => return Some(index),
            _ => {}
        }
        index += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::ensure_single_statement;
    use crate::ExecutionError;

    #[test]
    fn one_statement_with_or_without_semicolon_passes() {
        assert!(ensure_single_statement("SELECT 1").is_ok());
        assert!(ensure_single_statement("SELECT 1;  \n").is_ok());
        assert!(ensure_single_statement("SELECT 1;;").is_ok());
    }

    #[test]
    fn quoted_and_commented_semicolons_are_ignored() {
        assert!(ensure_single_statement("SELECT 'a;b' AS \"x;y\" FROM airlines").is_ok());
        assert!(ensure_single_statement("SELECT 1 -- trailing; note\n").is_ok());
        assert!(ensure_single_statement("SELECT /* ; */ 1").is_ok());
    }

    #[test]
    fn second_statement_is_rejected() {
        let err = ensure_single_statement("SELECT 1; DROP TABLE flights").unwrap_err();
        assert!(matches!(err, ExecutionError::Database(message) if message.contains("multiple statements")));
        assert!(ensure_single_statement("SELECT 1; SELECT 2;").is_err());
    }
}
