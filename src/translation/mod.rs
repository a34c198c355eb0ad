//! Compile `#{...}` statement templates into driver SQL.

mod scanner;

use scanner::{
    BLOCK_CLOSE, BLOCK_OPEN, LINE_COMMENT, PLACEHOLDER_OPEN, State, closes_dollar_quote,
    dollar_tag_len, scan_placeholder, starts_pair,
};

use crate::error::SqlMapperError;
use crate::mapping::ParameterMapping;

/// Target placeholder style for compiled statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    Sqlite,
}

impl PlaceholderStyle {
    /// Placeholder text for a zero-based parameter position.
    #[must_use]
    pub fn placeholder(self, position: usize) -> String {
        match self {
            PlaceholderStyle::Postgres => format!("${}", position + 1),
            PlaceholderStyle::Sqlite => format!("?{}", position + 1),
        }
    }
}

/// Replace every `#{...}` placeholder with the driver's positional placeholder and collect the
/// parameter mappings in declaration order.
///
/// Placeholders inside quoted strings, comments, and dollar-quoted blocks are left alone:
/// ```rust
/// use reactive_sql_mapper::translation::{PlaceholderStyle, compile_template};
///
/// let (sql, mappings) = compile_template(
///     "select * from blog where id = #{id} and title <> '#{skip}'",
///     PlaceholderStyle::Postgres,
/// )?;
/// assert_eq!(sql, "select * from blog where id = $1 and title <> '#{skip}'");
/// assert_eq!(mappings.len(), 1);
/// # Ok::<(), reactive_sql_mapper::SqlMapperError>(())
/// ```
///
/// # Errors
/// Returns `SqlMapperError::ConfigError` for an unterminated or malformed placeholder.
pub fn compile_template(
    template: &str,
    style: PlaceholderStyle,
) -> Result<(String, Vec<ParameterMapping>), SqlMapperError> {
    let mut out = String::with_capacity(template.len());
    let mut mappings = Vec::new();
    let mut state = State::Normal;
    let mut copied_to = 0;
    let mut idx = 0;
    let bytes = template.as_bytes();

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if starts_pair(bytes, idx, LINE_COMMENT) => state = State::LineComment,
                _ if starts_pair(bytes, idx, BLOCK_OPEN) => state = State::BlockComment(1),
                b'$' => {
                    if let Some(len) = dollar_tag_len(bytes, idx) {
                        state = State::DollarQuoted { open: idx, len };
                        idx += len - 1;
                    }
                }
                _ if starts_pair(bytes, idx, PLACEHOLDER_OPEN) => {
                    let end = scan_placeholder(bytes, idx).ok_or_else(|| {
                        SqlMapperError::ConfigError(format!(
                            "unterminated placeholder at byte {idx} in: {template}"
                        ))
                    })?;
                    let mapping = ParameterMapping::parse(&template[idx + 2..end])?;
                    out.push_str(&template[copied_to..idx]);
                    out.push_str(&style.placeholder(mappings.len()));
                    mappings.push(mapping);
                    copied_to = end + 1;
                    idx = end;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if starts_pair(bytes, idx, BLOCK_OPEN) {
                    state = State::BlockComment(depth + 1);
                } else if starts_pair(bytes, idx, BLOCK_CLOSE) {
                    if depth == 1 {
                        state = State::Normal;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                }
            }
            State::DollarQuoted { open, len } => {
                if b == b'$' && closes_dollar_quote(bytes, idx, open, len) {
                    state = State::Normal;
                    idx += len - 1;
                }
            }
        }
        idx += 1;
    }

    out.push_str(&template[copied_to..]);
    Ok((out, mappings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParameterMode, SqlType};

    #[test]
    fn compiles_sqlite_placeholders() {
        let (sql, mappings) = compile_template(
            "select * from t where a = #{a} and b = #{b}",
            PlaceholderStyle::Sqlite,
        )
        .unwrap();
        assert_eq!(sql, "select * from t where a = ?1 and b = ?2");
        let names: Vec<_> = mappings.iter().map(|m| m.property.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn compiles_postgres_placeholders_with_attributes() {
        let (sql, mappings) = compile_template(
            "call proc(#{input, sqlType=INTEGER}, #{result, mode=OUT, jdbcType=VARCHAR})",
            PlaceholderStyle::Postgres,
        )
        .unwrap();
        assert_eq!(sql, "call proc($1, $2)");
        assert_eq!(mappings[0].sql_type, Some(SqlType::Integer));
        assert_eq!(mappings[1].mode, ParameterMode::Out);
        assert_eq!(mappings[1].sql_type, Some(SqlType::Varchar));
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select '#{a}', #{b} -- #{c}\n/* #{d} */ from t where x = #{e}";
        let (out, mappings) = compile_template(sql, PlaceholderStyle::Sqlite).unwrap();
        assert_eq!(out, "select '#{a}', ?1 -- #{c}\n/* #{d} */ from t where x = ?2");
        assert_eq!(mappings.len(), 2);
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "$foo$ select #{a} from t $foo$ where a = #{b}";
        let (out, _) = compile_template(sql, PlaceholderStyle::Postgres).unwrap();
        assert_eq!(out, "$foo$ select #{a} from t $foo$ where a = $1");
    }

    #[test]
    fn dollar_quote_may_end_the_template() {
        let (out, mappings) =
            compile_template("select $$#{a}$$", PlaceholderStyle::Postgres).unwrap();
        assert_eq!(out, "select $$#{a}$$");
        assert!(mappings.is_empty());

        let (out, _) = compile_template("select $x$ #{a} $x$, #{b}", PlaceholderStyle::Postgres)
            .unwrap();
        assert_eq!(out, "select $x$ #{a} $x$, $1");
    }

    #[test]
    fn keeps_multibyte_text_intact() {
        let (out, _) =
            compile_template("select 'héllo', #{a} as ünï", PlaceholderStyle::Sqlite).unwrap();
        assert_eq!(out, "select 'héllo', ?1 as ünï");
    }

    #[test]
    fn rejects_unterminated_placeholders() {
        assert!(compile_template("select #{a", PlaceholderStyle::Sqlite).is_err());
    }
}
