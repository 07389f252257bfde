use crate::traits::Value;

/// AND-combined, parameterized WHERE predicates built from optional filters.
///
/// Clauses use positional `?` placeholders; append the rendered SQL to a
/// statement that uses no numbered (`?N`) placeholders.
///
/// ```
/// use flashback_sql::{Predicates, Value};
///
/// let mut p = Predicates::new();
/// p.eq_opt("u.status", Some("ready"))
///     .eq_opt("u.platform_id", None::<i64>)
///     .eq_null_aware("u.model_id", None);
/// assert_eq!(p.where_sql(), " WHERE u.status = ? AND u.model_id IS NULL");
/// assert_eq!(p.params(), &[Value::Text("ready".into())]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Predicates {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = ?`.
    pub fn eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.clauses.push(format!("{} = ?", column));
        self.params.push(value.into());
        self
    }

    /// `column = ?` when a value is given, nothing otherwise.
    pub fn eq_opt<V: Into<Value>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.eq(column, v);
        }
        self
    }

    /// NULL-aware equality: `column IS NULL` for `None`, `column = ?` otherwise.
    /// `None` is a value here, not "no filter".
    pub fn eq_null_aware(&mut self, column: &str, value: Option<i64>) -> &mut Self {
        match value {
            Some(v) => self.eq(column, v),
            None => {
                self.clauses.push(format!("{} IS NULL", column));
                self
            }
        }
    }

    /// A raw clause with its own `?` placeholders.
    pub fn raw(&mut self, clause: &str, params: impl IntoIterator<Item = Value>) -> &mut Self {
        self.clauses.push(clause.to_string());
        self.params.extend(params);
        self
    }

    /// `(c1 LIKE ? OR c2 LIKE ? ...)` matching `term` as a substring of any
    /// column. `%` and `_` in the term match literally.
    pub fn like_any(&mut self, columns: &[&str], term: &str) -> &mut Self {
        if columns.is_empty() {
            return self;
        }
        let pattern = format!("%{}%", escape_like(term));
        let group = columns
            .iter()
            .map(|c| format!("{} LIKE ? ESCAPE '\\'", c))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.clauses.push(format!("({})", group));
        self.params
            .extend(columns.iter().map(|_| Value::Text(pattern.clone())));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `" WHERE a AND b"`, or an empty string when there are no clauses.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// `" AND a AND b"`, for appending to a statement that already has a WHERE.
    pub fn and_sql(&self) -> String {
        self.clauses
            .iter()
            .map(|c| format!(" AND {}", c))
            .collect()
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_params(self) -> Vec<Value> {
        self.params
    }
}

/// Backslash-escape LIKE wildcards and the escape character itself.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_renders_nothing() {
        let p = Predicates::new();
        assert!(p.is_empty());
        assert_eq!(p.where_sql(), "");
        assert_eq!(p.and_sql(), "");
    }

    #[test]
    fn optional_filters_are_skipped() {
        let mut p = Predicates::new();
        p.eq_opt("a", None::<i64>).eq_opt("b", Some(2i64)).eq_opt("c", None::<String>);
        assert_eq!(p.where_sql(), " WHERE b = ?");
        assert_eq!(p.into_params(), vec![Value::Integer(2)]);
    }

    #[test]
    fn null_aware_equality() {
        let mut p = Predicates::new();
        p.eq_null_aware("model_id", Some(7)).eq_null_aware("other_id", None);
        assert_eq!(p.and_sql(), " AND model_id = ? AND other_id IS NULL");
        assert_eq!(p.params(), &[Value::Integer(7)]);
    }

    #[test]
    fn like_group_per_term() {
        let mut p = Predicates::new();
        for term in "A00 alice".split_whitespace() {
            p.like_any(&["u.usb_id", "t.name"], term);
        }
        assert_eq!(
            p.where_sql(),
            " WHERE (u.usb_id LIKE ? ESCAPE '\\' OR t.name LIKE ? ESCAPE '\\') \
             AND (u.usb_id LIKE ? ESCAPE '\\' OR t.name LIKE ? ESCAPE '\\')"
        );
        assert_eq!(p.params().len(), 4);
        assert_eq!(p.params()[2], Value::Text("%alice%".into()));
    }

    #[test]
    fn raw_clause_keeps_param_order() {
        let mut p = Predicates::new();
        p.eq("x", 1i64)
            .raw("(y < ? OR y > ?)", [Value::Integer(2), Value::Integer(3)]);
        assert_eq!(p.where_sql(), " WHERE x = ? AND (y < ? OR y > ?)");
        assert_eq!(
            p.params(),
            &[Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn like_wildcards_in_term_are_literal() {
        let mut p = Predicates::new();
        p.like_any(&["custom_text"], r"50%_off\x");
        assert_eq!(p.params(), &[Value::Text(r"%50\%\_off\\x%".into())]);
    }

    #[test]
    fn escaped_like_matches_literally() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut p = Predicates::new();
        p.like_any(&["t"], "5%");
        let sql = format!(
            "SELECT COUNT(*) FROM (SELECT '5% off' AS t UNION ALL SELECT '50 off'){}",
            p.where_sql()
        );
        let text = match &p.params()[0] {
            Value::Text(s) => s.clone(),
            other => panic!("unexpected param {:?}", other),
        };
        let n: i64 = conn.query_row(&sql, [text], |r| r.get(0)).unwrap();
        assert_eq!(n, 1);
    }
}
