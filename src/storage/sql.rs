//! SQL rendering for fetch specifications.

use crate::core::schema::{EntityDescription, PRIMARY_KEY};
use crate::core::value::Value;
use crate::query::{Comparison, FetchSpec, Predicate};
use crate::storage::schema::quote;

/// Renders a predicate, pushing bound values onto `params`.
pub fn render_predicate(predicate: &Predicate, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::True => "1".to_string(),
        Predicate::Compare { field, op, value } => {
            let operator = match (op, value.is_null()) {
                (Comparison::Equal, true) => "IS",
                (Comparison::NotEqual, true) => "IS NOT",
                (Comparison::Equal, false) => "=",
                (Comparison::NotEqual, false) => "!=",
                (Comparison::Less, _) => "<",
                (Comparison::LessOrEqual, _) => "<=",
                (Comparison::Greater, _) => ">",
                (Comparison::GreaterOrEqual, _) => ">=",
                (Comparison::Like, _) => "LIKE",
            };
            params.push(value.clone());
            format!("{} {operator} ?", quote(field))
        }
        Predicate::And(parts) => join(parts, " AND ", "1", params),
        Predicate::Or(parts) => join(parts, " OR ", "0", params),
        Predicate::Not(inner) => format!("NOT ({})", render_predicate(inner, params)),
        Predicate::Raw(expression) => format!("({expression})"),
    }
}

fn join(parts: &[Predicate], separator: &str, empty: &str, params: &mut Vec<Value>) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let rendered: Vec<String> = parts
        .iter()
        .map(|p| format!("({})", render_predicate(p, params)))
        .collect();
    rendered.join(separator)
}

fn where_and_tail(spec: &FetchSpec, params: &mut Vec<Value>) -> String {
    let mut sql = String::new();
    if let Some(filter) = spec.filter() {
        sql.push_str(" WHERE ");
        sql.push_str(&render_predicate(filter, params));
    }

    let mut keys: Vec<String> = spec
        .ordering()
        .iter()
        .map(|d| {
            let direction = if d.ascending { "ASC" } else { "DESC" };
            format!("{} {direction}", quote(&d.field))
        })
        .collect();
    // Insertion order breaks remaining ties.
    keys.push(format!("{PRIMARY_KEY} ASC"));
    sql.push_str(" ORDER BY ");
    sql.push_str(&keys.join(", "));

    if let Some(limit) = spec.limit() {
        sql.push_str(" LIMIT ?");
        params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }
    sql
}

/// `SELECT` statement for `spec`. Columns are the primary key followed by
/// the entity's fields in definition order.
pub fn select_sql(entity: &EntityDescription, spec: &FetchSpec, params: &mut Vec<Value>) -> String {
    let mut columns = vec![PRIMARY_KEY.to_string()];
    columns.extend(entity.fields.iter().map(|f| quote(&f.name)));
    format!(
        "SELECT {} FROM {}{}",
        columns.join(", "),
        quote(&entity.name),
        where_and_tail(spec, params)
    )
}

/// `SELECT COUNT(*)` statement for `spec`, honoring its limit.
pub fn count_sql(entity: &EntityDescription, spec: &FetchSpec, params: &mut Vec<Value>) -> String {
    format!(
        "SELECT COUNT(*) FROM (SELECT {PRIMARY_KEY} FROM {}{})",
        quote(&entity.name),
        where_and_tail(spec, params)
    )
}
