use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use super::filter::{Filter, Sort};
use crate::error::{Error, Result};

/// Alias of the collection table in every compiled statement.
pub(super) const ROW: &str = "c";

/// A compiled `FROM ... WHERE ...` fragment with its positional parameters.
pub(super) struct Selection {
    pub from: String,
    pub predicate: String,
    pub params: Vec<SqlValue>,
    pub has_text: bool,
}

impl Selection {
    pub fn select(&self, columns: &str) -> String {
        format!("SELECT {columns} FROM {} WHERE {}", self.from, self.predicate)
    }
}

pub(super) fn validate_collection_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.contains("__")
        && name.len() <= 64;
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidQuery(format!("invalid collection name '{name}'")))
    }
}

pub(super) fn validate_field(field: &str) -> Result<()> {
    let valid = !field.is_empty()
        && field.split('.').all(|segment| {
            !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidQuery(format!("invalid field path '{field}'")))
    }
}

pub(super) fn fts_table(collection: &str) -> String {
    format!("{collection}__fts")
}

/// `json_extract` expression for a validated field path on the given row alias.
pub(super) fn extract(alias: &str, field: &str) -> String {
    format!("json_extract({alias}.doc, '$.{field}')")
}

pub(super) fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Turns free text into an FTS5 query that matches any of its words.
pub(super) fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

pub(super) fn compile(collection: &str, filter: &Filter, text_indexed: bool) -> Result<Selection> {
    let text_queries = filter.text_queries();
    if text_queries.len() > 1 {
        return Err(Error::InvalidQuery(
            "a filter may contain at most one text predicate".to_string(),
        ));
    }

    let mut params = Vec::new();
    let from = match text_queries.first() {
        Some(text) => {
            if !text_indexed {
                return Err(Error::MissingTextIndex(collection.to_string()));
            }
            let fts = fts_table(collection);
            let scored = match fts_query(text) {
                Some(query) => {
                    params.push(SqlValue::Text(query));
                    format!(
                        "SELECT rowid AS fts_rowid, bm25(\"{fts}\") AS score FROM \"{fts}\" WHERE \"{fts}\" MATCH ?"
                    )
                }
                None => "SELECT NULL AS fts_rowid, NULL AS score WHERE 0".to_string(),
            };
            format!("\"{collection}\" AS {ROW} LEFT JOIN ({scored}) AS s ON s.fts_rowid = {ROW}.seq")
        }
        None => format!("\"{collection}\" AS {ROW}"),
    };

    let predicate = predicate(filter, &mut params)?;

    Ok(Selection {
        from,
        predicate,
        params,
        has_text: !text_queries.is_empty(),
    })
}

fn predicate(filter: &Filter, params: &mut Vec<SqlValue>) -> Result<String> {
    match filter {
        Filter::Eq(field, value) => equals(field, value, params),
        Filter::Ne(field, value) => Ok(format!("NOT COALESCE({}, 0)", equals(field, value, params)?)),
        Filter::In(field, values) => {
            if values.is_empty() {
                return Ok("0".to_string());
            }
            let parts = values
                .iter()
                .map(|v| equals(field, v, params))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", parts.join(" OR ")))
        }
        Filter::And(children) => join(children, " AND ", "1", params),
        Filter::Or(children) => join(children, " OR ", "0", params),
        Filter::Text(_) => Ok("s.fts_rowid IS NOT NULL".to_string()),
    }
}

fn join(children: &[Filter], op: &str, empty: &str, params: &mut Vec<SqlValue>) -> Result<String> {
    if children.is_empty() {
        return Ok(empty.to_string());
    }
    let parts = children
        .iter()
        .map(|child| predicate(child, params))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("({})", parts.join(op)))
}

fn equals(field: &str, value: &Value, params: &mut Vec<SqlValue>) -> Result<String> {
    validate_field(field)?;

    if field == "id" {
        params.push(to_sql_value(value));
        return Ok(format!("{ROW}.id = ?"));
    }

    let extracted = extract(ROW, field);
    if value.is_null() {
        return Ok(format!("{extracted} IS NULL"));
    }

    let sql_value = to_sql_value(value);
    params.push(sql_value.clone());
    params.push(sql_value);
    Ok(format!(
        "({extracted} = ? OR (json_type({ROW}.doc, '$.{field}') = 'array' AND EXISTS \
         (SELECT 1 FROM json_each({ROW}.doc, '$.{field}') AS je WHERE je.value = ?)))"
    ))
}

pub(super) fn order_by(sort: &[Sort], has_text: bool) -> Result<String> {
    let mut terms = Vec::with_capacity(sort.len() + 1);
    let mut tie_break = "ASC";

    for key in sort {
        match key {
            Sort::Asc(field) => {
                validate_field(field)?;
                terms.push(format!("{} ASC", extract(ROW, field)));
                tie_break = "ASC";
            }
            Sort::Desc(field) => {
                validate_field(field)?;
                terms.push(format!("{} DESC", extract(ROW, field)));
                tie_break = "DESC";
            }
            Sort::TextScore => {
                if !has_text {
                    return Err(Error::InvalidQuery(
                        "sorting by text score requires a text predicate".to_string(),
                    ));
                }
                // bm25 is lower for better matches; rows matched by other branches have no score.
                terms.push("s.score IS NULL ASC, s.score ASC".to_string());
            }
        }
    }

    terms.push(format!("{ROW}.seq {tie_break}"));
    Ok(format!("ORDER BY {}", terms.join(", ")))
}
