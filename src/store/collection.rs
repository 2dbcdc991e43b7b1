use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;
use uuid::Uuid;

use super::filter::{Filter, IndexKey, IndexKind, Sort, index_name};
use super::query::{self, ROW, Selection};
use super::sqlite::{SharedConnection, with_conn};
use super::{Collection, Document, ID_FIELD};
use crate::error::{Error, Result};

pub struct SqliteCollection {
    conn: SharedConnection,
    name: String,
}

struct CatalogEntry {
    keys: String,
    is_unique: bool,
    is_text: bool,
}

impl SqliteCollection {
    pub(crate) fn new(conn: SharedConnection, name: String) -> Self {
        Self { conn, name }
    }

    fn has_text_index(&self, conn: &Connection) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM _indexes WHERE collection = ?1 AND is_text = 1",
                params![self.name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn compile(&self, conn: &Connection, filter: &Filter) -> Result<Selection> {
        let text_indexed = if filter.text_queries().is_empty() {
            false
        } else {
            self.has_text_index(conn)?
        };
        query::compile(&self.name, filter, text_indexed)
    }

    fn query_docs(
        &self,
        conn: &Connection,
        filter: &Filter,
        sort: &[Sort],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        // SQLite reads a negative OFFSET as 0, so a skip beyond i64 cannot match anything.
        let Ok(offset) = i64::try_from(skip) else {
            return Ok(Vec::new());
        };
        let selection = self.compile(conn, filter)?;
        let order = query::order_by(sort, selection.has_text)?;
        // A negative LIMIT is unbounded in SQLite.
        let limit = if limit == 0 {
            -1
        } else {
            i64::try_from(limit).unwrap_or(i64::MAX)
        };
        let sql = format!(
            "{} {order} LIMIT {limit} OFFSET {offset}",
            selection.select(&format!("{ROW}.doc")),
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(selection.params.iter()), |row| {
            row.get::<_, String>(0)
        })?;

        rows.map(|raw| parse_document(&raw?)).collect()
    }

    fn matching_rows(
        &self,
        conn: &Connection,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<(i64, Document)>> {
        let selection = self.compile(conn, filter)?;
        let mut sql = format!(
            "{} ORDER BY {ROW}.seq",
            selection.select(&format!("{ROW}.seq, {ROW}.doc"))
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(selection.params.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        rows.map(|row| {
            let (seq, raw) = row?;
            Ok((seq, parse_document(&raw)?))
        })
        .collect()
    }

    fn apply_patch(&self, filter: &Filter, patch: Document, limit: Option<usize>) -> Result<u64> {
        if patch.contains_key(ID_FIELD) {
            return Err(Error::InvalidQuery("the id field cannot be updated".to_string()));
        }

        with_conn(&self.conn, |conn| {
            let tx = conn.transaction()?;
            let rows = self.matching_rows(&tx, filter, limit)?;

            let mut modified = 0;
            for (seq, mut doc) in rows {
                let before = doc.clone();
                for (key, value) in &patch {
                    doc.insert(key.clone(), value.clone());
                }
                if doc == before {
                    continue;
                }
                tx.execute(
                    &format!("UPDATE \"{}\" SET doc = ?1 WHERE seq = ?2", self.name),
                    params![Value::Object(doc).to_string(), seq],
                )
                .map_err(Error::from_write)?;
                modified += 1;
            }

            tx.commit()?;
            Ok(modified)
        })
    }

    fn catalog_entry(&self, conn: &Connection, name: &str) -> Result<Option<CatalogEntry>> {
        conn.query_row(
            "SELECT keys, is_unique, is_text FROM _indexes WHERE collection = ?1 AND name = ?2",
            params![self.name, name],
            |row| {
                Ok(CatalogEntry {
                    keys: row.get(0)?,
                    is_unique: row.get(1)?,
                    is_text: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn create_btree_index(&self, conn: &Connection, name: &str, keys: &[IndexKey], unique: bool) -> Result<()> {
        let columns = keys
            .iter()
            .map(|k| {
                let dir = if k.kind == IndexKind::Descending { "DESC" } else { "ASC" };
                format!("json_extract(doc, '$.{}') {dir}", k.field)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let unique = if unique { "UNIQUE " } else { "" };
        conn.execute_batch(&format!(
            "CREATE {unique}INDEX IF NOT EXISTS \"{}__{name}\" ON \"{}\" ({columns});",
            self.name, self.name
        ))
        .map_err(Error::from_write)
    }

    fn create_text_index(&self, conn: &Connection, keys: &[IndexKey]) -> Result<()> {
        let table = &self.name;
        let fts = query::fts_table(table);
        let columns: Vec<String> = (0..keys.len()).map(|i| format!("f{i}")).collect();
        let column_list = columns.join(", ");
        let values = |alias: &str| {
            keys.iter()
                .map(|k| query::extract(alias, &k.field))
                .collect::<Vec<_>>()
                .join(", ")
        };

        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE \"{fts}\" USING fts5({column_list}, tokenize = 'porter unicode61');
             INSERT INTO \"{fts}\" (rowid, {column_list}) SELECT seq, {backfill} FROM \"{table}\" AS src;
             CREATE TRIGGER \"{fts}_ai\" AFTER INSERT ON \"{table}\" BEGIN
                 INSERT INTO \"{fts}\" (rowid, {column_list}) VALUES (new.seq, {new_values});
             END;
             CREATE TRIGGER \"{fts}_ad\" AFTER DELETE ON \"{table}\" BEGIN
                 DELETE FROM \"{fts}\" WHERE rowid = old.seq;
             END;
             CREATE TRIGGER \"{fts}_au\" AFTER UPDATE ON \"{table}\" BEGIN
                 DELETE FROM \"{fts}\" WHERE rowid = old.seq;
                 INSERT INTO \"{fts}\" (rowid, {column_list}) VALUES (new.seq, {new_values});
             END;",
            backfill = values("src"),
            new_values = values("new"),
        ))?;
        Ok(())
    }

    fn drop_text_index(&self, conn: &Connection) -> Result<()> {
        let fts = query::fts_table(&self.name);
        conn.execute_batch(&format!(
            "DROP TRIGGER IF EXISTS \"{fts}_ai\";
             DROP TRIGGER IF EXISTS \"{fts}_ad\";
             DROP TRIGGER IF EXISTS \"{fts}_au\";
             DROP TABLE IF EXISTS \"{fts}\";"
        ))?;
        Ok(())
    }
}

fn parse_document(raw: &str) -> Result<Document> {
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::InvalidQuery("stored record is not an object".to_string())),
    }
}

/// Returns the record's id, assigning a fresh one when absent.
fn ensure_id(doc: &mut Document) -> Result<String> {
    match doc.get(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Null) | None => {
            let id = Uuid::new_v4().to_string();
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            Ok(id)
        }
        Some(_) => Err(Error::InvalidQuery("record id must be a non-empty string".to_string())),
    }
}

fn encode_keys(keys: &[IndexKey]) -> String {
    let pairs: Vec<Value> = keys
        .iter()
        .map(|k| {
            let kind = match k.kind {
                IndexKind::Ascending => Value::from(1),
                IndexKind::Descending => Value::from(-1),
                IndexKind::Text => Value::from("text"),
            };
            Value::Array(vec![Value::from(k.field.clone()), kind])
        })
        .collect();
    Value::Array(pairs).to_string()
}

impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_one(&self, filter: &Filter) -> Result<Option<Document>> {
        let mut docs = with_conn(&self.conn, |conn| self.query_docs(conn, filter, &[], 0, 1))?;
        Ok(docs.pop())
    }

    fn find_many(
        &self,
        filter: &Filter,
        sort: &[Sort],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        with_conn(&self.conn, |conn| {
            self.query_docs(conn, filter, sort, skip, limit)
        })
    }

    fn insert_one(&self, mut doc: Document) -> Result<String> {
        let id = ensure_id(&mut doc)?;
        with_conn(&self.conn, |conn| {
            conn.execute(
                &format!("INSERT INTO \"{}\" (id, doc) VALUES (?1, ?2)", self.name),
                params![id, Value::Object(doc).to_string()],
            )
            .map_err(Error::from_write)?;
            Ok(())
        })?;
        Ok(id)
    }

    fn insert_many(&self, docs: Vec<Document>) -> Result<Vec<String>> {
        with_conn(&self.conn, |conn| {
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(docs.len());
            {
                let mut stmt =
                    tx.prepare(&format!("INSERT INTO \"{}\" (id, doc) VALUES (?1, ?2)", self.name))?;
                for mut doc in docs {
                    let id = ensure_id(&mut doc)?;
                    stmt.execute(params![id, Value::Object(doc).to_string()])
                        .map_err(Error::from_write)?;
                    ids.push(id);
                }
            }
            tx.commit()?;
            Ok(ids)
        })
    }

    fn update_one(&self, filter: &Filter, patch: Document) -> Result<bool> {
        Ok(self.apply_patch(filter, patch, Some(1))? > 0)
    }

    fn update_many(&self, filter: &Filter, patch: Document) -> Result<u64> {
        self.apply_patch(filter, patch, None)
    }

    fn delete_one(&self, filter: &Filter) -> Result<bool> {
        with_conn(&self.conn, |conn| {
            let rows = self.matching_rows(conn, filter, Some(1))?;
            let Some((seq, _)) = rows.first() else {
                return Ok(false);
            };
            let deleted = conn.execute(
                &format!("DELETE FROM \"{}\" WHERE seq = ?1", self.name),
                params![seq],
            )?;
            Ok(deleted > 0)
        })
    }

    fn delete_many(&self, filter: &Filter) -> Result<u64> {
        with_conn(&self.conn, |conn| {
            let selection = self.compile(conn, filter)?;
            let sql = format!(
                "DELETE FROM \"{}\" WHERE seq IN ({})",
                self.name,
                selection.select(&format!("{ROW}.seq"))
            );
            let deleted = conn.execute(&sql, params_from_iter(selection.params.iter()))?;
            Ok(deleted as u64)
        })
    }

    fn count_documents(&self, filter: &Filter) -> Result<u64> {
        with_conn(&self.conn, |conn| {
            let selection = self.compile(conn, filter)?;
            let count: i64 = conn.query_row(
                &selection.select("COUNT(*)"),
                params_from_iter(selection.params.iter()),
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    fn create_index(&self, keys: &[IndexKey], unique: bool) -> Result<String> {
        if keys.is_empty() {
            return Err(Error::InvalidQuery("an index needs at least one key".to_string()));
        }
        for key in keys {
            query::validate_field(&key.field)?;
        }

        let is_text = keys.iter().any(|k| k.kind == IndexKind::Text);
        if is_text && !keys.iter().all(|k| k.kind == IndexKind::Text) {
            return Err(Error::InvalidQuery(
                "text indexes cannot be combined with ordered keys".to_string(),
            ));
        }
        if is_text && unique {
            return Err(Error::InvalidQuery("text indexes cannot be unique".to_string()));
        }

        let name = index_name(keys);
        let encoded = encode_keys(keys);

        with_conn(&self.conn, |conn| {
            if let Some(existing) = self.catalog_entry(conn, &name)? {
                if existing.keys == encoded && existing.is_unique == unique {
                    return Ok(name.clone());
                }
                return Err(Error::Conflict(format!(
                    "index '{name}' already exists with different options"
                )));
            }
            if is_text && self.has_text_index(conn)? {
                return Err(Error::Conflict(format!(
                    "collection '{}' already has a text index",
                    self.name
                )));
            }

            let tx = conn.transaction()?;
            if is_text {
                self.create_text_index(&tx, keys)?;
            } else {
                self.create_btree_index(&tx, &name, keys, unique)?;
            }
            tx.execute(
                "INSERT INTO _indexes (collection, name, keys, is_unique, is_text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![self.name, name, encoded, unique, is_text, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;

            tracing::debug!("Created index {} on {}", name, self.name);
            Ok(name.clone())
        })
    }

    fn drop_index(&self, name: &str) -> Result<()> {
        with_conn(&self.conn, |conn| {
            let entry = self.catalog_entry(conn, name)?.ok_or(Error::NotFound)?;

            let tx = conn.transaction()?;
            if entry.is_text {
                self.drop_text_index(&tx)?;
            } else {
                tx.execute_batch(&format!("DROP INDEX IF EXISTS \"{}__{name}\";", self.name))?;
            }
            tx.execute(
                "DELETE FROM _indexes WHERE collection = ?1 AND name = ?2",
                params![self.name, name],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn list_indexes(&self) -> Result<Vec<String>> {
        with_conn(&self.conn, |conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM _indexes WHERE collection = ?1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map(params![self.name], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(Error::from)
        })
    }
}
