use actix_web::error::ErrorBadRequest;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use std::str::FromStr;

/// A bindable value for dynamically built statements.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(d) => SqlValue::Date(d),
                Err(_) => SqlValue::String(s.clone()),
            },
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    SqlValue::U64(u)
                } else if let Some(i) = n.as_i64() {
                    SqlValue::I64(i)
                } else {
                    SqlValue::F64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::Bool(b) => SqlValue::Bool(*b),
            _ => SqlValue::Null,
        }
    }
}

/// Bind every value in order. Works for `query`, `query_as` and `query_scalar`.
macro_rules! bind_all {
    ($query:expr, $values:expr) => {{
        use $crate::utils::db_utils::SqlValue;
        let mut query = $query;
        for value in $values.iter().cloned() {
            query = match value {
                SqlValue::String(v) => query.bind(v),
                SqlValue::I64(v) => query.bind(v),
                SqlValue::U64(v) => query.bind(v),
                SqlValue::F64(v) => query.bind(v),
                SqlValue::Bool(v) => query.bind(v),
                SqlValue::Date(v) => query.bind(v),
                SqlValue::Null => query.bind(None::<String>),
            };
        }
        query
    }};
}
pub(crate) use bind_all;

/// `AND`-joined WHERE conditions with their bind values.
#[derive(Debug, Default)]
pub struct Filters {
    conditions: Vec<&'static str>,
    pub values: Vec<SqlValue>,
}

impl Filters {
    pub fn push(&mut self, condition: &'static str, value: SqlValue) {
        self.conditions.push(condition);
        self.values.push(value);
    }

    /// For conditions with several placeholders, e.g. a multi-column LIKE.
    pub fn push_many(&mut self, condition: &'static str, values: impl IntoIterator<Item = SqlValue>) {
        self.conditions.push(condition);
        self.values.extend(values);
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }
}

/// Page number (1-based) and page size, clamped to sane bounds. The offset is
/// widened to `u64` so no `u32` page/size pair can overflow it.
pub fn paging(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (page, per_page, u64::from(page - 1) * u64::from(per_page))
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Require a non-empty JSON object.
pub fn patch_object(payload: &Value) -> Result<&Map<String, Value>, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }
    Ok(obj)
}

/// Reject a patch whose `field` is present but is not one of `T`'s names.
pub fn check_choice<T: FromStr>(
    patch: &Map<String, Value>,
    field: &str,
) -> Result<(), actix_web::Error> {
    match patch.get(field) {
        None => Ok(()),
        Some(Value::String(s)) if T::from_str(s).is_ok() => Ok(()),
        Some(Value::String(s)) => Err(ErrorBadRequest(format!("Unknown {field} '{s}'"))),
        Some(_) => Err(ErrorBadRequest(format!("{field} must be a string"))),
    }
}

/// Build `UPDATE table SET .. WHERE id_column = ?` from a JSON object.
///
/// Keys outside `allowed` are rejected, so a client cannot reach columns
/// (or SQL) it has no business touching.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = patch_object(payload)?;

    if let Some(bad) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ErrorBadRequest(format!("Field '{bad}' cannot be updated")));
    }

    let mut values = Vec::with_capacity(obj.len() + 1);
    for value in obj.values() {
        if value.is_array() || value.is_object() {
            return Err(ErrorBadRequest("Unsupported JSON value type"));
        }
        values.push(SqlValue::from(value));
    }
    values.push(SqlValue::U64(id_value));

    let set_clause = obj
        .keys()
        .map(|k| format!("{k} = ?"))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(SqlUpdate {
        sql: format!("UPDATE {table} SET {set_clause} WHERE {id_column} = ?"),
        values,
    })
}

pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let query = bind_all!(sqlx::query(&update.sql), update.values);
    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}
