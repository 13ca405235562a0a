//! Minimal read-only SQL executor (spec §4.11, SPEC_FULL §B.3 `preview_sql`).
//!
//! The spec leaves the execution engine open (spec's Open Questions) and
//! states only the contract: a single read-only query over named in-memory
//! relations, deterministic column order, no DDL/DML. Rather than pull in a
//! full query engine, this evaluates a restricted subset of `SELECT` -
//! projection, a `FROM` naming one materialized relation, `WHERE` over
//! column/literal comparisons, and `ORDER BY`/`LIMIT` - directly against
//! `Vec<Value>` relations using `sqlparser`'s AST. Joins and aggregates are
//! out of scope for this pass; a statement requiring them is rejected with
//! `CoreError::Validation` rather than silently mis-executed.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;
use sqlparser::ast::{
    BinaryOperator, Expr, GroupByExpr, LimitClause, OrderByExpr, Query, Select, SelectItem,
    SetExpr, Statement, TableFactor, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::{CoreError, CoreResult};

/// The cap `preview_sql` (SPEC_FULL §B.3) enforces regardless of the
/// query's own `LIMIT`.
pub const SQL_PREVIEW_ROW_LIMIT: usize = 500;

/// Parses `sql` and rejects anything but a single read-only `SELECT` (spec
/// §4.11 "the SQL executor must reject statements whose effect is not a
/// single read-only query... validation examines the parsed statement").
pub fn validate_read_only(sql: &str) -> CoreResult<Statement> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)?;
    let mut it = statements.into_iter();
    let Some(statement) = it.next() else {
        return Err(CoreError::validation("sql", "statement is empty"));
    };
    if it.next().is_some() {
        return Err(CoreError::validation("sql", "only a single statement is allowed"));
    }
    match &statement {
        Statement::Query(_) => Ok(statement),
        other => Err(CoreError::validation(
            "sql",
            format!("only read-only SELECT statements are allowed, got: {other}"),
        )),
    }
}

/// A relation bound to a name for the duration of one execution (spec
/// §4.11 step 2: "materialize each source `(commit, table_key)` as a
/// temporary named relation bound to its `alias`").
pub struct Relation {
    pub name: String,
    pub rows: Vec<Value>,
}

/// Executes a validated read-only `SELECT` against `relations`, returning
/// rows with a deterministic column order (spec §4.11 step 3). `row_limit`
/// additionally caps the result regardless of any `LIMIT` the query itself
/// carries.
pub fn execute_select(statement: &Statement, relations: &[Relation], row_limit: usize) -> CoreResult<Vec<Value>> {
    let Statement::Query(query) = statement else {
        return Err(CoreError::validation("sql", "not a SELECT statement"));
    };
    let (select, order_by) = unwrap_select(query)?;

    let relation = select_from_relation(select, relations)?;
    let mut rows: Vec<&Value> = relation.rows.iter().collect();

    if let Some(predicate) = &select.selection {
        let mut filtered = Vec::with_capacity(rows.len());
        for row in rows {
            if eval_predicate(predicate, row)? {
                filtered.push(row);
            }
        }
        rows = filtered;
    }

    if let Some(order_by) = order_by {
        sort_rows(&mut rows, order_by)?;
    }

    let projected: CoreResult<Vec<Value>> = rows.into_iter().map(|row| project_row(select, row)).collect();
    let mut projected = projected?;

    let limit_expr = match &query.limit_clause {
        Some(LimitClause::LimitOffset { limit, .. }) => limit.as_ref(),
        Some(LimitClause::OffsetCommaLimit { limit, .. }) => Some(limit),
        None => None,
    };
    let requested_limit = match limit_expr.and_then(as_sql_value) {
        Some(SqlValue::Number(n, _)) => {
            Some(n.parse::<usize>().map_err(|_| CoreError::validation("sql", "invalid LIMIT"))?)
        }
        _ => None,
    };
    let effective_limit = requested_limit.map(|n| n.min(row_limit)).unwrap_or(row_limit);
    projected.truncate(effective_limit);
    Ok(projected)
}

fn unwrap_select(query: &Query) -> CoreResult<(&Select, Option<&[OrderByExpr]>)> {
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(CoreError::validation("sql", "only a plain SELECT body is supported (no UNION/INTERSECT)"));
    };
    if select.from.len() > 1 || select.from.first().is_some_and(|t| !t.joins.is_empty()) {
        return Err(CoreError::validation("sql", "joins are not supported"));
    }
    let has_group_by = match &select.group_by {
        GroupByExpr::All(_) => true,
        GroupByExpr::Expressions(exprs, _) => !exprs.is_empty(),
    };
    if has_group_by || select.having.is_some() {
        return Err(CoreError::validation("sql", "GROUP BY / HAVING are not supported"));
    }
    let order_by = query.order_by.as_ref().map(|ob| ob.exprs.as_slice());
    Ok((select, order_by))
}

fn select_from_relation<'a>(select: &Select, relations: &'a [Relation]) -> CoreResult<&'a Relation> {
    let table = select
        .from
        .first()
        .ok_or_else(|| CoreError::validation("sql", "FROM clause is required"))?;
    let TableFactor::Table { name, .. } = &table.relation else {
        return Err(CoreError::validation("sql", "FROM must name a single relation"));
    };
    let name = name.to_string();
    relations
        .iter()
        .find(|r| r.name.eq_ignore_ascii_case(&name))
        .ok_or_else(|| CoreError::not_found("sql_relation", name))
}

fn project_row(select: &Select, row: &Value) -> CoreResult<Value> {
    let obj = row.as_object().ok_or_else(|| CoreError::Internal("row is not a JSON object".into()))?;
    let mut out = serde_json::Map::new();
    for item in &select.projection {
        match item {
            SelectItem::Wildcard(_) => {
                for (k, v) in obj {
                    out.insert(k.clone(), v.clone());
                }
            }
            SelectItem::UnnamedExpr(Expr::Identifier(ident)) => {
                out.insert(ident.value.clone(), obj.get(&ident.value).cloned().unwrap_or(Value::Null));
            }
            SelectItem::ExprWithAlias { expr: Expr::Identifier(ident), alias } => {
                out.insert(alias.value.clone(), obj.get(&ident.value).cloned().unwrap_or(Value::Null));
            }
            other => {
                return Err(CoreError::validation(
                    "sql",
                    format!("unsupported projection item: {other}"),
                ))
            }
        }
    }
    Ok(Value::Object(out))
}

fn eval_predicate(expr: &Expr, row: &Value) -> CoreResult<bool> {
    match expr {
        Expr::BinaryOp { left, op: BinaryOperator::And, right } => {
            Ok(eval_predicate(left, row)? && eval_predicate(right, row)?)
        }
        Expr::BinaryOp { left, op: BinaryOperator::Or, right } => {
            Ok(eval_predicate(left, row)? || eval_predicate(right, row)?)
        }
        Expr::BinaryOp { left, op, right } => {
            let lhs = eval_scalar(left, row)?;
            let rhs = eval_scalar(right, row)?;
            compare(&lhs, op, &rhs)
        }
        Expr::Nested(inner) => eval_predicate(inner, row),
        other => Err(CoreError::validation("sql", format!("unsupported predicate: {other}"))),
    }
}

/// `Expr::Value` wraps a span-carrying `ValueWithSpan`; this unwraps to the
/// bare `sqlparser::ast::Value` so callers can match on it directly.
fn as_sql_value(expr: &Expr) -> Option<&SqlValue> {
    match expr {
        Expr::Value(v) => Some(&v.value),
        _ => None,
    }
}

fn eval_scalar(expr: &Expr, row: &Value) -> CoreResult<Value> {
    match expr {
        Expr::Identifier(ident) => Ok(row.get(&ident.value).cloned().unwrap_or(Value::Null)),
        Expr::Value(v) => match &v.value {
            SqlValue::Number(n, _) => serde_json::from_str(n).map_err(CoreError::from),
            SqlValue::SingleQuotedString(s) => Ok(Value::String(s.clone())),
            SqlValue::Boolean(b) => Ok(Value::Bool(*b)),
            SqlValue::Null => Ok(Value::Null),
            other => Err(CoreError::validation("sql", format!("unsupported literal: {other}"))),
        },
        other => Err(CoreError::validation("sql", format!("unsupported expression: {other}"))),
    }
}

fn compare(lhs: &Value, op: &BinaryOperator, rhs: &Value) -> CoreResult<bool> {
    let ordering = json_partial_cmp(lhs, rhs);
    Ok(match op {
        BinaryOperator::Eq => lhs == rhs,
        BinaryOperator::NotEq => lhs != rhs,
        BinaryOperator::Gt => ordering == Some(Ordering::Greater),
        BinaryOperator::GtEq => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        BinaryOperator::Lt => ordering == Some(Ordering::Less),
        BinaryOperator::LtEq => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        other => return Err(CoreError::validation("sql", format!("unsupported operator: {other}"))),
    })
}

fn json_partial_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn sort_rows(rows: &mut [&Value], order_by: &[OrderByExpr]) -> CoreResult<()> {
    let mut keys: Vec<(String, bool)> = Vec::with_capacity(order_by.len());
    for item in order_by {
        let Expr::Identifier(ident) = &item.expr else {
            return Err(CoreError::validation("sql", "ORDER BY must name a column"));
        };
        keys.push((ident.value.clone(), item.asc.unwrap_or(true)));
    }
    rows.sort_by(|a, b| {
        for (col, asc) in &keys {
            let av = a.get(col).unwrap_or(&Value::Null);
            let bv = b.get(col).unwrap_or(&Value::Null);
            let ord = json_partial_cmp(av, bv).unwrap_or(Ordering::Equal);
            let ord = if *asc { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

/// Builds a `BTreeMap<alias, rows>`-shaped set of relations from the
/// table-reader output for SPEC_FULL §B.3 `preview_sql` and the SQL
/// transform worker's materialization step.
pub fn relations_from_tables(tables: BTreeMap<String, Vec<Value>>) -> Vec<Relation> {
    tables.into_iter().map(|(name, rows)| Relation { name, rows }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_relation() -> Relation {
        Relation {
            name: "people".into(),
            rows: vec![
                serde_json::json!({"id": 1, "name": "alice", "age": 30}),
                serde_json::json!({"id": 2, "name": "bob", "age": 25}),
                serde_json::json!({"id": 3, "name": "carol", "age": 40}),
            ],
        }
    }

    #[test]
    fn rejects_non_select_statements() {
        assert!(validate_read_only("DELETE FROM people").is_err());
        assert!(validate_read_only("DROP TABLE people").is_err());
        assert!(validate_read_only("INSERT INTO people VALUES (1)").is_err());
    }

    #[test]
    fn rejects_multiple_statements() {
        assert!(validate_read_only("SELECT 1; SELECT 2;").is_err());
    }

    #[test]
    fn accepts_plain_select() {
        assert!(validate_read_only("SELECT id, name FROM people WHERE age > 26").is_ok());
    }

    #[test]
    fn executes_projection_and_filter() {
        let stmt = validate_read_only("SELECT name FROM people WHERE age > 26 ORDER BY name").unwrap();
        let rows = execute_select(&stmt, &[sample_relation()], SQL_PREVIEW_ROW_LIMIT).unwrap();
        assert_eq!(rows, vec![serde_json::json!({"name": "alice"}), serde_json::json!({"name": "carol"})]);
    }

    #[test]
    fn preview_row_limit_caps_results() {
        let stmt = validate_read_only("SELECT * FROM people").unwrap();
        let rows = execute_select(&stmt, &[sample_relation()], 2).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn unknown_relation_is_not_found() {
        let stmt = validate_read_only("SELECT * FROM nope").unwrap();
        let result = execute_select(&stmt, &[sample_relation()], SQL_PREVIEW_ROW_LIMIT);
        assert!(result.is_err());
    }
}
