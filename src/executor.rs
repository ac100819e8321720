//! Turns a parsed [`ast::Statement`] into an effect on a [`Database`] and a
//! human-readable result string for the REPL.

use crate::ast::*;
use crate::database::Database;
use crate::schema::{ColumnDef, Schema};
use crate::value::Value;
use regex::Regex;
use std::cmp::Ordering;

pub fn execute(statement: Statement, db: &mut Database) -> Result<String, String> {
    match statement {
        Statement::CreateTable(stmt) => execute_create_table(stmt, db),
        Statement::DropTable(stmt) => execute_drop_table(stmt, db),
        Statement::Insert(stmt) => execute_insert(stmt, db),
        Statement::Select(stmt) => execute_select(stmt, db),
        Statement::Update(stmt) => execute_update(stmt, db),
        Statement::Delete(stmt) => execute_delete(stmt, db),
    }
}

fn execute_create_table(stmt: CreateTableStatement, db: &mut Database) -> Result<String, String> {
    if stmt.columns.is_empty() {
        return Err("a table needs at least one column".to_string());
    }
    let schema = Schema::new(
        stmt.columns
            .iter()
            .map(|c| ColumnDef {
                name: c.name.clone(),
                data_type: c.data_type,
            })
            .collect(),
    );
    db.create_table(&stmt.name, schema)
        .map_err(|e| e.to_string())?;
    Ok(format!("Table '{}' created", stmt.name))
}

fn execute_drop_table(stmt: DropTableStatement, db: &mut Database) -> Result<String, String> {
    let existed = db.drop_table(&stmt.name).map_err(|e| e.to_string())?;
    if existed {
        Ok(format!("Table '{}' dropped", stmt.name))
    } else {
        Err(format!("Table '{}' does not exist", stmt.name))
    }
}

fn execute_insert(stmt: InsertStatement, db: &mut Database) -> Result<String, String> {
    let table = db.get_table(&stmt.table).map_err(|e| e.to_string())?;
    let schema = table.schema().clone();

    let mut inserted = 0;
    for values in stmt.values {
        let row = match &stmt.columns {
            Some(names) => reorder_row(&schema, names, values)?,
            None => values,
        };
        if row.len() != schema.len() {
            return Err(format!(
                "expected {} values, got {}",
                schema.len(),
                row.len()
            ));
        }
        table.insert(row).map_err(|e| e.to_string())?;
        inserted += 1;
    }
    Ok(format!("{inserted} row(s) inserted"))
}

fn reorder_row(schema: &Schema, names: &[String], values: Vec<Value>) -> Result<Vec<Value>, String> {
    if names.len() != values.len() {
        return Err(format!(
            "column list has {} entries but {} values were given",
            names.len(),
            values.len()
        ));
    }
    let mut row = vec![Value::Null; schema.len()];
    for (name, value) in names.iter().zip(values) {
        let pos = schema
            .position(name)
            .ok_or_else(|| format!("column '{name}' does not exist"))?;
        row[pos] = value;
    }
    Ok(row)
}

fn execute_select(stmt: SelectStatement, db: &mut Database) -> Result<String, String> {
    let table = db.get_table(&stmt.from).map_err(|e| e.to_string())?;
    let schema = table.schema().clone();

    let column_indices = resolve_select_columns(&stmt.columns, &schema)?;

    let mut rows = match &stmt.where_clause {
        Some(expr) if is_single_pk_equality(expr, &schema) => {
            let pk = single_pk_equality_value(expr, &schema)?;
            match table.select(pk).map_err(|e| e.to_string())? {
                Some(row) => vec![row],
                None => Vec::new(),
            }
        }
        _ => table.select_all().map_err(|e| e.to_string())?,
    };

    if let Some(expr) = &stmt.where_clause {
        rows.retain(|row| evaluate_predicate(expr, &schema, row).unwrap_or(false));
    }

    if let Some(order_by) = &stmt.order_by {
        sort_rows(&mut rows, order_by, &schema)?;
    }

    let offset = stmt.offset.unwrap_or(0);
    let limit = stmt.limit.unwrap_or(rows.len());
    let page: Vec<&Vec<Value>> = rows.iter().skip(offset).take(limit).collect();

    Ok(render_rows(&schema, &column_indices, &page))
}

fn resolve_select_columns(columns: &[Column], schema: &Schema) -> Result<Vec<usize>, String> {
    match columns.first() {
        Some(Column::All) => Ok((0..schema.len()).collect()),
        _ => columns
            .iter()
            .map(|c| match c {
                Column::Named(name) => schema
                    .position(name)
                    .ok_or_else(|| format!("column '{name}' does not exist")),
                Column::All => Err("'*' cannot be mixed with named columns".to_string()),
            })
            .collect(),
    }
}

fn render_rows(schema: &Schema, column_indices: &[usize], rows: &[&Vec<Value>]) -> String {
    let mut out = String::new();
    for &idx in column_indices {
        out.push_str(&schema.0[idx].name);
        out.push('\t');
    }
    out.push('\n');
    out.push_str(&"-".repeat(40));
    out.push('\n');
    for row in rows {
        for &idx in column_indices {
            out.push_str(&row[idx].to_string());
            out.push('\t');
        }
        out.push('\n');
    }
    out
}

/// Point lookups (`WHERE pk = <literal>`) go straight to the index instead
/// of a full scan.
fn is_single_pk_equality(expr: &Expression, schema: &Schema) -> bool {
    single_pk_equality_value(expr, schema).is_ok()
}

fn single_pk_equality_value(expr: &Expression, schema: &Schema) -> Result<i64, String> {
    let Expression::BinaryOp { left, op: BinaryOperator::Equal, right } = expr else {
        return Err("not a point lookup".to_string());
    };
    let pk_name = schema.primary_key_name().unwrap_or("");
    match (&**left, &**right) {
        (Expression::Column(name), Expression::Value(Value::Int(n))) if name == pk_name => Ok(*n),
        (Expression::Value(Value::Int(n)), Expression::Column(name)) if name == pk_name => Ok(*n),
        _ => Err("not a point lookup".to_string()),
    }
}

fn sort_rows(rows: &mut [Vec<Value>], order_by: &[OrderByExpr], schema: &Schema) -> Result<(), String> {
    let indices: Vec<(usize, bool)> = order_by
        .iter()
        .map(|o| {
            schema
                .position(&o.column)
                .map(|idx| (idx, o.asc))
                .ok_or_else(|| format!("column '{}' does not exist", o.column))
        })
        .collect::<Result<_, _>>()?;

    rows.sort_by(|a, b| {
        for &(idx, asc) in &indices {
            let cmp = compare_for_sort(&a[idx], &b[idx]);
            if cmp != Ordering::Equal {
                return if asc { cmp } else { cmp.reverse() };
            }
        }
        Ordering::Equal
    });
    Ok(())
}

fn compare_for_sort(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => left.partial_cmp(right).unwrap_or(Ordering::Equal),
    }
}

fn execute_update(stmt: UpdateStatement, db: &mut Database) -> Result<String, String> {
    let table = db.get_table(&stmt.table).map_err(|e| e.to_string())?;
    let schema = table.schema().clone();

    let mut updated = 0;
    let matching_pks: Vec<i64> = table
        .select_all()
        .map_err(|e| e.to_string())?
        .into_iter()
        .filter(|row| {
            stmt.where_clause
                .as_ref()
                .map(|expr| evaluate_predicate(expr, &schema, row).unwrap_or(false))
                .unwrap_or(true)
        })
        .map(|row| row[0].as_int().expect("primary key column is always an int"))
        .collect();

    for pk in matching_pks {
        let Some(mut row) = table.select(pk).map_err(|e| e.to_string())? else {
            continue;
        };
        for assignment in &stmt.assignments {
            let idx = schema
                .position(&assignment.column)
                .ok_or_else(|| format!("column '{}' does not exist", assignment.column))?;
            row[idx] = assignment.value.clone();
        }
        if table.update(pk, row).map_err(|e| e.to_string())? {
            updated += 1;
        }
    }
    Ok(format!("{updated} row(s) updated"))
}

fn execute_delete(stmt: DeleteStatement, db: &mut Database) -> Result<String, String> {
    let table = db.get_table(&stmt.table).map_err(|e| e.to_string())?;
    let schema = table.schema().clone();

    let matching_pks: Vec<i64> = table
        .select_all()
        .map_err(|e| e.to_string())?
        .into_iter()
        .filter(|row| {
            stmt.where_clause
                .as_ref()
                .map(|expr| evaluate_predicate(expr, &schema, row).unwrap_or(false))
                .unwrap_or(true)
        })
        .map(|row| row[0].as_int().expect("primary key column is always an int"))
        .collect();

    let mut deleted = 0;
    for pk in matching_pks {
        if table.delete(pk).map_err(|e| e.to_string())? {
            deleted += 1;
        }
    }
    Ok(format!("{deleted} row(s) deleted"))
}

fn evaluate_predicate(expr: &Expression, schema: &Schema, row: &[Value]) -> Result<bool, String> {
    match expr {
        Expression::BinaryOp { left, op: BinaryOperator::And, right } => {
            Ok(evaluate_predicate(left, schema, row)? && evaluate_predicate(right, schema, row)?)
        }
        Expression::BinaryOp { left, op: BinaryOperator::Or, right } => {
            Ok(evaluate_predicate(left, schema, row)? || evaluate_predicate(right, schema, row)?)
        }
        Expression::BinaryOp { left, op: BinaryOperator::Like, right } => {
            let value = evaluate_value(left, schema, row)?;
            let pattern = evaluate_value(right, schema, row)?;
            match (value, pattern) {
                (Value::Text(s), Value::Text(p)) => Ok(like_regex(&p)?.is_match(&s)),
                _ => Err("LIKE requires text operands".to_string()),
            }
        }
        Expression::BinaryOp { left, op, right } => {
            let l = evaluate_value(left, schema, row)?;
            let r = evaluate_value(right, schema, row)?;
            compare(&l, op, &r)
        }
        Expression::UnaryOp { op: UnaryOperator::Not, expr } => {
            Ok(!evaluate_predicate(expr, schema, row)?)
        }
        Expression::Column(_) | Expression::Value(_) => {
            Err("a bare value is not a valid WHERE predicate".to_string())
        }
    }
}

fn evaluate_value(expr: &Expression, schema: &Schema, row: &[Value]) -> Result<Value, String> {
    match expr {
        Expression::Column(name) => {
            let idx = schema
                .position(name)
                .ok_or_else(|| format!("column '{name}' does not exist"))?;
            Ok(row[idx].clone())
        }
        Expression::Value(v) => Ok(v.clone()),
        _ => Err("expected a column or a literal".to_string()),
    }
}

fn compare(left: &Value, op: &BinaryOperator, right: &Value) -> Result<bool, String> {
    let ordering = left.partial_cmp(right);
    match op {
        BinaryOperator::Equal => Ok(left == right),
        BinaryOperator::NotEqual => Ok(left != right),
        BinaryOperator::LessThan => Ok(ordering == Some(Ordering::Less)),
        BinaryOperator::LessThanOrEqual => {
            Ok(matches!(ordering, Some(Ordering::Less) | Some(Ordering::Equal)))
        }
        BinaryOperator::GreaterThan => Ok(ordering == Some(Ordering::Greater)),
        BinaryOperator::GreaterThanOrEqual => Ok(matches!(
            ordering,
            Some(Ordering::Greater) | Some(Ordering::Equal)
        )),
        BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Like => {
            Err("operator requires boolean or text operands".to_string())
        }
    }
}

/// Translate a SQL `LIKE` pattern (`%` = any run, `_` = any single char) to
/// an anchored regex.
fn like_regex(pattern: &str) -> Result<Regex, String> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| format!("invalid LIKE pattern: {e}"))
}
