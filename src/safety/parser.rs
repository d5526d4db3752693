//! SQL parsing and classification logic.
//!
//! Uses sqlparser-rs with the SQLite dialect. Submissions the parser does not
//! understand are still executed; they are just classified as unknown.

use sqlparser::ast::{Query, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

use super::{Classification, SafetyLevel, StatementType};

/// SQL classifier for student submissions.
#[derive(Debug)]
pub struct SqlClassifier {
    dialect: SQLiteDialect,
}

impl Default for SqlClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlClassifier {
    /// Creates a new SQL classifier.
    pub fn new() -> Self {
        Self {
            dialect: SQLiteDialect {},
        }
    }

    /// Classifies a SQL string.
    pub fn classify(&self, sql: &str) -> Classification {
        let statements = match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => {
                return Classification::with_parse_error(
                    SafetyLevel::Unknown,
                    StatementType::Unknown,
                    e.to_string(),
                )
            }
        };

        match statements.as_slice() {
            [] => Classification::with_parse_error(
                SafetyLevel::Unknown,
                StatementType::Unknown,
                "Empty SQL statement",
            ),
            [statement] => {
                let (level, stmt_type) = classify_statement(statement);
                Classification::new(level, stmt_type)
            }
            many => {
                let (level, stmt_type) = many
                    .iter()
                    .map(classify_statement)
                    .fold((SafetyLevel::ReadOnly, StatementType::Select), most_significant);
                Classification::new(level, StatementType::Multiple(Box::new(stmt_type)))
            }
        }
    }
}

/// Convenience function to classify SQL without creating a classifier instance.
pub fn classify_sql(sql: &str) -> Classification {
    SqlClassifier::new().classify(sql)
}

fn most_significant(
    current: (SafetyLevel, StatementType),
    candidate: (SafetyLevel, StatementType),
) -> (SafetyLevel, StatementType) {
    if level_priority(candidate.0) > level_priority(current.0) {
        candidate
    } else {
        current
    }
}

fn level_priority(level: SafetyLevel) -> u8 {
    match level {
        SafetyLevel::ReadOnly => 0,
        SafetyLevel::Unknown => 1,
        SafetyLevel::Mutating => 2,
    }
}

fn classify_statement(statement: &Statement) -> (SafetyLevel, StatementType) {
    match statement {
        // May hide data-modifying CTEs
        Statement::Query(query) => classify_query(query),
        Statement::Explain { .. } | Statement::ExplainTable { .. } => {
            (SafetyLevel::ReadOnly, StatementType::Explain)
        }

        Statement::Insert { .. } => (SafetyLevel::Mutating, StatementType::Insert),
        Statement::Update { .. } => (SafetyLevel::Mutating, StatementType::Update),
        Statement::Delete { .. } => (SafetyLevel::Mutating, StatementType::Delete),
        Statement::Drop { .. } => (SafetyLevel::Mutating, StatementType::Drop),
        Statement::AlterTable { .. } => (SafetyLevel::Mutating, StatementType::Alter),
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateVirtualTable { .. } => (SafetyLevel::Mutating, StatementType::Create),
        Statement::Pragma { .. } => (SafetyLevel::Mutating, StatementType::Pragma),
        Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. } => (SafetyLevel::ReadOnly, StatementType::Transaction),

        _ => (SafetyLevel::Unknown, StatementType::Unknown),
    }
}

fn classify_query(query: &Query) -> (SafetyLevel, StatementType) {
    let from_ctes = query
        .with
        .iter()
        .flat_map(|with| with.cte_tables.iter())
        .map(|cte| classify_query(&cte.query));

    std::iter::once(classify_set_expr(&query.body))
        .chain(from_ctes)
        .fold((SafetyLevel::ReadOnly, StatementType::Select), most_significant)
}

fn classify_set_expr(set_expr: &SetExpr) -> (SafetyLevel, StatementType) {
    match set_expr {
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => classify_statement(stmt),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::Select(select) => select
            .from
            .iter()
            .map(classify_table_with_joins)
            .fold((SafetyLevel::ReadOnly, StatementType::Select), most_significant),
        SetExpr::SetOperation { left, right, .. } => {
            most_significant(classify_set_expr(left), classify_set_expr(right))
        }
        _ => (SafetyLevel::ReadOnly, StatementType::Select),
    }
}

fn classify_table_with_joins(twj: &TableWithJoins) -> (SafetyLevel, StatementType) {
    std::iter::once(&twj.relation)
        .chain(twj.joins.iter().map(|join| &join.relation))
        .map(classify_table_factor)
        .fold((SafetyLevel::ReadOnly, StatementType::Select), most_significant)
}

fn classify_table_factor(factor: &TableFactor) -> (SafetyLevel, StatementType) {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => (SafetyLevel::ReadOnly, StatementType::Select),
    }
}
