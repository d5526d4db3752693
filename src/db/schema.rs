//! Schema definitions for the reference database.
//!
//! A schema is either an ordered TOML table list (which also carries fixture
//! rows and random-data hints) or a plain SQL script executed verbatim.

use crate::error::{GraderError, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;

/// Default number of generated rows per table in random mode.
const DEFAULT_RANDOM_ROWS: usize = 10;

/// A loaded schema and the text it came from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// Structured table list.
    Tables { tables: Vec<TableDef>, text: String },
    /// SQL script executed as-is. Random data generation is not available.
    Script { sql: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    #[serde(default)]
    tables: Vec<TableDef>,
}

/// One table of a structured schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDef {
    /// Table name.
    pub name: String,

    /// Column definitions and table constraints, in SQL syntax.
    pub columns: Vec<String>,

    /// Rows generated for this table in random mode.
    #[serde(default = "default_random_rows")]
    pub random_rows: usize,

    /// Fixture rows keyed by column name.
    #[serde(default)]
    pub fixture: Vec<toml::Table>,
}

fn default_random_rows() -> usize {
    DEFAULT_RANDOM_ROWS
}

/// SQLite type affinity of a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    /// Determines affinity using SQLite's declared-type rules.
    pub fn from_declared_type(declared: &str) -> Self {
        let upper = declared.to_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if ["CHAR", "CLOB", "TEXT"].iter().any(|t| upper.contains(t)) {
            Self::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            Self::Blob
        } else if ["REAL", "FLOA", "DOUB"].iter().any(|t| upper.contains(t)) {
            Self::Real
        } else {
            Self::Numeric
        }
    }
}

/// A parsed column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub declared_type: String,
    /// `INTEGER PRIMARY KEY` columns alias the rowid and are filled by SQLite.
    pub is_rowid_alias: bool,
}

impl ColumnDef {
    pub fn affinity(&self) -> Affinity {
        Affinity::from_declared_type(&self.declared_type)
    }
}

/// A column that references another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRef {
    pub column: String,
    pub table: String,
    pub referenced_column: String,
}

impl SchemaSource {
    /// Loads a schema from disk. `.toml` files are structured, anything else
    /// is treated as a SQL script.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GraderError::provisioning(format!(
                "Failed to read schema {}: {e}",
                path.display()
            ))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::parse_toml(&text).map_err(|e| {
                GraderError::provisioning(format!("Schema error in {}:\n  {e}", path.display()))
            })
        } else {
            Ok(Self::Script { sql: text })
        }
    }

    /// Parses a structured schema from TOML text.
    pub fn parse_toml(text: &str) -> Result<Self> {
        let file: SchemaFile =
            toml::from_str(text).map_err(|e| GraderError::provisioning(e.to_string()))?;

        for table in &file.tables {
            table.validate()?;
        }

        Ok(Self::Tables {
            tables: file.tables,
            text: text.to_string(),
        })
    }

    /// Returns the schema source text, used as context for feedback.
    pub fn text(&self) -> &str {
        match self {
            Self::Tables { text, .. } => text,
            Self::Script { sql } => sql,
        }
    }
}

impl TableDef {
    fn validate(&self) -> Result<()> {
        if !is_identifier(&self.name) {
            return Err(GraderError::provisioning(format!(
                "Invalid table name '{}'",
                self.name
            )));
        }
        if self.columns.is_empty() {
            return Err(GraderError::provisioning(format!(
                "Table '{}' has no columns",
                self.name
            )));
        }
        Ok(())
    }

    /// Builds the CREATE TABLE statement. Table constraints are moved after
    /// the column definitions, as SQLite requires.
    pub fn create_statement(&self) -> String {
        let (constraints, columns): (Vec<&String>, Vec<&String>) = self
            .columns
            .iter()
            .partition(|def| is_constraint(def));

        let body: Vec<&str> = columns
            .into_iter()
            .chain(constraints)
            .map(|def| def.trim())
            .collect();

        format!("CREATE TABLE {} ({});", self.name, body.join(", "))
    }

    /// Returns the parsed column definitions, skipping table constraints.
    ///
    /// An `INTEGER` column named by a single-column table-level
    /// `PRIMARY KEY (...)` aliases the rowid just like an inline one.
    pub fn column_defs(&self) -> Vec<ColumnDef> {
        let table_key = self.table_primary_key();

        self.columns
            .iter()
            .filter(|def| !is_constraint(def))
            .filter_map(|def| parse_column(def))
            .map(|mut column| {
                if table_key.as_deref() == Some(column.name.as_str())
                    && column.declared_type.eq_ignore_ascii_case("INTEGER")
                {
                    column.is_rowid_alias = true;
                }
                column
            })
            .collect()
    }

    /// The column of a single-column table-level primary key, if any.
    fn table_primary_key(&self) -> Option<String> {
        self.columns
            .iter()
            .find_map(|def| table_pk_regex().captures(def))
            .map(|caps| caps[1].to_string())
    }

    /// Returns every foreign key, whether declared inline on a column or as
    /// a table constraint.
    pub fn foreign_keys(&self) -> Vec<ForeignKeyRef> {
        let mut keys = Vec::new();

        for def in &self.columns {
            if let Some(caps) = table_fk_regex().captures(def) {
                keys.push(ForeignKeyRef {
                    column: caps[1].to_string(),
                    table: caps[2].to_string(),
                    referenced_column: caps
                        .get(3)
                        .map_or_else(|| "rowid".to_string(), |m| m.as_str().to_string()),
                });
            } else if !is_constraint(def) {
                if let (Some(column), Some(caps)) =
                    (parse_column(def), inline_fk_regex().captures(def))
                {
                    keys.push(ForeignKeyRef {
                        column: column.name,
                        table: caps[1].to_string(),
                        referenced_column: caps
                            .get(2)
                            .map_or_else(|| "rowid".to_string(), |m| m.as_str().to_string()),
                    });
                }
            }
        }

        keys
    }
}

/// Table constraints start with a keyword, never with a column name.
fn is_constraint(def: &str) -> bool {
    constraint_regex().is_match(def)
}

fn parse_column(def: &str) -> Option<ColumnDef> {
    let mut tokens = def.split_whitespace();
    let name = tokens.next()?.trim_matches('"').to_string();
    let declared_type = tokens
        .next()
        .filter(|t| !is_column_constraint_keyword(t))
        .unwrap_or("")
        .to_string();
    let upper = def.to_uppercase();
    let is_rowid_alias = declared_type.eq_ignore_ascii_case("INTEGER") && upper.contains("PRIMARY KEY");

    Some(ColumnDef {
        name,
        declared_type,
        is_rowid_alias,
    })
}

fn is_column_constraint_keyword(token: &str) -> bool {
    matches!(
        token.to_uppercase().as_str(),
        "PRIMARY" | "NOT" | "NULL" | "UNIQUE" | "CHECK" | "DEFAULT" | "REFERENCES" | "COLLATE"
    )
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

fn constraint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:FOREIGN\s+KEY|PRIMARY\s+KEY|UNIQUE\s*\(|CHECK\s*\(|CONSTRAINT\s)")
            .expect("static regex is valid")
    })
}

fn table_pk_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^\s*(?:CONSTRAINT\s+"?\w+"?\s+)?PRIMARY\s+KEY\s*\(\s*"?(\w+)"?\s*(?:ASC|DESC)?\s*\)"#)
            .expect("static regex is valid")
    })
}

fn table_fk_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^\s*FOREIGN\s+KEY\s*\(\s*"?(\w+)"?\s*\)\s*REFERENCES\s+"?(\w+)"?\s*(?:\(\s*"?(\w+)"?\s*\))?"#)
            .expect("static regex is valid")
    })
}

fn inline_fk_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\bREFERENCES\s+"?(\w+)"?\s*(?:\(\s*"?(\w+)"?\s*\))?"#)
            .expect("static regex is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCHOOL: &str = r#"
[[tables]]
name = "Students"
columns = ["id INTEGER PRIMARY KEY AUTOINCREMENT", "name TEXT NOT NULL"]
fixture = [{ name = "Alice" }, { name = "Bob" }]

[[tables]]
name = "Courses"
columns = [
    "id INTEGER PRIMARY KEY AUTOINCREMENT",
    "FOREIGN KEY (parent_id) REFERENCES Courses(id)",
    "title TEXT",
    "parent_id INTEGER",
]
random_rows = 5
"#;

    fn tables() -> Vec<TableDef> {
        match SchemaSource::parse_toml(SCHOOL).unwrap() {
            SchemaSource::Tables { tables, .. } => tables,
            other => panic!("Expected tables, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_tables_in_order() {
        let tables = tables();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "Students");
        assert_eq!(tables[0].random_rows, DEFAULT_RANDOM_ROWS);
        assert_eq!(tables[0].fixture.len(), 2);
        assert_eq!(tables[1].random_rows, 5);
    }

    #[test]
    fn test_create_statement_moves_constraints_last() {
        let tables = tables();
        assert_eq!(
            tables[1].create_statement(),
            "CREATE TABLE Courses (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT, \
             parent_id INTEGER, FOREIGN KEY (parent_id) REFERENCES Courses(id));"
        );
    }

    #[test]
    fn test_column_defs() {
        let tables = tables();
        let columns = tables[1].column_defs();
        assert_eq!(columns.len(), 3);
        assert!(columns[0].is_rowid_alias);
        assert_eq!(columns[1].name, "title");
        assert_eq!(columns[1].affinity(), Affinity::Text);
        assert!(!columns[2].is_rowid_alias);
        assert_eq!(columns[2].affinity(), Affinity::Integer);
    }

    #[test]
    fn test_foreign_keys_table_and_inline() {
        let table = TableDef {
            name: "Enrollments".into(),
            columns: vec![
                "student_id INTEGER REFERENCES Students(id)".into(),
                "course_id INTEGER".into(),
                "FOREIGN KEY (course_id) REFERENCES Courses".into(),
            ],
            random_rows: 3,
            fixture: vec![],
        };

        assert_eq!(
            table.foreign_keys(),
            vec![
                ForeignKeyRef {
                    column: "student_id".into(),
                    table: "Students".into(),
                    referenced_column: "id".into(),
                },
                ForeignKeyRef {
                    column: "course_id".into(),
                    table: "Courses".into(),
                    referenced_column: "rowid".into(),
                },
            ]
        );
    }

    #[test]
    fn test_keyword_prefixed_column_names_are_columns() {
        let table = TableDef {
            name: "Visits".into(),
            columns: vec![
                "id INTEGER PRIMARY KEY".into(),
                "parent_id INTEGER".into(),
                "FOREIGN KEY (parent_id) REFERENCES Parents(id)".into(),
                "check_in TEXT".into(),
                "unique_code TEXT".into(),
                "primary_color TEXT".into(),
                "UNIQUE (unique_code)".into(),
            ],
            random_rows: 3,
            fixture: vec![],
        };

        assert_eq!(
            table.create_statement(),
            "CREATE TABLE Visits (id INTEGER PRIMARY KEY, parent_id INTEGER, check_in TEXT, \
             unique_code TEXT, primary_color TEXT, \
             FOREIGN KEY (parent_id) REFERENCES Parents(id), UNIQUE (unique_code));"
        );
        let names: Vec<String> = table.column_defs().into_iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            ["id", "parent_id", "check_in", "unique_code", "primary_color"]
        );
    }

    #[test]
    fn test_table_level_integer_primary_key_aliases_rowid() {
        let table = TableDef {
            name: "Rooms".into(),
            columns: vec![
                "id INTEGER".into(),
                "code INTEGER".into(),
                "PRIMARY KEY (id)".into(),
            ],
            random_rows: 3,
            fixture: vec![],
        };
        let columns = table.column_defs();
        assert!(columns[0].is_rowid_alias);
        assert!(!columns[1].is_rowid_alias);

        let composite = TableDef {
            columns: vec!["a INTEGER".into(), "b INTEGER".into(), "PRIMARY KEY (a, b)".into()],
            ..table
        };
        assert!(composite.column_defs().iter().all(|c| !c.is_rowid_alias));
    }

    #[test]
    fn test_affinity_rules() {
        assert_eq!(Affinity::from_declared_type("BIGINT"), Affinity::Integer);
        assert_eq!(Affinity::from_declared_type("VARCHAR(20)"), Affinity::Text);
        assert_eq!(Affinity::from_declared_type(""), Affinity::Blob);
        assert_eq!(Affinity::from_declared_type("DOUBLE"), Affinity::Real);
        assert_eq!(Affinity::from_declared_type("DECIMAL(10,2)"), Affinity::Numeric);
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let toml = r#"
[[tables]]
name = "Students; DROP TABLE x"
columns = ["id INTEGER"]
"#;
        let err = SchemaSource::parse_toml(toml).unwrap_err();
        assert!(err.to_string().contains("Invalid table name"));
    }

    #[test]
    fn test_load_sql_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.sql");
        std::fs::write(&path, "CREATE TABLE t (x INTEGER);").unwrap();

        match SchemaSource::load(&path).unwrap() {
            SchemaSource::Script { sql } => assert!(sql.contains("CREATE TABLE t")),
            other => panic!("Expected script, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file_is_provisioning_error() {
        let err = SchemaSource::load(Path::new("/nonexistent/schema.toml")).unwrap_err();
        assert!(matches!(err, GraderError::Provisioning(_)));
    }
}
