//! SQL dialects and the statements each one needs
//!
//! The session table has the same two-column shape everywhere; what differs
//! is identifier quoting, placeholder style and the "insert or update on
//! conflict" clause.

use crate::error::{StorageError, StorageResult};
use std::fmt;

/// Relational backends supported by the SQL session store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL, `$n` placeholders
    Postgres,
    /// MySQL / MariaDB, backtick identifiers
    MySql,
    /// SQLite
    Sqlite,
}

impl Dialect {
    /// Pick the dialect from a connection URL scheme
    pub fn from_url(url: &str) -> StorageResult<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default();
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(StorageError::Configuration(format!(
                "unsupported SQL connection URL scheme in {:?}",
                url
            ))),
        }
    }

    /// Quote an identifier, escaping embedded quote characters
    pub fn quote_ident(self, name: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", name.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Bind placeholder for the `n`th (1-based) parameter
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${}", n),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }

    /// Idempotent creation of the session table
    pub fn create_table(self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(255) NOT NULL PRIMARY KEY, {} TEXT)",
            self.quote_ident(table),
            self.quote_ident("key"),
            self.quote_ident("session"),
        )
    }

    /// Read one session by key
    pub fn select(self, table: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            self.quote_ident("session"),
            self.quote_ident(table),
            self.quote_ident("key"),
            self.placeholder(1),
        )
    }

    /// Insert a session or replace the one already stored under its key
    ///
    /// Binds `(key, session)` in that order.
    pub fn upsert(self, table: &str) -> String {
        let key = self.quote_ident("key");
        let session = self.quote_ident("session");
        let insert = format!(
            "INSERT INTO {} ({}, {}) VALUES ({}, {})",
            self.quote_ident(table),
            key,
            session,
            self.placeholder(1),
            self.placeholder(2),
        );
        match self {
            Self::Postgres => format!(
                "{} ON CONFLICT ({}) DO UPDATE SET {} = EXCLUDED.{}",
                insert, key, session, session
            ),
            Self::Sqlite => format!(
                "{} ON CONFLICT ({}) DO UPDATE SET {} = excluded.{}",
                insert, key, session, session
            ),
            Self::MySql => format!(
                "{} ON DUPLICATE KEY UPDATE {} = VALUES({})",
                insert, session, session
            ),
        }
    }

    /// Remove one session by key
    pub fn delete(self, table: &str) -> String {
        format!(
            "DELETE FROM {} WHERE {} = {}",
            self.quote_ident(table),
            self.quote_ident("key"),
            self.placeholder(1),
        )
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TABLE;

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(
            Dialect::from_url("postgres://bot@localhost/bot").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(
            Dialect::from_url("postgresql://localhost").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(
            Dialect::from_url("mysql://root@db:3306/bot").unwrap(),
            Dialect::MySql
        );
        assert_eq!(Dialect::from_url("sqlite::memory:").unwrap(), Dialect::Sqlite);
        assert_eq!(
            Dialect::from_url("SQLITE://sessions.db").unwrap(),
            Dialect::Sqlite
        );
    }

    #[test]
    fn test_display_name_is_url_scheme() {
        for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite] {
            let url = format!("{}://localhost/bot", dialect);
            assert_eq!(Dialect::from_url(&url).unwrap(), dialect);
        }
    }

    #[test]
    fn test_dialect_from_unknown_url() {
        let err = Dialect::from_url("redis://localhost").unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
        assert!(Dialect::from_url("no scheme").is_err());
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(Dialect::Postgres.quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::MySql.quote_ident("a`b"), "`a``b`");
        assert_eq!(
            Dialect::Sqlite.quote_ident(DEFAULT_TABLE),
            "\"telegraf-sessions\""
        );
    }

    #[test]
    fn test_postgres_statements() {
        let d = Dialect::Postgres;
        assert_eq!(
            d.create_table("sessions"),
            "CREATE TABLE IF NOT EXISTS \"sessions\" (\"key\" VARCHAR(255) NOT NULL PRIMARY KEY, \"session\" TEXT)"
        );
        assert_eq!(
            d.select("sessions"),
            "SELECT \"session\" FROM \"sessions\" WHERE \"key\" = $1"
        );
        assert_eq!(
            d.upsert("sessions"),
            "INSERT INTO \"sessions\" (\"key\", \"session\") VALUES ($1, $2) \
             ON CONFLICT (\"key\") DO UPDATE SET \"session\" = EXCLUDED.\"session\""
        );
        assert_eq!(
            d.delete("sessions"),
            "DELETE FROM \"sessions\" WHERE \"key\" = $1"
        );
    }

    #[test]
    fn test_sqlite_upsert() {
        assert_eq!(
            Dialect::Sqlite.upsert("s"),
            "INSERT INTO \"s\" (\"key\", \"session\") VALUES (?, ?) \
             ON CONFLICT (\"key\") DO UPDATE SET \"session\" = excluded.\"session\""
        );
    }

    #[test]
    fn test_mysql_statements() {
        let d = Dialect::MySql;
        assert_eq!(
            d.upsert("s"),
            "INSERT INTO `s` (`key`, `session`) VALUES (?, ?) \
             ON DUPLICATE KEY UPDATE `session` = VALUES(`session`)"
        );
        assert_eq!(d.select("s"), "SELECT `session` FROM `s` WHERE `key` = ?");
        assert_eq!(d.delete("s"), "DELETE FROM `s` WHERE `key` = ?");
    }

    #[test]
    fn test_statements_never_embed_values() {
        for d in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite] {
            for sql in [d.select("t"), d.upsert("t"), d.delete("t")] {
                assert!(!sql.contains('\''), "{} statement has a literal: {}", d, sql);
            }
        }
    }
}
