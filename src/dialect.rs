use serde::{Deserialize, Serialize};
use std::fmt;

/// Target SQL engine. Chosen once per session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Embedded Java engine
    H2,
    Postgres,
    #[value(name = "mssql")]
    MsSql,
    Oracle,
    /// No schemas, emulated sequences and versioning
    Firebird,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::H2,
        Dialect::Postgres,
        Dialect::MsSql,
        Dialect::Oracle,
        Dialect::Firebird,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dialect::H2 => "h2",
            Dialect::Postgres => "postgres",
            Dialect::MsSql => "mssql",
            Dialect::Oracle => "oracle",
            Dialect::Firebird => "firebird",
        }
    }

    /// Engines without schemas flatten `grain.name` into `grain_name`.
    pub fn has_schemas(self) -> bool {
        !matches!(self, Dialect::Oracle | Dialect::Firebird)
    }

    /// DDL must be committed before triggers can refer to the new objects.
    pub fn requires_commit_after_ddl(self) -> bool {
        matches!(self, Dialect::Firebird)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown dialect '{}'", s))
    }
}
