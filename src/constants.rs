// Configuration file name
pub const CONFIG_FILENAME: &str = "grainsql.yaml";

// Hidden columns maintained by the generator
pub const REC_VERSION: &str = "recversion";
pub const SURROGATE_COUNT: &str = "surrogate_count";

// Postgres companion index for LIKE-friendly lookups over bounded strings
pub const CONJUGATE_INDEX_POSTFIX: &str = "__vpo";

// Identifier limits shared by every dialect (the tightest engine wins)
pub const MAX_IDENTIFIER_LENGTH: usize = 30;
pub const HASH_SUFFIX_LENGTH: usize = 8;

// Materialized view trigger bodies carry the view checksum between these markers
pub const CHECKSUM_OPEN: &str = "/*CHECKSUM";
pub const CHECKSUM_CLOSE: &str = "CHECKSUM*/";

pub const VERSION_CHECK_FAILURE: &str = "record version check failure";
