use crate::config::types::*;

/// Trait for merging optional configuration values
pub trait Merge<T> {
    fn merge(self, other: T) -> T;
}

impl<T> Merge<Option<T>> for Option<T> {
    fn merge(self, other: Option<T>) -> Option<T> {
        other.or(self)
    }
}

impl Merge<ConfigInput> for ConfigInput {
    fn merge(self, other: ConfigInput) -> ConfigInput {
        ConfigInput {
            dialect: self.dialect.merge(other.dialect),
            model: match (self.model, other.model) {
                (Some(a), Some(b)) => Some(a.merge_with(b)),
                (a, b) => b.or(a),
            },
            output: match (self.output, other.output) {
                (Some(a), Some(b)) => Some(a.merge_with(b)),
                (a, b) => b.or(a),
            },
            system_schema: self.system_schema.merge(other.system_schema),
            h2: match (self.h2, other.h2) {
                (Some(a), Some(b)) => Some(a.merge_with(b)),
                (a, b) => b.or(a),
            },
            observed: self.observed.merge(other.observed),
        }
    }
}

impl ModelInput {
    pub fn merge_with(self, other: ModelInput) -> ModelInput {
        ModelInput {
            path: other.path.or(self.path),
        }
    }
}

impl OutputInput {
    pub fn merge_with(self, other: OutputInput) -> OutputInput {
        OutputInput {
            format: other.format.or(self.format),
            file: other.file.or(self.file),
        }
    }
}

impl H2Input {
    pub fn merge_with(self, other: H2Input) -> H2Input {
        H2Input {
            version_check: other.version_check.or(self.version_check),
            mv_insert: other.mv_insert.or(self.mv_insert),
            mv_update: other.mv_update.or(self.mv_update),
            mv_delete: other.mv_delete.or(self.mv_delete),
        }
    }
}
