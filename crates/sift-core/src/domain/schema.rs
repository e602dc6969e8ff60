use crate::domain::task::is_valid_attribute_name;
use crate::error::CoreError;
use crate::eval::is_named_date;
use std::collections::BTreeSet;

pub const BUILTIN_ATTRIBUTES: [&str; 16] = [
    "description",
    "status",
    "project",
    "priority",
    "tags",
    "due",
    "scheduled",
    "wait",
    "until",
    "start",
    "end",
    "entry",
    "modified",
    "recur",
    "parent",
    "depends",
];

pub const DATE_ATTRIBUTES: [&str; 8] = [
    "due",
    "scheduled",
    "wait",
    "until",
    "start",
    "end",
    "entry",
    "modified",
];

/// Words the expression language claims for itself.
const OPERATOR_WORDS: [&str; 6] = ["and", "or", "xor", "not", "_hastag_", "_notag_"];

/// The attribute names the record resolver will answer for. Names outside
/// the schema are unresolved rather than silently empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    names: BTreeSet<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Schema {
    pub fn builtin() -> Self {
        Self {
            names: BUILTIN_ATTRIBUTES.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn with_udas<I, S>(udas: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut schema = Self::builtin();
        for uda in udas {
            let name = uda.as_ref().trim();
            if !is_valid_attribute_name(name) || is_reserved(name) {
                return Err(CoreError::InvalidAttributeName(name.to_string()));
            }
            schema.names.insert(name.to_string());
        }
        Ok(schema)
    }

    pub fn contains(&self, name: &str) -> bool {
        name == "id" || name == "uuid" || self.names.contains(name)
    }

    pub fn is_date(&self, name: &str) -> bool {
        DATE_ATTRIBUTES.contains(&name)
    }
}

/// Named dates resolve before attributes, so an attribute spelled like one
/// could never be read.
fn is_reserved(name: &str) -> bool {
    name == "id" || name == "uuid" || is_named_date(name) || OPERATOR_WORDS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::Schema;

    #[test]
    fn udas_extend_builtin() {
        let schema = Schema::with_udas(["estimate"]).unwrap();
        assert!(schema.contains("estimate"));
        assert!(schema.contains("project"));
        assert!(schema.contains("id"));
        assert!(!schema.contains("nosuchfield"));
    }

    #[test]
    fn uda_names_are_validated() {
        assert!(Schema::with_udas(["Bad Name"]).is_err());
        assert!(Schema::with_udas(["uuid"]).is_err());
    }

    #[test]
    fn udas_cannot_shadow_named_dates_or_operators() {
        for name in ["today", "eom", "monday", "later", "and", "xor", "not", "_hastag_"] {
            assert!(Schema::with_udas([name]).is_err(), "{name} accepted");
        }
        assert!(Schema::with_udas(["todays"]).is_ok());
    }
}
