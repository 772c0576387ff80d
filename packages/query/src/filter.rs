//! Structured attribute filter expressions.
//!
//! Filters are built as a [`Predicate`] tree and rendered to the feature
//! service's SQL-92 `where` dialect only at the boundary. User-influenced
//! text (species names picked from query results) is escaped during
//! rendering, so a value containing a quote character can never alter the
//! predicate structure. The in-process layer evaluates the tree directly
//! and never sees SQL at all.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A filter expression over a layer's attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Predicate {
    /// Matches every record. Renders as `1=1`.
    #[default]
    All,
    /// Matches records where `field` has a non-null value.
    NotNull {
        /// Attribute field name.
        field: String,
    },
    /// Matches records where `field` equals a string value.
    Equals {
        /// Attribute field name.
        field: String,
        /// Value to compare against; escaped at render time.
        value: String,
    },
    /// Matches records where `field` lies in `[min, max]`.
    Range {
        /// Attribute field name.
        field: String,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// Matches records where `field >= value`.
    GreaterEq {
        /// Attribute field name.
        field: String,
        /// Inclusive lower bound.
        value: f64,
    },
    /// Matches records where `field < value`.
    LessThan {
        /// Attribute field name.
        field: String,
        /// Exclusive upper bound.
        value: f64,
    },
    /// Matches records satisfying every inner predicate.
    And(Vec<Predicate>),
}

impl Predicate {
    /// Renders the predicate as a feature-service `where` clause.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::All => "1=1".to_string(),
            Self::NotNull { field } => format!("({field} IS NOT NULL)"),
            Self::Equals { field, value } => {
                format!("({field} = '{}')", escape_literal(value))
            }
            Self::Range { field, min, max } => {
                format!("({field} BETWEEN {min} AND {max})")
            }
            Self::GreaterEq { field, value } => format!("({field} >= {value})"),
            Self::LessThan { field, value } => format!("({field} < {value})"),
            Self::And(inner) => {
                if inner.is_empty() {
                    return "1=1".to_string();
                }
                let mut sql = String::new();
                for (i, predicate) in inner.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" AND ");
                    }
                    let _ = write!(sql, "{}", predicate.to_sql());
                }
                sql
            }
        }
    }

    /// Evaluates the predicate against an attribute map.
    ///
    /// String comparisons are exact; numeric comparisons accept any JSON
    /// number. A missing or mistyped attribute fails the comparison rather
    /// than erroring.
    #[must_use]
    pub fn matches(&self, attributes: &BTreeMap<String, serde_json::Value>) -> bool {
        match self {
            Self::All => true,
            Self::NotNull { field } => {
                attributes.get(field).is_some_and(|v| !v.is_null())
            }
            Self::Equals { field, value } => attributes
                .get(field)
                .and_then(serde_json::Value::as_str)
                .is_some_and(|v| v == value),
            Self::Range { field, min, max } => attributes
                .get(field)
                .and_then(serde_json::Value::as_f64)
                .is_some_and(|v| v >= *min && v <= *max),
            Self::GreaterEq { field, value } => attributes
                .get(field)
                .and_then(serde_json::Value::as_f64)
                .is_some_and(|v| v >= *value),
            Self::LessThan { field, value } => attributes
                .get(field)
                .and_then(serde_json::Value::as_f64)
                .is_some_and(|v| v < *value),
            Self::And(inner) => inner.iter().all(|p| p.matches(attributes)),
        }
    }
}

/// Doubles embedded single quotes, the SQL-92 string escape accepted by
/// feature services.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Composes the layer's attribute filter from at most one numeric-range
/// fragment and at most one categorical fragment.
///
/// Setting a fragment replaces any previous fragment of the same kind;
/// selecting a new category never accumulates with the old one.
/// [`compose`](Self::compose) renders the conjunction in a fixed order, so
/// it is idempotent and independent of which fragment was set last.
#[derive(Debug, Clone)]
pub struct FilterComposer {
    range_field: String,
    category_field: String,
    range: Option<(f64, f64)>,
    category: Option<String>,
}

impl FilterComposer {
    /// Creates a composer with no active fragments.
    #[must_use]
    pub fn new(range_field: &str, category_field: &str) -> Self {
        Self {
            range_field: range_field.to_string(),
            category_field: category_field.to_string(),
            range: None,
            category: None,
        }
    }

    /// Replaces the numeric-range fragment.
    pub fn set_range(&mut self, min: f64, max: f64) {
        self.range = Some((min, max));
    }

    /// Removes the numeric-range fragment.
    pub fn clear_range(&mut self) {
        self.range = None;
    }

    /// Replaces the categorical fragment; `None` clears it.
    pub fn set_category(&mut self, value: Option<&str>) {
        self.category = value.map(ToString::to_string);
    }

    /// Returns the active categorical fragment value.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Returns the conjunction of all active fragments.
    ///
    /// An empty fragment set composes to [`Predicate::All`].
    #[must_use]
    pub fn compose(&self) -> Predicate {
        let mut fragments = Vec::new();

        if let Some((min, max)) = self.range {
            fragments.push(Predicate::Range {
                field: self.range_field.clone(),
                min,
                max,
            });
        }
        if let Some(value) = &self.category {
            fragments.push(Predicate::Equals {
                field: self.category_field.clone(),
                value: value.clone(),
            });
        }

        match fragments.len() {
            0 => Predicate::All,
            1 => fragments.remove(0),
            _ => Predicate::And(fragments),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn attrs(entries: &[(&str, serde_json::Value)]) -> BTreeMap<String, serde_json::Value> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn empty_composer_matches_all() {
        let composer = FilterComposer::new("tree_dbh", "spc_common");
        assert_eq!(composer.compose(), Predicate::All);
        assert_eq!(composer.compose().to_sql(), "1=1");
    }

    #[test]
    fn compose_is_idempotent() {
        let mut composer = FilterComposer::new("tree_dbh", "spc_common");
        composer.set_range(5.0, 30.0);
        composer.set_category(Some("pin oak"));
        assert_eq!(composer.compose(), composer.compose());
    }

    #[test]
    fn compose_is_order_independent() {
        let mut range_first = FilterComposer::new("tree_dbh", "spc_common");
        range_first.set_range(5.0, 30.0);
        range_first.set_category(Some("pin oak"));

        let mut category_first = FilterComposer::new("tree_dbh", "spc_common");
        category_first.set_category(Some("pin oak"));
        category_first.set_range(5.0, 30.0);

        assert_eq!(range_first.compose(), category_first.compose());
    }

    #[test]
    fn new_category_replaces_previous_selection() {
        let mut composer = FilterComposer::new("tree_dbh", "spc_common");
        composer.set_category(Some("pin oak"));
        composer.set_category(Some("red maple"));

        let sql = composer.compose().to_sql();
        assert_eq!(sql, "(spc_common = 'red maple')");
    }

    #[test]
    fn clearing_category_restores_range_only() {
        let mut composer = FilterComposer::new("tree_dbh", "spc_common");
        composer.set_range(0.0, 50.0);
        composer.set_category(Some("pin oak"));
        composer.set_category(None);

        assert_eq!(
            composer.compose().to_sql(),
            "(tree_dbh BETWEEN 0 AND 50)"
        );
    }

    #[test]
    fn conjunction_renders_in_fixed_order() {
        let mut composer = FilterComposer::new("tree_dbh", "spc_common");
        composer.set_category(Some("pin oak"));
        composer.set_range(5.0, 30.0);

        assert_eq!(
            composer.compose().to_sql(),
            "(tree_dbh BETWEEN 5 AND 30) AND (spc_common = 'pin oak')"
        );
    }

    #[test]
    fn quoted_value_cannot_break_out_of_the_literal() {
        let mut composer = FilterComposer::new("tree_dbh", "spc_common");
        composer.set_category(Some("oak') OR (1=1"));

        assert_eq!(
            composer.compose().to_sql(),
            "(spc_common = 'oak'') OR (1=1')"
        );
    }

    #[test]
    fn quoted_value_still_matches_structurally() {
        let mut composer = FilterComposer::new("tree_dbh", "spc_common");
        composer.set_category(Some("devil's walkingstick"));
        let predicate = composer.compose();

        assert!(predicate.matches(&attrs(&[(
            "spc_common",
            json!("devil's walkingstick")
        )])));
        assert!(!predicate.matches(&attrs(&[("spc_common", json!("pin oak"))])));
    }

    #[test]
    fn range_matches_inclusive_bounds() {
        let predicate = Predicate::Range {
            field: "tree_dbh".to_string(),
            min: 5.0,
            max: 30.0,
        };
        assert!(predicate.matches(&attrs(&[("tree_dbh", json!(5))])));
        assert!(predicate.matches(&attrs(&[("tree_dbh", json!(30))])));
        assert!(!predicate.matches(&attrs(&[("tree_dbh", json!(31))])));
        assert!(!predicate.matches(&attrs(&[("tree_dbh", json!(null))])));
    }

    #[test]
    fn half_open_bounds_render_and_match() {
        let bin = Predicate::And(vec![
            Predicate::GreaterEq {
                field: "tree_dbh".to_string(),
                value: 10.0,
            },
            Predicate::LessThan {
                field: "tree_dbh".to_string(),
                value: 20.0,
            },
        ]);

        assert_eq!(bin.to_sql(), "(tree_dbh >= 10) AND (tree_dbh < 20)");
        assert!(bin.matches(&attrs(&[("tree_dbh", json!(10))])));
        assert!(bin.matches(&attrs(&[("tree_dbh", json!(19.9))])));
        assert!(!bin.matches(&attrs(&[("tree_dbh", json!(20))])));
    }

    #[test]
    fn not_null_rejects_null_and_missing() {
        let predicate = Predicate::NotNull {
            field: "spc_common".to_string(),
        };
        assert!(predicate.matches(&attrs(&[("spc_common", json!("ginkgo"))])));
        assert!(!predicate.matches(&attrs(&[("spc_common", json!(null))])));
        assert!(!predicate.matches(&attrs(&[])));
    }
}
