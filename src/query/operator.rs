//! Comparison and logical operators accepted by the where-builders.

use std::fmt;
use std::str::FromStr;

use crate::error::OrmError;

/// Comparison operator of a where condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `LIKE`
    Like,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<>`
    Ne,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
    /// `BETWEEN low AND high`
    Between,
    /// `IS`
    Is,
    /// `IS NOT`
    IsNot,
    /// `INSTANCEOF`
    InstanceOf,
    /// `MATCHES`
    Matches,
}

/// Rendering family of an operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorKind {
    /// `path op :param`
    Basic,
    /// `path [NOT] IN [...]` or a sub-query.
    In,
    /// `path BETWEEN :a AND :b`
    Between,
    /// `path IS [NOT] NULL`
    Null,
}

const ALL: [Operator; 14] = [
    Operator::Eq,
    Operator::Like,
    Operator::Lt,
    Operator::Lte,
    Operator::Gt,
    Operator::Gte,
    Operator::Ne,
    Operator::In,
    Operator::NotIn,
    Operator::Between,
    Operator::Is,
    Operator::IsNot,
    Operator::InstanceOf,
    Operator::Matches,
];

impl Operator {
    /// Every operator, in canonical order.
    pub fn all() -> &'static [Operator] {
        &ALL
    }

    /// `$`-prefixed code used in condition maps.
    pub fn code(self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Like => "$lk",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Ne => "$ne",
            Operator::In => "$in",
            Operator::NotIn => "$nin",
            Operator::Between => "$btw",
            Operator::Is => "$is",
            Operator::IsNot => "$isnt",
            Operator::InstanceOf => "$io",
            Operator::Matches => "$m",
        }
    }

    /// Dialect keyword or symbol.
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Like => "LIKE",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Ne => "<>",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Between => "BETWEEN",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
            Operator::InstanceOf => "INSTANCEOF",
            Operator::Matches => "MATCHES",
        }
    }

    /// Rendering family.
    pub fn kind(self) -> OperatorKind {
        match self {
            Operator::In | Operator::NotIn => OperatorKind::In,
            Operator::Between => OperatorKind::Between,
            Operator::Is | Operator::IsNot => OperatorKind::Null,
            _ => OperatorKind::Basic,
        }
    }

    /// Operator used when the compared value is null.
    pub fn for_null(self) -> Operator {
        match self {
            Operator::Ne | Operator::IsNot => Operator::IsNot,
            _ => Operator::Is,
        }
    }

    /// Returns `true` when `token` is a recognized operator code.
    pub fn is_code(token: &str) -> bool {
        token.starts_with('$') && token.parse::<Operator>().is_ok()
    }
}

impl FromStr for Operator {
    type Err = OrmError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let trimmed = token.trim();
        if let Some(op) = ALL.iter().find(|op| op.code() == trimmed) {
            return Ok(*op);
        }
        let op = match trimmed.to_ascii_lowercase().as_str() {
            "=" | "==" => Operator::Eq,
            "like" => Operator::Like,
            "<" => Operator::Lt,
            "<=" => Operator::Lte,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            "<>" | "!=" => Operator::Ne,
            "in" => Operator::In,
            "not in" | "nin" => Operator::NotIn,
            "between" => Operator::Between,
            "is" => Operator::Is,
            "is not" | "isnt" => Operator::IsNot,
            "instanceof" => Operator::InstanceOf,
            "matches" => Operator::Matches,
            _ => {
                return Err(OrmError::InvalidOperator {
                    op: token.to_string(),
                })
            }
        };
        Ok(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

/// Boolean connector between where clauses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Logic {
    /// `AND`
    #[default]
    And,
    /// `OR`
    Or,
}

impl Logic {
    /// Dialect keyword.
    pub fn sql(self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }

    /// Parses `$and`/`$or` keys of condition maps.
    pub fn from_key(key: &str) -> Option<Logic> {
        match key {
            "$and" => Some(Logic::And),
            "$or" => Some(Logic::Or),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_symbols_parse_to_the_same_operator() {
        for op in Operator::all() {
            assert_eq!(op.code().parse::<Operator>().ok(), Some(*op));
            assert_eq!(op.sql().parse::<Operator>().ok(), Some(*op));
        }
        assert_eq!("!=".parse::<Operator>().ok(), Some(Operator::Ne));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = "$contains".parse::<Operator>().unwrap_err();
        assert!(matches!(err, OrmError::InvalidOperator { ref op } if op == "$contains"));
    }

    #[test]
    fn null_values_map_to_is_or_is_not() {
        assert_eq!(Operator::Ne.for_null(), Operator::IsNot);
        assert_eq!(Operator::Gt.for_null(), Operator::Is);
        assert_eq!(Operator::Is.kind(), OperatorKind::Null);
        assert_eq!(Operator::NotIn.kind(), OperatorKind::In);
    }
}
