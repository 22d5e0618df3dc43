//! Conservative bucket pruning from table metadata and a column predicate.

use hivetap_types::HiveType;
use rustc_hash::FxHashMap;

use crate::hash::{BucketValue, bucket_hash, bucket_number};
use hivetap_result::Result;

/// Synthetic pseudo-column a predicate may restrict directly to bucket ids.
pub const BUCKET_ID_COLUMN: &str = "$bucket_id";

/// The bucketing scheme a table declares. Only [`BucketingVersion::V1`]
/// matches the hash implemented here; any other version means "no usable
/// bucketing information" and is never hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketingVersion {
    V1,
    V2,
}

/// One bucketed column, in declaration order. Order is significant: it is
/// the order values are fed to the rolling hash.
#[derive(Debug, Clone)]
pub struct BucketColumn {
    pub name: String,
    pub hive_type: HiveType,
}

impl BucketColumn {
    pub fn new(name: impl Into<String>, hive_type: HiveType) -> Self {
        Self {
            name: name.into(),
            hive_type,
        }
    }
}

/// A table's bucketing metadata.
#[derive(Debug, Clone)]
pub struct BucketProperty {
    pub version: BucketingVersion,
    pub bucket_count: u32,
    pub columns: Vec<BucketColumn>,
}

/// What a predicate pins a single column to.
#[derive(Debug, Clone)]
pub enum ValueSet {
    /// The column is unrestricted.
    All,
    /// The column can only take one of these values.
    Values(Vec<BucketValue>),
}

/// Per-column predicate bindings, keyed by column name.
#[derive(Debug, Clone, Default)]
pub struct PredicateBindings {
    sets: FxHashMap<String, ValueSet>,
}

impl PredicateBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, column: impl Into<String>, set: ValueSet) -> &mut Self {
        self.sets.insert(column.into(), set);
        self
    }

    /// Bind a column to exactly one value.
    pub fn bind_exact(&mut self, column: impl Into<String>, value: BucketValue) -> &mut Self {
        self.bind(column, ValueSet::Values(vec![value]))
    }

    pub fn get(&self, column: &str) -> Option<&ValueSet> {
        self.sets.get(column)
    }

    /// The single value a column is pinned to, if any.
    fn exact(&self, column: &str) -> Option<&BucketValue> {
        match self.sets.get(column)? {
            ValueSet::Values(values) if values.len() == 1 => Some(&values[0]),
            _ => None,
        }
    }
}

/// A conservative candidate bucket set: either every bucket, or a finite
/// set guaranteed to contain the true bucket of any matching row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketFilter {
    Unrestricted,
    /// Sorted, deduplicated candidate bucket numbers.
    Buckets(Vec<u32>),
}

/// Derive the candidate bucket set for a predicate.
///
/// Only two shapes restrict the set: a complete exact binding of every
/// bucketed column (over the hashable allow-list), or an explicit finite
/// restriction of the [`BUCKET_ID_COLUMN`] pseudo-column. Partial bindings
/// of a subset of bucketed columns are deliberately not used — the result
/// must always be a superset of the true answer, never a subset.
pub fn plan_bucket_filter(
    property: Option<&BucketProperty>,
    bindings: &PredicateBindings,
) -> Result<BucketFilter> {
    let Some(property) = property else {
        return Ok(BucketFilter::Unrestricted);
    };
    if property.version != BucketingVersion::V1
        || property.bucket_count == 0
        || property.columns.is_empty()
    {
        return Ok(BucketFilter::Unrestricted);
    }

    if let Some(bucket) = exact_bucket(property, bindings)? {
        return Ok(BucketFilter::Buckets(vec![bucket]));
    }

    if let Some(ValueSet::Values(values)) = bindings.get(BUCKET_ID_COLUMN) {
        let mut ids: Vec<u32> = values
            .iter()
            .filter_map(|value| match value {
                BucketValue::Long(id) => u32::try_from(*id)
                    .ok()
                    .filter(|id| *id < property.bucket_count),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        return Ok(BucketFilter::Buckets(ids));
    }

    Ok(BucketFilter::Unrestricted)
}

/// The exact bucket, when every bucketed column is pinned to one value and
/// every bucketed column's type is hashable under the legacy scheme.
fn exact_bucket(
    property: &BucketProperty,
    bindings: &PredicateBindings,
) -> Result<Option<u32>> {
    let mut types = Vec::with_capacity(property.columns.len());
    let mut values = Vec::with_capacity(property.columns.len());
    for column in &property.columns {
        if !hashable_in_filter(&column.hive_type) {
            return Ok(None);
        }
        let Some(value) = bindings.exact(&column.name) else {
            return Ok(None);
        };
        types.push(column.hive_type.clone());
        values.push(value.clone());
    }
    let hash = bucket_hash(&types, &values)?;
    Ok(Some(bucket_number(hash, property.bucket_count)?))
}

/// Types the planner will hash: integral types, boolean, unbounded string.
fn hashable_in_filter(declared: &HiveType) -> bool {
    matches!(
        declared,
        HiveType::TinyInt
            | HiveType::SmallInt
            | HiveType::Int
            | HiveType::BigInt
            | HiveType::Boolean
            | HiveType::Varchar(None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_bucketed(count: u32) -> BucketProperty {
        BucketProperty {
            version: BucketingVersion::V1,
            bucket_count: count,
            columns: vec![BucketColumn::new("c", HiveType::Int)],
        }
    }

    #[test]
    fn no_property_means_unrestricted() {
        let bindings = PredicateBindings::new();
        assert_eq!(
            plan_bucket_filter(None, &bindings).unwrap(),
            BucketFilter::Unrestricted
        );
    }

    #[test]
    fn unsupported_version_is_never_hashed() {
        let property = BucketProperty {
            version: BucketingVersion::V2,
            ..int_bucketed(4)
        };
        let mut bindings = PredicateBindings::new();
        bindings.bind_exact("c", BucketValue::Long(10));
        assert_eq!(
            plan_bucket_filter(Some(&property), &bindings).unwrap(),
            BucketFilter::Unrestricted
        );
    }

    #[test]
    fn complete_exact_binding_yields_a_singleton() {
        let property = int_bucketed(4);
        let mut bindings = PredicateBindings::new();
        bindings.bind_exact("c", BucketValue::Long(10));

        // hash(int 10) = 10; 10 & 0x7fffffff mod 4 = 2.
        let expected_hash = bucket_hash(&[HiveType::Int], &[BucketValue::Long(10)]).unwrap();
        assert_eq!(expected_hash, 10);
        assert_eq!(
            plan_bucket_filter(Some(&property), &bindings).unwrap(),
            BucketFilter::Buckets(vec![2])
        );
    }

    #[test]
    fn partial_binding_does_not_restrict() {
        let property = BucketProperty {
            version: BucketingVersion::V1,
            bucket_count: 4,
            columns: vec![
                BucketColumn::new("c", HiveType::Int),
                BucketColumn::new("d", HiveType::Varchar(None)),
            ],
        };
        let mut bindings = PredicateBindings::new();
        bindings.bind_exact("c", BucketValue::Long(10));
        assert_eq!(
            plan_bucket_filter(Some(&property), &bindings).unwrap(),
            BucketFilter::Unrestricted
        );
    }

    #[test]
    fn multi_valued_binding_does_not_restrict() {
        let property = int_bucketed(4);
        let mut bindings = PredicateBindings::new();
        bindings.bind(
            "c",
            ValueSet::Values(vec![BucketValue::Long(1), BucketValue::Long(2)]),
        );
        assert_eq!(
            plan_bucket_filter(Some(&property), &bindings).unwrap(),
            BucketFilter::Unrestricted
        );
    }

    #[test]
    fn unhashable_bucket_column_type_does_not_restrict() {
        let property = BucketProperty {
            version: BucketingVersion::V1,
            bucket_count: 4,
            columns: vec![BucketColumn::new("c", HiveType::Timestamp)],
        };
        let mut bindings = PredicateBindings::new();
        bindings.bind_exact("c", BucketValue::Long(1_500));
        assert_eq!(
            plan_bucket_filter(Some(&property), &bindings).unwrap(),
            BucketFilter::Unrestricted
        );
    }

    #[test]
    fn bucket_id_restriction_intersects_with_the_valid_range() {
        let property = int_bucketed(4);
        let mut bindings = PredicateBindings::new();
        bindings.bind(
            BUCKET_ID_COLUMN,
            ValueSet::Values(vec![
                BucketValue::Long(2),
                BucketValue::Long(0),
                BucketValue::Long(9),
                BucketValue::Long(-1),
                BucketValue::Long(2),
            ]),
        );
        assert_eq!(
            plan_bucket_filter(Some(&property), &bindings).unwrap(),
            BucketFilter::Buckets(vec![0, 2])
        );
    }

    #[test]
    fn unusable_bindings_leave_the_filter_unrestricted() {
        let property = int_bucketed(4);
        let mut bindings = PredicateBindings::new();
        bindings.bind("unrelated", ValueSet::All);
        assert_eq!(
            plan_bucket_filter(Some(&property), &bindings).unwrap(),
            BucketFilter::Unrestricted
        );
    }
}
