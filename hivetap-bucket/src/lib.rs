//! Bucket hashing and bucket-based partition pruning.
//!
//! Bucketed tables assign each row to one of `bucket_count` buckets by
//! hashing the declared bucket columns with a fixed legacy algorithm. The
//! hash here must match that external scheme bit for bit: a wrong bit
//! silently prunes buckets that still contain matching rows. [`hash`]
//! replicates the algorithm; [`filter`] derives a conservative candidate
//! bucket set from table metadata and a column predicate.

#![forbid(unsafe_code)]

pub mod filter;
pub mod hash;

pub use filter::{
    BUCKET_ID_COLUMN, BucketColumn, BucketFilter, BucketProperty, BucketingVersion,
    PredicateBindings, ValueSet, plan_bucket_filter,
};
pub use hash::{BucketValue, bucket_hash, bucket_hash_at, bucket_number};
