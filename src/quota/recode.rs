// src/quota/recode.rs

use tracing::warn;

use crate::config::BucketMerge;
use crate::quota::aggregate::{round2, Proportions};

/// Fold `merge.fold` into `merge.keep`: keep becomes the rounded sum, fold becomes null.
/// Input must be the output of `aggregate`.
pub fn merge_buckets(props: &Proportions, merge: &BucketMerge) -> Proportions {
    let keep = props.get(&merge.keep).flatten();
    let fold = props.get(&merge.fold).flatten();
    if keep.is_none() && fold.is_none() {
        warn!(keep = %merge.keep, fold = %merge.fold, "neither bucket aggregated, merging zeros");
    }

    let mut out = props.clone();
    out.set(&merge.keep, Some(round2(keep.unwrap_or(0.0) + fold.unwrap_or(0.0))));
    out.set(&merge.fold, None);
    out
}
