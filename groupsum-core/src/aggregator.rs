//! Aggregator contract.
//!
//! Concrete accumulators implement [`Aggregator`], which is typed by the
//! payload they absorb and merges only with their own kind. The keyed store
//! holds them behind the object-safe [`DynAggregator`], blanket-implemented
//! for every aggregator, so one store can carry several kinds side by side
//! while each namespace still maps to a single statically known kind.

use std::any::{type_name, Any};

use crate::error::AggregateError;

/// Running accumulator for one aggregation bucket.
///
/// There is no removal or decrement; the model is append-only.
pub trait Aggregator<P>: Send + Sync + 'static {
    /// Absorbs one payload into the running state.
    fn add_record(&mut self, record: &P);

    /// Folds another partial aggregation of the same bucket into this one.
    ///
    /// Must be associative and commutative over the aggregator's own fields,
    /// so merge order never changes the result.
    fn merge_self(&mut self, other: &Self);
}

/// Type-erased view of an [`Aggregator`] as stored in a keyed store.
pub trait DynAggregator<P>: Send + Sync {
    fn absorb(&mut self, record: &P);

    /// Merges `other` into `self`, failing if the two are different kinds.
    fn merge_dyn(&mut self, other: &dyn DynAggregator<P>) -> Result<(), AggregateError>;

    fn as_any(&self) -> &dyn Any;

    /// Name of the concrete aggregator type, used in diagnostics.
    fn kind(&self) -> &'static str;
}

impl<P, A> DynAggregator<P> for A
where
    A: Aggregator<P>,
{
    fn absorb(&mut self, record: &P) {
        self.add_record(record);
    }

    fn merge_dyn(&mut self, other: &dyn DynAggregator<P>) -> Result<(), AggregateError> {
        let other = other
            .as_any()
            .downcast_ref::<A>()
            .ok_or_else(|| AggregateError::KindMismatch {
                expected: type_name::<A>(),
                found: other.kind(),
            })?;
        self.merge_self(other);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn kind(&self) -> &'static str {
        type_name::<A>()
    }
}

impl<'a, P> dyn DynAggregator<P> + 'a {
    /// Recovers the concrete aggregator, if it is of kind `A`.
    pub fn downcast_ref<A: Aggregator<P>>(&self) -> Option<&A> {
        self.as_any().downcast_ref::<A>()
    }
}

/// Boxes a fresh aggregator for storage.
pub fn boxed<P, A: Aggregator<P>>(aggregator: A) -> Box<dyn DynAggregator<P>> {
    Box::new(aggregator)
}
