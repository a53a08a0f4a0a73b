//! Input records delivered to the router.

use crate::error::RecordError;

/// One unit of input.
///
/// A producer either hands over a payload or signals that it failed. The
/// router only ever sees payloads; what to do with a failed record is decided
/// by the ingestion loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Record<P> {
    /// A payload ready to be aggregated
    Data(P),
    /// The producer hit an error instead of producing a payload
    Failed(RecordError),
}

impl<P> Record<P> {
    pub fn failed(message: impl Into<String>) -> Self {
        Record::Failed(RecordError::new(message))
    }

    pub fn payload(&self) -> Option<&P> {
        match self {
            Record::Data(payload) => Some(payload),
            Record::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RecordError> {
        match self {
            Record::Data(_) => None,
            Record::Failed(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<P, RecordError> {
        match self {
            Record::Data(payload) => Ok(payload),
            Record::Failed(err) => Err(err),
        }
    }
}

impl<P> From<P> for Record<P> {
    fn from(payload: P) -> Self {
        Record::Data(payload)
    }
}
