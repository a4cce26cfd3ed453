//! # Fingerprint Differ
//!
//! Decides whether a freshly built document needs to be written at all.
//!
//! ## Canonical form
//!
//! Properties are rendered in lexicographic name order as
//! `{"name": [values],...}`, each value list serialized with `serde_json`,
//! and the result is hashed with SHA-256. Only properties take part; the
//! creation timestamp, score and any previous fingerprint never do, so the
//! same content always yields the same digest no matter how the document
//! was assembled.
//!
//! ## Decisions
//!
//! | Indexed copy | Fingerprints | Decision |
//! |--------------|--------------|----------|
//! | absent       | -            | `Insert` |
//! | present      | equal        | `Skip`   |
//! | present      | different    | `Update` |

use bridge_traits::{
    Document, Properties, PropertyValue, ADDITIONAL_NAMES_PROPERTY, CONTACT_POINTS_PROPERTY,
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("Property '{property}' holds a non-finite number")]
    NonFiniteValue { property: String },

    #[error("Canonical serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Fingerprint and creation time of the indexed copy of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFingerprint {
    pub fingerprint: Vec<u8>,
    pub creation_timestamp_ms: i64,
}

impl From<Document> for StoredFingerprint {
    fn from(document: Document) -> Self {
        Self {
            fingerprint: document.fingerprint,
            creation_timestamp_ms: document.creation_timestamp_ms,
        }
    }
}

/// What to do with a candidate document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffDecision {
    /// Content unchanged; do not write
    Skip,
    /// Content changed; write, keeping the stored creation time
    Update { creation_timestamp_ms: i64 },
    /// Not indexed yet; write as is
    Insert,
}

impl DiffDecision {
    pub fn needs_write(&self) -> bool {
        !matches!(self, DiffDecision::Skip)
    }
}

/// SHA-256 digest of the canonical property rendering.
pub fn fingerprint(document: &Document) -> Result<Vec<u8>, FingerprintError> {
    let canonical = canonical_properties(&document.properties)?;
    Ok(Sha256::digest(canonical.as_bytes()).to_vec())
}

fn canonical_properties(properties: &Properties) -> Result<String, FingerprintError> {
    let mut tokens = Vec::with_capacity(properties.len());

    for (name, values) in properties {
        ensure_finite(name, values)?;
        tokens.push(format!(
            "{}: {}",
            serde_json::to_string(name)?,
            serde_json::to_string(values)?
        ));
    }

    Ok(format!("{{{}}}", tokens.join(",")))
}

// serde_json renders NaN and infinities as `null`, which would collide.
fn ensure_finite(property: &str, values: &[PropertyValue]) -> Result<(), FingerprintError> {
    for value in values {
        match value {
            PropertyValue::Double(d) if !d.is_finite() => {
                return Err(FingerprintError::NonFiniteValue {
                    property: property.to_string(),
                })
            }
            PropertyValue::Nested(nested) => {
                for (name, values) in nested {
                    ensure_finite(&format!("{}.{}", property, name), values)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Compare a candidate fingerprint with the indexed copy.
pub fn diff(candidate: &[u8], previous: Option<&StoredFingerprint>) -> DiffDecision {
    match previous {
        None => DiffDecision::Insert,
        Some(stored) if stored.fingerprint == candidate => DiffDecision::Skip,
        Some(stored) => DiffDecision::Update {
            creation_timestamp_ms: stored.creation_timestamp_ms,
        },
    }
}

/// Stamp fingerprint and score onto `document` and decide whether to write it.
///
/// When an indexed copy exists its creation timestamp replaces the freshly
/// built one. A fingerprint failure is logged and the document is written
/// unconditionally.
pub fn prepare(document: &mut Document, previous: Option<StoredFingerprint>) -> DiffDecision {
    document.score = compute_score(&document.properties);

    let decision = match fingerprint(document) {
        Ok(digest) => {
            let decision = diff(&digest, previous.as_ref());
            document.fingerprint = digest;
            decision
        }
        Err(e) => {
            warn!(doc_id = %document.id, error = %e, "Fingerprint failed, indexing unconditionally");
            document.fingerprint.clear();
            match previous.as_ref() {
                Some(stored) => DiffDecision::Update {
                    creation_timestamp_ms: stored.creation_timestamp_ms,
                },
                None => DiffDecision::Insert,
            }
        }
    };

    if let Some(stored) = previous {
        document.creation_timestamp_ms = stored.creation_timestamp_ms;
    }

    decision
}

/// `1 + |contact points| + |additional names|`.
pub fn compute_score(properties: &Properties) -> i32 {
    let count = |name: &str| properties.get(name).map_or(0, Vec::len);
    let total = 1 + count(CONTACT_POINTS_PROPERTY) + count(ADDITIONAL_NAMES_PROPERTY);
    i32::try_from(total).unwrap_or(i32::MAX)
}
