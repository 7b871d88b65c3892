// crates/ava-core/src/variant.rs
// ============================================================================
// Module: Variant Assigner
// Description: Deterministic, hash-bucketed A/B enrollment and variant
//              selection.
// ============================================================================

//! Enrollment and variant selection are both derived from a single SHA-256
//! digest of `experimentId + ":" + sessionId`, so assignment is idempotent
//! across repeated calls and across processes without any shared state.

use sha2::Digest;
use sha2::Sha256;

use crate::identifiers::ExperimentId;
use crate::identifiers::SessionId;
use crate::identifiers::VariantId;
use crate::model::experiment::Variant;

/// The outcome of [`assign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Whether the session was enrolled in the experiment's traffic slice.
    pub enrolled: bool,
    /// The variant the session was bucketed into, present iff `enrolled`.
    pub variant_id: Option<VariantId>,
}

const BUCKET_SPACE: u32 = 10_000;

fn digest(experiment_id: &ExperimentId, session_id: &SessionId) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(experiment_id.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(session_id.as_str().as_bytes());
    hasher.finalize().into()
}

fn bucket_from(bytes: &[u8]) -> u32 {
    let array: [u8; 4] = bytes.try_into().unwrap_or([0; 4]);
    u32::from_be_bytes(array) % BUCKET_SPACE
}

/// Deterministically assigns `session_id` to enrollment and (if enrolled) a
/// variant of `experiment_id`, given `variants` and `traffic_percent`.
///
/// Enrollment bucket: `uint32(sha256(experimentId:sessionId)[0..4]) % 10000
/// < trafficPercent * 100`. Variant bucket: `uint32(...[4..8]) % 10000`,
/// walked against cumulative variant weights scaled by 10000.
///
/// # Panics
/// Never panics; an empty `variants` slice yields an unenrolled assignment
/// even if the enrollment bucket would otherwise qualify.
#[must_use]
pub fn assign(
    session_id: &SessionId,
    experiment_id: &ExperimentId,
    variants: &[Variant],
    traffic_percent: u8,
) -> Assignment {
    let bytes = digest(experiment_id, session_id);
    let enrollment_bucket = bucket_from(&bytes[0..4]);
    let enrolled = enrollment_bucket < u32::from(traffic_percent) * 100;

    if !enrolled || variants.is_empty() {
        return Assignment {
            enrolled: enrolled && !variants.is_empty(),
            variant_id: None,
        };
    }

    let variant_bucket = bucket_from(&bytes[4..8]);
    let variant_id = pick_variant(variant_bucket, variants);

    Assignment {
        enrolled: true,
        variant_id,
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "cumulative weight scaled by BUCKET_SPACE stays within u32 range for weights in [0,1]"
)]
fn pick_variant(variant_bucket: u32, variants: &[Variant]) -> Option<VariantId> {
    let mut cumulative: f64 = 0.0;
    for variant in variants {
        cumulative += variant.weight;
        let cumulative_bucket = (cumulative * f64::from(BUCKET_SPACE)).round() as u32;
        if variant_bucket < cumulative_bucket {
            return Some(variant.id.clone());
        }
    }
    variants.last().map(|variant| variant.id.clone())
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::assign;
    use crate::identifiers::ExperimentId;
    use crate::identifiers::SessionId;
    use crate::model::experiment::Variant;

    fn two_arm_variants() -> Vec<Variant> {
        vec![
            Variant {
                id: "control".into(),
                name: "control".to_owned(),
                weight: 0.5,
                scoring_config_id: None,
                eval_engine: None,
            },
            Variant {
                id: "treatment".into(),
                name: "treatment".to_owned(),
                weight: 0.5,
                scoring_config_id: None,
                eval_engine: None,
            },
        ]
    }

    #[test]
    fn assignment_is_deterministic_across_calls() {
        let experiment_id = ExperimentId::from("exp-1");
        let session_id = SessionId::from("s-0042");
        let variants = two_arm_variants();
        let first = assign(&session_id, &experiment_id, &variants, 50);
        let second = assign(&session_id, &experiment_id, &variants, 50);
        assert_eq!(first, second);
    }

    #[test]
    fn enrollment_and_variant_shares_converge_to_weights() {
        let experiment_id = ExperimentId::from("exp-1");
        let variants = two_arm_variants();
        let mut enrolled_count = 0u32;
        let mut control_count = 0u32;
        let total = 10_000u32;
        for i in 0..total {
            let session_id = SessionId::from(format!("s-{i:04}"));
            let assignment = assign(&session_id, &experiment_id, &variants, 50);
            if assignment.enrolled {
                enrolled_count += 1;
                if assignment.variant_id.as_ref().map(crate::identifiers::VariantId::as_str) == Some("control") {
                    control_count += 1;
                }
            }
        }
        let enrolled_fraction = f64::from(enrolled_count) / f64::from(total);
        assert!(
            (enrolled_fraction - 0.50).abs() < 0.03,
            "enrolled_fraction={enrolled_fraction}"
        );
        let control_fraction = f64::from(control_count) / f64::from(enrolled_count);
        assert!(
            (control_fraction - 0.50).abs() < 0.03,
            "control_fraction={control_fraction}"
        );
    }
}
