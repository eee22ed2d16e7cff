//! Maps raw booking API errors to short operator-facing messages

const MAX_PASSTHROUGH_CHARS: usize = 120;

pub const SLOT_NO_LONGER_AVAILABLE: &str =
    "This time slot is no longer available. Pick another time or enable override availability.";
pub const SLOT_CONFLICT: &str =
    "This time slot is already taken. Pick another time or enable override availability.";
pub const SLOT_UNAVAILABLE: &str =
    "The selected time is not available for this service or staff member.";

/// Keyword table, checked top to bottom against the lowercased message
const RULES: &[(&[&str], &str)] = &[
    (&["no longer available"], SLOT_NO_LONGER_AVAILABLE),
    (
        &["already booked", "already taken", "slot is taken", "conflict", "overlap"],
        SLOT_CONFLICT,
    ),
    (&["not available", "unavailable"], SLOT_UNAVAILABLE),
];

/// Classify a raw error message.
///
/// Unknown errors pass through as their first sentence, capped at
/// 120 characters.
pub fn classify(raw: &str) -> String {
    let lowered = raw.to_lowercase();

    for (keywords, message) in RULES {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return (*message).to_string();
        }
    }

    passthrough(raw)
}

fn passthrough(raw: &str) -> String {
    let trimmed = raw.trim();
    let sentence = match trimmed.find(". ") {
        Some(idx) => &trimmed[..=idx],
        None => trimmed,
    };
    sentence.chars().take(MAX_PASSTHROUGH_CHARS).collect()
}
