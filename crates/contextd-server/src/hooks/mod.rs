// src/hooks/mod.rs
// Hook manager: the policy constants session-lifecycle hooks are built around.
// Centralizing these means the orchestrator and the HTTP surface read from one place
// rather than hardcoding behavior twice.

/// Percentage of context usage at which a checkpoint-prompt hook should fire.
pub const CHECKPOINT_PROMPT_THRESHOLD: f32 = 70.0;

/// Percentage of context usage considered critical — callers should checkpoint immediately.
pub const CRITICAL_THRESHOLD: f32 = 90.0;

/// Whether `session_end` always attempts memory distillation, regardless of outcome.
pub const AUTO_DISTILL_ON_SESSION_END: bool = true;

/// Scrubbing is applied to every piece of user-controlled text before it is embedded,
/// stored, or logged — there is no configuration flag to disable it.
pub const SCRUBBING_ALWAYS_ON: bool = true;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_threshold_is_below_critical() {
        assert!(CHECKPOINT_PROMPT_THRESHOLD < CRITICAL_THRESHOLD);
    }
}
