//! QA routing policy.

/// Decides whether a cell is answered by the agent workflow or the
/// synchronous path. Kept as a single boolean policy so the rule can grow
/// (per-tenant rollout, question-type overrides) without touching callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct QaRouting;

impl QaRouting {
    pub fn new() -> Self {
        Self
    }

    /// Current rule: use the agent iff the question opted in.
    pub fn should_use_agent_qa(&self, question_use_agent_qa: bool) -> bool {
        question_use_agent_qa
    }
}
