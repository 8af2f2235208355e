//! Decides whose events the agent may answer.
//!
//! Supervisors are recognized by the `-supervisor` identity suffix, or by an
//! authenticated supervisor role claim when the transport supplies one. The
//! suffix alone can be spoofed by anyone who picks their own identity, so
//! deployments that can mint role claims should.

use handoff_types::{has_supervisor_suffix, Participant, ParticipantKind, ParticipantRole};

/// Classifies participants relative to one agent identity.
#[derive(Debug, Clone)]
pub struct ParticipantFilter {
    agent_identity: String,
}

impl ParticipantFilter {
    pub fn new(agent_identity: impl Into<String>) -> Self {
        Self {
            agent_identity: agent_identity.into(),
        }
    }

    pub fn agent_identity(&self) -> &str {
        &self.agent_identity
    }

    pub fn classify(&self, participant: &Participant) -> ParticipantKind {
        if participant.is_agent || participant.identity == self.agent_identity {
            ParticipantKind::Agent
        } else if participant.role_claim == Some(ParticipantRole::Supervisor)
            || has_supervisor_suffix(&participant.identity)
        {
            ParticipantKind::Supervisor
        } else {
            ParticipantKind::User
        }
    }

    /// Only regular users may trigger an automated reply.
    pub fn may_trigger_reply(&self, participant: &Participant) -> bool {
        self.classify(participant) == ParticipantKind::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ParticipantFilter {
        ParticipantFilter::new("handoff-agent")
    }

    #[test]
    fn suffix_marks_supervisor() {
        let kind = filter().classify(&Participant::new("maria-supervisor"));
        assert_eq!(kind, ParticipantKind::Supervisor);
    }

    #[test]
    fn role_claim_marks_supervisor() {
        let participant = Participant::new("maria").with_role_claim(ParticipantRole::Supervisor);
        assert_eq!(filter().classify(&participant), ParticipantKind::Supervisor);
    }

    #[test]
    fn suffix_still_counts_with_user_claim() {
        let participant =
            Participant::new("maria-supervisor").with_role_claim(ParticipantRole::User);
        assert_eq!(filter().classify(&participant), ParticipantKind::Supervisor);
    }

    #[test]
    fn agent_and_self_are_agents() {
        assert_eq!(
            filter().classify(&Participant::new("handoff-agent")),
            ParticipantKind::Agent
        );
        assert_eq!(
            filter().classify(&Participant::agent("other-worker")),
            ParticipantKind::Agent
        );
    }

    #[test]
    fn only_users_trigger_replies() {
        let f = filter();
        assert!(f.may_trigger_reply(&Participant::new("caller-17")));
        assert!(!f.may_trigger_reply(&Participant::new("maria-supervisor")));
        assert!(!f.may_trigger_reply(&Participant::new("handoff-agent")));
    }
}
