//! Application-boundary access to the logged-in member.

use crate::member::Member;

/// Supplies the member acting in the current request, if any.
pub trait Session: Send + Sync {
    fn current_member(&self) -> Option<Member>;
}

/// A session with a fixed member, or nobody logged in.
#[derive(Debug, Clone, Default)]
pub struct FixedSession(pub Option<Member>);

impl FixedSession {
    #[must_use]
    pub fn logged_in(member: Member) -> Self {
        Self(Some(member))
    }

    #[must_use]
    pub const fn anonymous() -> Self {
        Self(None)
    }
}

impl Session for FixedSession {
    fn current_member(&self) -> Option<Member> {
        self.0.clone()
    }
}
