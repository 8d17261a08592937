mod invitations;

pub use invitations::{InvitationError, InvitationResult, InvitationService, InvitationStatus};
