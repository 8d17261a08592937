mod invitations;

pub use invitations::SqliteInvitationRepo;
