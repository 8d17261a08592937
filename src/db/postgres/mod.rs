mod invitations;

pub use invitations::PostgresInvitationRepo;
