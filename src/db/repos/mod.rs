mod invitations;

pub use invitations::*;
