mod directory;
mod error;
mod principal;
mod resolver;

pub use directory::{DirectoryError, DirectoryRecord, LdapClient, StaticDirectory};
pub use error::{IdentityError, IdentityResult};
pub use principal::{AuthDomain, ParseAuthDomainError, Principal, Role};
pub use resolver::{IdentityResolver, MatchPolicy};
