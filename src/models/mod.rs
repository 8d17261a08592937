mod invitation;
mod invitation_token;

pub use invitation::*;
pub use invitation_token::*;
