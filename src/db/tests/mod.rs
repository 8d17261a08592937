//! Shared database repository test infrastructure
//!
//! The same test logic runs against every `InvitationRepo` implementation:
//!
//! - **In-memory and SQLite**: fast, run with every `cargo test`
//! - **PostgreSQL**: testcontainers-based, run with `cargo test -- --ignored`
//!
//! ```bash
//! cargo test                       # Run fast tests only
//! cargo test -- --ignored          # Run PostgreSQL integration tests (requires Docker)
//! cargo test -- --include-ignored  # Run all tests
//! ```

mod invitations;
