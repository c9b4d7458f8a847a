//! Client-side identity: the persisted session, privilege inference, profile
//! reconciliation and the credential flows (login, registration, password reset).
//! Keep the public surface thin and split implementation across sub-modules.

mod persistence;
mod session;
mod privilege;
mod profile;
mod auth;
mod controller;

pub use persistence::{FilePersistence, MemoryPersistence, PersistError, SessionPersistence};
pub use session::{ProfilePatch, Session, SessionStore};
pub use privilege::{PrivilegeProber, ProbeOutcome, PROBE_PATH};
pub use profile::{ProfileSynchronizer, ProfileUpdate, UserProfile};
pub use auth::{split_name, validate_email, validate_password, AuthClient, RegistrationForm};
pub use controller::SessionController;
