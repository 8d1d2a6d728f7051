use serde_repr::{Deserialize_repr, Serialize_repr};

/// A kind of user of our application, having defined rights.
///
/// Users themselves live with the identity provider; we only see their
/// opaque ID inside an [`AuthToken`](super::AuthToken).
pub trait User {
    /// The rights of this user type.
    const RIGHTS: Rights;
}

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

/// Someone who casts votes.
#[derive(Debug, Copy, Clone)]
pub struct Voter;

impl User for Voter {
    const RIGHTS: Rights = Rights::Voter;
}

/// Someone who creates questions.
#[derive(Debug, Copy, Clone)]
pub struct Admin;

impl User for Admin {
    const RIGHTS: Rights = Rights::Admin;
}
