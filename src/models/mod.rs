pub mod doctor;
pub mod emergency;
pub mod member;

pub use doctor::*;
pub use emergency::*;
pub use member::*;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error("Member id must not be empty")]
    EmptyMemberId,
}
