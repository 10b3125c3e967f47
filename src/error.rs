use std::fmt;

use thiserror::Error;

/// Which accessor tripped over an empty handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access
{
    /// `Shared::read` or `Shared::write`.
    Dereference,
    /// `Shared::as_ptr`.
    Member,
}

impl fmt::Display for Access
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Dereference => f.write_str("dereference operator"),
            Self::Member => f.write_str("arrow operator"),
        }
    }
}

/// What an allocation was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation
{
    Payload,
    Counter,
}

impl fmt::Display for Allocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Payload => f.write_str("payload"),
            Self::Counter => f.write_str("reference counter"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error
{
    /// The handle is empty. It stays empty; reassign it and try again.
    #[error("Illegal nullptr access with {0}.")]
    NullAccess(Access),

    /// The global allocator returned null. Nothing was leaked and no handle
    /// changed state.
    #[error("failed to allocate {size} bytes for the {what}")]
    AllocationFailed
    {
        what: Allocation,
        size: usize,
    },

    /// Some alias currently holds a conflicting borrow of the payload.
    #[error("payload is already borrowed through an alias")]
    Borrowed,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn null_access_messages()
    {
        assert_eq!(
            Error::NullAccess(Access::Dereference).to_string(),
            "Illegal nullptr access with dereference operator."
        );
        assert_eq!(
            Error::NullAccess(Access::Member).to_string(),
            "Illegal nullptr access with arrow operator."
        );
    }

    #[test]
    fn allocation_message_names_target()
    {
        let e = Error::AllocationFailed {
            what: Allocation::Counter,
            size: 16,
        };
        assert_eq!(e.to_string(), "failed to allocate 16 bytes for the reference counter");
    }
}
