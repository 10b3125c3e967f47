/// Simple axiomatic model of the counting discipline.
///
/// Each lifecycle operation of `Shared` is viewed in terms of how it alters
/// three numbers tracked for a single count cell: the live handles holding
/// the cell, the value stored in the cell, and the live payloads behind it.
/// Every axiom checks its preconditions and the consistency of the result,
/// so a sequence of calls that runs to completion is a proof that the
/// sequence keeps the count equal to the number of handles.
#[allow(dead_code)]
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Axioms
{
    /// Live handles sharing the cell.
    pub handles: usize,

    /// Value stored in the count cell; zero once released.
    pub count: usize,

    /// Live payloads behind the cell: zero or one.
    pub payloads: usize,
}

#[allow(dead_code)]
impl Axioms
{
    /// Nothing allocated yet.
    ///
    /// ```
    /// sharedref::Axioms::unallocated().reclaimed()
    /// ```
    pub fn unallocated() -> Self
    {
        Self {
            handles: 0,
            count: 0,
            payloads: 0,
        }
    }

    /// The count equals the number of handles, and a payload exists exactly
    /// when the count is nonzero.
    pub fn consistent(self) -> Self
    {
        self.check();
        self
    }

    fn check(&self)
    {
        assert_eq!(self.handles, self.count, "count differs from live handles");
        assert_eq!(
            self.count == 0,
            self.payloads == 0,
            "payload and count cell out of step"
        );
        assert!(self.payloads <= 1, "payload owned twice");
    }

    /// Everything has been released exactly once.
    pub fn reclaimed(self)
    {
        assert_eq!(self.handles + self.count + self.payloads, 0);
    }

    /// Adopting a heap value creates the payload and a cell counting one.
    ///
    /// ```notest
    /// assert_eq!(self.handles + self.count + self.payloads, 0);
    /// self.handles = 1;
    /// self.count = 1;
    /// self.payloads = 1;
    /// ```
    ///
    /// Sequencing:
    /// ```
    /// sharedref::Axioms::unallocated().adopt().drop_handle().reclaimed();
    /// ```
    pub fn adopt(mut self) -> Self
    {
        assert_eq!(self.handles + self.count + self.payloads, 0);
        self.handles = 1;
        self.count = 1;
        self.payloads = 1;
        self.consistent()
    }

    /// Copying a handle adds one handle and one count, never a payload.
    ///
    /// ```
    /// sharedref::Axioms::unallocated()
    ///     .adopt()
    ///     .copy()
    ///     .copy()
    ///     .drop_handle()
    ///     .drop_handle()
    ///     .drop_handle()
    ///     .reclaimed();
    /// ```
    pub fn copy(mut self) -> Self
    {
        self.check();
        assert!(self.count > 0, "copy of an empty handle shares nothing");
        self.handles += 1;
        self.count += 1;
        self.consistent()
    }

    /// Moving a handle retires the source as it creates the target, so no
    /// number changes. The same holds for move-assignment into an empty
    /// target.
    pub fn take(self) -> Self { self.consistent() }

    /// Dropping a handle removes it; the last one frees payload and cell.
    pub fn drop_handle(mut self) -> Self
    {
        self.check();
        assert!(self.handles > 0, "no handle left to drop");
        self.handles -= 1;
        self.count -= 1;
        if self.count == 0 {
            self.payloads = 0;
        }
        self.consistent()
    }

    /// Detaching moves one handle over to a fresh cell and payload.
    ///
    /// Returns the remaining shared state and the detached one.
    ///
    /// ```
    /// let (rest, mine) = sharedref::Axioms::unallocated()
    ///     .adopt()
    ///     .copy()
    ///     .copy()
    ///     .detach();
    /// assert_eq!(rest.count, 2);
    /// assert_eq!(mine.count, 1);
    /// rest.drop_handle().drop_handle().reclaimed();
    /// mine.drop_handle().reclaimed();
    /// ```
    pub fn detach(mut self) -> (Self, Self)
    {
        self.check();
        assert!(self.count > 1, "detaching a sole owner copies nothing");
        self.handles -= 1;
        self.count -= 1;
        (self.consistent(), Self::unallocated().adopt())
    }

    /// The whole lifecycle of one value, from adoption to release.
    ///
    /// Proof: the following doctest passes
    ///
    /// ```
    /// sharedref::Axioms::lifecycle()
    /// ```
    pub fn lifecycle()
    {
        let (rest, mine) = Self::unallocated()
            .adopt()
            .copy()
            .take()
            .copy()
            .detach();
        rest.drop_handle().drop_handle().reclaimed();
        mine.drop_handle().reclaimed();
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    #[should_panic(expected = "detaching a sole owner copies nothing")]
    fn sole_owner_cannot_detach() { let _ = Axioms::unallocated().adopt().detach(); }

    #[test]
    #[should_panic(expected = "no handle left to drop")]
    fn double_release()
    {
        let _ = Axioms::unallocated().adopt().drop_handle().drop_handle();
    }
}
