//! Error taxonomy for the cuckoo hash table.
//!
//! Every fallible operation on `Table` returns `Result<T, Error>`. The one failure mode the
//! original C library treats as fatal (the hash family producing colliding bucket indices beyond
//! its retry bound) has no variant here: it means the mixers are broken, not that the caller did
//! anything wrong, and it `panic!`s from the `hash` module instead of unwinding through a variant
//! nobody can meaningfully recover from.

quick_error! {
    /// Failure modes of the table's public operations.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub enum Error {
        /// An insert attempted to store the sentinel key as a user key.
        ///
        /// The table is left unchanged.
        InvalidKey {
            display("cannot insert the sentinel key as a user key")
            description("attempted to insert the sentinel key")
        }
        /// A lookup or delete found no entry for the given key.
        ///
        /// This is not a table-integrity error; the table is consistent.
        NotFound {
            display("key not found")
            description("no entry for the given key")
        }
        /// Insert exhausted cuckoo relocation without freeing a slot.
        ///
        /// The table is left unchanged. The caller's remedy is to create a larger table and
        /// migrate; this crate performs no automatic resize.
        NoSpace {
            display("no space left after cuckoo relocation")
            description("bucket pair and follow-depth relocation exhausted")
        }
        /// `Table::init` was given memory that is not cache-line aligned.
        InvalidAlignment {
            display("backing memory is not {}-byte aligned", crate::CACHE_LINE_SIZE)
            description("backing memory misaligned")
        }
        /// `Table::init` was given a memory region smaller than `Table::size_bytes` requires.
        TooSmall {
            display("backing memory smaller than the computed table size")
            description("backing memory too small")
        }
        /// `Table::verify` found an inconsistency.
        ///
        /// Test-only in intent: a well-formed writer never produces this.
        Corrupt {
            display("table failed consistency verification")
            description("table invariant violated")
        }
    }
}
