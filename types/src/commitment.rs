//! Identity commitments, the leaves of a group tree.

use crate::word::word_type;

word_type! {
    /// A member's identity commitment.
    ///
    /// Treated as an opaque 256-bit integer; the commitment scheme that
    /// produced it is outside this workspace.
    Commitment
}
