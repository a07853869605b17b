/// Lexical context of the byte under the cursor while rewriting markers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    /// SQL Server style `[identifier]`
    Bracketed,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}
