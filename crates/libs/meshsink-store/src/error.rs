/// Errors surfaced by the store and its read interface.
///
/// `BadNodeId` is a client-input rejection, distinct from a successful
/// empty result: a well-formed identity that matches nothing yields
/// `Ok(None)`, never this error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed node id: {0:?} (expected decimal or !hex)")]
    BadNodeId(String),
}
