use uuid::Uuid;

/// Entity categories that receive generated identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    EventSeries,
    Event,
    Circle,
    Artist,
    Release,
    Track,
    Credit,
    SongLink,
}

/// Pure generator of globally-unique opaque identifiers, one call per new
/// row. Nothing downstream assumes any structure in the produced string.
pub trait IdGenerator: Send + Sync {
    fn generate(&self, kind: EntityKind) -> String;
}

/// Default generator backed by random UUIDs.
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn generate(&self, _kind: EntityKind) -> String {
        Uuid::new_v4().to_string()
    }
}
