// Helper for generating UUIDv7 (timestamp-sortable UUIDs).
//
// Todos and refresh-token rows are generated app-side so that listing by
// id follows creation order. Users keep PG's gen_random_uuid() (v4) when
// created through SQL.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
