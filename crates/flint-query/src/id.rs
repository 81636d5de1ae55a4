use bson::oid::ObjectId;

/// Field holding a document's identifier.
pub const ID_FIELD: &str = "_id";

/// Parse a 24-character hex string into an [`ObjectId`].
pub fn to_object_id(hex: &str) -> Option<ObjectId> {
    ObjectId::parse_str(hex).ok()
}

/// Parse every valid hex string, dropping the ones that are not ObjectIds.
pub fn to_object_ids<I, S>(hexes: I) -> Vec<ObjectId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    hexes
        .into_iter()
        .filter_map(|h| to_object_id(h.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_hex() {
        let id = ObjectId::new();
        assert_eq!(to_object_id(&id.to_hex()), Some(id));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(to_object_id("not-an-id"), None);
        assert_eq!(to_object_id(""), None);
    }

    #[test]
    fn batch_parse_drops_invalid_entries() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let ids = to_object_ids([a.to_hex(), "zzz".to_string(), b.to_hex()]);
        assert_eq!(ids, vec![a, b]);
    }
}
