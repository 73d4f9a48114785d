use shiftpack_core::{Error, MigrationIndex, MigrationIndexEntry, RawReleaseCatalog, Result};

/// Parses the registry payload: a JSON array of releases, oldest first.
pub fn parse_registry_payload(payload: &[u8]) -> Result<Vec<RawReleaseCatalog>> {
    serde_json::from_slice(payload).map_err(|err| Error::invalid_payload("registry", err))
}

/// Parses the migration index: a JSON array of `{from, to, routine}` entries.
pub fn parse_migration_index(payload: &[u8]) -> Result<MigrationIndex> {
    let entries: Vec<MigrationIndexEntry> = serde_json::from_slice(payload)
        .map_err(|err| Error::invalid_payload("migration index", err))?;
    for entry in &entries {
        if entry.from.trim().is_empty()
            || entry.to.trim().is_empty()
            || entry.routine.as_str().trim().is_empty()
        {
            return Err(Error::InvalidPayload {
                kind: "migration index",
                message: format!(
                    "entry '{}' -> '{}' must name both releases and a routine",
                    entry.from, entry.to
                ),
            });
        }
    }
    Ok(MigrationIndex::from_entries(entries))
}
