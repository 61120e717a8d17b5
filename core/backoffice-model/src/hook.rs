use crate::Entity;

/// Client-side behaviour attached to one entity type through the repository
/// factory.
///
/// Repositories work without hooks. Attach one when an entity type needs
/// checks the admin API would only report after a round trip, such as a
/// name that must not be blank, or display-only values derived after a
/// search.
pub trait EntityHook: Send + Sync {
    /// Runs before a save is sent. An `Err` aborts the save with its message
    /// and nothing is sent.
    fn validate(&self, entity: &Entity) -> Result<(), String> {
        let _ = entity;
        Ok(())
    }

    /// Runs on every entity a search returns, after hydration.
    fn on_after_load(&self, entity: &mut Entity) {
        let _ = entity;
    }
}
