//! The activity catalog over an abstract store.

use std::sync::{Arc, Mutex};

use sanka_store::{Activity, SeatUpdate, Store, StoreError};
use sanka_types::{ActivityId, Clock};
use tracing::{debug, info};

use crate::{ActivitySpec, CatalogError};

pub struct ActivityCatalog {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    /// Makes the duplicate check and the insert in `create` one step.
    create: Mutex<()>,
}

impl ActivityCatalog {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            create: Mutex::new(()),
        }
    }

    /// All activities, oldest first.
    pub fn list(&self) -> Result<Vec<Activity>, CatalogError> {
        Ok(self.store.iter_activities()?)
    }

    pub fn get(&self, id: ActivityId) -> Result<Activity, CatalogError> {
        self.store.get_activity(id).map_err(|e| not_found(id, e))
    }

    /// Validate `spec` and store it as a new activity with no participants.
    ///
    /// A second activity with the same name on the same date is rejected.
    pub fn create(&self, spec: &ActivitySpec) -> Result<Activity, CatalogError> {
        let new = spec.validate()?;
        let _guard = self.create.lock().unwrap_or_else(|e| e.into_inner());
        let clash = self
            .store
            .iter_activities()?
            .into_iter()
            .any(|a| a.date == new.date && a.name.eq_ignore_ascii_case(&new.name));
        if clash {
            return Err(CatalogError::invalid(
                "name",
                format!("an activity named {:?} already exists on {}", new.name, new.date),
            ));
        }
        let activity = self.store.insert_activity(new, self.clock.now())?;
        info!(
            activity = %activity.id,
            name = %activity.name,
            cost = %activity.cost,
            capacity = activity.required_participants,
            "created activity"
        );
        Ok(activity)
    }

    /// Take one seat. Returns the new participant count.
    pub fn increment_participants(&self, id: ActivityId) -> Result<u32, CatalogError> {
        match self
            .store
            .increment_participants(id)
            .map_err(|e| not_found(id, e))?
        {
            SeatUpdate::Taken(count) => Ok(count),
            SeatUpdate::Full => {
                debug!(activity = %id, "no seat left");
                Err(CatalogError::ActivityFull(id))
            }
        }
    }

    /// Give back a seat taken by a join that is being compensated.
    pub fn release_participant(&self, id: ActivityId) -> Result<u32, CatalogError> {
        let count = self
            .store
            .release_participant(id)
            .map_err(|e| not_found(id, e))?;
        debug!(activity = %id, count, "released seat");
        Ok(count)
    }
}

fn not_found(id: ActivityId, e: StoreError) -> CatalogError {
    match e {
        StoreError::NotFound(_) => CatalogError::ActivityNotFound(id),
        other => other.into(),
    }
}
