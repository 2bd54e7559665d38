//! Memoized client→organization containment lookups.
//!
//! The RBAC evaluator takes containment as an injected predicate; this index
//! answers it from the repository and caches results for the process
//! lifetime (the owning organization of a client never changes).

use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::services::{Database, ServiceError};

pub struct ContainmentIndex {
    db: Database,
    cache: Mutex<HashMap<(Uuid, Uuid), bool>>,
}

impl ContainmentIndex {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Does the client belong to the organization?
    pub async fn belongs(
        &self,
        client_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, ServiceError> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(&belongs) = cache.get(&(client_id, organization_id)) {
                return Ok(belongs);
            }
        }

        let belongs = self.db.client_belongs_to(client_id, organization_id).await?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert((client_id, organization_id), belongs);
        }
        Ok(belongs)
    }
}
