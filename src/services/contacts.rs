//! Contact reconciliation: find a contact by email, create it when absent

use std::collections::HashMap;

use tracing::debug;

use super::ghl::{CalendarApi, NewContact};

/// Per-run contact resolver
///
/// Remembers resolved ids by lowercased email, so a CSV with several
/// appointments for the same person searches and creates only once.
pub struct ContactReconciler<'a> {
    api: &'a dyn CalendarApi,
    access_token: &'a str,
    location_id: &'a str,
    cache: HashMap<String, String>,
}

impl<'a> ContactReconciler<'a> {
    pub fn new(api: &'a dyn CalendarApi, access_token: &'a str, location_id: &'a str) -> Self {
        Self {
            api,
            access_token,
            location_id,
            cache: HashMap::new(),
        }
    }

    /// Contact id for `email`, creating the contact if the search finds nothing.
    ///
    /// The error string is the row-level message shown to the operator.
    pub async fn resolve(&mut self, name: &str, email: &str, phone: &str) -> Result<String, String> {
        let key = email.trim().to_lowercase();
        if let Some(id) = self.cache.get(&key) {
            return Ok(id.clone());
        }

        let search_error = match self
            .api
            .search_contact_by_email(self.access_token, self.location_id, email)
            .await
        {
            Ok(Some(id)) => return Ok(self.remember(key, id, "found", email)),
            Ok(None) => None,
            // Fall through to create; the search error is the more useful detail
            Err(e) => Some(e),
        };

        let contact = NewContact {
            location_id: self.location_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
        };
        match self.api.create_contact(self.access_token, &contact).await {
            Ok(id) => Ok(self.remember(key, id, "created", email)),
            Err(e) => Err(format!(
                "Could not get or create contact for email='{}': {}",
                email,
                search_error.unwrap_or(e)
            )),
        }
    }

    fn remember(&mut self, key: String, id: String, source: &str, email: &str) -> String {
        debug!("Contact {} for {}: {}", source, email, id);
        self.cache.insert(key, id.clone());
        id
    }
}
