// Recipient resolution

use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::automations::models::{ActionType, ContactChannel, ContextEntity, CustomerContact, Recipient};

/// Distinct customer ids referenced by the context, in first-occurrence order
pub fn distinct_customers(context: &[ContextEntity]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    context
        .iter()
        .map(ContextEntity::customer_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Pick a destination for one customer.
///
/// The action's preferred channel is tried first, then the other one.
fn contact_for(action: ActionType, contact: &CustomerContact) -> Option<(ContactChannel, String)> {
    let phone = non_empty(&contact.phone).map(|p| (ContactChannel::Phone, p.to_string()));
    let email = non_empty(&contact.email).map(|e| (ContactChannel::Email, e.to_string()));

    match action.preferred_contact() {
        ContactChannel::Phone => phone.or(email),
        ContactChannel::Email => email.or(phone),
    }
}

/// Join context customers against their contact details.
///
/// Customers with no usable phone or email, or missing from the directory,
/// are left out.
pub fn resolve_recipients(
    action: ActionType,
    context: &[ContextEntity],
    contacts: &[CustomerContact],
) -> Vec<Recipient> {
    let by_id: HashMap<Uuid, &CustomerContact> =
        contacts.iter().map(|c| (c.customer_id, c)).collect();

    distinct_customers(context)
        .into_iter()
        .filter_map(|customer_id| {
            let Some(contact) = by_id.get(&customer_id) else {
                debug!("Customer {} not found in directory; skipping", customer_id);
                return None;
            };

            match contact_for(action, contact) {
                Some((channel, destination)) => Some(Recipient {
                    customer_id,
                    destination,
                    channel,
                    name: non_empty(&contact.full_name).map(str::to_string),
                }),
                None => {
                    debug!("Customer {} has no phone or email; skipping", customer_id);
                    None
                }
            }
        })
        .collect()
}
