use crate::models::Session;
use crate::{Header, ProviderOutcome};

/// Resolves the caller's session, ending the request when it is missing.
pub async fn provide(Header(authorization): Header<String>) -> ProviderOutcome<Session> {
    todo!()
}
