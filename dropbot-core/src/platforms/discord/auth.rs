use twilight_http::Client as HttpClient;
use twilight_model::id::Id;
use twilight_model::id::marker::UserMarker;
use tracing::info;

use crate::Error;

/// Returns the bot's user id: the configured `CLIENT_ID` when present,
/// otherwise whatever `GET /users/@me` reports for this token.
pub async fn resolve_bot_user_id(
    http: &HttpClient,
    configured: Option<u64>,
) -> Result<Id<UserMarker>, Error> {
    if let Some(id) = configured.and_then(Id::new_checked) {
        return Ok(id);
    }

    let user = http
        .current_user()
        .await
        .map_err(|e| Error::Auth(format!("Discord: error calling /users/@me => {e}")))?
        .model()
        .await
        .map_err(|e| Error::Auth(format!("Discord: bad /users/@me body => {e}")))?;

    info!("Resolved bot user {} (ID={})", user.name, user.id);
    Ok(user.id)
}
