//! Route catalog
//!
//! Template constants for the REST operations used by the client. Major
//! parameters follow the platform's bucketing rules: channel- and
//! guild-scoped routes bucket on their top-level resource id.

use super::{Method, Route};

pub const GATEWAY_GET: Route = Route::new(Method::Get, "/gateway", None);

pub const CURRENT_USER_GET: Route = Route::new(Method::Get, "/users/@me", None);

pub const CHANNEL_GET: Route = Route::new(Method::Get, "/channels/{channel.id}", Some("channel.id"));

pub const CHANNEL_MODIFY: Route =
    Route::new(Method::Patch, "/channels/{channel.id}", Some("channel.id"));

pub const CHANNEL_DELETE: Route =
    Route::new(Method::Delete, "/channels/{channel.id}", Some("channel.id"));

pub const MESSAGES_LIST: Route = Route::new(
    Method::Get,
    "/channels/{channel.id}/messages",
    Some("channel.id"),
);

pub const MESSAGE_CREATE: Route = Route::new(
    Method::Post,
    "/channels/{channel.id}/messages",
    Some("channel.id"),
);

pub const MESSAGE_GET: Route = Route::new(
    Method::Get,
    "/channels/{channel.id}/messages/{message.id}",
    Some("channel.id"),
);

pub const MESSAGE_EDIT: Route = Route::new(
    Method::Patch,
    "/channels/{channel.id}/messages/{message.id}",
    Some("channel.id"),
);

/// The service assigns message deletion a dedicated bucket per method; see
/// [`crate::bucket::BucketKey::compute`].
pub const MESSAGE_DELETE: Route = Route::new(
    Method::Delete,
    "/channels/{channel.id}/messages/{message.id}",
    Some("channel.id"),
);

/// Self-limited client side; the service does not send rate-limit headers
/// for reactions.
pub const REACTION_CREATE: Route = Route::new(
    Method::Put,
    "/channels/{channel.id}/messages/{message.id}/reactions/{emoji}/@me",
    Some("channel.id"),
);

pub const REACTION_DELETE_OWN: Route = Route::new(
    Method::Delete,
    "/channels/{channel.id}/messages/{message.id}/reactions/{emoji}/@me",
    Some("channel.id"),
);

pub const GUILD_GET: Route = Route::new(Method::Get, "/guilds/{guild.id}", Some("guild.id"));

pub const GUILD_CHANNELS_LIST: Route = Route::new(
    Method::Get,
    "/guilds/{guild.id}/channels",
    Some("guild.id"),
);

pub const GUILD_MEMBER_GET: Route = Route::new(
    Method::Get,
    "/guilds/{guild.id}/members/{user.id}",
    Some("guild.id"),
);
