//! Enabling and disabling the per-streamer intents.

use tracing::{info, warn};

use super::metadata::Streamer;
use super::registry::StreamerRegistry;
use crate::error::{Error, Result};
use crate::platform::LiveClient;

/// One of the three independent things that can be enabled for a streamer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Intent {
    /// Live notifications.
    Notify,
    /// Automatic video recording.
    Record,
    /// Automatic danmu capture.
    Danmu,
}

impl Intent {
    pub fn is_set(self, streamer: &Streamer) -> bool {
        match self {
            Intent::Notify => streamer.notify.notify_on,
            Intent::Record => streamer.record,
            Intent::Danmu => streamer.danmu,
        }
    }

    fn set(self, streamer: &mut Streamer, on: bool) {
        match self {
            Intent::Notify => streamer.notify.notify_on = on,
            Intent::Record => streamer.record = on,
            Intent::Danmu => streamer.danmu = on,
        }
    }

    fn enable(self, streamer: &mut Streamer) -> IntentOutcome {
        if self.is_set(streamer) {
            IntentOutcome::AlreadyEnabled
        } else {
            self.set(streamer, true);
            IntentOutcome::Enabled
        }
    }

    fn disable(self, streamer: &mut Streamer) -> IntentOutcome {
        if self.is_set(streamer) {
            self.set(streamer, false);
            IntentOutcome::Disabled
        } else {
            IntentOutcome::NotSet
        }
    }
}

/// What an intent toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    Enabled,
    AlreadyEnabled,
    Disabled,
    NotSet,
}

/// Enable `intent` for `uid`, registering the streamer first when needed.
///
/// The name of an unregistered streamer is resolved through the platform
/// client; an unknown uid fails with [`Error::StreamerNotFound`] without
/// touching the registry. Concurrent calls for the same uid report
/// [`IntentOutcome::Enabled`] exactly once.
pub async fn add_intent(
    registry: &StreamerRegistry,
    client: &dyn LiveClient,
    uid: u64,
    intent: Intent,
) -> Result<IntentOutcome> {
    let outcome = match registry.modify(uid, false, |s| intent.enable(s))? {
        Some(outcome) => outcome,
        None => {
            let name = client
                .user_name(uid)
                .await?
                .filter(|name| !name.is_empty())
                .ok_or_else(|| Error::not_found(uid))?;
            registry.upsert_with(uid, || Streamer::new(uid, name), |s| intent.enable(s))?
        }
    };

    let name = registry.name(uid).unwrap_or_default();
    match outcome {
        IntentOutcome::Enabled => info!(uid, "Enabled {} for {}", intent, name),
        _ => warn!(uid, "{} is already enabled for {}", intent, name),
    }
    Ok(outcome)
}

/// Disable `intent` for `uid`. The streamer is removed from the registry
/// once no intent remains.
pub fn remove_intent(registry: &StreamerRegistry, uid: u64, intent: Intent) -> Result<IntentOutcome> {
    match registry.modify(uid, true, |s| intent.disable(s))? {
        Some(IntentOutcome::Disabled) => {
            info!(uid, "Disabled {}", intent);
            Ok(IntentOutcome::Disabled)
        }
        Some(outcome) => {
            warn!(uid, "{} was not enabled", intent);
            Ok(outcome)
        }
        None => {
            warn!(uid, "Streamer is not registered, nothing to disable");
            Ok(IntentOutcome::NotSet)
        }
    }
}

/// QQ recipient kind for live notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum QqTarget {
    User,
    Group,
}

impl QqTarget {
    fn slot(self, streamer: &mut Streamer) -> &mut u64 {
        match self {
            QqTarget::User => &mut streamer.send_qq,
            QqTarget::Group => &mut streamer.send_qq_group,
        }
    }
}

/// Send `uid`'s live notifications to the QQ user or group `id`.
///
/// QQ messages are only sent with live notifications, so this also enables
/// [`Intent::Notify`]. Unregistered streamers are registered first.
pub async fn set_qq_target(
    registry: &StreamerRegistry,
    client: &dyn LiveClient,
    uid: u64,
    target: QqTarget,
    id: u64,
) -> Result<()> {
    if id == 0 {
        return Err(Error::Other(format!("invalid QQ {target} number 0")));
    }
    let apply = |s: &mut Streamer| {
        *target.slot(s) = id;
        s.notify.notify_on = true;
    };

    if registry.modify(uid, false, apply)?.is_none() {
        let name = client
            .user_name(uid)
            .await?
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::not_found(uid))?;
        registry.upsert_with(uid, || Streamer::new(uid, name), apply)?;
    }
    info!(uid, qq = id, "Live notifications of {} go to QQ {}", uid, target);
    Ok(())
}

/// Stop sending `uid`'s live notifications to QQ. Returns `false` when the
/// streamer is not registered.
pub fn clear_qq_target(registry: &StreamerRegistry, uid: u64, target: QqTarget) -> Result<bool> {
    let cleared = registry
        .modify(uid, false, |s| *target.slot(s) = 0)?
        .is_some();
    if cleared {
        info!(uid, "Cleared QQ {} recipient", target);
    } else {
        warn!(uid, "Streamer is not registered, no QQ {} recipient to clear", target);
    }
    Ok(cleared)
}
