//! Discord webhook notifications

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{json, Value};

use crate::error::MacroError;
use crate::utils::settings::Settings;

const USERNAME: &str = "haiku";

const COLOR_RECOVERY: u32 = 0xe67e22;
const COLOR_RECAST_FAILURE: u32 = 0xef4444;
const COLOR_PURCHASE: u32 = 0x3498db;
const COLOR_DEVIL_FRUIT: u32 = 0xffd700;

/// Side-channel notifications raised by the fishing loop and the watchdog.
///
/// Implementations must not block the caller for long and must never fail it.
pub trait Notifier: Send + Sync {
    fn notify_recovery(&self, recovery_count: u32, fish_count: u32);
    fn notify_recast_failure(&self, failures: u32, fish_count: u32);
    fn notify_purchase(&self, quantity: u32, fish_count: u32);
    fn notify_devil_fruit(&self, fish_count: u32);
}

/// Drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify_recovery(&self, _: u32, _: u32) {}
    fn notify_recast_failure(&self, _: u32, _: u32) {}
    fn notify_purchase(&self, _: u32, _: u32) {}
    fn notify_devil_fruit(&self, _: u32) {}
}

/// Check that `url` looks like a Discord webhook endpoint
pub fn validate_webhook_url(url: &str) -> Result<(), MacroError> {
    let url = url.trim();
    let known_host = url.contains("discord.com/api/webhooks/")
        || url.contains("discordapp.com/api/webhooks/");
    if url.starts_with("https://") && known_host {
        Ok(())
    } else {
        Err(MacroError::InvalidWebhookUrl(url.to_string()))
    }
}

fn field(name: &str, value: impl ToString) -> Value {
    json!({ "name": name, "value": value.to_string(), "inline": true })
}

fn relative_time(now: DateTime<Utc>) -> String {
    format!("<t:{}:R>", now.timestamp())
}

fn wrap(embed: Value, mention: Option<&str>) -> Value {
    let mut payload = json!({ "embeds": [embed], "username": USERNAME });
    if let Some(id) = mention.map(str::trim).filter(|id| !id.is_empty()) {
        payload["content"] = Value::String(format!("<@{}>", id));
    }
    payload
}

pub fn recovery_payload(
    recovery_count: u32,
    fish_count: u32,
    mention: Option<&str>,
    now: DateTime<Utc>,
) -> Value {
    let embed = json!({
        "title": "Watchdog Recovery",
        "description": "Fishing loop was stuck and has been restarted",
        "color": COLOR_RECOVERY,
        "fields": [
            field("Recovery #", recovery_count),
            field("Fish Count", fish_count),
            field("Time", relative_time(now)),
        ],
        "timestamp": now.to_rfc3339(),
    });
    wrap(embed, mention)
}

pub fn recast_failure_payload(
    failures: u32,
    fish_count: u32,
    mention: Option<&str>,
    now: DateTime<Utc>,
) -> Value {
    let embed = json!({
        "title": "Macro Stopped - No Minigame Detected",
        "description": format!(
            "Macro stopped after {} consecutive recasts without detecting a minigame. \
             You may not be near water or the game might have issues.",
            failures
        ),
        "color": COLOR_RECAST_FAILURE,
        "fields": [
            field("Failed Recasts", failures),
            field("Total Fish Caught", fish_count),
            field("Time", relative_time(now)),
        ],
        "timestamp": now.to_rfc3339(),
    });
    wrap(embed, mention)
}

pub fn purchase_payload(quantity: u32, fish_count: u32, now: DateTime<Utc>) -> Value {
    let embed = json!({
        "title": "Bait Purchased",
        "description": format!("Successfully bought **{}** common bait", quantity),
        "color": COLOR_PURCHASE,
        "fields": [
            field("Total Fish", fish_count),
            field("Time", relative_time(now)),
        ],
        "timestamp": now.to_rfc3339(),
    });
    wrap(embed, None)
}

pub fn devil_fruit_payload(fish_count: u32, mention: Option<&str>, now: DateTime<Utc>) -> Value {
    let embed = json!({
        "title": "Legendary+ Fruit Caught!",
        "description": "Pity counter was used! Legendary+ fruit detected and stored automatically!",
        "color": COLOR_DEVIL_FRUIT,
        "fields": [field("Total Fish Caught", fish_count)],
        "timestamp": now.to_rfc3339(),
    });
    wrap(embed, mention)
}

/// Which toggle gates a notification
#[derive(Debug, Clone, Copy)]
enum Topic {
    Recovery,
    Purchase,
    DevilFruit,
}

/// Posts notifications to the webhook configured in the live settings
pub struct DiscordWebhook {
    settings: Arc<RwLock<Settings>>,
}

impl DiscordWebhook {
    pub fn new(settings: Arc<RwLock<Settings>>) -> Self {
        Self { settings }
    }

    /// Webhook URL and mention target, if `topic` should be sent at all
    fn target(&self, topic: Topic) -> Option<(String, String)> {
        let s = self.settings.read();
        let wanted = match topic {
            Topic::Recovery => s.webhook_notify_recovery,
            Topic::Purchase => s.webhook_notify_purchase,
            Topic::DevilFruit => s.webhook_notify_devil_fruit,
        };
        if !s.webhook_enabled || !wanted || s.webhook_url.trim().is_empty() {
            return None;
        }
        Some((s.webhook_url.trim().to_string(), s.discord_user_id.clone()))
    }

    /// Post on a detached thread; failures are logged and otherwise ignored
    fn post(url: String, payload: Value, label: &'static str) {
        let spawned = thread::Builder::new()
            .name("webhook".into())
            .spawn(move || {
                let client = reqwest::blocking::Client::new();
                match client
                    .post(&url)
                    .json(&payload)
                    .timeout(Duration::from_secs(10))
                    .send()
                {
                    Ok(response) if response.status().is_success() => {
                        tracing::info!("[WEBHOOK] {} notification sent", label);
                    }
                    Ok(response) => {
                        tracing::warn!(
                            "[WEBHOOK] {} notification failed: HTTP {}",
                            label,
                            response.status()
                        );
                    }
                    Err(e) => tracing::warn!("[WEBHOOK] {} notification error: {}", label, e),
                }
            });
        if let Err(e) = spawned {
            tracing::warn!("[WEBHOOK] Failed to spawn sender thread: {}", e);
        }
    }
}

impl Notifier for DiscordWebhook {
    fn notify_recovery(&self, recovery_count: u32, fish_count: u32) {
        if let Some((url, mention)) = self.target(Topic::Recovery) {
            let payload = recovery_payload(recovery_count, fish_count, Some(&mention), Utc::now());
            Self::post(url, payload, "Recovery");
        }
    }

    fn notify_recast_failure(&self, failures: u32, fish_count: u32) {
        // Shares the recovery toggle
        if let Some((url, mention)) = self.target(Topic::Recovery) {
            let payload = recast_failure_payload(failures, fish_count, Some(&mention), Utc::now());
            Self::post(url, payload, "Recast failure");
        }
    }

    fn notify_purchase(&self, quantity: u32, fish_count: u32) {
        if let Some((url, _)) = self.target(Topic::Purchase) {
            Self::post(url, purchase_payload(quantity, fish_count, Utc::now()), "Purchase");
        }
    }

    fn notify_devil_fruit(&self, fish_count: u32) {
        if let Some((url, mention)) = self.target(Topic::DevilFruit) {
            let payload = devil_fruit_payload(fish_count, Some(&mention), Utc::now());
            Self::post(url, payload, "Devil fruit");
        }
    }
}
