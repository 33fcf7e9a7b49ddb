//! Line-oriented admin commands for the console.
//!
//! ```text
//! route add <source> (to|->|<->) <destination> [modifier ...]
//! route list
//! route del <id>
//! color tag|text <hop> <#RRGGBB> [in <channel>]
//! color del <hop> [in <channel>]
//! format <hop> <format>
//! format hide|del <hop>
//! channels
//! stats
//! ```

use anyhow::{anyhow, bail, Context, Result};
use relay_routing::MessageHub;

/// Whether a console line is an admin command rather than chat
pub fn is_command(line: &str) -> bool {
    matches!(
        line.split_whitespace().next(),
        Some("route" | "color" | "format" | "channels" | "stats")
    )
}

/// Run one admin command, returning the text to show
pub async fn execute(hub: &MessageHub, line: &str) -> Result<String> {
    let line = line.trim();
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["route", "add", ..] => {
            let id = hub.add_route_dsl(line).await?;
            let route = hub
                .route(id)
                .await
                .ok_or_else(|| anyhow!("route {} vanished", id))?;
            Ok(format!("Route #{} added: {}", id, route.to_dsl()))
        }
        ["route", "list"] => {
            let routes = hub.routes().await;
            if routes.is_empty() {
                return Ok("No routes defined".to_string());
            }
            Ok(routes
                .iter()
                .map(|r| format!("#{} {}", r.id, r.to_dsl()))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        ["route", "del", id] => {
            let id: u64 = id.trim_start_matches('#').parse().context("route id must be a number")?;
            hub.delete_route(id).await?;
            Ok(format!("Route #{} deleted", id))
        }
        ["color", which @ ("tag" | "text"), hop, color, rest @ ..] => {
            let where_to = scope(rest)?;
            let (tag, text) = if *which == "tag" {
                (Some(*color), None)
            } else {
                (None, Some(*color))
            };
            hub.set_hop_color(hop, where_to, tag, text).await?;
            Ok(format!("{} color of {} set to {}", which, hop, color))
        }
        ["color", "del", hop, rest @ ..] => {
            let where_to = scope(rest)?;
            if hub.remove_hop_color(hop, where_to).await? {
                Ok(format!("Color of {} removed", hop))
            } else {
                Ok(format!("No color defined for {}", hop))
            }
        }
        ["format", "hide", hop] => {
            hub.set_hop_format(hop, false, "%s").await?;
            Ok(format!("{} is no longer rendered", hop))
        }
        ["format", "del", hop] => {
            if hub.remove_hop_format(hop).await? {
                Ok(format!("Format of {} removed", hop))
            } else {
                Ok(format!("No format defined for {}", hop))
            }
        }
        ["format", hop, _, ..] => {
            let format = line
                .splitn(3, char::is_whitespace)
                .nth(2)
                .map(str::trim)
                .unwrap_or_default();
            hub.set_hop_format(hop, true, format).await?;
            Ok(format!("{} is now rendered as {}", hop, format))
        }
        ["channels"] => {
            let mut lines = vec![format!("Receivers: {}", hub.receivers().join(", "))];
            for (name, description) in hub.emitters() {
                if description.is_empty() {
                    lines.push(format!("Emitter {}", name));
                } else {
                    lines.push(format!("Emitter {}: {}", name, description));
                }
            }
            Ok(lines.join("\n"))
        }
        ["stats"] => {
            let stats = hub.stats().await;
            Ok(format!(
                "routes={} receivers={} emitters={} delivered={} suppressed={} no_match={}",
                stats.routes,
                stats.receivers,
                stats.emitters,
                stats.delivered,
                stats.suppressed,
                stats.no_match
            ))
        }
        _ => bail!("unknown command: {}", line.trim()),
    }
}

/// Optional `in <channel>` suffix
fn scope<'a>(rest: &[&'a str]) -> Result<Option<&'a str>> {
    match rest {
        [] => Ok(None),
        ["in", channel] => Ok(Some(*channel)),
        _ => bail!("expected `in <channel>`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_routing::{MessageReceiver, RoutableEnvelope};
    use relay_storage::MemoryRouteStore;
    use std::sync::Arc;

    struct Sink;

    #[async_trait]
    impl MessageReceiver for Sink {
        async fn receive(&self, _envelope: RoutableEnvelope, _destination: &str) -> bool {
            true
        }
    }

    fn hub() -> MessageHub {
        let hub = MessageHub::new(Arc::new(MemoryRouteStore::new()));
        hub.register_receiver("org", Arc::new(Sink), false).unwrap();
        hub
    }

    #[test]
    fn test_is_command() {
        assert!(is_command("route list"));
        assert!(is_command("  stats"));
        assert!(!is_command("routes are fun"));
        assert!(!is_command(""));
    }

    #[tokio::test]
    async fn test_route_lifecycle() {
        let hub = hub();
        let added = execute(&hub, "route add priv -> org if-has-prefix(prefix=\"-\")")
            .await
            .unwrap();
        assert!(added.starts_with("Route #"));

        let listing = execute(&hub, "route list").await.unwrap();
        assert!(listing.contains("priv -> org"));
        let id = hub.routes().await[0].id;

        execute(&hub, &format!("route del #{}", id)).await.unwrap();
        assert_eq!(execute(&hub, "route list").await.unwrap(), "No routes defined");
        assert!(execute(&hub, "route del 999").await.is_err());
        assert!(execute(&hub, "route del abc").await.is_err());
    }

    #[tokio::test]
    async fn test_colors_and_formats() {
        let hub = hub();
        execute(&hub, "color tag relay(*) #ff0000 in org").await.unwrap();
        assert_eq!(hub.render_config().await.colors().len(), 1);
        assert!(execute(&hub, "color del relay(*) in org").await.unwrap().contains("removed"));
        assert!(execute(&hub, "color tag org red").await.is_err());

        execute(&hub, "format discord-priv <%s>").await.unwrap();
        assert_eq!(hub.render_config().await.formats()[0].format, "<%s>");
        execute(&hub, "format hide discord-priv").await.unwrap();
        assert!(!hub.render_config().await.formats()[0].render);
        assert!(execute(&hub, "format del discord-priv").await.unwrap().contains("removed"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        assert!(execute(&hub(), "route frobnicate").await.is_err());
        let channels = execute(&hub(), "channels").await.unwrap();
        assert!(channels.contains("org"));
    }
}
