//! The message hub: registries, rule table and dispatch

use crate::envelope::{Hop, RoutableEnvelope};
use crate::error::ConfigError;
use crate::modifier::{EventModifier, ModifierRegistry};
use crate::pattern::ChannelPattern;
use crate::render::{HopColor, HopFormat, RenderConfig};
use crate::route::Route;
use async_trait::async_trait;
use dashmap::DashMap;
use relay_storage::{HopColorRecord, HopFormatRecord, RouteStore};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Endpoint that accepts routed envelopes
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    /// Deliver an envelope whose last hop is `destination`.
    ///
    /// Returns whether the receiver consumed it.
    async fn receive(&self, envelope: RoutableEnvelope, destination: &str) -> bool;
}

/// Endpoint that produces envelopes
pub trait MessageEmitter: Send + Sync {
    /// Human readable description for listings
    fn description(&self) -> String {
        String::new()
    }
}

/// Outcome of dispatching one envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Delivered to this many receivers
    Delivered(usize),
    /// No route matched, or destinations resolved to no receivers
    NoMatch,
    /// Routes matched but modifiers dropped it, the cycle guard skipped it
    /// or the receivers refused it
    Suppressed,
}

/// Hub counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Envelopes delivered at least once
    pub delivered: u64,
    /// Envelopes nothing matched
    pub no_match: u64,
    /// Envelopes matched but not delivered
    pub suppressed: u64,
    /// Routes in the rule table
    pub routes: usize,
    /// Registered receivers
    pub receivers: usize,
    /// Registered emitters
    pub emitters: usize,
}

/// A route with parsed patterns and built modifiers
struct CompiledRoute {
    route: Route,
    source: ChannelPattern,
    destination: ChannelPattern,
    modifiers: Vec<Box<dyn EventModifier>>,
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("id", &self.route.id)
            .field("source", &self.source.as_str())
            .field("destination", &self.destination.as_str())
            .field("modifiers", &self.modifiers.len())
            .finish()
    }
}

impl CompiledRoute {
    fn compile(route: Route, registry: &ModifierRegistry) -> Result<Self, ConfigError> {
        let source = ChannelPattern::parse(&route.source)?;
        let destination = ChannelPattern::parse(&route.destination)?;
        let modifiers = route
            .modifiers
            .iter()
            .map(|m| registry.build(m))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            route,
            source,
            destination,
            modifiers,
        })
    }

    /// `(source, destination)` pairs, the mirror included for two-way routes
    fn directions(&self) -> impl Iterator<Item = (&ChannelPattern, &ChannelPattern)> {
        let mirror = self
            .route
            .two_way
            .then_some((&self.destination, &self.source));
        std::iter::once((&self.source, &self.destination)).chain(mirror)
    }

    fn apply(&self, envelope: RoutableEnvelope) -> Option<RoutableEnvelope> {
        self.modifiers
            .iter()
            .try_fold(envelope, |env, modifier| {
                let out = modifier.modify(env);
                if out.is_none() {
                    debug!("Route {}: dropped by {}", self.route.id, modifier.name());
                }
                out
            })
    }
}

type RouteSnapshot = Arc<Vec<Arc<CompiledRoute>>>;

#[derive(Clone)]
struct ReceiverEntry {
    hop: Hop,
    handler: Arc<dyn MessageReceiver>,
}

#[derive(Clone)]
struct EmitterEntry {
    hop: Hop,
    handler: Arc<dyn MessageEmitter>,
}

/// Routes envelopes from emitters to receivers.
///
/// Registries are concurrent maps; the rule table and rendering config are
/// immutable snapshots swapped on mutation, so dispatch never waits on a
/// configuration change for longer than a pointer swap.
pub struct MessageHub {
    receivers: DashMap<String, ReceiverEntry>,
    emitters: DashMap<String, EmitterEntry>,
    routes: RwLock<RouteSnapshot>,
    render: RwLock<Arc<RenderConfig>>,
    /// Serializes store writes with snapshot swaps
    mutation: Mutex<()>,
    registry: ModifierRegistry,
    store: Arc<dyn RouteStore>,
    delivered_counter: AtomicU64,
    no_match_counter: AtomicU64,
    suppressed_counter: AtomicU64,
}

fn channel_key(hop: &Hop) -> String {
    hop.channel().to_lowercase()
}

impl MessageHub {
    /// Create a new hub with the standard modifiers
    pub fn new(store: Arc<dyn RouteStore>) -> Self {
        Self::with_registry(store, ModifierRegistry::with_defaults())
    }

    /// Create a new hub with a custom modifier registry
    pub fn with_registry(store: Arc<dyn RouteStore>, registry: ModifierRegistry) -> Self {
        Self {
            receivers: DashMap::new(),
            emitters: DashMap::new(),
            routes: RwLock::new(Arc::new(Vec::new())),
            render: RwLock::new(Arc::new(RenderConfig::default())),
            mutation: Mutex::new(()),
            registry,
            store,
            delivered_counter: AtomicU64::new(0),
            no_match_counter: AtomicU64::new(0),
            suppressed_counter: AtomicU64::new(0),
        }
    }

    /// Replace the default tag and text colors, keeping overrides
    pub async fn set_default_colors(&self, tag: &str, text: &str) -> Result<(), ConfigError> {
        let mut next = RenderConfig::new(tag, text)?;
        let mut guard = self.render.write().await;
        for color in guard.colors() {
            next.upsert_color(color.clone());
        }
        for format in guard.formats() {
            next.upsert_format(format.clone());
        }
        *guard = Arc::new(next);
        Ok(())
    }

    /// The modifier registry
    pub fn registry(&self) -> &ModifierRegistry {
        &self.registry
    }

    /// Register a receiver under a concrete channel name like `relay(alliance)`
    pub fn register_receiver(
        &self,
        name: &str,
        handler: Arc<dyn MessageReceiver>,
        overwrite: bool,
    ) -> Result<(), ConfigError> {
        let hop = Hop::parse(name)?;
        let key = channel_key(&hop);
        if !overwrite && self.receivers.contains_key(&key) {
            return Err(ConfigError::DuplicateReceiver(hop.channel()));
        }
        debug!("Registered receiver {}", hop);
        self.receivers.insert(key, ReceiverEntry { hop, handler });
        Ok(())
    }

    /// Remove a receiver, returning whether it was registered
    pub fn unregister_receiver(&self, name: &str) -> bool {
        let removed = Hop::parse(name)
            .map(|hop| self.receivers.remove(&channel_key(&hop)).is_some())
            .unwrap_or(false);
        if removed {
            debug!("Unregistered receiver {}", name);
        }
        removed
    }

    /// Register an emitter under a concrete channel name
    pub fn register_emitter(
        &self,
        name: &str,
        handler: Arc<dyn MessageEmitter>,
        overwrite: bool,
    ) -> Result<(), ConfigError> {
        let hop = Hop::parse(name)?;
        let key = channel_key(&hop);
        if !overwrite && self.emitters.contains_key(&key) {
            return Err(ConfigError::DuplicateEmitter(hop.channel()));
        }
        debug!("Registered emitter {}", hop);
        self.emitters.insert(key, EmitterEntry { hop, handler });
        Ok(())
    }

    /// Remove an emitter, returning whether it was registered
    pub fn unregister_emitter(&self, name: &str) -> bool {
        Hop::parse(name)
            .map(|hop| self.emitters.remove(&channel_key(&hop)).is_some())
            .unwrap_or(false)
    }

    /// Registered receiver channels, sorted
    pub fn receivers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.receivers.iter().map(|e| e.hop.channel()).collect();
        names.sort();
        names
    }

    /// Registered emitter channels with descriptions, sorted
    pub fn emitters(&self) -> Vec<(String, String)> {
        let mut names: Vec<(String, String)> = self
            .emitters
            .iter()
            .map(|e| (e.hop.channel(), e.handler.description()))
            .collect();
        names.sort();
        names
    }

    fn has_receiver_for(&self, pattern: &ChannelPattern) -> bool {
        self.receivers.iter().any(|e| pattern.matches(&e.hop))
    }

    /// Concrete receivers for a destination, cloned out of the registry
    fn resolve(&self, destination: &ChannelPattern) -> Vec<ReceiverEntry> {
        let mut targets: Vec<ReceiverEntry> = self
            .receivers
            .iter()
            .filter(|e| destination.matches(&e.hop))
            .map(|e| e.value().clone())
            .collect();
        targets.sort_by_key(|e| channel_key(&e.hop));
        targets
    }

    /// Add a route, returning its id
    pub async fn add_route(&self, route: Route) -> Result<u64, ConfigError> {
        let compiled = CompiledRoute::compile(route, &self.registry)?;
        if !compiled.destination.is_wildcard() && !self.has_receiver_for(&compiled.destination) {
            return Err(ConfigError::UnreachableDestination(
                compiled.destination.to_string(),
            ));
        }
        if !compiled.source.is_wildcard()
            && !self.emitters.iter().any(|e| compiled.source.matches(&e.hop))
        {
            warn!("Route source {} has no registered emitter", compiled.source);
        }

        let _lock = self.mutation.lock().await;
        let id = self.store.insert_route(compiled.route.to_record()).await?;
        let mut compiled = compiled;
        compiled.route.id = id;
        info!("Added route {}: {}", id, compiled.route.to_dsl());

        let mut guard = self.routes.write().await;
        let mut next = guard.as_ref().clone();
        next.push(Arc::new(compiled));
        *guard = Arc::new(next);
        Ok(id)
    }

    /// Parse and add a route definition
    pub async fn add_route_dsl(&self, definition: &str) -> Result<u64, ConfigError> {
        let route = Route::parse(definition)?;
        self.add_route(route).await
    }

    /// Delete a route by id
    pub async fn delete_route(&self, id: u64) -> Result<(), ConfigError> {
        let _lock = self.mutation.lock().await;
        let stored = self.store.delete_route(id).await?;

        let mut guard = self.routes.write().await;
        let before = guard.len();
        let next: Vec<_> = guard.iter().filter(|r| r.route.id != id).cloned().collect();
        let in_table = next.len() != before;
        *guard = Arc::new(next);

        if !stored && !in_table {
            return Err(ConfigError::RouteNotFound(id));
        }
        info!("Deleted route {}", id);
        Ok(())
    }

    /// All routes, ordered by id
    pub async fn routes(&self) -> Vec<Route> {
        let snapshot = self.routes.read().await.clone();
        let mut routes: Vec<Route> = snapshot.iter().map(|r| r.route.clone()).collect();
        routes.sort_by_key(|r| r.id);
        routes
    }

    /// One route by id
    pub async fn route(&self, id: u64) -> Option<Route> {
        let snapshot = self.routes.read().await.clone();
        snapshot
            .iter()
            .find(|r| r.route.id == id)
            .map(|r| r.route.clone())
    }

    /// Dispatch an envelope to every receiver the rule table selects
    pub async fn handle(&self, envelope: RoutableEnvelope) -> DeliveryResult {
        let result = self.dispatch(envelope).await;
        let counter = match result {
            DeliveryResult::Delivered(_) => &self.delivered_counter,
            DeliveryResult::NoMatch => &self.no_match_counter,
            DeliveryResult::Suppressed => &self.suppressed_counter,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    async fn dispatch(&self, envelope: RoutableEnvelope) -> DeliveryResult {
        let Some(origin) = envelope.origin().cloned() else {
            warn!("Refusing envelope with an empty path");
            return DeliveryResult::NoMatch;
        };
        let routes = self.routes.read().await.clone();

        let mut delivered = 0usize;
        let mut suppressed = false;
        let mut matched = false;

        for route in routes.iter() {
            // Both directions of a two-way route may resolve to the same receiver
            let mut targeted = HashSet::new();
            for (source, destination) in route.directions() {
                if !source.matches(&origin) {
                    continue;
                }
                matched = true;

                let Some(modified) = route.apply(envelope.clone()) else {
                    suppressed = true;
                    continue;
                };

                for target in self.resolve(destination) {
                    if !targeted.insert(channel_key(&target.hop)) {
                        continue;
                    }
                    if modified.has_visited(&target.hop) {
                        debug!(
                            "Route {}: {} already in path, not delivering",
                            route.route.id, target.hop
                        );
                        suppressed = true;
                        continue;
                    }
                    let mut out = modified.clone();
                    out.push_hop(target.hop.clone());
                    let channel = target.hop.channel();
                    if target.handler.receive(out, &channel).await {
                        delivered += 1;
                    } else {
                        debug!("Receiver {} refused envelope", channel);
                        suppressed = true;
                    }
                }
            }
        }

        if delivered > 0 {
            DeliveryResult::Delivered(delivered)
        } else if suppressed {
            DeliveryResult::Suppressed
        } else {
            if matched {
                debug!("Envelope from {} matched routes without receivers", origin);
            } else {
                debug!("No route for envelope from {}", origin);
            }
            DeliveryResult::NoMatch
        }
    }

    /// Current rendering configuration
    pub async fn render_config(&self) -> Arc<RenderConfig> {
        self.render.read().await.clone()
    }

    /// Breadcrumb of the envelope's path as seen from `for_channel`
    pub async fn render_path(&self, envelope: &RoutableEnvelope, for_channel: &Hop) -> String {
        self.render_config().await.render_path(envelope, for_channel)
    }

    /// Text color for the envelope rendered into `for_channel`
    pub async fn text_color(&self, envelope: &RoutableEnvelope, for_channel: &Hop) -> String {
        self.render_config()
            .await
            .text_color(envelope, for_channel)
            .to_string()
    }

    /// Breadcrumb plus colored text
    pub async fn render_message(
        &self,
        envelope: &RoutableEnvelope,
        for_channel: &Hop,
    ) -> Option<String> {
        self.render_config()
            .await
            .render_message(envelope, for_channel)
    }

    async fn update_render(&self, change: impl FnOnce(&mut RenderConfig) -> bool) -> bool {
        let mut guard = self.render.write().await;
        let mut next = guard.as_ref().clone();
        let changed = change(&mut next);
        *guard = Arc::new(next);
        changed
    }

    /// Set the tag and/or text color of a hop, optionally only when rendered into `where_to`
    pub async fn set_hop_color(
        &self,
        hop: &str,
        where_to: Option<&str>,
        tag_color: Option<&str>,
        text_color: Option<&str>,
    ) -> Result<(), ConfigError> {
        let color = HopColor::from_record(&HopColorRecord {
            hop: hop.to_string(),
            where_to: where_to.map(str::to_string),
            tag_color: tag_color.map(str::to_string),
            text_color: text_color.map(str::to_string),
        })?;
        let _lock = self.mutation.lock().await;
        self.store.upsert_color(color.to_record()).await?;
        debug!("Set color for {}", color.hop);
        self.update_render(|config| {
            config.upsert_color(color);
            true
        })
        .await;
        Ok(())
    }

    /// Remove a color override, returning whether it existed
    pub async fn remove_hop_color(&self, hop: &str, where_to: Option<&str>) -> Result<bool, ConfigError> {
        let hop = ChannelPattern::parse(hop)?.to_string();
        let where_to = where_to
            .map(|w| ChannelPattern::parse(w).map(|p| p.to_string()))
            .transpose()?;
        let _lock = self.mutation.lock().await;
        let stored = self.store.delete_color(&hop, where_to.as_deref()).await?;
        let in_config = self
            .update_render(|config| config.remove_color(&hop, where_to.as_deref()))
            .await;
        Ok(stored || in_config)
    }

    /// Set how a hop is displayed; `%s` in `format` is replaced by the hop label
    pub async fn set_hop_format(&self, hop: &str, render: bool, format: &str) -> Result<(), ConfigError> {
        let format = HopFormat::from_record(&HopFormatRecord {
            hop: hop.to_string(),
            render,
            format: format.to_string(),
        })?;
        let _lock = self.mutation.lock().await;
        self.store.upsert_format(format.to_record()).await?;
        self.update_render(|config| {
            config.upsert_format(format);
            true
        })
        .await;
        Ok(())
    }

    /// Remove a hop format, returning whether it existed
    pub async fn remove_hop_format(&self, hop: &str) -> Result<bool, ConfigError> {
        let hop = ChannelPattern::parse(hop)?.to_string();
        let _lock = self.mutation.lock().await;
        let stored = self.store.delete_format(&hop).await?;
        let in_config = self.update_render(|config| config.remove_format(&hop)).await;
        Ok(stored || in_config)
    }

    /// Rebuild the rule table and rendering config from the store.
    ///
    /// Entries that no longer parse are skipped with a warning. Receivers
    /// are usually registered later, so destinations are not checked.
    pub async fn load_from_store(&self) -> Result<usize, ConfigError> {
        let _lock = self.mutation.lock().await;
        let snapshot = self.store.load().await?;

        let mut routes = Vec::with_capacity(snapshot.routes.len());
        for record in &snapshot.routes {
            let compiled = Route::from_record(record)
                .map_err(ConfigError::from)
                .and_then(|route| CompiledRoute::compile(route, &self.registry));
            match compiled {
                Ok(route) => routes.push(Arc::new(route)),
                Err(e) => warn!("Skipping stored route {}: {}", record.id, e),
            }
        }

        let mut render = self.render_config().await.without_overrides();
        for record in &snapshot.colors {
            match HopColor::from_record(record) {
                Ok(color) => render.upsert_color(color),
                Err(e) => warn!("Skipping stored color for {}: {}", record.hop, e),
            }
        }
        for record in &snapshot.formats {
            match HopFormat::from_record(record) {
                Ok(format) => render.upsert_format(format),
                Err(e) => warn!("Skipping stored format for {}: {}", record.hop, e),
            }
        }

        let loaded = routes.len();
        *self.routes.write().await = Arc::new(routes);
        *self.render.write().await = Arc::new(render);
        info!(
            "Loaded {} routes, {} colors, {} formats from store",
            loaded,
            snapshot.colors.len(),
            snapshot.formats.len()
        );
        Ok(loaded)
    }

    /// Counters and registry sizes
    pub async fn stats(&self) -> HubStats {
        HubStats {
            delivered: self.delivered_counter.load(Ordering::Relaxed),
            no_match: self.no_match_counter.load(Ordering::Relaxed),
            suppressed: self.suppressed_counter.load(Ordering::Relaxed),
            routes: self.routes.read().await.len(),
            receivers: self.receivers.len(),
            emitters: self.emitters.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Character, HopType};
    use crate::modifier::{ArgValue, RouteModifier};
    use relay_storage::MemoryRouteStore;

    #[derive(Default)]
    struct Collector {
        got: Mutex<Vec<(RoutableEnvelope, String)>>,
        refuse: bool,
    }

    #[async_trait]
    impl MessageReceiver for Collector {
        async fn receive(&self, envelope: RoutableEnvelope, destination: &str) -> bool {
            if self.refuse {
                return false;
            }
            self.got.lock().await.push((envelope, destination.to_string()));
            true
        }
    }

    struct Source;

    impl MessageEmitter for Source {
        fn description(&self) -> String {
            "test source".to_string()
        }
    }

    fn hub() -> MessageHub {
        MessageHub::new(Arc::new(MemoryRouteStore::new()))
    }

    fn receiver(hub: &MessageHub, name: &str) -> Arc<Collector> {
        let collector = Arc::new(Collector::default());
        hub.register_receiver(name, collector.clone(), false).unwrap();
        collector
    }

    fn msg(origin: Hop, text: &str) -> RoutableEnvelope {
        RoutableEnvelope::message(origin, text)
    }

    #[tokio::test]
    async fn test_prefix_route_strips_and_filters() {
        let hub = hub();
        let target = receiver(&hub, "discord-priv(general)");
        hub.add_route(
            Route::new("relay(*)", "discord-priv(*)").with_modifier(
                RouteModifier::new("if-has-prefix").arg("prefix", ArgValue::Str("!".into())),
            ),
        )
        .await
        .unwrap();

        let from = Hop::named(HopType::Relay, "alliance");
        assert_eq!(
            hub.handle(msg(from.clone(), "!hi")).await,
            DeliveryResult::Delivered(1)
        );
        assert_eq!(hub.handle(msg(from, "hi")).await, DeliveryResult::Suppressed);

        let got = target.got.lock().await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0.text(), Some("hi"));
        assert_eq!(got[0].1, "discord-priv(general)");
        assert_eq!(
            got[0].0.path.last(),
            Some(&Hop::named(HopType::DiscordPriv, "general"))
        );
    }

    #[tokio::test]
    async fn test_two_way_route_and_cycle_guard() {
        let hub = hub();
        let private = receiver(&hub, "priv(X)");
        let org = receiver(&hub, "org");
        hub.add_route(Route::new("priv(X)", "org").two_way()).await.unwrap();

        let from_org = msg(Hop::new(HopType::Org, None), "to priv");
        assert_eq!(hub.handle(from_org).await, DeliveryResult::Delivered(1));
        let from_priv = msg(Hop::named(HopType::Priv, "x"), "to org");
        assert_eq!(hub.handle(from_priv).await, DeliveryResult::Delivered(1));
        assert_eq!(private.got.lock().await.len(), 1);
        assert_eq!(org.got.lock().await.len(), 1);

        let mut looped = msg(Hop::new(HopType::Org, None), "again");
        looped.push_hop(Hop::named(HopType::Priv, "X"));
        assert_eq!(hub.handle(looped).await, DeliveryResult::Suppressed);
        assert_eq!(private.got.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_wildcard_fan_out_skips_origin() {
        let hub = hub();
        let a = receiver(&hub, "relay(a)");
        let b = receiver(&hub, "relay(b)");
        hub.add_route(Route::new("relay(*)", "relay(*)")).await.unwrap();

        let result = hub.handle(msg(Hop::named(HopType::Relay, "a"), "hi")).await;
        assert_eq!(result, DeliveryResult::Delivered(1));
        assert!(a.got.lock().await.is_empty());
        assert_eq!(b.got.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_relayed_envelope_reaches_same_named_channel() {
        let hub = hub();
        let console = receiver(&hub, "console");
        let peer = receiver(&hub, "relay(peer)");
        hub.add_route(Route::new("relay(*)", "console").two_way())
            .await
            .unwrap();

        let mut relayed = msg(Hop::new(HopType::Console, None), "hello from the other bot");
        relayed.prepend_hop(Hop::named(HopType::Relay, "peer"));
        assert_eq!(hub.handle(relayed).await, DeliveryResult::Delivered(1));

        let got = console.got.lock().await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0.path.len(), 3);
        assert!(peer.got.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_two_way_route_delivers_once() {
        let hub = hub();
        let a = receiver(&hub, "relay(a)");
        let b = receiver(&hub, "relay(b)");
        hub.add_route(Route::new("relay(*)", "relay(*)").two_way())
            .await
            .unwrap();

        let result = hub.handle(msg(Hop::named(HopType::Relay, "a"), "hi")).await;
        assert_eq!(result, DeliveryResult::Delivered(1));
        assert!(a.got.lock().await.is_empty());
        assert_eq!(b.got.lock().await.len(), 1);
        assert_eq!(hub.stats().await.delivered, 1);
    }

    #[tokio::test]
    async fn test_no_match_and_refusal() {
        let hub = hub();
        assert_eq!(
            hub.handle(msg(Hop::new(HopType::Org, None), "x")).await,
            DeliveryResult::NoMatch
        );

        let refusing = Arc::new(Collector {
            refuse: true,
            ..Default::default()
        });
        hub.register_receiver("console", refusing, false).unwrap();
        hub.add_route(Route::new("org", "console")).await.unwrap();
        assert_eq!(
            hub.handle(msg(Hop::new(HopType::Org, None), "x")).await,
            DeliveryResult::Suppressed
        );

        hub.unregister_receiver("console");
        assert_eq!(
            hub.handle(msg(Hop::new(HopType::Org, None), "x")).await,
            DeliveryResult::NoMatch
        );

        let empty = RoutableEnvelope {
            path: Vec::new(),
            ..msg(Hop::new(HopType::Org, None), "x")
        };
        assert_eq!(hub.handle(empty).await, DeliveryResult::NoMatch);

        let stats = hub.stats().await;
        assert_eq!(stats.no_match, 3);
        assert_eq!(stats.suppressed, 1);
    }

    #[tokio::test]
    async fn test_add_route_validation() {
        let hub = hub();
        assert!(matches!(
            hub.add_route(Route::new("org", "console")).await,
            Err(ConfigError::UnreachableDestination(_))
        ));
        assert!(matches!(
            hub.add_route(Route::new("chat", "relay(*)")).await,
            Err(ConfigError::UnknownHopType(_))
        ));
        assert!(matches!(
            hub.add_route(Route::new("org", "relay(*)").with_modifier(RouteModifier::new("nope")))
                .await,
            Err(ConfigError::Modifier(_))
        ));
        assert!(matches!(
            hub.add_route_dsl("route add org =>").await,
            Err(ConfigError::Dsl(_))
        ));
        assert!(hub.add_route(Route::new("org", "relay(*)")).await.is_ok());
        assert!(hub.routes().await.len() == 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let hub = hub();
        receiver(&hub, "org");
        let again = Arc::new(Collector::default());
        assert!(matches!(
            hub.register_receiver("ORG", again.clone(), false),
            Err(ConfigError::DuplicateReceiver(_))
        ));
        hub.register_receiver("org", again, true).unwrap();
        assert_eq!(hub.receivers(), vec!["org".to_string()]);

        hub.register_emitter("org", Arc::new(Source), false).unwrap();
        assert!(matches!(
            hub.register_emitter("org", Arc::new(Source), false),
            Err(ConfigError::DuplicateEmitter(_))
        ));
        assert_eq!(
            hub.emitters(),
            vec![("org".to_string(), "test source".to_string())]
        );
        assert!(hub.unregister_emitter("org"));
        assert!(hub.register_receiver("priv(*)", Arc::new(Collector::default()), false).is_err());
    }

    #[tokio::test]
    async fn test_delete_route() {
        let hub = hub();
        receiver(&hub, "console");
        let id = hub.add_route_dsl("route add org -> console").await.unwrap();
        assert!(hub.route(id).await.is_some());
        hub.delete_route(id).await.unwrap();
        assert!(hub.route(id).await.is_none());
        assert!(matches!(
            hub.delete_route(id).await,
            Err(ConfigError::RouteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_from_store() {
        let store: Arc<dyn RouteStore> = Arc::new(MemoryRouteStore::new());
        let first = MessageHub::new(store.clone());
        receiver(&first, "org");
        first
            .add_route_dsl(r#"route add relay(*) <-> org if-not-by(sender="Spam") route-silently"#)
            .await
            .unwrap();
        first
            .set_hop_color("relay(*)", None, Some("#ff0000"), None)
            .await
            .unwrap();
        first.set_hop_format("org", false, "%s").await.unwrap();

        let second = MessageHub::new(store);
        assert_eq!(second.load_from_store().await.unwrap(), 1);
        assert_eq!(second.routes().await, first.routes().await);

        let org = receiver(&second, "org");
        let env = msg(Hop::named(HopType::Relay, "ally"), "hello")
            .with_character(Character::new("Nady", None));
        assert_eq!(second.handle(env).await, DeliveryResult::Delivered(1));
        let delivered = org.got.lock().await[0].0.clone();
        assert!(delivered.route_silently);

        let mut visible = delivered.clone();
        visible.route_silently = false;
        assert_eq!(
            second.render_path(&visible, &Hop::new(HopType::Console, None)).await,
            "<font color=#FF0000>[ally]</font>"
        );
        assert!(second.remove_hop_format("org").await.unwrap());
        assert!(second.remove_hop_color("relay(*)", None).await.unwrap());
        assert!(!second.remove_hop_color("relay(*)", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_color_rejected() {
        let hub = hub();
        assert!(matches!(
            hub.set_hop_color("org", None, Some("red"), None).await,
            Err(ConfigError::InvalidColor(_))
        ));
    }
}
