use crate::config::{Config, ZoneConfig};
use crate::datasources::geocoding::MIN_QUERY_LEN;
use crate::datasources::{GeocodingClient, OpenMeteoClient};
use crate::db::Database;
use crate::error::{CacaoWatchError, Result};
use crate::logic::quality::{quality_report, recent_hourly_index};
use crate::logic::{DataOrigin, FetchOrchestrator, FetchState, RetryPolicy, WeatherCache};
use crate::models::{DailyOutlook, HourlyIndexPoint, QualityReport, Zone};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Hours shown in the rolling hourly index
const HOURLY_WINDOW: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Hourly,
}

impl Screen {
    pub fn from_key(c: char) -> Option<Self> {
        match c {
            '1' => Some(Screen::Dashboard),
            '2' | 'h' => Some(Screen::Hourly),
            _ => None,
        }
    }
}

pub struct ZoneListState {
    pub highlighted: usize,
}

impl ZoneListState {
    pub fn new(highlighted: usize) -> Self {
        Self { highlighted }
    }

    pub fn next(&mut self, max: usize) {
        if max > 0 && self.highlighted < max - 1 {
            self.highlighted += 1;
        }
    }

    pub fn prev(&mut self) {
        if self.highlighted > 0 {
            self.highlighted -= 1;
        }
    }
}

/// Work the main loop runs between frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Select(usize),
    Search(String),
    Clear,
    Refresh,
}

/// Turns configured zones into selectable ones, geocoding those that have no
/// coordinates.
pub struct ZoneResolver {
    geocoder: Option<GeocodingClient>,
    resolved: HashMap<String, Zone>,
}

impl ZoneResolver {
    pub fn new(config: &Config) -> Result<Self> {
        let geocoder = match &config.geocoding {
            Some(g) => Some(GeocodingClient::new(g.clone())?),
            None => None,
        };
        Ok(Self {
            geocoder,
            resolved: HashMap::new(),
        })
    }

    pub async fn resolve(&mut self, zone: &ZoneConfig) -> Result<Zone> {
        if let Some(coordinates) = zone.coordinates() {
            return Ok(zone.to_zone(coordinates));
        }
        if let Some(hit) = self.resolved.get(&zone.key) {
            return Ok(hit.clone());
        }

        let geocoder = self.geocoder.as_ref().ok_or_else(|| {
            CacaoWatchError::Config(format!(
                "zone '{}' has no coordinates and geocoding is not configured",
                zone.key
            ))
        })?;

        let place = geocoder.resolve(&zone.geocode_query()).await?;
        tracing::info!(zone = %zone.key, coordinates = %place.coordinates, "Resolved zone location");
        let resolved = zone.to_zone(place.coordinates);
        self.resolved.insert(zone.key.clone(), resolved.clone());
        Ok(resolved)
    }

    /// Free-text place search; the best match becomes an ad-hoc zone keyed
    /// by its formatted address.
    pub async fn search(&self, query: &str) -> Result<Zone> {
        let geocoder = self.geocoder.as_ref().ok_or_else(|| {
            CacaoWatchError::Config("place search needs a geocoding section in config".into())
        })?;

        let place = geocoder
            .search(query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CacaoWatchError::NotFound(format!("No location found for '{}'", query.trim())))?;

        tracing::info!(query, place = %place.name, coordinates = %place.coordinates, "Place search");
        Ok(place.to_zone())
    }
}

/// Build the orchestrator over the SQLite cache with the configured policy.
pub fn build_orchestrator(
    config: &Config,
    db: &Database,
) -> Result<FetchOrchestrator<OpenMeteoClient>> {
    let ttl = chrono::Duration::try_minutes(config.cache.ttl_minutes).ok_or_else(|| {
        CacaoWatchError::Config(format!(
            "cache.ttl_minutes {} is out of range",
            config.cache.ttl_minutes
        ))
    })?;
    let client = OpenMeteoClient::new(config.provider.clone())?;
    let cache = WeatherCache::new(Arc::new(db.clone()), ttl);
    Ok(FetchOrchestrator::new(
        client,
        cache,
        RetryPolicy::from(&config.retry),
    ))
}

pub struct App {
    pub screen: Screen,
    pub should_quit: bool,
    pub config: Config,
    pub db: Database,

    // Services
    pub orchestrator: FetchOrchestrator<OpenMeteoClient>,
    pub resolver: ZoneResolver,

    // Data derived from the last observed fetch state
    pub fetch_state: FetchState,
    pub report: Option<QualityReport>,
    pub hourly: Vec<HourlyIndexPoint>,
    pub outlook: Vec<DailyOutlook>,
    shown: Option<(String, DateTime<Utc>, DataOrigin)>,

    // UI state
    pub zone_list: ZoneListState,
    /// Place search text while the `/` prompt is open
    pub search_input: Option<String>,
    pub status_message: Option<String>,
    pub pending: Option<PendingAction>,
}

impl App {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let orchestrator = build_orchestrator(&config, &db)?;
        let resolver = ZoneResolver::new(&config)?;

        let mut app = Self {
            screen: Screen::Dashboard,
            should_quit: false,
            config,
            db,
            orchestrator,
            resolver,
            fetch_state: FetchState::Empty,
            report: None,
            hourly: Vec::new(),
            outlook: Vec::new(),
            shown: None,
            zone_list: ZoneListState::new(0),
            search_input: None,
            status_message: None,
            pending: None,
        };

        if let Some(index) = app.initial_zone_index() {
            app.zone_list.highlighted = index;
            app.pending = Some(PendingAction::Select(index));
        }

        Ok(app)
    }

    /// Last remembered zone, else the configured default.
    pub fn initial_zone_index(&self) -> Option<usize> {
        let remembered = match self.db.last_zone() {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("Failed to read last selected zone: {}", e);
                None
            }
        };

        remembered
            .as_deref()
            .and_then(|key| self.zone_index(key))
            .or_else(|| {
                self.config
                    .default_zone
                    .as_deref()
                    .and_then(|key| self.zone_index(key))
            })
    }

    fn zone_index(&self, key: &str) -> Option<usize> {
        self.config.zones.iter().position(|z| z.key == key)
    }

    pub fn switch_screen(&mut self, screen: Screen) {
        self.screen = screen;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn set_status(&mut self, message: &str) {
        self.status_message = Some(message.to_string());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub fn select_highlighted(&mut self) {
        self.pending = Some(PendingAction::Select(self.zone_list.highlighted));
    }

    pub fn clear_selection(&mut self) {
        self.pending = Some(PendingAction::Clear);
    }

    pub fn start_search(&mut self) {
        self.search_input = Some(String::new());
        self.clear_status();
    }

    pub fn cancel_search(&mut self) {
        self.search_input = None;
    }

    pub fn is_searching(&self) -> bool {
        self.search_input.is_some()
    }

    pub fn push_search_char(&mut self, c: char) {
        if let Some(input) = self.search_input.as_mut() {
            input.push(c);
        }
    }

    pub fn pop_search_char(&mut self) {
        if let Some(input) = self.search_input.as_mut() {
            input.pop();
        }
    }

    /// Queue the typed search. Too-short queries keep the prompt open.
    pub fn submit_search(&mut self) {
        let Some(input) = self.search_input.as_ref() else {
            return;
        };
        let query = input.trim().to_string();
        if query.chars().count() < MIN_QUERY_LEN {
            self.set_status(&format!("Escriba al menos {} caracteres", MIN_QUERY_LEN));
            return;
        }

        self.search_input = None;
        self.set_status(&format!("Buscando \"{}\"...", query));
        self.pending = Some(PendingAction::Search(query));
    }

    pub fn request_refresh(&mut self) {
        self.pending = Some(PendingAction::Refresh);
        self.set_status("Actualizando datos...");
    }

    /// Start whatever the last key press asked for. Fetches run on background
    /// tasks; only geocoding is awaited here.
    pub async fn run_pending(&mut self) {
        let Some(action) = self.pending.take() else {
            return;
        };

        match action {
            PendingAction::Select(index) => {
                let Some(zone_config) = self.config.zones.get(index).cloned() else {
                    return;
                };
                match self.resolver.resolve(&zone_config).await {
                    Ok(zone) => {
                        if let Err(e) = self.db.remember_zone(&zone.key) {
                            tracing::warn!("Failed to remember selected zone: {}", e);
                        }
                        self.clear_status();
                        self.orchestrator.spawn_select(Some(zone));
                    }
                    Err(e) => {
                        tracing::warn!(zone = %zone_config.key, "Zone resolution failed: {}", e);
                        self.orchestrator.spawn_select(None);
                        self.set_status(&format!(
                            "No se pudo ubicar {}: {}",
                            zone_config.name, e
                        ));
                    }
                }
            }
            PendingAction::Search(query) => match self.resolver.search(&query).await {
                Ok(zone) => {
                    self.clear_status();
                    self.orchestrator.spawn_select(Some(zone));
                }
                Err(e) => {
                    tracing::warn!(query = %query, "Place search failed: {}", e);
                    self.set_status(&format!("No se encontró \"{}\": {}", query, e));
                }
            },
            PendingAction::Clear => {
                self.orchestrator.spawn_select(None);
                self.clear_status();
            }
            PendingAction::Refresh => {
                let orchestrator = self.orchestrator.clone();
                tokio::spawn(async move {
                    orchestrator.refresh().await;
                });
            }
        }
    }

    /// Periodic tick: refetch only when the shown data has gone stale.
    pub fn tick(&self) {
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator.refresh_if_stale().await;
        });
    }

    /// Pull the orchestrator state and recompute scores when it changed.
    pub async fn sync_state(&mut self) {
        let state = self.orchestrator.state().await;
        let key = match &state {
            FetchState::Ready {
                zone,
                fetched_at,
                origin,
                ..
            } => Some((zone.key.clone(), *fetched_at, *origin)),
            _ => None,
        };

        if key != self.shown {
            match state.snapshot() {
                Some(snapshot) => {
                    self.report = Some(quality_report(snapshot));
                    self.hourly = recent_hourly_index(snapshot, HOURLY_WINDOW);
                    self.outlook = snapshot.daily_outlook();
                }
                None => {
                    self.report = None;
                    self.hourly.clear();
                    self.outlook.clear();
                }
            }
            self.shown = key;
        }

        self.fetch_state = state;
    }

    pub fn selected_key(&self) -> Option<&str> {
        self.fetch_state.zone().map(|z| z.key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeocodingConfig;
    use crate::models::snapshot::fixtures::sample_snapshot;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_with(config: Config) -> App {
        App::new(config, Database::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn zone_list_stays_in_bounds() {
        let mut list = ZoneListState::new(0);
        list.prev();
        assert_eq!(list.highlighted, 0);
        list.next(2);
        list.next(2);
        assert_eq!(list.highlighted, 1);
    }

    #[test]
    fn starts_without_selection_by_default() {
        let app = app_with(Config::default());
        assert_eq!(app.pending, None);
        assert!(matches!(app.fetch_state, FetchState::Empty));
    }

    #[test]
    fn default_zone_is_selected_at_startup() {
        let config = Config {
            default_zone: Some("naranjal,guayas".into()),
            ..Config::default()
        };
        let app = app_with(config);
        assert_eq!(app.zone_list.highlighted, 2);
        assert_eq!(app.pending, Some(PendingAction::Select(2)));
    }

    #[test]
    fn remembered_zone_wins_over_default() {
        let db = Database::open_in_memory().unwrap();
        db.remember_zone("mera,pastaza").unwrap();
        let config = Config {
            default_zone: Some("naranjal,guayas".into()),
            ..Config::default()
        };
        let app = App::new(config, db).unwrap();
        assert_eq!(app.initial_zone_index(), Some(6));
    }

    #[tokio::test]
    async fn resolver_uses_configured_coordinates() {
        let mut resolver = ZoneResolver::new(&Config::default()).unwrap();
        let zone = resolver.resolve(&Config::default().zones[0]).await.unwrap();
        assert_eq!(zone.key, "jipijapa,manabi");
        assert_eq!(zone.variety.as_deref(), Some("Arriba Nacional"));
    }

    #[tokio::test]
    async fn resolver_without_geocoder_rejects_bare_zone() {
        let mut resolver = ZoneResolver::new(&Config::default()).unwrap();
        let bare = ZoneConfig {
            key: "quevedo,los-rios".into(),
            name: "Los Ríos - Quevedo".into(),
            variety: None,
            latitude: None,
            longitude: None,
        };
        let err = resolver.resolve(&bare).await.unwrap_err();
        assert!(matches!(err, CacaoWatchError::Config(_)));
    }

    #[tokio::test]
    async fn sync_state_scores_cached_snapshot() {
        let mut app = app_with(Config::default());
        let zone = app.config.zones[0].to_zone(app.config.zones[0].coordinates().unwrap());
        app.orchestrator
            .cache()
            .put(&zone.key, sample_snapshot(), Utc::now())
            .unwrap();

        app.orchestrator.select(Some(zone)).await;
        app.sync_state().await;

        assert_eq!(app.report.as_ref().unwrap().overall, 100);
        assert_eq!(app.hourly.len(), HOURLY_WINDOW);
        assert_eq!(app.outlook.len(), 2);
        assert_eq!(app.selected_key(), Some("jipijapa,manabi"));

        app.orchestrator.select(None).await;
        app.sync_state().await;
        assert!(app.report.is_none());
        assert!(app.hourly.is_empty());
    }

    #[test]
    fn oversized_ttl_is_a_config_error() {
        let mut config = Config::default();
        config.cache.ttl_minutes = i64::MAX / 10;
        let db = Database::open_in_memory().unwrap();

        let err = build_orchestrator(&config, &db).unwrap_err();
        assert!(matches!(err, CacaoWatchError::Config(_)));
        assert!(App::new(config, db).is_err());
    }

    #[test]
    fn search_prompt_editing() {
        let mut app = app_with(Config::default());
        app.push_search_char('x');
        assert!(!app.is_searching());

        app.start_search();
        for c in "qux".chars() {
            app.push_search_char(c);
        }
        app.pop_search_char();
        app.submit_search();
        assert!(app.is_searching());
        assert_eq!(app.pending, None);
        assert!(app.status_message.as_deref().unwrap().contains('3'));

        app.push_search_char('e');
        app.submit_search();
        assert!(!app.is_searching());
        assert_eq!(app.pending, Some(PendingAction::Search("que".into())));

        app.start_search();
        app.cancel_search();
        assert!(!app.is_searching());
    }

    #[tokio::test]
    async fn search_without_geocoder_reports_in_status() {
        let mut app = app_with(Config::default());
        app.start_search();
        for c in "quevedo".chars() {
            app.push_search_char(c);
        }
        app.submit_search();
        app.run_pending().await;

        assert!(app.status_message.as_deref().unwrap().contains("quevedo"));
        assert!(matches!(app.orchestrator.state().await, FetchState::Empty));
    }

    #[tokio::test]
    async fn search_selects_best_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geocode/json"))
            .and(query_param("address", "quevedo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "results": [{
                    "formatted_address": "Quevedo, Los Ríos, Ecuador",
                    "geometry": {"location": {"lat": -1.0225, "lng": -79.4631}}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config {
            geocoding: Some(GeocodingConfig {
                api_key: "test_key".into(),
                base_url: server.uri(),
            }),
            ..Config::default()
        };
        let mut app = app_with(config);
        // A fresh cache entry keeps the forecast off the network
        app.orchestrator
            .cache()
            .put("quevedo,los-ríos,ecuador", sample_snapshot(), Utc::now())
            .unwrap();

        app.start_search();
        for c in "quevedo".chars() {
            app.push_search_char(c);
        }
        app.submit_search();
        app.run_pending().await;

        for _ in 0..100 {
            app.sync_state().await;
            if matches!(app.fetch_state, FetchState::Ready { .. }) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(app.selected_key(), Some("quevedo,los-ríos,ecuador"));
        let zone = app.fetch_state.zone().unwrap();
        assert_eq!(zone.name, "Quevedo, Los Ríos, Ecuador");
        assert_eq!(zone.coordinates.latitude, -1.0225);
        assert_eq!(app.report.as_ref().unwrap().overall, 100);
        assert!(app.status_message.is_none());
    }
}
