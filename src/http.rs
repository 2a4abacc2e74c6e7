//! HTTP client for the tracker API.
//!
//! One pooled `reqwest` client serves every endpoint. Responses go through
//! a single path that turns non-2xx bodies into [`ApiError::Status`] and
//! decodes JSON. Nothing here retries; the active-users poller layers its
//! own backoff on top of [`TrackerClient::fetch_active_users`].

use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::heatmap::{HeatmapPoint, HeatmapQuery};
use crate::lifecycle::{DateRange, RouteView};
use crate::poller::ActiveUser;
use crate::stations::{LikeAction, LikeStatus, Station, StationDraft};
use crate::stats::{
    DistanceComparison, LeaderboardPeriod, Leaderboards, TopDailyDistance, TopDailyDistancesEnvelope,
    TopSession, TopSessionsEnvelope, TopUser, TotalDistanceEnvelope, WeeklyStats,
};
use crate::LocationSample;

const MAX_IDLE_PER_HOST: usize = 8;

/// Client for the ride tracker API.
#[derive(Debug, Clone)]
pub struct TrackerClient {
    client: Client,
    config: ClientConfig,
}

impl TrackerClient {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfig(format!("failed to create HTTP client: {}", e)))?;

        info!("[TrackerClient] using API at {}", config.base_url);
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Request plumbing
    // -------------------------------------------------------------------------

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ApiResult<T> {
        let url = self.config.endpoint(path);
        let start = Instant::now();
        let response = self.client.get(&url).query(query).send().await?;
        let value = read_json(response).await;
        debug!("[TrackerClient] GET {} in {:?}", path, start.elapsed());
        value
    }

    async fn post_empty(&self, path: &str) -> ApiResult<()> {
        let response = self.client.post(self.config.endpoint(path)).send().await?;
        ensure_success(response).await.map(|_| ())
    }

    // -------------------------------------------------------------------------
    // Routes
    // -------------------------------------------------------------------------

    /// Location samples of one user, optionally limited to a date range.
    pub async fn fetch_route(&self, user_id: i64, range: Option<&DateRange>) -> ApiResult<Vec<LocationSample>> {
        let query = range.map(|r| r.query_params().to_vec()).unwrap_or_default();
        let samples: Vec<LocationSample> = self.get_json(&format!("route/{}", user_id), &query).await?;
        info!("[TrackerClient] route for user {}: {} samples", user_id, samples.len());
        Ok(samples)
    }

    /// Run one fetch through the route view lifecycle.
    ///
    /// Returns whether the response was applied; `false` means a newer
    /// submission superseded it while in flight.
    pub async fn load_route_view(&self, view: &mut RouteView, user_id: i64, range: DateRange) -> bool {
        let request = view.submit(range);
        let outcome = self.fetch_route(user_id, Some(&range)).await;
        if let Err(err) = &outcome {
            warn!("[TrackerClient] route fetch failed: {}", err);
        }
        view.complete(request, outcome)
    }

    pub async fn fetch_weekly_stats(&self, user_id: i64) -> ApiResult<WeeklyStats> {
        self.get_json(&format!("user-stats/week/{}", user_id), &[]).await
    }

    // -------------------------------------------------------------------------
    // Leaderboards
    // -------------------------------------------------------------------------

    pub async fn fetch_top_users(&self, period: LeaderboardPeriod) -> ApiResult<Vec<TopUser>> {
        self.get_json(&format!("top-users/{}", period.as_str()), &[]).await
    }

    pub async fn fetch_top_sessions(&self, period: LeaderboardPeriod) -> ApiResult<Vec<TopSession>> {
        let envelope: TopSessionsEnvelope = self
            .get_json(&format!("top-sessions/{}", period.as_str()), &[])
            .await?;
        Ok(envelope.top_sessions)
    }

    pub async fn fetch_top_daily_distances(&self, period: LeaderboardPeriod) -> ApiResult<Vec<TopDailyDistance>> {
        let envelope: TopDailyDistancesEnvelope = self
            .get_json(&format!("top-daily-distances/{}", period.as_str()), &[])
            .await?;
        Ok(envelope.top_daily_distances)
    }

    /// Total km ridden by everyone in the period.
    pub async fn fetch_total_distance(&self, period: LeaderboardPeriod) -> ApiResult<f64> {
        let envelope: TotalDistanceEnvelope = self
            .get_json(&format!("total-distance/{}", period.as_str()), &[])
            .await?;
        Ok(envelope.total_distance)
    }

    pub async fn fetch_distance_comparison(&self, period: LeaderboardPeriod) -> ApiResult<DistanceComparison> {
        self.get_json(&format!("total-category-by-distance/{}", period.as_str()), &[])
            .await
    }

    /// All leaderboard sections for a period, fetched concurrently.
    ///
    /// The first failing request fails the whole bundle.
    pub async fn fetch_leaderboards(&self, period: LeaderboardPeriod) -> ApiResult<Leaderboards> {
        let start = Instant::now();
        let (top_users, top_sessions, top_daily_distances, total_distance, comparison) = futures::try_join!(
            self.fetch_top_users(period),
            self.fetch_top_sessions(period),
            self.fetch_top_daily_distances(period),
            self.fetch_total_distance(period),
            self.fetch_distance_comparison(period),
        )?;

        info!(
            "[TrackerClient] leaderboards {}: {} users, {} sessions, {} days in {:?}",
            period.as_str(),
            top_users.len(),
            top_sessions.len(),
            top_daily_distances.len(),
            start.elapsed()
        );

        Ok(Leaderboards {
            period,
            top_users,
            top_sessions,
            top_daily_distances,
            total_distance,
            comparison: Some(comparison),
        })
    }

    // -------------------------------------------------------------------------
    // Heatmap
    // -------------------------------------------------------------------------

    pub async fn fetch_heatmap(&self, query: HeatmapQuery) -> ApiResult<Vec<HeatmapPoint>> {
        let points: Vec<HeatmapPoint> = self.get_json(&query.path(), &[]).await?;
        debug!("[TrackerClient] {} -> {} points", query.path(), points.len());
        Ok(points)
    }

    // -------------------------------------------------------------------------
    // Markers
    // -------------------------------------------------------------------------

    pub async fn fetch_stations(&self) -> ApiResult<Vec<Station>> {
        self.get_json("charging-stations", &[]).await
    }

    /// Create a marker. Returns it as stored by the server.
    pub async fn add_station(&self, draft: &StationDraft) -> ApiResult<Station> {
        let form = station_form(draft)?;
        let response = self
            .client
            .post(self.config.endpoint("charging-stations"))
            .multipart(form)
            .send()
            .await?;
        let station: Station = read_json(response).await?;
        info!("[TrackerClient] added {} marker {}", station.marker_type.as_str(), station.id);
        Ok(station)
    }

    pub async fn update_station(&self, id: &str, draft: &StationDraft) -> ApiResult<Station> {
        let form = station_form(draft)?;
        let response = self
            .client
            .put(self.config.endpoint(&format!("charging-stations/{}", id)))
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn delete_station(&self, id: &str) -> ApiResult<()> {
        let response = self
            .client
            .delete(self.config.endpoint(&format!("charging-stations/{}", id)))
            .send()
            .await?;
        ensure_success(response).await?;
        info!("[TrackerClient] deleted marker {}", id);
        Ok(())
    }

    pub async fn fetch_like_status(&self, id: &str, user_id: i64) -> ApiResult<LikeStatus> {
        self.get_json(&format!("charging-stations/{}/like-status/{}", id, user_id), &[])
            .await
    }

    /// Apply a like or dislike, then return the refreshed status.
    pub async fn react_to_station(&self, id: &str, user_id: i64, action: LikeAction) -> ApiResult<LikeStatus> {
        self.post_empty(&format!("charging-stations/{}/{}/{}", id, action.as_str(), user_id))
            .await?;
        self.fetch_like_status(id, user_id).await
    }

    pub async fn like_station(&self, id: &str, user_id: i64) -> ApiResult<LikeStatus> {
        self.react_to_station(id, user_id, LikeAction::Like).await
    }

    pub async fn dislike_station(&self, id: &str, user_id: i64) -> ApiResult<LikeStatus> {
        self.react_to_station(id, user_id, LikeAction::Dislike).await
    }

    // -------------------------------------------------------------------------
    // Live positions
    // -------------------------------------------------------------------------

    pub async fn fetch_active_users(&self) -> ApiResult<Vec<ActiveUser>> {
        self.get_json("active-users", &[]).await
    }
}

/// Pass 2xx responses through, turn anything else into a status error.
async fn ensure_success(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let err = ApiError::from_response(status.as_u16(), &body);
    warn!("[TrackerClient] HTTP {} -> {}", status.as_u16(), err);
    Err(err)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn station_form(draft: &StationDraft) -> ApiResult<Form> {
    let mut form = Form::new();
    for (name, value) in draft.form_fields() {
        form = form.text(name, value);
    }
    if let Some(photo) = &draft.photo {
        let part = Part::bytes(photo.bytes.clone())
            .file_name(photo.file_name.clone())
            .mime_str(&photo.mime_type)
            .map_err(|e| ApiError::InvalidInput(format!("invalid photo type {}: {}", photo.mime_type, e)))?;
        form = form.part("photo", part);
    }
    Ok(form)
}
