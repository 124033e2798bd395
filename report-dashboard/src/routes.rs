use std::sync::Arc;

use axum::Router;
use axum::extract::{Json, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use report_core::report::{REPORT_AGGREGATION_OPTIONS, REPORT_INTERVAL_OPTIONS};
use report_core::{
    AggregationKind, DataReport, GraphKey, HexbinGraph, HexbinQuery, RenderMode, ReportConfig,
    generate_data_report, hexbin_graph,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::charts::svg::render_report;
use crate::config::MAX_UPLOAD_ROWS;
use crate::datasets::{DatasetSummary, summarize};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/report-options", get(report_options))
        .route("/datasets", post(create_dataset).get(list_datasets))
        .route("/datasets/{id}", delete(delete_dataset))
        .route("/datasets/{id}/filter", put(set_filter))
        .route("/datasets/{id}/report", get(report))
        .route("/datasets/{id}/report.svg", get(report_svg))
        .route("/datasets/{id}/hexbin", post(hexbin))
        .with_state(state)
}

#[derive(Serialize)]
pub struct OptionEntry {
    value: Value,
    label: &'static str,
}

#[derive(Serialize)]
pub struct ReportOptions {
    intervals: Vec<OptionEntry>,
    aggregations: Vec<OptionEntry>,
    types: Vec<OptionEntry>,
    default_interval: u32,
}

pub async fn report_options(State(state): State<Arc<AppState>>) -> Json<ReportOptions> {
    let intervals = REPORT_INTERVAL_OPTIONS
        .iter()
        .map(|&(secs, label)| OptionEntry {
            value: Value::from(secs),
            label,
        })
        .collect();
    let aggregations = REPORT_AGGREGATION_OPTIONS
        .iter()
        .map(|&(kind, label)| OptionEntry {
            value: Value::from(kind.map_or("none", |k| k.as_str())),
            label,
        })
        .collect();
    let types = [RenderMode::Independent, RenderMode::StackedSum]
        .into_iter()
        .map(|mode| OptionEntry {
            value: Value::from(mode.as_str()),
            label: mode.label(),
        })
        .collect();

    Json(ReportOptions {
        intervals,
        aggregations,
        types,
        default_interval: state.settings.default_interval_secs,
    })
}

#[derive(Deserialize)]
pub struct CreateDatasetRequest {
    id: String,
    records: Vec<Map<String, Value>>,
}

pub async fn create_dataset(
    State(state): State<Arc<AppState>>,
    Json(data): Json<CreateDatasetRequest>,
) -> Result<(StatusCode, Json<DatasetSummary>), ApiError> {
    if data.id.trim().is_empty() {
        return Err(ApiError::BadRequest("dataset id must not be empty".to_owned()));
    }
    if data.records.len() > MAX_UPLOAD_ROWS {
        return Err(ApiError::BadRequest(format!(
            "{} records exceed the limit of {MAX_UPLOAD_ROWS}",
            data.records.len()
        )));
    }

    // Lock ordering: datasets first, then the memo
    let summary = state.datasets.write().await.insert(&data.id, &data.records);
    state.hexbin_memo.lock().await.clear();

    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn list_datasets(State(state): State<Arc<AppState>>) -> Json<Vec<DatasetSummary>> {
    Json(state.datasets.read().await.summaries())
}

pub async fn delete_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.datasets.write().await.remove(&id) {
        return Err(ApiError::DatasetNotFound(id));
    }
    state.hexbin_memo.lock().await.clear();
    info!(dataset = %id, "Dataset removed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct FilterRequest {
    /// Row indices to keep visible; `null` clears the filter.
    indices: Option<Vec<usize>>,
}

pub async fn set_filter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(data): Json<FilterRequest>,
) -> Result<Json<DatasetSummary>, ApiError> {
    let summary = {
        let mut datasets = state.datasets.write().await;
        let table = datasets
            .get_mut(&id)
            .ok_or_else(|| ApiError::DatasetNotFound(id.clone()))?;
        match data.indices {
            Some(indices) => table.set_filter(indices),
            None => table.clear_filter(),
        }
        summarize(table)
    };
    state.hexbin_memo.lock().await.clear();
    Ok(Json(summary))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    field: Option<String>,
    /// Aggregation name; `none` plots raw samples. Defaults to average.
    aggregation: Option<String>,
    /// Sampling interval in seconds.
    interval: Option<u32>,
    #[serde(rename = "type")]
    report_type: Option<String>,
}

impl ReportQuery {
    fn into_config(self, data_id: &str, default_interval: u32) -> Result<ReportConfig, ApiError> {
        let report_type = self
            .report_type
            .as_deref()
            .map(str::parse::<RenderMode>)
            .transpose()?
            .unwrap_or_default();
        Ok(ReportConfig {
            data_id: Some(data_id.to_owned()),
            field: self.field,
            aggregation: parse_aggregation(
                self.aggregation.as_deref(),
                Some(AggregationKind::Average),
            )?,
            interval_secs: self.interval.unwrap_or(default_interval),
            report_type,
        })
    }
}

fn parse_aggregation(
    raw: Option<&str>,
    default: Option<AggregationKind>,
) -> Result<Option<AggregationKind>, ApiError> {
    match raw {
        None => Ok(default),
        Some(s) if s.trim().eq_ignore_ascii_case("none") => Ok(None),
        Some(s) => Ok(Some(s.parse()?)),
    }
}

async fn build_report(
    state: &AppState,
    id: &str,
    query: ReportQuery,
) -> Result<Option<DataReport>, ApiError> {
    let config = query.into_config(id, state.settings.default_interval_secs)?;
    let datasets = state.datasets.read().await;
    let table = datasets
        .get(id)
        .ok_or_else(|| ApiError::DatasetNotFound(id.to_owned()))?;
    if let Some(field) = config.field.as_deref() {
        let known = table.field_index(field).is_some();
        if known && !table.numeric_fields().iter().any(|f| f.name == field) {
            return Err(ApiError::BadRequest(format!("field `{field}` is not numeric")));
        }
    }
    let report = generate_data_report(table, &config)?;
    debug!(
        dataset = id,
        field = ?config.field,
        aggregation = ?config.aggregation,
        series = report.as_ref().map_or(0, |r| r.chart.series.len()),
        "Report generated"
    );
    Ok(report)
}

pub async fn report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Option<DataReport>>, ApiError> {
    Ok(Json(build_report(&state, &id, query).await?))
}

pub async fn report_svg(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let label = query.field.clone().unwrap_or_else(|| id.clone());
    let report = build_report(&state, &id, query).await?;
    let markup = render_report(report.as_ref(), &label);
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], markup.into_string()))
}

#[derive(Deserialize)]
pub struct HexbinRequest {
    /// Indices of the rows aggregated into the clicked hexbin.
    points: Vec<usize>,
    field: String,
    aggregation: Option<String>,
}

pub async fn hexbin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(data): Json<HexbinRequest>,
) -> Result<Json<Option<HexbinGraph>>, ApiError> {
    let aggregation = parse_aggregation(data.aggregation.as_deref(), None)?;
    let key = (
        id.clone(),
        GraphKey::new(&data.field, aggregation, data.points.as_slice())?,
    );

    let ticket = {
        let mut memo = state.hexbin_memo.lock().await;
        if let Some(cached) = memo.get(&key) {
            debug!(dataset = %id, field = %data.field, "Hexbin graph served from memo");
            return Ok(Json(cached.clone()));
        }
        memo.begin()
    };

    let graph = {
        let datasets = state.datasets.read().await;
        let table = datasets
            .get(&id)
            .ok_or_else(|| ApiError::DatasetNotFound(id.clone()))?;
        let points = data
            .points
            .iter()
            .map(|&i| {
                table
                    .row(i)
                    .ok_or_else(|| ApiError::BadRequest(format!("row {i} is out of range")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let query = HexbinQuery {
            field: data.field.clone(),
            aggregation,
            bucketing: state.hexbin_bucketing(),
        };
        hexbin_graph(table, &points, &query)?
    };

    let kept = state
        .hexbin_memo
        .lock()
        .await
        .publish(ticket, key, graph.clone());
    debug!(dataset = %id, ticket, kept, "Hexbin graph computed");

    Ok(Json(graph))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;
    use shared::config::ReportSettings;
    use tower::ServiceExt;

    use super::*;

    fn app() -> (Arc<AppState>, Router) {
        let state = Arc::new(AppState::new(ReportSettings::default()));
        (Arc::clone(&state), router(state))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn upload_minions(app: &Router) {
        let (status, _) = send(
            app,
            post_json(
                "/datasets",
                json!({
                    "id": "minions",
                    "records": [
                        {"minion_id": "A", "date": 0, "v": 10},
                        {"minion_id": "A", "date": 1000, "v": 20},
                        {"minion_id": "B", "date": 500, "v": 5},
                    ]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    async fn upload_cells(app: &Router) {
        let hour = 3_600_000_i64;
        let (status, _) = send(
            app,
            post_json(
                "/datasets",
                json!({
                    "id": "cells",
                    "records": [
                        {"enodeb_id": 1, "cell_name": "c1", "date": 0, "rsrp": 10.0},
                        {"enodeb_id": 1, "cell_name": "c1", "date": 2 * hour, "rsrp": 20.0},
                        {"enodeb_id": 2, "cell_name": "c2", "date": hour, "rsrp": 30.0},
                    ]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_upload_and_list() {
        let (_, app) = app();
        upload_minions(&app).await;

        let (status, body) = send(&app, get("/datasets")).await;
        assert_eq!(status, StatusCode::OK);
        let list: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(list[0]["id"], "minions");
        assert_eq!(list[0]["rows"], 3);
        assert_eq!(list[0]["fields"][2]["kind"], "integer");
        assert_eq!(list[0]["report_fields"], json!(["date", "v"]));
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let (_, app) = app();
        let (status, _) = send(&app, post_json("/datasets", json!({"id": " ", "records": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_dataset() {
        let (_, app) = app();
        upload_minions(&app).await;

        let delete = || Request::delete("/datasets/minions").body(Body::empty()).unwrap();
        assert_eq!(send(&app, delete()).await.0, StatusCode::NO_CONTENT);
        assert_eq!(send(&app, delete()).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_average_report() {
        let (_, app) = app();
        upload_minions(&app).await;

        let (status, body) = send(&app, get("/datasets/minions/report?field=v&interval=1")).await;
        assert_eq!(status, StatusCode::OK);
        let report: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["summary_title"], "AVG");
        assert_eq!(report["summary_value"], 10.0);
        assert_eq!(report["series"][0]["key"], "B");
        assert_eq!(report["series"][1]["legend"], "A: 15");
        assert_eq!(report["sampling_dates"], json!([0, 1000]));
    }

    #[tokio::test]
    async fn test_raw_report() {
        let (_, app) = app();
        upload_minions(&app).await;

        let (status, body) = send(
            &app,
            get("/datasets/minions/report?field=v&aggregation=none"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let report: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["summary_title"], "");
        assert_eq!(report["series"][1]["values"], json!([[0, 10.0], [1000, 20.0]]));
    }

    #[tokio::test]
    async fn test_missing_field_is_null() {
        let (_, app) = app();
        upload_minions(&app).await;

        let (status, body) = send(&app, get("/datasets/minions/report?field=nope")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"null");
    }

    #[tokio::test]
    async fn test_bad_report_parameters() {
        let (_, app) = app();
        upload_minions(&app).await;

        for uri in [
            "/datasets/minions/report?field=v&aggregation=bogus",
            "/datasets/minions/report?field=v&type=pie",
            "/datasets/minions/report?field=v&aggregation=mode",
            "/datasets/minions/report?field=v&interval=0",
            "/datasets/minions/report?field=minion_id",
        ] {
            let (status, _) = send(&app, get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
        let (status, _) = send(&app, get("/datasets/other/report?field=v")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_report_svg() {
        let (_, app) = app();
        upload_minions(&app).await;

        let response = app
            .clone()
            .oneshot(get("/datasets/minions/report.svg?field=v&type=stacked_sum&interval=1"))
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let svg = String::from_utf8(body.to_vec()).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("SUM AVG"));

        let (_, body) = send(&app, get("/datasets/minions/report.svg?field=nope")).await;
        assert!(String::from_utf8(body).unwrap().contains("nope: no data"));
    }

    #[tokio::test]
    async fn test_hexbin_graph_is_memoised() {
        let (state, app) = app();
        upload_cells(&app).await;

        let request = || {
            post_json(
                "/datasets/cells/hexbin",
                json!({"points": [0, 1, 2], "field": "rsrp", "aggregation": "average"}),
            )
        };
        let (status, body) = send(&app, request()).await;
        assert_eq!(status, StatusCode::OK);
        let graph: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(graph["group_period"], 3_600_000);
        assert_eq!(graph["series"][0]["key"], "1");
        assert_eq!(graph["series"][0]["label"], "c1");
        assert_eq!(graph["group_times"], json!([0, 3_600_000, 7_200_000]));

        let key = (
            "cells".to_owned(),
            GraphKey::new("rsrp", Some(AggregationKind::Average), [0_usize, 1, 2].as_slice()).unwrap(),
        );
        assert!(state.hexbin_memo.lock().await.get(&key).is_some());

        let (_, cached) = send(&app, request()).await;
        assert_eq!(cached, body);
    }

    #[tokio::test]
    async fn test_hexbin_edge_cases() {
        let (_, app) = app();
        upload_cells(&app).await;

        let (status, body) = send(
            &app,
            post_json(
                "/datasets/cells/hexbin",
                json!({"points": [0], "field": "rsrp", "aggregation": "count"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"null");

        let (status, _) = send(
            &app,
            post_json(
                "/datasets/cells/hexbin",
                json!({"points": [7], "field": "rsrp", "aggregation": "average"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_filter_clears_memo() {
        let (state, app) = app();
        upload_cells(&app).await;
        send(
            &app,
            post_json(
                "/datasets/cells/hexbin",
                json!({"points": [0, 1], "field": "rsrp", "aggregation": "max"}),
            ),
        )
        .await;
        assert!(state.hexbin_memo.lock().await.latest().is_some());

        let request = Request::put("/datasets/cells/filter")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"indices": [0, 1]}).to_string()))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let summary: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(summary["filtered_rows"], 2);
        assert!(state.hexbin_memo.lock().await.latest().is_none());
    }

    #[tokio::test]
    async fn test_report_options() {
        let (_, app) = app();
        let (status, body) = send(&app, get("/report-options")).await;
        assert_eq!(status, StatusCode::OK);
        let options: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(options["default_interval"], 10);
        assert_eq!(options["aggregations"][0]["value"], "none");
        assert_eq!(options["types"][1]["value"], "stacked_sum");
    }
}
