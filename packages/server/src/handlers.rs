//! HTTP handler functions for the police log API.

use actix_web::{HttpResponse, web};
use police_log_analytics::parse_query_id;
use police_log_analytics_models::QueryId;
use police_log_server_models::{
    ApiError, ApiFilterOptions, ApiFormOptions, ApiHealth, ApiQuerySummary, ApiStop,
    QueryRunResponse, StopQueryParams, StopsResponse, SubmitStopResponse,
};
use police_log_stop_models::{FilterOptions, NewStopForm, StopFilter};
use police_log_store::{StoreError, load_or_empty};

use crate::AppState;

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.store.backend().to_string(),
    })
}

/// `GET /api/filters`
///
/// Sidebar options derived from every stored record.
pub async fn filters(state: web::Data<AppState>) -> HttpResponse {
    let loaded = load_or_empty(state.store.records().as_ref(), &StopFilter::default()).await;
    let options = FilterOptions::from_records(&loaded.records);

    HttpResponse::Ok().json(ApiFilterOptions::new(options, loaded.error))
}

/// `GET /api/form-options`
pub async fn form_options() -> HttpResponse {
    HttpResponse::Ok().json(ApiFormOptions::default())
}

/// `GET /api/stops`
///
/// Filtered stops in store order. A store failure is reported inline next
/// to an empty list.
pub async fn stops(
    state: web::Data<AppState>,
    params: web::Query<StopQueryParams>,
) -> HttpResponse {
    let filter = match params.to_filter() {
        Ok(filter) => filter,
        Err(e) => return HttpResponse::BadRequest().json(ApiError::new(e.to_string())),
    };
    let loaded = load_or_empty(state.store.records().as_ref(), &filter).await;
    let count = loaded.records.len();

    let stops: Vec<ApiStop> = loaded
        .records
        .into_iter()
        .take(params.limit.unwrap_or(usize::MAX))
        .map(ApiStop::from)
        .collect();

    HttpResponse::Ok().json(StopsResponse {
        count,
        stops,
        error: loaded.error,
    })
}

/// `POST /api/stops`
///
/// Appends the submitted stop and returns it with its narrative.
pub async fn submit_stop(
    state: web::Data<AppState>,
    form: web::Json<NewStopForm>,
) -> HttpResponse {
    let record = match form.to_record() {
        Ok(record) => record,
        Err(e) => return HttpResponse::BadRequest().json(ApiError::new(e.to_string())),
    };

    match state.store.records().append(record.clone()).await {
        Ok(()) => HttpResponse::Ok().json(SubmitStopResponse {
            stop: ApiStop::from(record),
            narrative: form.narrative(),
        }),
        Err(StoreError::Invalid(e)) => {
            HttpResponse::BadRequest().json(ApiError::new(e.to_string()))
        }
        Err(e) => {
            log::error!("Failed to append stop: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to save stop"))
        }
    }
}

/// `GET /api/queries`
pub async fn queries() -> HttpResponse {
    let summaries: Vec<ApiQuerySummary> = QueryId::all()
        .iter()
        .copied()
        .map(ApiQuerySummary::from)
        .collect();

    HttpResponse::Ok().json(summaries)
}

/// `GET /api/queries/{id}`
///
/// Runs one catalog query over the filtered records. Execution failures
/// are reported inline; an unknown id is a 404.
pub async fn run_query(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<StopQueryParams>,
) -> HttpResponse {
    let id = match parse_query_id(&path) {
        Ok(id) => id,
        Err(e) => return HttpResponse::NotFound().json(ApiError::new(e.to_string())),
    };

    let filter = match params.to_filter() {
        Ok(filter) => filter,
        Err(e) => return HttpResponse::BadRequest().json(ApiError::new(e.to_string())),
    };
    match police_log_analytics::run_query(state.engine.as_ref(), id, &filter).await {
        Ok(result) => HttpResponse::Ok().json(QueryRunResponse {
            result: Some(result),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to run query {id}: {e}");
            HttpResponse::Ok().json(QueryRunResponse {
                result: None,
                error: Some(format!("Query failed: {e}")),
            })
        }
    }
}
