use crate::{
    attendance::error::AttendanceError,
    auth::auth::AuthUser,
    geo::{Coordinate, geocode::Geocoder},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GeocodeQuery {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, ToSchema)]
pub struct GeocodeResponse {
    pub location: Coordinate,
    /// Falls back to `"lat, lng"` when no provider answers
    #[schema(example = "Gulshan, Dhaka, Bangladesh")]
    pub address: String,
}

/// Preview the address that a check-in at this position would be tagged with.
#[utoipa::path(
    get,
    path = "/api/geocode",
    params(GeocodeQuery),
    responses(
        (status = 200, description = "Best-effort address", body = GeocodeResponse),
        (status = 400, description = "Invalid coordinate")
    ),
    security(("bearer_auth" = [])),
    tag = "Geocode"
)]
pub async fn reverse_geocode(
    _auth: AuthUser,
    geocoder: web::Data<Geocoder>,
    query: web::Query<GeocodeQuery>,
) -> actix_web::Result<HttpResponse> {
    let location =
        Coordinate::new(query.latitude, query.longitude).map_err(AttendanceError::from)?;
    let address = geocoder.reverse(location).await;

    Ok(HttpResponse::Ok().json(GeocodeResponse { location, address }))
}
