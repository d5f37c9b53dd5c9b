use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use gcipher_db::storage::CrlStore;

use crate::{ca::pem, context::ApiContext, error::ApiError};

/// The latest revocation list of the active signing identity.
#[utoipa::path(
    get,
    path = "/public/ca/intermediate/crl",
    tags = ["crl"],
    responses(
        (status = 200, description = "PEM encoded CRL", content_type = "application/pkix-crl", body = String),
        (status = 404, description = "No revocation list generated yet"),
    )
)]
pub async fn get_crl(State(ctx): State<ApiContext>) -> Result<impl IntoResponse, ApiError> {
    let issuer = ctx.identities.active().fingerprint();

    let crl = CrlStore::get(&*ctx.db, issuer)
        .await?
        .ok_or(ApiError::NotFound("Revocation list not available"))?;

    let body = pem::encode(pem::X509_CRL, &crl.crl_der)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pkix-crl"),
            (header::CONTENT_DISPOSITION, "attachment; filename=crl.crl"),
        ],
        body,
    ))
}
