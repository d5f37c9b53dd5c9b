use axum::{Json, extract::State, extract::rejection::JsonRejection};
use base64::{Engine, engine::general_purpose::STANDARD};
use futures::TryStreamExt;
use gcipher_common::{
    params::{ApiRequest, CertificateSerialParams, IssueCertificateParams, ListCertificatesParams},
    views::{ApiResponse, CertificateView},
};
use tracing::instrument;

use crate::{context::ApiContext, error::ApiError};

type Payload<T> = Result<Json<ApiRequest<T>>, JsonRejection>;

fn required_serial(params: &CertificateSerialParams) -> Result<&str, ApiError> {
    let serial = params.serial_number.trim();
    if serial.is_empty() {
        return Err(ApiError::malformed("Missing serialnumber parameter"));
    }
    Ok(serial)
}

/// Sign a certificate signing request for the authenticated user.
#[utoipa::path(
    post,
    path = "/api/v1/certificate/request",
    tags = ["certificates"],
    request_body = ApiRequest<IssueCertificateParams>,
    responses(
        (status = 200, description = "Certificate issued", body = ApiResponse<CertificateView>),
        (status = 400, description = "Malformed request or CSR"),
        (status = 409, description = "No free serial number could be found"),
    )
)]
#[instrument(skip_all)]
pub async fn request_certificate(
    State(ctx): State<ApiContext>,
    payload: Payload<IssueCertificateParams>,
) -> Result<Json<ApiResponse<CertificateView>>, ApiError> {
    let Json(request) = payload?;
    let caller = ctx.authenticator.authenticate(&request.auth).await?;
    let owner = caller.owner();

    let csr = STANDARD
        .decode(request.data.csr.trim())
        .map_err(|_| ApiError::malformed("Invalid CSR format"))?;

    let issued = ctx
        .issuer
        .issue(&csr, owner, &request.data.kind, request.data.lifetime)
        .await?;

    Ok(Json(ApiResponse::ok(CertificateView {
        cert_pem: issued.cert_pem,
    })))
}

/// Fetch one of the authenticated user's certificates.
#[utoipa::path(
    post,
    path = "/api/v1/certificate/retrieve",
    tags = ["certificates"],
    request_body = ApiRequest<CertificateSerialParams>,
    responses(
        (status = 200, description = "The certificate", body = ApiResponse<CertificateView>),
        (status = 404, description = "No such certificate for this user"),
    )
)]
#[instrument(skip_all)]
pub async fn retrieve_certificate(
    State(ctx): State<ApiContext>,
    payload: Payload<CertificateSerialParams>,
) -> Result<Json<ApiResponse<CertificateView>>, ApiError> {
    let Json(request) = payload?;
    let caller = ctx.authenticator.authenticate(&request.auth).await?;
    let owner = caller.owner();

    let cert = ctx
        .registry
        .retrieve(required_serial(&request.data)?, owner)
        .await?;

    Ok(Json(ApiResponse::ok(cert.into())))
}

/// Revoke one of the authenticated user's certificates.
#[utoipa::path(
    post,
    path = "/api/v1/certificate/revoke",
    tags = ["certificates"],
    request_body = ApiRequest<CertificateSerialParams>,
    responses(
        (status = 200, description = "Certificate revoked"),
        (status = 404, description = "No such certificate for this user"),
        (status = 409, description = "Certificate already revoked"),
    )
)]
#[instrument(skip_all)]
pub async fn revoke_certificate(
    State(ctx): State<ApiContext>,
    payload: Payload<CertificateSerialParams>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let Json(request) = payload?;
    let caller = ctx.authenticator.authenticate(&request.auth).await?;
    let owner = caller.owner();

    ctx.revocations
        .revoke(required_serial(&request.data)?, owner)
        .await?;

    Ok(Json(ApiResponse::success()))
}

/// List the authenticated user's certificates, optionally by state.
#[utoipa::path(
    post,
    path = "/api/v1/certificate/list",
    tags = ["certificates"],
    request_body = ApiRequest<ListCertificatesParams>,
    responses(
        (status = 200, description = "Matching certificates", body = ApiResponse<Vec<CertificateView>>),
        (status = 400, description = "Unknown state filter"),
    )
)]
#[instrument(skip_all)]
pub async fn list_certificates(
    State(ctx): State<ApiContext>,
    payload: Payload<ListCertificatesParams>,
) -> Result<Json<ApiResponse<Vec<CertificateView>>>, ApiError> {
    let Json(request) = payload?;
    let caller = ctx.authenticator.authenticate(&request.auth).await?;
    let owner = caller.owner();

    let certs: Vec<CertificateView> = ctx
        .registry
        .list(owner, &request.data.state)
        .await?
        .map_ok(CertificateView::from)
        .try_collect()
        .await?;

    Ok(Json(ApiResponse::ok(certs)))
}
