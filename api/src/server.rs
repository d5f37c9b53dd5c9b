use axum::{
    Router,
    extract::MatchedPath,
    http::{HeaderName, Request},
};
use gcipher_common::views::ApiErrorResponse;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info_span;
use utoipa::{
    ToSchema,
    openapi::{Contact, Info, License, OpenApi, RefOr, Response, path::Operation},
};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{context::ApiContext, handlers};

const REQUEST_ID_HEADER: &str = "x-request-id";

fn api_router() -> OpenApiRouter<ApiContext> {
    let openapi = OpenApi::builder()
        .info(
            Info::builder()
                .title("gcipher API Reference")
                .version(env!("CARGO_PKG_VERSION"))
                .license(Some(
                    License::builder()
                        .name("Apache 2.0 License")
                        .identifier(Some(env!("CARGO_PKG_LICENSE")))
                        .build(),
                ))
                .contact(Some(Contact::builder().name(Some("gcipher maintainers")).build())),
        )
        .build();

    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(handlers::certificates::request_certificate))
        .routes(routes!(handlers::certificates::retrieve_certificate))
        .routes(routes!(handlers::certificates::revoke_certificate))
        .routes(routes!(handlers::certificates::list_certificates))
        .routes(routes!(handlers::crl::get_crl))
        .routes(routes!(handlers::health_check))
}

/// The OpenAPI document describing every route.
pub fn openapi() -> OpenApi {
    let (_, mut api) = api_router().split_for_parts();

    api.paths.paths.iter_mut().for_each(|(_path, item)| {
        apply_default_errors(&mut item.get);
        apply_default_errors(&mut item.post);
    });

    api
}

/// The HTTP service, with request tracing and request ids.
pub fn make(context: ApiContext) -> Router {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
            let span = info_span!(
                "http_request",
                method = req.method().to_string(),
                request_id = Option::<&str>::None,
                path = Option::<&str>::None,
            );

            if let Some(request_id) = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
            {
                span.record("request_id", request_id);
            }

            if let Some(path) = req.extensions().get::<MatchedPath>() {
                span.record("path", path.as_str())
            } else {
                span.record("path", req.uri().path())
            };

            span
        }))
        .layer(PropagateRequestIdLayer::new(x_request_id));

    let (router, _) = api_router().layer(middleware).split_for_parts();
    router.with_state(context)
}

fn error_ref(summary: &str) -> RefOr<Response> {
    RefOr::Ref(
        utoipa::openapi::Ref::builder()
            .summary(summary)
            .ref_location_from_schema_name(ApiErrorResponse::name())
            .build(),
    )
}

fn apply_default_errors(item: &mut Option<Operation>) {
    if let Some(item) = item.as_mut() {
        item.responses
            .responses
            .insert("500".into(), error_ref("Internal server error"));

        // Every operation with a body authenticates and validates it
        if item.request_body.is_some() {
            for (status, summary) in [("400", "Malformed request"), ("401", "Unauthenticated")] {
                item.responses
                    .responses
                    .entry(status.into())
                    .or_insert_with(|| error_ref(summary));
            }
        }
    }
}
