//! Work and purchase routes
//!
//! Listings are public; a bearer token, when present, identifies the viewer
//! so the access policy can show purchased content and bookmarks.

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::{
    decode_segment, not_found_response, optional_caller, read_json, require_caller, respond,
    segments, FullBody,
};
use crate::library::{NewWork, WorkStatus};
use crate::server::AppState;
use crate::types::Result;
use crate::services::purchases::SettledPurchase;

#[derive(Serialize)]
struct StatusResponse {
    work_id: String,
    status: WorkStatus,
}

#[derive(Serialize)]
struct RemovedResponse {
    work_id: String,
    removed: bool,
}

pub async fn handle_works_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let works = &state.library.works;
    let purchases = &state.library.purchases;

    match (method, segments(path).as_slice()) {
        // =====================================================================
        // Public listings
        // =====================================================================
        (Method::GET, ["works"]) => {
            let result: Result<_> = async {
                let viewer = optional_caller(&req, &state)?;
                works.all(viewer.as_ref().map(|c| c.web3_address.as_str())).await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::GET, ["works", "search", keywords]) => {
            let result: Result<_> = async {
                let viewer = optional_caller(&req, &state)?;
                works
                    .search(
                        viewer.as_ref().map(|c| c.web3_address.as_str()),
                        &decode_segment(keywords)?,
                    )
                    .await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::GET, ["works", "author", address]) => {
            let result: Result<_> = async {
                let viewer = optional_caller(&req, &state)?;
                works
                    .by_author(
                        viewer.as_ref().map(|c| c.web3_address.as_str()),
                        &decode_segment(address)?,
                    )
                    .await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::GET, ["works", "pending"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "pending_works")?;
                works.pending(&caller.web3_address).await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::GET, ["works", work_id]) => {
            let result: Result<_> = async {
                let viewer = optional_caller(&req, &state)?;
                works
                    .get(
                        viewer.as_ref().map(|c| c.web3_address.as_str()),
                        &decode_segment(work_id)?,
                    )
                    .await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        // =====================================================================
        // Lifecycle
        // =====================================================================
        (Method::POST, ["works"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "publish_work")?;
                let draft: NewWork = read_json(req).await?;
                works.publish(&caller.web3_address, draft).await
            }
            .await;
            respond(StatusCode::CREATED, result)
        }

        (Method::POST, ["works", work_id, "approve"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "approve_work")?;
                let work_id = decode_segment(work_id)?;
                let status = works.approve(&caller.web3_address, &work_id).await?;
                Ok(StatusResponse { work_id, status })
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::DELETE, ["works", work_id]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "remove_work")?;
                let work_id = decode_segment(work_id)?;
                works.remove(&caller.web3_address, &work_id).await?;
                Ok(RemovedResponse {
                    work_id,
                    removed: true,
                })
            }
            .await;
            respond(StatusCode::OK, result)
        }

        // =====================================================================
        // Purchases
        // =====================================================================
        (Method::POST, ["works", work_id, "purchase"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "purchase_work")?;
                purchases
                    .purchase(&caller.web3_address, &decode_segment(work_id)?)
                    .await
            }
            .await;
            respond(StatusCode::CREATED, result)
        }

        (Method::GET, ["purchases"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "purchased_works")?;
                purchases.purchased_works(&caller.web3_address).await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::POST, ["internal", "purchases"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "mark_purchased")?;
                let settled: SettledPurchase = read_json(req).await?;
                purchases.record_settled(&caller.web3_address, settled).await
            }
            .await;
            respond(StatusCode::CREATED, result)
        }

        _ => not_found_response(path),
    }
}
