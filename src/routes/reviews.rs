//! Review routes

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::str::FromStr;
use std::sync::Arc;

use super::{
    decode_segment, not_found_response, read_json, require_caller, respond, segments, FullBody,
};
use crate::library::{ReviewDraft, ReviewStatus};
use crate::server::AppState;
use crate::types::Result;

pub async fn handle_reviews_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let reviews = &state.library.reviews;

    match (method, segments(path).as_slice()) {
        (Method::PUT, ["reviews"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "update_review")?;
                let draft: ReviewDraft = read_json(req).await?;
                reviews.create_or_update(&caller.web3_address, draft).await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::POST, ["reviews", work_id, "submit", status]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "submit_work_review")?;
                let status = ReviewStatus::from_str(&decode_segment(status)?)?;
                reviews
                    .submit(&caller.web3_address, &decode_segment(work_id)?, status)
                    .await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::GET, ["reviews", work_id]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "work_review")?;
                reviews
                    .review_for_validator(&caller.web3_address, &decode_segment(work_id)?)
                    .await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::GET, ["reviews", work_id, "all"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "work_reviews")?;
                reviews
                    .reviews_for_author(&caller.web3_address, &decode_segment(work_id)?)
                    .await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::GET, ["reviews", work_id, "status"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "work_review_status")?;
                reviews
                    .review_statuses(&caller.web3_address, &decode_segment(work_id)?)
                    .await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        _ => not_found_response(path),
    }
}
