//! Bookmark routes
//!
//! - POST /bookmarks/{work_id}
//! - DELETE /bookmarks/{work_id}
//! - GET /bookmarks

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::{decode_segment, not_found_response, require_caller, respond, segments, FullBody};
use crate::server::AppState;
use crate::types::Result;

#[derive(Serialize)]
struct BookmarkResponse {
    work_id: String,
    /// False when the call changed nothing
    changed: bool,
}

pub async fn handle_bookmarks_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let purchases = &state.library.purchases;

    match (method, segments(path).as_slice()) {
        (Method::GET, ["bookmarks"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "bookmarks")?;
                purchases.bookmarks(&caller.web3_address).await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::POST, ["bookmarks", work_id]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "add_bookmark")?;
                let work_id = decode_segment(work_id)?;
                let changed = purchases.add_bookmark(&caller.web3_address, &work_id).await?;
                Ok(BookmarkResponse { work_id, changed })
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::DELETE, ["bookmarks", work_id]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "remove_bookmark")?;
                let work_id = decode_segment(work_id)?;
                let changed = purchases
                    .remove_bookmark(&caller.web3_address, &work_id)
                    .await?;
                Ok(BookmarkResponse { work_id, changed })
            }
            .await;
            respond(StatusCode::OK, result)
        }

        _ => not_found_response(path),
    }
}
