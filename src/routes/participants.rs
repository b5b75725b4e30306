//! Participant routes
//!
//! - POST /participants - register
//! - GET /participants/exists/{address}
//! - GET|PUT /participants/me - basic info, nickname
//! - POST|PUT /participants/me/author - apply for / edit the author profile
//! - POST|PUT /participants/me/validator - apply for / edit the validator profile
//! - GET /authors/{address}, GET /validators/{address}
//! - POST /faucet
//! - POST /dev/token - dev mode only, signs a token for a registered address

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    decode_segment, not_found_response, read_json, require_caller, respond, segments, FullBody,
};
use crate::library::{ProfileFields, Registration};
use crate::server::AppState;
use crate::types::{LibraryError, Result};

#[derive(Deserialize)]
struct NicknameUpdate {
    nickname: String,
}

#[derive(Deserialize)]
struct TokenRequest {
    web3_address: String,
}

#[derive(Serialize)]
struct ExistsResponse {
    exists: bool,
}

#[derive(Serialize)]
struct TxResponse {
    tx_hash: String,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

/// Dev tokens live for a day
const DEV_TOKEN_EXPIRY_SECONDS: u64 = 24 * 60 * 60;

pub async fn handle_participants_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let identity = &state.library.identity;

    match (method, segments(path).as_slice()) {
        (Method::POST, ["participants"]) => {
            let result: Result<_> = async {
                let registration: Registration = read_json(req).await?;
                identity.register(registration).await
            }
            .await;
            respond(StatusCode::CREATED, result)
        }

        (Method::GET, ["participants", "exists", address]) => {
            let result: Result<_> = async {
                let exists = identity.exists(&decode_segment(address)?).await?;
                Ok(ExistsResponse { exists })
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::GET, ["participants", "me"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "get_basic_info")?;
                identity.basic_info(&caller.web3_address).await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::PUT, ["participants", "me"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "update_basic_info")?;
                let update: NicknameUpdate = read_json(req).await?;
                identity
                    .update_nickname(&caller.web3_address, &update.nickname)
                    .await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::POST, ["participants", "me", "author"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "become_author")?;
                let fields: ProfileFields = read_json(req).await?;
                identity.become_author(&caller.web3_address, fields).await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::PUT, ["participants", "me", "author"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "update_author_info")?;
                let fields: ProfileFields = read_json(req).await?;
                identity.update_author(&caller.web3_address, fields).await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::POST, ["participants", "me", "validator"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "become_validator")?;
                let fields: ProfileFields = read_json(req).await?;
                identity.become_validator(&caller.web3_address, fields).await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::PUT, ["participants", "me", "validator"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "update_validator_info")?;
                let fields: ProfileFields = read_json(req).await?;
                identity.update_validator(&caller.web3_address, fields).await
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::GET, ["authors", address]) => {
            let result: Result<_> = async { identity.author_info(&decode_segment(address)?).await }.await;
            respond(StatusCode::OK, result)
        }

        (Method::GET, ["validators", address]) => {
            let result: Result<_> = async { identity.validator_info(&decode_segment(address)?).await }.await;
            respond(StatusCode::OK, result)
        }

        (Method::POST, ["faucet"]) => {
            let result: Result<_> = async {
                let caller = require_caller(&req, &state, "faucet")?;
                let tx_hash = identity.faucet(&caller.web3_address).await?;
                Ok(TxResponse { tx_hash })
            }
            .await;
            respond(StatusCode::OK, result)
        }

        (Method::POST, ["dev", "token"]) if state.args.dev_mode => {
            respond(StatusCode::OK, dev_token(req, &state).await)
        }

        _ => not_found_response(path),
    }
}

async fn dev_token(req: Request<Incoming>, state: &AppState) -> Result<TokenResponse> {
    let request: TokenRequest = read_json(req).await?;
    let participant = state
        .library
        .identity
        .basic_info(&request.web3_address)
        .await
        .map_err(|e| match e {
            LibraryError::NotFound(_) => {
                LibraryError::Unauthorized(format!("{} is not registered", request.web3_address))
            }
            other => other,
        })?;

    let token = state.jwt.generate_token(
        &participant.web3_address,
        participant.role,
        DEV_TOKEN_EXPIRY_SECONDS,
    )?;
    Ok(TokenResponse { token })
}
